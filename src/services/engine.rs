//! Engine facade wiring the approval components together.

use crate::config::EngineConfig;
use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{ArtifactStatus, Decision, EmailDelivery, Notification, ReviewerInfo, Vote, VoteWithReviewer};
use crate::services::aggregation::{RoundScope, StatusAggregator};
use crate::services::artifact_store::{ArtifactStore, SqliteArtifactStore};
use crate::services::directory::{SqliteUserDirectory, UserDirectory};
use crate::services::dispatcher::{DispatchSettings, NotificationDispatcher};
use crate::services::email::{EmailTransport, HttpEmailTransport, LogTransport};
use crate::services::notification_sink::{NotificationSink, SqliteNotificationSink};
use crate::services::registry::{ApprovalRequestRegistry, DecisionOutcome};
use crate::services::rounds::{RoundManager, RoundOutcome};
use serde::Serialize;
use std::sync::Arc;

/// How many notifications a feed returns.
pub const NOTIFICATION_FEED_LIMIT: i64 = 50;

/// Engine tuning.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub round_scope: RoundScope,
    pub dispatch: DispatchSettings,
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            round_scope: config.round_scope,
            dispatch: DispatchSettings {
                public_base_url: config.public_base_url.clone(),
                email_timeout: config.email_timeout(),
                overall_timeout: config.round_timeout(),
            },
        }
    }
}

/// A user's recent notifications plus their unread total.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

pub struct ApprovalEngine {
    registry: ApprovalRequestRegistry,
    rounds: RoundManager,
    dispatcher: Arc<NotificationDispatcher>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ApprovalEngine {
    /// Build an engine whose collaborators all live in the given database.
    pub fn new(pool: DbPool, options: EngineOptions, transport: Arc<dyn EmailTransport>) -> Self {
        Self::with_collaborators(
            pool.clone(),
            options,
            Arc::new(SqliteUserDirectory::new(pool.clone())),
            Arc::new(SqliteArtifactStore::new(pool.clone())),
            Arc::new(SqliteNotificationSink::new(pool)),
            transport,
        )
    }

    pub fn with_collaborators(
        pool: DbPool,
        options: EngineOptions,
        directory: Arc<dyn UserDirectory>,
        artifacts: Arc<dyn ArtifactStore>,
        sink: Arc<dyn NotificationSink>,
        transport: Arc<dyn EmailTransport>,
    ) -> Self {
        let aggregator = StatusAggregator::new(pool.clone(), options.round_scope);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            directory,
            sink,
            transport,
            options.dispatch,
        ));

        Self {
            registry: ApprovalRequestRegistry::new(pool.clone(), aggregator),
            rounds: RoundManager::new(pool, artifacts.clone(), dispatcher.clone()),
            dispatcher,
            artifacts,
        }
    }

    /// Build an engine from configuration, picking the email transport.
    pub fn from_config(pool: DbPool, config: &EngineConfig) -> Result<Self, AppError> {
        let transport: Arc<dyn EmailTransport> = if config.email.enabled {
            Arc::new(HttpEmailTransport::new(config.email.clone())?)
        } else {
            log::info!("[engine] Email disabled, messages will only be logged");
            Arc::new(LogTransport)
        };

        Ok(Self::new(pool, EngineOptions::from(config), transport))
    }

    pub async fn issue_approval_round(
        &self,
        artifact_id: i64,
        reviewer_ids: &[i64],
        requested_by: Option<i64>,
    ) -> Result<RoundOutcome, AppError> {
        self.rounds.issue_round(artifact_id, reviewer_ids, requested_by).await
    }

    /// Votes newest first, with reviewer info where the directory has it.
    pub async fn list_votes(&self, artifact_id: i64) -> Result<Vec<VoteWithReviewer>, AppError> {
        let votes = self.registry.list_votes(artifact_id).await?;

        let mut reviewer_ids: Vec<i64> = votes.iter().map(|v| v.reviewer_id).collect();
        reviewer_ids.sort_unstable();
        reviewer_ids.dedup();
        let users = self.dispatcher.directory().resolve_map(&reviewer_ids).await?;

        Ok(votes
            .into_iter()
            .map(|vote| {
                let reviewer = users.get(&vote.reviewer_id).cloned().map(ReviewerInfo::from);
                VoteWithReviewer { vote, reviewer }
            })
            .collect())
    }

    /// Change a round vote owned by `caller_id`.
    ///
    /// When the status actually changes to a decision, the user who issued
    /// the round gets an in-app notice.
    pub async fn cast_or_update_vote(
        &self,
        vote_id: i64,
        caller_id: i64,
        status: &str,
        comment: Option<String>,
    ) -> Result<Vote, AppError> {
        let decision: Decision = status.parse()?;
        let update = self
            .registry
            .update_vote(vote_id, caller_id, decision, comment)
            .await?;

        if update.previous_status != update.vote.status {
            match self.artifacts.describe(update.vote.artifact_id).await {
                Ok(Some(descriptor)) => self.dispatcher.notify_decision(&update.vote, &descriptor).await,
                Ok(None) => {}
                Err(e) => log::warn!(
                    "[engine] Skipping decision notice for vote {}: {}",
                    update.vote.id,
                    e
                ),
            }
        }

        Ok(update.vote)
    }

    pub async fn record_decision(
        &self,
        artifact_id: i64,
        reviewer_id: i64,
        status: &str,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, AppError> {
        let decision: Decision = status.parse()?;
        self.registry
            .record_decision(artifact_id, reviewer_id, decision, comment)
            .await
    }

    /// Aggregate status computed on demand.
    pub async fn artifact_status(&self, artifact_id: i64) -> Result<ArtifactStatus, AppError> {
        self.registry.aggregator().compute(artifact_id).await
    }

    pub async fn notifications(&self, user_id: i64) -> Result<NotificationFeed, AppError> {
        let sink = self.dispatcher.sink();
        Ok(NotificationFeed {
            notifications: sink.list_for_user(user_id, NOTIFICATION_FEED_LIMIT).await?,
            unread_count: sink.unread_count(user_id).await?,
        })
    }

    /// Mark one of the user's notifications as read.
    pub async fn mark_notification_read(&self, user_id: i64, notification_id: i64) -> Result<(), AppError> {
        if self.dispatcher.sink().mark_read(notification_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::not_found_with_id("Notification", notification_id))
        }
    }

    pub async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64, AppError> {
        self.dispatcher.sink().mark_all_read(user_id).await
    }

    /// Email delivery log for an artifact, newest first.
    pub async fn deliveries(&self, artifact_id: i64) -> Result<Vec<EmailDelivery>, AppError> {
        self.dispatcher.sink().deliveries_for(artifact_id).await
    }
}
