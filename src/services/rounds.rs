//! Approval rounds for round-based artifacts.

use crate::db::pool::DbPool;
use crate::db::votes::{self, NewVote};
use crate::error::AppError;
use crate::models::{ArtifactDescriptor, Flavor, Vote, VoteStatus};
use crate::services::artifact_store::ArtifactStore;
use crate::services::dispatcher::{DispatchReport, NotificationDispatcher};
use crate::services::registry::lock_and_load;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of issuing a round.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    pub round_number: i64,
    pub votes: Vec<Vote>,
    pub delivery: DispatchReport,
}

/// Collapse repeated reviewer IDs, keeping first-occurrence order.
pub fn dedupe_reviewers(reviewer_ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(reviewer_ids.len());
    reviewer_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

pub struct RoundManager {
    pool: DbPool,
    artifacts: Arc<dyn ArtifactStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl RoundManager {
    pub fn new(
        pool: DbPool,
        artifacts: Arc<dyn ArtifactStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            pool,
            artifacts,
            dispatcher,
        }
    }

    /// Issue a new round of approval requests.
    ///
    /// The round number is one past the highest existing round, or 1. One
    /// pending vote per reviewer is committed before any notification goes
    /// out. Once committed the round is reported as issued; notification
    /// failures only show up in the delivery counts.
    ///
    /// # Errors
    /// * `InvalidInput` - empty reviewer list, or a single-decision artifact
    /// * `NotFound` - the artifact does not exist
    pub async fn issue_round(
        &self,
        artifact_id: i64,
        reviewer_ids: &[i64],
        requested_by: Option<i64>,
    ) -> Result<RoundOutcome, AppError> {
        if reviewer_ids.is_empty() {
            return Err(AppError::invalid_input_field(
                "At least one reviewer is required",
                "reviewerIds",
            ));
        }
        let reviewers = dedupe_reviewers(reviewer_ids);

        let mut tx = self.pool.begin().await?;
        let artifact = lock_and_load(&mut tx, artifact_id).await?;

        if artifact.flavor() != Flavor::Rounds {
            return Err(AppError::invalid_input(format!(
                "A {} takes a single decision per reviewer and has no rounds",
                artifact.kind.label()
            )));
        }

        let round_number = votes::max_round(&mut *tx, artifact_id)
            .await?
            .map_or(Vote::DEFAULT_ROUND, |max| max + 1);

        let mut created = Vec::with_capacity(reviewers.len());
        for &reviewer_id in &reviewers {
            let vote = votes::insert_vote(
                &mut *tx,
                &NewVote {
                    artifact_id,
                    reviewer_id,
                    flavor: Flavor::Rounds,
                    round_number,
                    status: VoteStatus::Pending,
                    comment: None,
                    requested_by,
                },
            )
            .await?;
            created.push(vote);
        }

        tx.commit().await?;

        log::info!(
            "[rounds] Issued round {} for artifact {} to {} reviewers",
            round_number,
            artifact_id,
            reviewers.len()
        );

        // The round is committed; nothing below may fail the call.
        let descriptor = match self.artifacts.describe(artifact_id).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) | Err(_) => {
                log::warn!(
                    "[rounds] Could not describe artifact {}, notifying without project name",
                    artifact_id
                );
                ArtifactDescriptor {
                    id: artifact.id,
                    project_id: artifact.project_id,
                    kind: artifact.kind,
                    name: artifact.name.clone(),
                    project_name: None,
                }
            }
        };

        let delivery = self.dispatcher.on_round_issued(&reviewers, &descriptor).await;

        Ok(RoundOutcome {
            round_number,
            votes: created,
            delivery,
        })
    }
}
