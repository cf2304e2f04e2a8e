//! Durable vote records: listing, single decisions, and vote updates.
//!
//! Every mutation runs in one transaction that starts by locking the
//! artifact row, then writes the vote and recomputes the aggregate before
//! committing. Concurrent mutations on the same artifact are serialized by
//! SQLite's write lock, so a stale vote set is never aggregated.

use crate::db::pool::DbPool;
use crate::db::votes::{self, NewVote};
use crate::db::{self, artifacts};
use crate::error::AppError;
use crate::models::{Artifact, ArtifactStatus, Decision, Flavor, Vote, VoteStatus};
use crate::services::aggregation::StatusAggregator;
use crate::services::guard::VoteMutationGuard;
use serde::Serialize;
use sqlx::SqliteConnection;

/// Result of recording a single decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub vote: Vote,
    pub artifact_status: ArtifactStatus,
}

/// Result of updating a round vote.
#[derive(Debug, Clone)]
pub struct VoteUpdate {
    pub vote: Vote,
    pub previous_status: VoteStatus,
    pub artifact_status: ArtifactStatus,
}

#[derive(Debug, Clone)]
pub struct ApprovalRequestRegistry {
    pool: DbPool,
    aggregator: StatusAggregator,
}

/// Lock the artifact for the rest of the transaction and load it.
pub(crate) async fn lock_and_load(
    conn: &mut SqliteConnection,
    artifact_id: i64,
) -> Result<Artifact, AppError> {
    if !artifacts::lock_artifact(&mut *conn, artifact_id).await? {
        return Err(AppError::not_found_with_id("Artifact", artifact_id));
    }

    artifacts::find_artifact(&mut *conn, artifact_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("Artifact", artifact_id))
}

impl ApprovalRequestRegistry {
    pub fn new(pool: DbPool, aggregator: StatusAggregator) -> Self {
        Self { pool, aggregator }
    }

    pub fn aggregator(&self) -> &StatusAggregator {
        &self.aggregator
    }

    /// All votes for an artifact across every round, newest first.
    pub async fn list_votes(&self, artifact_id: i64) -> Result<Vec<Vote>, AppError> {
        if artifacts::find_artifact(&self.pool, artifact_id).await?.is_none() {
            return Err(AppError::not_found_with_id("Artifact", artifact_id));
        }

        Ok(votes::list_for_artifact(&self.pool, artifact_id).await?)
    }

    /// Record a reviewer's one and only decision on a single-decision artifact.
    ///
    /// A reviewer who already has a vote on the artifact gets `Conflict`,
    /// whatever that vote says. The partial unique index on `votes` backs the
    /// pre-check, so a racing duplicate also ends in `Conflict`.
    pub async fn record_decision(
        &self,
        artifact_id: i64,
        reviewer_id: i64,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, AppError> {
        let mut tx = self.pool.begin().await?;
        let artifact = lock_and_load(&mut tx, artifact_id).await?;

        if artifact.flavor() != Flavor::Single {
            return Err(AppError::invalid_input(format!(
                "A {} is approved through rounds; update the pending vote instead",
                artifact.kind.label()
            )));
        }

        if votes::has_single_vote(&mut *tx, artifact_id, reviewer_id).await? {
            return Err(AppError::conflict(format!(
                "You have already voted on this {}",
                artifact.kind.label()
            )));
        }

        let new_vote = NewVote {
            artifact_id,
            reviewer_id,
            flavor: Flavor::Single,
            round_number: Vote::DEFAULT_ROUND,
            status: decision.into(),
            comment: comment.filter(|c| !c.is_empty()),
            requested_by: None,
        };

        let vote = match votes::insert_vote(&mut *tx, &new_vote).await {
            Ok(vote) => vote,
            Err(e) if votes::is_unique_violation(&e) => {
                return Err(AppError::conflict(format!(
                    "You have already voted on this {}",
                    artifact.kind.label()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let artifact_status = self.aggregator.recompute_in(&mut tx, &artifact).await?;
        tx.commit().await?;

        log::info!(
            "[registry] Reviewer {} {} artifact {} -> {}",
            reviewer_id,
            decision,
            artifact_id,
            artifact_status
        );

        Ok(DecisionOutcome {
            vote,
            artifact_status,
        })
    }

    /// Transition a round vote on behalf of `caller_id`.
    pub async fn update_vote(
        &self,
        vote_id: i64,
        caller_id: i64,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<VoteUpdate, AppError> {
        // Ownership and flavor never change, so they can be checked before
        // taking the write lock.
        let existing = votes::find_vote(&self.pool, vote_id).await?;
        let existing = VoteMutationGuard::authorize(existing, vote_id, caller_id)?;

        let mut tx = self.pool.begin().await?;
        let artifact = lock_and_load(&mut tx, existing.artifact_id).await?;

        let current = votes::find_vote(&mut *tx, vote_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("Vote", vote_id))?;
        let change = VoteMutationGuard::transition(&current, decision, comment, db::now_millis());

        let vote = votes::apply_change(&mut *tx, vote_id, &change)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("Vote", vote_id))?;

        let artifact_status = self.aggregator.recompute_in(&mut tx, &artifact).await?;
        tx.commit().await?;

        log::info!(
            "[registry] Vote {} {} -> {} (artifact {} now {})",
            vote_id,
            current.status,
            vote.status,
            artifact.id,
            artifact_status
        );

        Ok(VoteUpdate {
            vote,
            previous_status: current.status,
            artifact_status,
        })
    }
}
