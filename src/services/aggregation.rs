//! Vote aggregation: derive an artifact-level status from its votes.
//!
//! The mapping itself is one pure function, [`aggregate`]. Policies decide
//! which votes are in scope and whether the result is written back onto the
//! artifact, so "all rounds" versus "latest round" is a configuration choice
//! rather than a code path.

use crate::db::pool::DbPool;
use crate::db::{artifacts, votes};
use crate::error::AppError;
use crate::models::{Artifact, ArtifactStatus, Flavor, Vote, VoteStatus};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

/// Map a set of vote statuses to the aggregate status.
///
/// Any rejection wins; otherwise a non-empty set of approvals is approved;
/// everything else (no votes, or some still pending) is pending.
pub fn aggregate<I>(statuses: I) -> ArtifactStatus
where
    I: IntoIterator<Item = VoteStatus>,
{
    let mut seen_any = false;
    let mut all_approved = true;

    for status in statuses {
        seen_any = true;
        match status {
            VoteStatus::Rejected => return ArtifactStatus::Rejected,
            VoteStatus::Pending => all_approved = false,
            VoteStatus::Approved => {}
        }
    }

    if seen_any && all_approved {
        ArtifactStatus::Approved
    } else {
        ArtifactStatus::Pending
    }
}

/// Which votes count toward an artifact's status, and where the result goes.
pub trait VoteAggregationPolicy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Select the votes that participate in aggregation.
    fn in_scope<'a>(&self, votes: &'a [Vote]) -> Vec<&'a Vote>;

    /// Whether the computed status is materialized on the artifact row.
    fn persists_status(&self) -> bool;

    fn compute(&self, votes: &[Vote]) -> ArtifactStatus {
        aggregate(self.in_scope(votes).into_iter().map(|v| v.status))
    }
}

/// One decided vote per reviewer; the aggregate is stored on the artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleDecisionPolicy;

impl VoteAggregationPolicy for SingleDecisionPolicy {
    fn name(&self) -> &'static str {
        "single_decision"
    }

    fn in_scope<'a>(&self, votes: &'a [Vote]) -> Vec<&'a Vote> {
        votes.iter().collect()
    }

    fn persists_status(&self) -> bool {
        true
    }
}

/// Every vote from every round ever issued counts.
///
/// A rejection from an earlier round keeps the artifact rejected even when
/// the newest round is fully approved.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllRoundsPolicy;

impl VoteAggregationPolicy for AllRoundsPolicy {
    fn name(&self) -> &'static str {
        "all_rounds"
    }

    fn in_scope<'a>(&self, votes: &'a [Vote]) -> Vec<&'a Vote> {
        votes.iter().collect()
    }

    fn persists_status(&self) -> bool {
        false
    }
}

/// Only the highest-numbered round counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestRoundPolicy;

impl VoteAggregationPolicy for LatestRoundPolicy {
    fn name(&self) -> &'static str {
        "latest_round"
    }

    fn in_scope<'a>(&self, votes: &'a [Vote]) -> Vec<&'a Vote> {
        let Some(latest) = votes.iter().map(|v| v.round_number).max() else {
            return Vec::new();
        };
        votes.iter().filter(|v| v.round_number == latest).collect()
    }

    fn persists_status(&self) -> bool {
        false
    }
}

/// Aggregation scope for round-based artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundScope {
    #[default]
    AllRounds,
    LatestRound,
}

static SINGLE_DECISION: SingleDecisionPolicy = SingleDecisionPolicy;
static ALL_ROUNDS: AllRoundsPolicy = AllRoundsPolicy;
static LATEST_ROUND: LatestRoundPolicy = LatestRoundPolicy;

/// Resolve the policy for a flavor under the configured round scope.
pub fn policy_for(flavor: Flavor, scope: RoundScope) -> &'static dyn VoteAggregationPolicy {
    match (flavor, scope) {
        (Flavor::Single, _) => &SINGLE_DECISION,
        (Flavor::Rounds, RoundScope::AllRounds) => &ALL_ROUNDS,
        (Flavor::Rounds, RoundScope::LatestRound) => &LATEST_ROUND,
    }
}

/// Computes artifact status against the durable store.
#[derive(Debug, Clone)]
pub struct StatusAggregator {
    pool: DbPool,
    round_scope: RoundScope,
}

impl StatusAggregator {
    pub fn new(pool: DbPool, round_scope: RoundScope) -> Self {
        Self { pool, round_scope }
    }

    pub fn policy(&self, flavor: Flavor) -> &'static dyn VoteAggregationPolicy {
        policy_for(flavor, self.round_scope)
    }

    /// Compute the status of an artifact on demand from its vote list.
    pub async fn compute(&self, artifact_id: i64) -> Result<ArtifactStatus, AppError> {
        let artifact = artifacts::find_artifact(&self.pool, artifact_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("Artifact", artifact_id))?;

        let votes = votes::list_for_artifact(&self.pool, artifact_id).await?;
        Ok(self.policy(artifact.flavor()).compute(&votes))
    }

    /// Recompute inside the caller's transaction and persist if the policy
    /// materializes status.
    ///
    /// The caller must already hold the write lock on the artifact (see
    /// [`artifacts::lock_artifact`]) so the read and the write-back see the
    /// same vote set.
    pub async fn recompute_in(
        &self,
        conn: &mut SqliteConnection,
        artifact: &Artifact,
    ) -> Result<ArtifactStatus, AppError> {
        let policy = self.policy(artifact.flavor());
        let votes = votes::list_for_artifact(&mut *conn, artifact.id).await?;
        let status = policy.compute(&votes);

        if policy.persists_status() {
            artifacts::set_status(&mut *conn, artifact.id, status).await?;
        }

        log::debug!(
            "[aggregate] artifact {} -> {} ({} votes, policy {})",
            artifact.id,
            status,
            votes.len(),
            policy.name()
        );

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(round: i64, status: VoteStatus) -> Vote {
        Vote {
            id: 0,
            artifact_id: 1,
            reviewer_id: 1,
            flavor: Flavor::Rounds,
            round_number: round,
            status,
            comment: None,
            requested_by: None,
            approved_at: None,
            rejected_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_empty_vote_set_is_pending() {
        assert_eq!(aggregate(Vec::<VoteStatus>::new()), ArtifactStatus::Pending);
    }

    #[test]
    fn test_any_rejection_wins() {
        let statuses = [VoteStatus::Approved, VoteStatus::Pending, VoteStatus::Rejected];
        assert_eq!(aggregate(statuses), ArtifactStatus::Rejected);
    }

    #[test]
    fn test_all_approved_is_approved() {
        let statuses = [VoteStatus::Approved, VoteStatus::Approved];
        assert_eq!(aggregate(statuses), ArtifactStatus::Approved);
    }

    #[test]
    fn test_pending_blocks_approval() {
        let statuses = [VoteStatus::Approved, VoteStatus::Pending];
        assert_eq!(aggregate(statuses), ArtifactStatus::Pending);
    }

    #[test]
    fn test_all_rounds_keeps_historical_rejection() {
        let votes = vec![
            vote(1, VoteStatus::Approved),
            vote(1, VoteStatus::Rejected),
            vote(2, VoteStatus::Approved),
            vote(2, VoteStatus::Approved),
        ];
        assert_eq!(AllRoundsPolicy.compute(&votes), ArtifactStatus::Rejected);
    }

    #[test]
    fn test_latest_round_ignores_older_rounds() {
        let votes = vec![
            vote(1, VoteStatus::Rejected),
            vote(2, VoteStatus::Approved),
            vote(2, VoteStatus::Approved),
        ];
        assert_eq!(LatestRoundPolicy.compute(&votes), ArtifactStatus::Approved);
        assert_eq!(LatestRoundPolicy.in_scope(&votes).len(), 2);
    }

    #[test]
    fn test_latest_round_with_no_votes() {
        assert_eq!(LatestRoundPolicy.compute(&[]), ArtifactStatus::Pending);
    }

    #[test]
    fn test_policy_selection() {
        assert!(policy_for(Flavor::Single, RoundScope::LatestRound).persists_status());
        assert_eq!(policy_for(Flavor::Rounds, RoundScope::AllRounds).name(), "all_rounds");
        assert_eq!(policy_for(Flavor::Rounds, RoundScope::LatestRound).name(), "latest_round");
        assert!(!policy_for(Flavor::Rounds, RoundScope::AllRounds).persists_status());
    }

    #[test]
    fn test_single_decision_matches_pairwise_rule() {
        // Rejected iff any rejected; approved iff non-empty and all approved.
        let cases: &[(&[VoteStatus], ArtifactStatus)] = &[
            (&[], ArtifactStatus::Pending),
            (&[VoteStatus::Approved], ArtifactStatus::Approved),
            (&[VoteStatus::Rejected], ArtifactStatus::Rejected),
            (&[VoteStatus::Approved, VoteStatus::Rejected], ArtifactStatus::Rejected),
            (&[VoteStatus::Approved, VoteStatus::Approved, VoteStatus::Approved], ArtifactStatus::Approved),
        ];

        for (statuses, expected) in cases {
            let votes: Vec<Vote> = statuses.iter().map(|s| vote(1, *s)).collect();
            assert_eq!(SingleDecisionPolicy.compute(&votes), *expected, "{statuses:?}");
        }
    }
}
