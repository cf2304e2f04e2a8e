//! Database queries for votes.
//!
//! Votes are inserted and updated, never deleted.

use crate::models::{Flavor, Vote, VoteStatus};
use sqlx::{Executor, Sqlite};

const VOTE_COLUMNS: &str = "id, artifact_id, reviewer_id, flavor, round_number, status, comment, \
     requested_by, approved_at, rejected_at, created_at, updated_at";

/// Input for inserting a vote.
#[derive(Debug, Clone)]
pub struct NewVote {
    pub artifact_id: i64,
    pub reviewer_id: i64,
    pub flavor: Flavor,
    pub round_number: i64,
    pub status: VoteStatus,
    pub comment: Option<String>,
    pub requested_by: Option<i64>,
}

/// Field values written by a vote transition.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteChange {
    pub status: VoteStatus,
    pub comment: Option<String>,
    pub approved_at: Option<i64>,
    pub rejected_at: Option<i64>,
    pub updated_at: i64,
}

/// Insert a vote and return the stored row.
///
/// A decided vote gets its matching decision timestamp. For single-decision
/// votes the partial unique index rejects a second row for the same
/// (artifact, reviewer) pair.
pub async fn insert_vote<'e, E>(executor: E, vote: &NewVote) -> Result<Vote, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = super::now_millis();
    let approved_at = (vote.status == VoteStatus::Approved).then_some(now);
    let rejected_at = (vote.status == VoteStatus::Rejected).then_some(now);

    sqlx::query_as::<_, Vote>(&format!(
        r#"
        INSERT INTO votes (artifact_id, reviewer_id, flavor, round_number, status, comment,
                           requested_by, approved_at, rejected_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        VOTE_COLUMNS
    ))
    .bind(vote.artifact_id)
    .bind(vote.reviewer_id)
    .bind(vote.flavor)
    .bind(vote.round_number)
    .bind(vote.status)
    .bind(&vote.comment)
    .bind(vote.requested_by)
    .bind(approved_at)
    .bind(rejected_at)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub async fn find_vote<'e, E>(executor: E, vote_id: i64) -> Result<Option<Vote>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Vote>(&format!("SELECT {} FROM votes WHERE id = ?", VOTE_COLUMNS))
        .bind(vote_id)
        .fetch_optional(executor)
        .await
}

/// All votes for an artifact across every round, newest first.
pub async fn list_for_artifact<'e, E>(executor: E, artifact_id: i64) -> Result<Vec<Vote>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Vote>(&format!(
        "SELECT {} FROM votes WHERE artifact_id = ? ORDER BY created_at DESC, id DESC",
        VOTE_COLUMNS
    ))
    .bind(artifact_id)
    .fetch_all(executor)
    .await
}

/// Whether the reviewer already has any single-decision vote on the artifact.
pub async fn has_single_vote<'e, E>(
    executor: E,
    artifact_id: i64,
    reviewer_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM votes WHERE artifact_id = ? AND reviewer_id = ? AND flavor = 'single' LIMIT 1",
    )
    .bind(artifact_id)
    .bind(reviewer_id)
    .fetch_optional(executor)
    .await?;

    Ok(found.is_some())
}

/// Highest round number issued for the artifact, if any.
pub async fn max_round<'e, E>(executor: E, artifact_id: i64) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT MAX(round_number) FROM votes WHERE artifact_id = ? AND flavor = 'rounds'")
        .bind(artifact_id)
        .fetch_one(executor)
        .await
}

/// Apply a transition to a stored vote and return the updated row.
pub async fn apply_change<'e, E>(executor: E, vote_id: i64, change: &VoteChange) -> Result<Option<Vote>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Vote>(&format!(
        r#"
        UPDATE votes
        SET status = ?, comment = ?, approved_at = ?, rejected_at = ?, updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        VOTE_COLUMNS
    ))
    .bind(change.status)
    .bind(&change.comment)
    .bind(change.approved_at)
    .bind(change.rejected_at)
    .bind(change.updated_at)
    .bind(vote_id)
    .fetch_optional(executor)
    .await
}

/// Whether a database error is a uniqueness violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
