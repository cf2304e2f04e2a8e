//! Concurrency tests for vote mutations.
//!
//! Decisions and vote updates on one artifact run in parallel tasks against
//! a shared pool. The artifact lock taken at the start of each transaction
//! must serialize them so that:
//! 1. A reviewer racing themselves records exactly one single decision
//! 2. The stored aggregate always matches the final vote set

use approval_engine::db::{self, artifacts, pool::DbPool, users};
use approval_engine::models::{ArtifactKind, ArtifactStatus, VoteStatus};
use approval_engine::services::email::LogTransport;
use approval_engine::services::engine::{ApprovalEngine, EngineOptions};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

async fn setup() -> (TempDir, DbPool, Arc<ApprovalEngine>, i64) {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();
    let project_id = artifacts::insert_project(&pool, "Apollo").await.unwrap();
    let engine = Arc::new(ApprovalEngine::new(
        pool.clone(),
        EngineOptions::default(),
        Arc::new(LogTransport),
    ));
    (dir, pool, engine, project_id)
}

async fn stored_status(pool: &DbPool, artifact_id: i64) -> Option<String> {
    sqlx::query_scalar("SELECT status FROM artifacts WHERE id = ?")
        .bind(artifact_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_duplicate_decisions_record_once() {
    let (_dir, pool, engine, project_id) = setup().await;
    let reviewer = users::insert_user(&pool, Some("Ada"), "ada@example.test")
        .await
        .unwrap()
        .id;
    let artifact = artifacts::insert_artifact(&pool, project_id, ArtifactKind::Feature, "Export")
        .await
        .unwrap();

    let artifact_id = artifact.id;
    let mut handles = Vec::new();
    for status in ["approved", "rejected", "approved", "rejected"] {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.record_decision(artifact_id, reviewer, status, None).await
        }));
    }

    let mut successes = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => successes.push(outcome),
            Err(e) => {
                assert!(e.is_conflict(), "unexpected error: {e:?}");
                conflicts += 1;
            }
        }
    }

    assert_eq!(successes.len(), 1);
    assert_eq!(conflicts, 3);

    let votes = engine.list_votes(artifact.id).await.unwrap();
    assert_eq!(votes.len(), 1);
    let winner = &successes[0];
    assert_eq!(votes[0].vote, winner.vote);
    assert_eq!(
        stored_status(&pool, artifact.id).await.as_deref(),
        Some(winner.artifact_status.to_string().as_str())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decisions_converge() {
    let (_dir, pool, engine, project_id) = setup().await;
    let artifact = artifacts::insert_artifact(&pool, project_id, ArtifactKind::Feature, "Export")
        .await
        .unwrap();

    let mut reviewers = Vec::new();
    for i in 0..8 {
        let user = users::insert_user(&pool, None, &format!("r{}@example.test", i))
            .await
            .unwrap();
        reviewers.push(user.id);
    }

    let artifact_id = artifact.id;
    let mut handles = Vec::new();
    for reviewer in reviewers.clone() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.record_decision(artifact_id, reviewer, "approved", None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(stored_status(&pool, artifact.id).await.as_deref(), Some("approved"));
    assert_eq!(
        engine.artifact_status(artifact.id).await.unwrap(),
        ArtifactStatus::Approved
    );

    // One late rejection flips the stored aggregate.
    let late = users::insert_user(&pool, None, "late@example.test").await.unwrap();
    engine
        .record_decision(artifact.id, late.id, "rejected", None)
        .await
        .unwrap();
    assert_eq!(stored_status(&pool, artifact.id).await.as_deref(), Some("rejected"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_vote_updates_converge() {
    let (_dir, pool, engine, project_id) = setup().await;
    let artifact = artifacts::insert_artifact(&pool, project_id, ArtifactKind::Projection, "Q3")
        .await
        .unwrap();

    let mut reviewers = Vec::new();
    for i in 0..6 {
        let user = users::insert_user(&pool, None, &format!("r{}@example.test", i))
            .await
            .unwrap();
        reviewers.push(user.id);
    }

    let round = engine
        .issue_approval_round(artifact.id, &reviewers, None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for vote in round.votes.clone() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .cast_or_update_vote(vote.id, vote.reviewer_id, "rejected", None)
                .await?;
            engine
                .cast_or_update_vote(vote.id, vote.reviewer_id, "approved", None)
                .await
        }));
    }
    for handle in handles {
        let vote = handle.await.unwrap().unwrap();
        assert_eq!(vote.status, VoteStatus::Approved);
        assert!(vote.approved_at.is_some() && vote.rejected_at.is_none());
    }

    assert_eq!(
        engine.artifact_status(artifact.id).await.unwrap(),
        ArtifactStatus::Approved
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rounds_get_distinct_numbers() {
    let (_dir, pool, engine, project_id) = setup().await;
    let reviewer = users::insert_user(&pool, Some("Ada"), "ada@example.test")
        .await
        .unwrap()
        .id;
    let artifact = artifacts::insert_artifact(&pool, project_id, ArtifactKind::Projection, "Q3")
        .await
        .unwrap();

    let artifact_id = artifact.id;
    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.issue_approval_round(artifact_id, &[reviewer], None).await
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap().round_number);
    }
    numbers.sort_unstable();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}
