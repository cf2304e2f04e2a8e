//! Database queries for projects and artifacts.

use crate::models::{Artifact, ArtifactDescriptor, ArtifactKind, ArtifactStatus, Flavor};
use sqlx::{Executor, Row, Sqlite};

const ARTIFACT_COLUMNS: &str = "id, project_id, kind, name, status, created_at, updated_at";

/// Insert a project and return its ID.
pub async fn insert_project<'e, E>(executor: E, name: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("INSERT INTO projects (name, created_at) VALUES (?, ?) RETURNING id")
        .bind(name)
        .bind(super::now_millis())
        .fetch_one(executor)
        .await
}

/// Insert an artifact.
///
/// Single-decision artifacts start with a materialized `pending` status;
/// round-based artifacts carry no stored status.
pub async fn insert_artifact<'e, E>(
    executor: E,
    project_id: i64,
    kind: ArtifactKind,
    name: &str,
) -> Result<Artifact, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let status = match kind.flavor() {
        Flavor::Single => Some(ArtifactStatus::Pending),
        Flavor::Rounds => None,
    };
    let now = super::now_millis();

    sqlx::query_as::<_, Artifact>(&format!(
        "INSERT INTO artifacts (project_id, kind, name, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
        ARTIFACT_COLUMNS
    ))
    .bind(project_id)
    .bind(kind)
    .bind(name)
    .bind(status)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub async fn find_artifact<'e, E>(executor: E, artifact_id: i64) -> Result<Option<Artifact>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Artifact>(&format!(
        "SELECT {} FROM artifacts WHERE id = ?",
        ARTIFACT_COLUMNS
    ))
    .bind(artifact_id)
    .fetch_optional(executor)
    .await
}

/// Load the artifact together with its owning project's name.
pub async fn find_descriptor<'e, E>(
    executor: E,
    artifact_id: i64,
) -> Result<Option<ArtifactDescriptor>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT a.id, a.project_id, a.kind, a.name, p.name AS project_name
        FROM artifacts a
        LEFT JOIN projects p ON p.id = a.project_id
        WHERE a.id = ?
        "#,
    )
    .bind(artifact_id)
    .fetch_optional(executor)
    .await?;

    row.map(|row| {
        Ok(ArtifactDescriptor {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            kind: row.try_get("kind")?,
            name: row.try_get("name")?,
            project_name: row.try_get("project_name")?,
        })
    })
    .transpose()
}

/// Touch the artifact row inside a transaction.
///
/// Being a write, this takes SQLite's write lock up front so the rest of the
/// transaction's read-aggregate-write sequence cannot interleave with another
/// writer. Returns `false` when the artifact does not exist.
pub async fn lock_artifact<'e, E>(executor: E, artifact_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE artifacts SET updated_at = ? WHERE id = ?")
        .bind(super::now_millis())
        .bind(artifact_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Write the derived aggregate back onto the artifact.
pub async fn set_status<'e, E>(
    executor: E,
    artifact_id: i64,
    status: ArtifactStatus,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE artifacts SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(super::now_millis())
        .bind(artifact_id)
        .execute(executor)
        .await?;

    Ok(())
}
