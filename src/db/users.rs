//! Database queries for the user directory.

use crate::models::User;
use sqlx::{Executor, QueryBuilder, Sqlite};

/// Insert a user and return the stored row.
pub async fn insert_user<'e, E>(executor: E, name: Option<&str>, email: &str) -> Result<User, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, created_at) VALUES (?, ?, ?) RETURNING id, name, email",
    )
    .bind(name)
    .bind(email)
    .bind(super::now_millis())
    .fetch_one(executor)
    .await
}

/// Fetch every user whose ID is in `ids`. Unknown IDs are skipped.
pub async fn find_users<'e, E>(executor: E, ids: &[i64]) -> Result<Vec<User>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, name, email FROM users WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    builder.build_query_as::<User>().fetch_all(executor).await
}
