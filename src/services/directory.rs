//! User directory collaborator: resolves reviewer IDs to display info.

use crate::db::pool::DbPool;
use crate::db::users;
use crate::error::AppError;
use crate::models::User;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve the given IDs. Unknown IDs are absent from the result.
    async fn resolve(&self, user_ids: &[i64]) -> Result<Vec<User>, AppError>;

    /// Resolve into a lookup map keyed by user ID.
    async fn resolve_map(&self, user_ids: &[i64]) -> Result<HashMap<i64, User>, AppError> {
        let users = self.resolve(user_ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}

/// Directory backed by the `users` table.
#[derive(Debug, Clone)]
pub struct SqliteUserDirectory {
    pool: DbPool,
}

impl SqliteUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn resolve(&self, user_ids: &[i64]) -> Result<Vec<User>, AppError> {
        Ok(users::find_users(&self.pool, user_ids).await?)
    }
}
