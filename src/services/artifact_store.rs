//! Artifact store collaborator: parent metadata for notification text.

use crate::db::artifacts;
use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::ArtifactDescriptor;
use async_trait::async_trait;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Artifact name, kind and owning project, or `None` if absent.
    async fn describe(&self, artifact_id: i64) -> Result<Option<ArtifactDescriptor>, AppError>;
}

#[derive(Debug, Clone)]
pub struct SqliteArtifactStore {
    pool: DbPool,
}

impl SqliteArtifactStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn describe(&self, artifact_id: i64) -> Result<Option<ArtifactDescriptor>, AppError> {
        Ok(artifacts::find_descriptor(&self.pool, artifact_id).await?)
    }
}
