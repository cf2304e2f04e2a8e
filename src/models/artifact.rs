//! Artifact model: the reviewable unit an approval is about.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Approval flavor of an artifact.
///
/// `Single` allows one decided vote per reviewer and materializes the
/// aggregate on the artifact. `Rounds` issues numbered batches of pending
/// votes and computes the aggregate on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Flavor {
    Single,
    Rounds,
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Rounds => write!(f, "rounds"),
        }
    }
}

/// Kind of reviewable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Data projection; approved in numbered rounds.
    Projection,
    /// Feature request; one decision per reviewer.
    Feature,
    /// Link between a checkpoint and a projection; one decision per reviewer.
    CheckpointProjection,
}

impl ArtifactKind {
    /// The approval flavor this kind is reviewed under.
    pub fn flavor(self) -> Flavor {
        match self {
            Self::Projection => Flavor::Rounds,
            Self::Feature | Self::CheckpointProjection => Flavor::Single,
        }
    }

    /// Human-readable label used in notification text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Projection => "projection",
            Self::Feature => "feature",
            Self::CheckpointProjection => "checkpoint projection",
        }
    }

    /// Query-string key the project page uses to focus this artifact.
    pub fn link_key(self) -> &'static str {
        match self {
            Self::Projection => "projection",
            Self::Feature => "feature",
            Self::CheckpointProjection => "checkpointProjection",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Projection => write!(f, "projection"),
            Self::Feature => write!(f, "feature"),
            Self::CheckpointProjection => write!(f, "checkpoint_projection"),
        }
    }
}

/// Aggregate approval state derived from an artifact's votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A reviewable unit owned by a project.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: i64,

    /// Owning project.
    pub project_id: i64,

    pub kind: ArtifactKind,

    /// Display name.
    pub name: String,

    /// Materialized aggregate; only written for single-decision kinds.
    pub status: Option<ArtifactStatus>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Artifact {
    pub fn flavor(&self) -> Flavor {
        self.kind.flavor()
    }
}

/// Artifact metadata needed to render notifications.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub id: i64,
    pub project_id: i64,
    pub kind: ArtifactKind,
    pub name: String,
    /// `None` when the owning project row is missing.
    pub project_name: Option<String>,
}

impl ArtifactDescriptor {
    pub const UNKNOWN_PROJECT: &'static str = "Unknown Project";

    pub fn project_display_name(&self) -> &str {
        self.project_name.as_deref().unwrap_or(Self::UNKNOWN_PROJECT)
    }

    /// In-app link to the artifact's approval tab.
    pub fn approval_path(&self) -> String {
        format!(
            "/projects/{}?tab=approvals&{}={}",
            self.project_id,
            self.kind.link_key(),
            self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_flavor_mapping() {
        assert_eq!(ArtifactKind::Projection.flavor(), Flavor::Rounds);
        assert_eq!(ArtifactKind::Feature.flavor(), Flavor::Single);
        assert_eq!(ArtifactKind::CheckpointProjection.flavor(), Flavor::Single);
    }

    #[test]
    fn test_approval_path() {
        let descriptor = ArtifactDescriptor {
            id: 7,
            project_id: 3,
            kind: ArtifactKind::Projection,
            name: "Q3 forecast".to_string(),
            project_name: None,
        };
        assert_eq!(descriptor.approval_path(), "/projects/3?tab=approvals&projection=7");
        assert_eq!(descriptor.project_display_name(), "Unknown Project");
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ArtifactKind::CheckpointProjection).unwrap();
        assert_eq!(json, "\"checkpoint_projection\"");
        assert_eq!(ArtifactKind::CheckpointProjection.to_string(), "checkpoint_projection");
    }
}
