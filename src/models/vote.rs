//! Vote model: one reviewer's recorded status for an artifact.

use super::artifact::Flavor;
use super::user::ReviewerInfo;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Stored state of a single vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VoteStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for VoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A reviewer's decision. `pending` is never something a caller can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for VoteStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => Self::Approved,
            Decision::Rejected => Self::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(AppError::invalid_input_field(
                format!("Invalid status '{}'. Must be 'approved' or 'rejected'", other),
                "status",
            )),
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        VoteStatus::from(*self).fmt(f)
    }
}

/// One reviewer's vote on an artifact, optionally tagged with a round.
///
/// At most one of `approved_at` / `rejected_at` is set, and it always
/// reflects the latest transition.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: i64,
    pub artifact_id: i64,
    pub reviewer_id: i64,
    pub flavor: Flavor,
    /// Round the vote belongs to; always 1 for single-decision votes.
    pub round_number: i64,
    pub status: VoteStatus,
    pub comment: Option<String>,
    /// User who issued the round, when known.
    pub requested_by: Option<i64>,
    pub approved_at: Option<i64>,
    pub rejected_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Vote {
    /// Default round for votes that are not issued through rounds.
    pub const DEFAULT_ROUND: i64 = 1;

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.reviewer_id == user_id
    }

    pub fn is_pending(&self) -> bool {
        self.status == VoteStatus::Pending
    }
}

/// Vote enriched with reviewer display info for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteWithReviewer {
    #[serde(flatten)]
    pub vote: Vote,
    /// `None` when the reviewer is unknown to the user directory.
    pub reviewer: Option<ReviewerInfo>,
}
