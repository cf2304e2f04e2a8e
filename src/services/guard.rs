//! Ownership and mutability rules for vote updates.

use crate::db::votes::VoteChange;
use crate::error::AppError;
use crate::models::{Decision, Flavor, Vote, VoteStatus};

/// Enforces who may change a vote and what a change writes.
pub struct VoteMutationGuard;

impl VoteMutationGuard {
    /// Check that `caller_id` may mutate the vote.
    ///
    /// Missing vote → `NotFound`; someone else's vote → `Forbidden`;
    /// single-decision votes are final → `InvalidInput`.
    pub fn authorize(vote: Option<Vote>, vote_id: i64, caller_id: i64) -> Result<Vote, AppError> {
        let vote = vote.ok_or_else(|| AppError::not_found_with_id("Vote", vote_id))?;

        if !vote.is_owned_by(caller_id) {
            return Err(AppError::forbidden("You can only update your own approvals"));
        }

        if vote.flavor == Flavor::Single {
            return Err(AppError::invalid_input(
                "Single-decision votes cannot be changed once recorded",
            ));
        }

        Ok(vote)
    }

    /// Compute the fields written when `vote` transitions to `decision`.
    ///
    /// Exactly one of the decision timestamps is set to `now` and the other
    /// is cleared. An omitted or empty comment keeps the stored one.
    pub fn transition(vote: &Vote, decision: Decision, comment: Option<String>, now: i64) -> VoteChange {
        let status = VoteStatus::from(decision);
        let (approved_at, rejected_at) = match decision {
            Decision::Approved => (Some(now), None),
            Decision::Rejected => (None, Some(now)),
        };

        let comment = match comment {
            Some(c) if !c.is_empty() => Some(c),
            _ => vote.comment.clone(),
        };

        VoteChange {
            status,
            comment,
            approved_at,
            rejected_at,
            updated_at: now,
        }
    }
}
