//! Submission status transitions. The lifecycle is a flat multi-way switch:
//! every state may move to every other state, only the owning business may
//! trigger a move, and nothing is terminal (`selected`/`rejected` revert to
//! `pending` like any other transition).

use crate::models::{Id, ProcessedSubmission, SubmissionStatus, UserId};
use crate::repo::{RepoResult, SubmissionRepo, VoteRepo};

/// Apply a status change and return the full updated submission with a
/// freshly computed vote aggregate, so callers can merge it into local lists
/// without a full re-fetch.
pub async fn set_status<R>(
    repo: &R,
    submission_id: Id,
    new_status: SubmissionStatus,
    owner: &UserId,
) -> RepoResult<ProcessedSubmission>
where
    R: SubmissionRepo + VoteRepo + ?Sized,
{
    let updated = repo
        .set_submission_status(submission_id, owner, new_status)
        .await?;
    let vote_count = repo.count_votes(submission_id).await?;
    // has_voted is the owner's own vote state on the moderated row
    let has_voted = repo
        .votes_by_user(updated.business_id, owner)
        .await?
        .contains(&submission_id);
    Ok(ProcessedSubmission::new(updated, vote_count, has_voted))
}
