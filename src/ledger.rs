//! Vote ledger: at-most-one-vote-per-user-per-submission with toggle
//! semantics. The store's uniqueness constraint on (submission_id, user_id)
//! is the source of truth; no counter is maintained anywhere.

use crate::models::{Id, UserId};
use crate::repo::{RepoError, VoteRepo};

/// Direction a toggle resolved to, decided before the remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteIntent {
    Cast,
    Retract,
}

/// Outcome of a ledger operation. `raced` marks the benign-conflict paths:
/// a duplicate insert absorbed via the constraint, or a delete that found
/// nothing left to delete. Callers treat raced receipts as soft success
/// requiring reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub voted: bool,
    pub raced: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("submission not found")]
    SubmissionNotFound,
    #[error("store failure: {0}")]
    Store(RepoError),
}

/// Apply a vote in a known direction.
///
/// Cast: a unique-constraint violation means a concurrent insert won; the
/// vote exists, so the intent is satisfied. Confirm existence and report it
/// as a raced success rather than an error.
/// Retract: a delete affecting zero rows means a concurrent delete won;
/// terminal success, also raced.
pub async fn apply_vote<R>(
    repo: &R,
    submission_id: Id,
    user_id: &UserId,
    intent: VoteIntent,
) -> Result<VoteReceipt, LedgerError>
where
    R: VoteRepo + ?Sized,
{
    match intent {
        VoteIntent::Cast => match repo.insert_vote(submission_id, user_id).await {
            Ok(_) => Ok(VoteReceipt {
                voted: true,
                raced: false,
            }),
            Err(RepoError::Conflict) => {
                // constraint says a row exists; confirm before reporting
                let count = repo
                    .count_votes(submission_id)
                    .await
                    .map_err(LedgerError::Store)?;
                if count > 0 {
                    Ok(VoteReceipt {
                        voted: true,
                        raced: true,
                    })
                } else {
                    Err(LedgerError::Store(RepoError::Conflict))
                }
            }
            Err(RepoError::NotFound) => Err(LedgerError::SubmissionNotFound),
            Err(e) => Err(LedgerError::Store(e)),
        },
        VoteIntent::Retract => {
            let removed = repo
                .delete_vote(submission_id, user_id)
                .await
                .map_err(LedgerError::Store)?;
            Ok(VoteReceipt {
                voted: false,
                raced: removed == 0,
            })
        }
    }
}

/// Toggle contract: flip based on current row existence.
pub async fn toggle_vote<R>(
    repo: &R,
    submission_id: Id,
    user_id: &UserId,
) -> Result<VoteReceipt, LedgerError>
where
    R: VoteRepo + ?Sized,
{
    let removed = repo
        .delete_vote(submission_id, user_id)
        .await
        .map_err(LedgerError::Store)?;
    if removed > 0 {
        return Ok(VoteReceipt {
            voted: false,
            raced: false,
        });
    }
    apply_vote(repo, submission_id, user_id, VoteIntent::Cast).await
}
