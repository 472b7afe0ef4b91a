//! Optimistic reconciliation controller.
//!
//! Owns the per-context `ProcessedSubmission` set: applies a speculative
//! local mutation synchronously (flip + re-rank before any suspension
//! point), issues the matching ledger operation, and on failure rebuilds
//! the whole set from the authoritative store.

use crate::ledger::{self, LedgerError, VoteIntent};
use crate::models::{Id, ProcessedSubmission, Submission, UserId};
use crate::ranking;
use crate::repo::{RepoError, SubmissionRepo, VoteRepo};

/// What a toggle intent resolved to, from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Speculative state confirmed by the store; local state already correct.
    Applied { voted: bool, vote_count: i64 },
    /// Benign race absorbed; state was rebuilt from the store. Soft notice,
    /// not an error: the end state is correct.
    Resynced,
    /// Non-benign failure; speculative state was discarded and rebuilt.
    /// Carries a non-fatal notice for the caller.
    RolledBack { notice: String },
}

#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    /// Rejected before any speculative mutation; state untouched.
    #[error("authentication required")]
    Unauthenticated,
    #[error(transparent)]
    Store(#[from] RepoError),
}

/// The viewer-scoped, ranked submission set for one business. One board per
/// rendering context; only one intent mutates it at a time within that
/// context, so cross-context races are left to the store's constraints.
pub struct SubmissionBoard {
    business_id: Id,
    viewer: Option<UserId>,
    items: Vec<ProcessedSubmission>,
}

impl SubmissionBoard {
    /// Build the processed set from authoritative data and rank it.
    pub async fn load<R>(
        repo: &R,
        business_id: Id,
        viewer: Option<UserId>,
    ) -> Result<Self, BoardError>
    where
        R: SubmissionRepo + VoteRepo + ?Sized,
    {
        let mut board = Self {
            business_id,
            viewer,
            items: Vec::new(),
        };
        board.reconcile(repo).await?;
        Ok(board)
    }

    pub fn business_id(&self) -> Id {
        self.business_id
    }

    pub fn viewer(&self) -> Option<&UserId> {
        self.viewer.as_ref()
    }

    pub fn submissions(&self) -> &[ProcessedSubmission] {
        &self.items
    }

    pub fn into_submissions(self) -> Vec<ProcessedSubmission> {
        self.items
    }

    /// Discard local state and rebuild it wholesale: all submissions
    /// (created-desc), all counts, and the viewer's votes, then re-rank.
    pub async fn reconcile<R>(&mut self, repo: &R) -> Result<(), BoardError>
    where
        R: SubmissionRepo + VoteRepo + ?Sized,
    {
        let submissions = repo.list_submissions(self.business_id).await?;
        let counts = repo.vote_counts(self.business_id).await?;
        let voted: Vec<Id> = match &self.viewer {
            Some(v) => repo.votes_by_user(self.business_id, v).await?,
            None => Vec::new(),
        };
        let mut items: Vec<ProcessedSubmission> = submissions
            .into_iter()
            .map(|s| {
                let count = counts.get(&s.id).copied().unwrap_or(0);
                let has_voted = voted.contains(&s.id);
                ProcessedSubmission::new(s, count, has_voted)
            })
            .collect();
        ranking::rank(&mut items);
        self.items = items;
        Ok(())
    }

    /// Toggle the viewer's vote on one submission.
    ///
    /// The speculative flip and re-sort complete before the first await, so
    /// a caller observing the board mid-flight never sees stale, unflipped
    /// state. The last-issued toggle's remote outcome determines final state
    /// after reconciliation.
    pub async fn toggle_vote<R>(
        &mut self,
        repo: &R,
        submission_id: Id,
    ) -> Result<ToggleOutcome, BoardError>
    where
        R: SubmissionRepo + VoteRepo + ?Sized,
    {
        let viewer = self
            .viewer
            .clone()
            .ok_or(BoardError::Unauthenticated)?;

        let Some(idx) = self.items.iter().position(|p| p.id() == submission_id) else {
            // locally unknown id: someone else changed the set under us
            self.reconcile(repo).await?;
            return Ok(ToggleOutcome::Resynced);
        };

        // speculative flip, clamped at zero, re-ranked synchronously
        let item = &mut self.items[idx];
        let voted = !item.has_voted;
        item.has_voted = voted;
        item.vote_count = (item.vote_count + if voted { 1 } else { -1 }).max(0);
        let vote_count = item.vote_count;
        ranking::rank(&mut self.items);

        let intent = if voted {
            VoteIntent::Cast
        } else {
            VoteIntent::Retract
        };
        match ledger::apply_vote(repo, submission_id, &viewer, intent).await {
            Ok(receipt) if !receipt.raced => Ok(ToggleOutcome::Applied { voted, vote_count }),
            Ok(_) => {
                // two toggles interleaved; the store's end state is correct,
                // ours may not be
                self.reconcile(repo).await?;
                Ok(ToggleOutcome::Resynced)
            }
            Err(LedgerError::SubmissionNotFound) => {
                self.reconcile(repo).await?;
                Ok(ToggleOutcome::RolledBack {
                    notice: "submission no longer exists".into(),
                })
            }
            Err(LedgerError::Store(e)) => {
                self.reconcile(repo).await?;
                Ok(ToggleOutcome::RolledBack {
                    notice: e.to_string(),
                })
            }
        }
    }

    /// Merge a single updated row (status change) without a full re-fetch.
    pub fn merge(&mut self, updated: ProcessedSubmission) {
        match self.items.iter_mut().find(|p| p.id() == updated.id()) {
            Some(slot) => *slot = updated,
            None => self.items.push(updated),
        }
        ranking::rank(&mut self.items);
    }

    /// Merge an edited submission, preserving local vote state.
    pub fn merge_edit(&mut self, updated: Submission) {
        if let Some(slot) = self.items.iter_mut().find(|p| p.id() == updated.id) {
            slot.submission = updated;
        }
        ranking::rank(&mut self.items);
    }

    pub fn remove(&mut self, submission_id: Id) {
        self.items.retain(|p| p.id() != submission_id);
        ranking::rank(&mut self.items);
    }
}
