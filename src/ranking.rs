//! Ranking engine: deterministic display order for a submission set.
//!
//! Pure, no I/O. The backing query orders by creation time only (sorting by
//! a computed aggregate at the store layer is unreliable across backends),
//! so this re-sort runs after every fetch and after every local mutation.

use crate::models::ProcessedSubmission;

/// Stable sort by vote count descending. Ties keep their input order; since
/// input arrives created-desc, newer submissions implicitly win ties.
pub fn rank(submissions: &mut [ProcessedSubmission]) {
    submissions.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
}

/// Convenience for callers holding an owned list.
pub fn ranked(mut submissions: Vec<ProcessedSubmission>) -> Vec<ProcessedSubmission> {
    rank(&mut submissions);
    submissions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Submission, SubmissionStatus};
    use chrono::{Duration, Utc};

    fn item(id: i64, votes: i64, age_secs: i64) -> ProcessedSubmission {
        let t = Utc::now() - Duration::seconds(age_secs);
        ProcessedSubmission::new(
            Submission {
                id,
                business_id: 1,
                title: format!("idea {id}"),
                description: String::new(),
                image_url: None,
                status: SubmissionStatus::Pending,
                submitted_by: "u".into(),
                created_at: t,
                updated_at: t,
            },
            votes,
            false,
        )
    }

    #[test]
    fn orders_by_votes_desc() {
        let out = ranked(vec![item(1, 0, 30), item(2, 4, 20), item(3, 2, 10)]);
        let ids: Vec<_> = out.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn ties_preserve_input_order() {
        // input created-desc: C (newest, 3 votes), B (5), A (oldest, 3)
        let c = item(3, 3, 10);
        let b = item(2, 5, 20);
        let a = item(1, 3, 30);
        let out = ranked(vec![c, b, a]);
        let ids: Vec<_> = out.iter().map(|p| p.id()).collect();
        // B first, then C and A tie at 3 preserving input order C before A
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn empty_and_single() {
        assert!(ranked(vec![]).is_empty());
        assert_eq!(ranked(vec![item(9, 1, 0)])[0].id(), 9);
    }
}
