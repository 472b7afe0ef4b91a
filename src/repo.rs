use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("conflict")]
    Conflict,
    #[error("referential integrity")]
    ReferentialIntegrity,
    #[error("transient: {0}")]
    Transient(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait BusinessRepo: Send + Sync {
    async fn create_business(&self, owner: &UserId, new: NewBusiness) -> RepoResult<Business>;
    async fn update_business(
        &self,
        id: Id,
        owner: &UserId,
        upd: UpdateBusiness,
    ) -> RepoResult<Business>;
    async fn get_business(&self, id: Id) -> RepoResult<Business>;
    async fn get_business_by_slug(&self, slug: &str) -> RepoResult<Business>;
    async fn get_business_for_owner(&self, owner: &UserId) -> RepoResult<Business>;
    async fn list_businesses(&self) -> RepoResult<Vec<Business>>;
}

#[async_trait]
pub trait SubmissionRepo: Send + Sync {
    async fn insert_submission(&self, new: NewSubmission) -> RepoResult<Submission>;
    /// Mutations are scoped to the submitter or the owning business; the
    /// store rejects anything else with `Unauthorized`.
    async fn update_submission(
        &self,
        id: Id,
        actor: &UserId,
        upd: UpdateSubmission,
    ) -> RepoResult<Submission>;
    async fn set_submission_status(
        &self,
        id: Id,
        owner: &UserId,
        status: SubmissionStatus,
    ) -> RepoResult<Submission>;
    async fn delete_submission(&self, id: Id, actor: &UserId) -> RepoResult<()>;
    async fn get_submission(&self, id: Id) -> RepoResult<Submission>;
    /// Ordered by creation time descending; vote-count ordering is the
    /// ranking engine's job, not the store's.
    async fn list_submissions(&self, business_id: Id) -> RepoResult<Vec<Submission>>;
}

#[async_trait]
pub trait VoteRepo: Send + Sync {
    async fn insert_vote(&self, submission_id: Id, user_id: &UserId) -> RepoResult<Vote>;
    /// Returns the number of rows removed; zero is not an error.
    async fn delete_vote(&self, submission_id: Id, user_id: &UserId) -> RepoResult<u64>;
    /// Submission ids within the business the user has voted on.
    async fn votes_by_user(&self, business_id: Id, user_id: &UserId) -> RepoResult<Vec<Id>>;
    async fn vote_counts(&self, business_id: Id) -> RepoResult<HashMap<Id, i64>>;
    async fn count_votes(&self, submission_id: Id) -> RepoResult<i64>;
}

pub trait Repo: BusinessRepo + SubmissionRepo + VoteRepo {}

impl<T> Repo for T where T: BusinessRepo + SubmissionRepo + VoteRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        businesses: HashMap<Id, Business>,
        submissions: HashMap<Id, Submission>,
        votes: HashMap<Id, Vote>,
        next_id: Id,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
        /// Whether votes are removed together with their submission. A
        /// non-cascading store rejects the delete with ReferentialIntegrity,
        /// mirroring a schema without ON DELETE CASCADE.
        cascade_votes: bool,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("VOTELY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        fn snapshot_path() -> PathBuf {
            if std::env::var("VOTELY_DATA_DIR").is_ok() {
                let mut p = Self::data_dir();
                p.push("state.json");
                p
            } else {
                PathBuf::from(SNAPSHOT_PATH)
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!(
                            "failed to parse snapshot '{}': {e}; starting empty",
                            path.display()
                        );
                        State::default()
                    }
                },
                Err(_) => State::default(),
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            if let Ok(s) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, s) {
                    log::warn!("failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
                cascade_votes: true,
            }
        }

        /// Emulate a schema without ON DELETE CASCADE on votes.
        pub fn with_cascade(mut self, cascade: bool) -> Self {
            self.cascade_votes = cascade;
            self
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }

        /// Submitter or business owner; anyone else is rejected.
        fn may_mutate(state: &State, submission: &Submission, actor: &UserId) -> bool {
            if submission.submitted_by == *actor {
                return true;
            }
            state
                .businesses
                .get(&submission.business_id)
                .map(|b| b.user_id == *actor)
                .unwrap_or(false)
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl BusinessRepo for InMemRepo {
        async fn create_business(&self, owner: &UserId, new: NewBusiness) -> RepoResult<Business> {
            let mut s = self.state.write().unwrap();
            let slug = slugify(&new.name);
            if slug.is_empty() || s.businesses.values().any(|b| b.slug == slug) {
                return Err(RepoError::Conflict);
            }
            if s.businesses.values().any(|b| b.user_id == *owner) {
                // one business per owner, like the onboarding flow enforces
                return Err(RepoError::Conflict);
            }
            let id = Self::next_id(&mut s);
            let business = Business {
                id,
                slug,
                name: new.name,
                tagline: new.tagline,
                logo_url: None,
                user_id: owner.clone(),
                created_at: Utc::now(),
            };
            s.businesses.insert(id, business.clone());
            drop(s);
            self.persist();
            Ok(business)
        }

        async fn update_business(
            &self,
            id: Id,
            owner: &UserId,
            upd: UpdateBusiness,
        ) -> RepoResult<Business> {
            let mut s = self.state.write().unwrap();
            let business = s.businesses.get_mut(&id).ok_or(RepoError::NotFound)?;
            if business.user_id != *owner {
                return Err(RepoError::Unauthorized);
            }
            // slug stays derived from the original name; it is immutable
            if let Some(name) = upd.name {
                business.name = name;
            }
            if let Some(tagline) = upd.tagline {
                business.tagline = Some(tagline);
            }
            let updated = business.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn get_business(&self, id: Id) -> RepoResult<Business> {
            let s = self.state.read().unwrap();
            s.businesses.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn get_business_by_slug(&self, slug: &str) -> RepoResult<Business> {
            let s = self.state.read().unwrap();
            s.businesses
                .values()
                .find(|b| b.slug == slug)
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn get_business_for_owner(&self, owner: &UserId) -> RepoResult<Business> {
            let s = self.state.read().unwrap();
            s.businesses
                .values()
                .find(|b| b.user_id == *owner)
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn list_businesses(&self) -> RepoResult<Vec<Business>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s.businesses.values().cloned().collect();
            v.sort_by_key(|b| b.id);
            Ok(v)
        }
    }

    #[async_trait]
    impl SubmissionRepo for InMemRepo {
        async fn insert_submission(&self, new: NewSubmission) -> RepoResult<Submission> {
            let mut s = self.state.write().unwrap();
            if !s.businesses.contains_key(&new.business_id) {
                return Err(RepoError::NotFound);
            }
            let now = Utc::now();
            let id = Self::next_id(&mut s);
            let submission = Submission {
                id,
                business_id: new.business_id,
                title: new.title,
                description: new.description,
                image_url: new.image_url,
                status: SubmissionStatus::Pending,
                submitted_by: new.submitted_by,
                created_at: now,
                updated_at: now,
            };
            s.submissions.insert(id, submission.clone());
            drop(s);
            self.persist();
            Ok(submission)
        }

        async fn update_submission(
            &self,
            id: Id,
            actor: &UserId,
            upd: UpdateSubmission,
        ) -> RepoResult<Submission> {
            let mut s = self.state.write().unwrap();
            let existing = s.submissions.get(&id).cloned().ok_or(RepoError::NotFound)?;
            if !Self::may_mutate(&s, &existing, actor) {
                return Err(RepoError::Unauthorized);
            }
            let submission = s.submissions.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title {
                submission.title = title;
            }
            if let Some(description) = upd.description {
                submission.description = description;
            }
            if let Some(image_url) = upd.image_url {
                submission.image_url = image_url;
            }
            submission.updated_at = Utc::now();
            let updated = submission.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn set_submission_status(
            &self,
            id: Id,
            owner: &UserId,
            status: SubmissionStatus,
        ) -> RepoResult<Submission> {
            let mut s = self.state.write().unwrap();
            let existing = s.submissions.get(&id).cloned().ok_or(RepoError::NotFound)?;
            let owns = s
                .businesses
                .get(&existing.business_id)
                .map(|b| b.user_id == *owner)
                .unwrap_or(false);
            if !owns {
                return Err(RepoError::Unauthorized);
            }
            let submission = s.submissions.get_mut(&id).ok_or(RepoError::NotFound)?;
            submission.status = status;
            submission.updated_at = Utc::now();
            let updated = submission.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_submission(&self, id: Id, actor: &UserId) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let existing = match s.submissions.get(&id).cloned() {
                Some(sub) => sub,
                None => return Err(RepoError::NotFound),
            };
            if !Self::may_mutate(&s, &existing, actor) {
                return Err(RepoError::Unauthorized);
            }
            let has_votes = s.votes.values().any(|v| v.submission_id == id);
            if has_votes {
                if !self.cascade_votes {
                    return Err(RepoError::ReferentialIntegrity);
                }
                s.votes.retain(|_, v| v.submission_id != id);
            }
            s.submissions.remove(&id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn get_submission(&self, id: Id) -> RepoResult<Submission> {
            let s = self.state.read().unwrap();
            s.submissions.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_submissions(&self, business_id: Id) -> RepoResult<Vec<Submission>> {
            let s = self.state.read().unwrap();
            if !s.businesses.contains_key(&business_id) {
                return Err(RepoError::NotFound);
            }
            let mut v: Vec<_> = s
                .submissions
                .values()
                .filter(|sub| sub.business_id == business_id)
                .cloned()
                .collect();
            // created desc; id breaks ties so near-simultaneous inserts stay
            // deterministic
            v.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            });
            Ok(v)
        }
    }

    #[async_trait]
    impl VoteRepo for InMemRepo {
        async fn insert_vote(&self, submission_id: Id, user_id: &UserId) -> RepoResult<Vote> {
            let mut s = self.state.write().unwrap();
            if !s.submissions.contains_key(&submission_id) {
                return Err(RepoError::NotFound);
            }
            // uniqueness on (submission_id, user_id) is the source of truth
            if s.votes
                .values()
                .any(|v| v.submission_id == submission_id && v.user_id == *user_id)
            {
                return Err(RepoError::Conflict);
            }
            let id = Self::next_id(&mut s);
            let vote = Vote {
                id,
                submission_id,
                user_id: user_id.clone(),
                created_at: Utc::now(),
            };
            s.votes.insert(id, vote.clone());
            drop(s);
            self.persist();
            Ok(vote)
        }

        async fn delete_vote(&self, submission_id: Id, user_id: &UserId) -> RepoResult<u64> {
            let mut s = self.state.write().unwrap();
            let before = s.votes.len();
            s.votes
                .retain(|_, v| !(v.submission_id == submission_id && v.user_id == *user_id));
            let removed = (before - s.votes.len()) as u64;
            drop(s);
            if removed > 0 {
                self.persist();
            }
            Ok(removed)
        }

        async fn votes_by_user(&self, business_id: Id, user_id: &UserId) -> RepoResult<Vec<Id>> {
            let s = self.state.read().unwrap();
            let ids = s
                .votes
                .values()
                .filter(|v| v.user_id == *user_id)
                .filter(|v| {
                    s.submissions
                        .get(&v.submission_id)
                        .map(|sub| sub.business_id == business_id)
                        .unwrap_or(false)
                })
                .map(|v| v.submission_id)
                .collect();
            Ok(ids)
        }

        async fn vote_counts(&self, business_id: Id) -> RepoResult<HashMap<Id, i64>> {
            let s = self.state.read().unwrap();
            let mut counts: HashMap<Id, i64> = HashMap::new();
            for v in s.votes.values() {
                let in_business = s
                    .submissions
                    .get(&v.submission_id)
                    .map(|sub| sub.business_id == business_id)
                    .unwrap_or(false);
                if in_business {
                    *counts.entry(v.submission_id).or_insert(0) += 1;
                }
            }
            Ok(counts)
        }

        async fn count_votes(&self, submission_id: Id) -> RepoResult<i64> {
            let s = self.state.read().unwrap();
            Ok(s.votes
                .values()
                .filter(|v| v.submission_id == submission_id)
                .count() as i64)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    /// Map driver errors onto the engine's taxonomy. Constraint codes carry
    /// the semantics the vote ledger and lifecycle manager depend on.
    fn map_db_err(e: sqlx::Error) -> RepoError {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => RepoError::Conflict,
                Some("23503") => RepoError::ReferentialIntegrity,
                _ => RepoError::Transient(db.message().to_string()),
            },
            _ => RepoError::Transient(e.to_string()),
        }
    }

    const SUBMISSION_COLS: &str =
        "id, business_id, title, description, image_url, status, submitted_by, created_at, updated_at";

    impl PgRepo {
        /// 0-rows-updated is ambiguous; resolve to NotFound vs Unauthorized.
        async fn classify_missing(&self, id: Id) -> RepoError {
            let exists: Result<Option<(Id,)>, _> =
                sqlx::query_as("SELECT id FROM submissions WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await;
            match exists {
                Ok(Some(_)) => RepoError::Unauthorized,
                Ok(None) => RepoError::NotFound,
                Err(e) => map_db_err(e),
            }
        }
    }

    #[async_trait]
    impl BusinessRepo for PgRepo {
        async fn create_business(&self, owner: &UserId, new: NewBusiness) -> RepoResult<Business> {
            let slug = slugify(&new.name);
            if slug.is_empty() {
                return Err(RepoError::Conflict);
            }
            sqlx::query_as::<_, Business>(
                "INSERT INTO businesses (slug, name, tagline, user_id) VALUES ($1,$2,$3,$4) \
                 RETURNING id, slug, name, tagline, logo_url, user_id, created_at",
            )
            .bind(&slug)
            .bind(&new.name)
            .bind(&new.tagline)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
        }

        async fn update_business(
            &self,
            id: Id,
            owner: &UserId,
            upd: UpdateBusiness,
        ) -> RepoResult<Business> {
            let rec = sqlx::query_as::<_, Business>(
                "UPDATE businesses SET name = COALESCE($3, name), tagline = COALESCE($4, tagline) \
                 WHERE id = $1 AND user_id = $2 \
                 RETURNING id, slug, name, tagline, logo_url, user_id, created_at",
            )
            .bind(id)
            .bind(owner)
            .bind(upd.name.as_ref())
            .bind(upd.tagline.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
            match rec {
                Some(b) => Ok(b),
                None => {
                    let exists: Option<(Id,)> =
                        sqlx::query_as("SELECT id FROM businesses WHERE id = $1")
                            .bind(id)
                            .fetch_optional(&self.pool)
                            .await
                            .map_err(map_db_err)?;
                    Err(if exists.is_some() {
                        RepoError::Unauthorized
                    } else {
                        RepoError::NotFound
                    })
                }
            }
        }

        async fn get_business(&self, id: Id) -> RepoResult<Business> {
            sqlx::query_as::<_, Business>(
                "SELECT id, slug, name, tagline, logo_url, user_id, created_at \
                 FROM businesses WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
        }

        async fn get_business_by_slug(&self, slug: &str) -> RepoResult<Business> {
            sqlx::query_as::<_, Business>(
                "SELECT id, slug, name, tagline, logo_url, user_id, created_at \
                 FROM businesses WHERE slug = $1",
            )
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
        }

        async fn get_business_for_owner(&self, owner: &UserId) -> RepoResult<Business> {
            sqlx::query_as::<_, Business>(
                "SELECT id, slug, name, tagline, logo_url, user_id, created_at \
                 FROM businesses WHERE user_id = $1",
            )
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
        }

        async fn list_businesses(&self) -> RepoResult<Vec<Business>> {
            sqlx::query_as::<_, Business>(
                "SELECT id, slug, name, tagline, logo_url, user_id, created_at \
                 FROM businesses ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)
        }
    }

    #[async_trait]
    impl SubmissionRepo for PgRepo {
        async fn insert_submission(&self, new: NewSubmission) -> RepoResult<Submission> {
            sqlx::query_as::<_, Submission>(&format!(
                "INSERT INTO submissions (business_id, title, description, image_url, submitted_by) \
                 VALUES ($1,$2,$3,$4,$5) RETURNING {SUBMISSION_COLS}"
            ))
            .bind(new.business_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.image_url)
            .bind(&new.submitted_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
        }

        async fn update_submission(
            &self,
            id: Id,
            actor: &UserId,
            upd: UpdateSubmission,
        ) -> RepoResult<Submission> {
            // image_url: $5 flags whether to touch the column, $6 is the value
            let (touch_image, image_value) = match upd.image_url {
                Some(v) => (true, v),
                None => (false, None),
            };
            let rec = sqlx::query_as::<_, Submission>(&format!(
                "UPDATE submissions s \
                 SET title = COALESCE($3, s.title), \
                     description = COALESCE($4, s.description), \
                     image_url = CASE WHEN $5 THEN $6 ELSE s.image_url END, \
                     updated_at = now() \
                 FROM businesses b \
                 WHERE s.id = $1 AND b.id = s.business_id \
                   AND (s.submitted_by = $2 OR b.user_id = $2) \
                 RETURNING s.id, s.business_id, s.title, s.description, s.image_url, \
                           s.status, s.submitted_by, s.created_at, s.updated_at"
            ))
            .bind(id)
            .bind(actor)
            .bind(upd.title.as_ref())
            .bind(upd.description.as_ref())
            .bind(touch_image)
            .bind(image_value.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
            match rec {
                Some(s) => Ok(s),
                None => Err(self.classify_missing(id).await),
            }
        }

        async fn set_submission_status(
            &self,
            id: Id,
            owner: &UserId,
            status: SubmissionStatus,
        ) -> RepoResult<Submission> {
            let rec = sqlx::query_as::<_, Submission>(
                "UPDATE submissions s SET status = $3, updated_at = now() \
                 FROM businesses b \
                 WHERE s.id = $1 AND b.id = s.business_id AND b.user_id = $2 \
                 RETURNING s.id, s.business_id, s.title, s.description, s.image_url, \
                           s.status, s.submitted_by, s.created_at, s.updated_at",
            )
            .bind(id)
            .bind(owner)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
            match rec {
                Some(s) => Ok(s),
                None => Err(self.classify_missing(id).await),
            }
        }

        async fn delete_submission(&self, id: Id, actor: &UserId) -> RepoResult<()> {
            // no app-side vote cleanup: a non-cascading schema must surface
            // the FK rejection as ReferentialIntegrity
            let res = sqlx::query(
                "DELETE FROM submissions s \
                 USING businesses b \
                 WHERE s.id = $1 AND b.id = s.business_id \
                   AND (s.submitted_by = $2 OR b.user_id = $2)",
            )
            .bind(id)
            .bind(actor)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
            if res.rows_affected() == 0 {
                return Err(self.classify_missing(id).await);
            }
            Ok(())
        }

        async fn get_submission(&self, id: Id) -> RepoResult<Submission> {
            sqlx::query_as::<_, Submission>(&format!(
                "SELECT {SUBMISSION_COLS} FROM submissions WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
        }

        async fn list_submissions(&self, business_id: Id) -> RepoResult<Vec<Submission>> {
            sqlx::query_as::<_, Submission>(&format!(
                "SELECT {SUBMISSION_COLS} FROM submissions \
                 WHERE business_id = $1 ORDER BY created_at DESC, id DESC"
            ))
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)
        }
    }

    #[async_trait]
    impl VoteRepo for PgRepo {
        async fn insert_vote(&self, submission_id: Id, user_id: &UserId) -> RepoResult<Vote> {
            sqlx::query_as::<_, Vote>(
                "INSERT INTO votes (submission_id, user_id) VALUES ($1,$2) \
                 RETURNING id, submission_id, user_id, created_at",
            )
            .bind(submission_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
        }

        async fn delete_vote(&self, submission_id: Id, user_id: &UserId) -> RepoResult<u64> {
            let res = sqlx::query("DELETE FROM votes WHERE submission_id = $1 AND user_id = $2")
                .bind(submission_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;
            Ok(res.rows_affected())
        }

        async fn votes_by_user(&self, business_id: Id, user_id: &UserId) -> RepoResult<Vec<Id>> {
            let rows: Vec<(Id,)> = sqlx::query_as(
                "SELECT v.submission_id FROM votes v \
                 JOIN submissions s ON s.id = v.submission_id \
                 WHERE s.business_id = $1 AND v.user_id = $2",
            )
            .bind(business_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        }

        async fn vote_counts(&self, business_id: Id) -> RepoResult<HashMap<Id, i64>> {
            let rows: Vec<(Id, i64)> = sqlx::query_as(
                "SELECT v.submission_id, COUNT(*) FROM votes v \
                 JOIN submissions s ON s.id = v.submission_id \
                 WHERE s.business_id = $1 GROUP BY v.submission_id",
            )
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
            Ok(rows.into_iter().collect())
        }

        async fn count_votes(&self, submission_id: Id) -> RepoResult<i64> {
            let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM votes WHERE submission_id = $1")
                .bind(submission_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_err)?;
            Ok(row.0)
        }
    }
}
