use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;
/// Opaque viewer identity (JWT subject); the engine never inspects it.
pub type UserId = String;

/// Submission lifecycle states. Flat switch: any state may move to any other,
/// there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres-store", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres-store",
    sqlx(type_name = "submission_status", rename_all = "snake_case")
)]
pub enum SubmissionStatus {
    Pending,
    Trending,
    UnderReview,
    Selected,
    Rejected,
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        SubmissionStatus::Pending
    }
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Trending => "trending",
            SubmissionStatus::UnderReview => "under_review",
            SubmissionStatus::Selected => "selected",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "trending" => Some(SubmissionStatus::Trending),
            "under_review" => Some(SubmissionStatus::UnderReview),
            "selected" => Some(SubmissionStatus::Selected),
            "rejected" => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Business {
    pub id: Id,
    pub slug: String,
    pub name: String,
    pub tagline: Option<String>,
    pub logo_url: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewBusiness {
    pub name: String,
    pub tagline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateBusiness {
    pub name: Option<String>,
    pub tagline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Submission {
    pub id: Id,
    pub business_id: Id,
    pub title: String,
    pub description: String,
    /// None means "no image"; a placeholder URL is a valid non-null value.
    pub image_url: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewSubmission {
    pub business_id: Id,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub submitted_by: UserId,
}

/// Field-level patch for a submission edit. `image_url` uses a double Option:
/// outer None leaves the column untouched, `Some(None)` nulls it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubmission {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Vote {
    pub id: Id,
    pub submission_id: Id,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Submission decorated with viewer-scoped vote state. Ephemeral: rebuilt on
/// every full reconciliation and owned by one `SubmissionBoard` at a time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessedSubmission {
    #[serde(flatten)]
    pub submission: Submission,
    pub has_voted: bool,
    pub vote_count: i64,
}

impl ProcessedSubmission {
    pub fn new(submission: Submission, vote_count: i64, has_voted: bool) -> Self {
        Self {
            submission,
            has_voted,
            vote_count,
        }
    }

    pub fn id(&self) -> Id {
        self.submission.id
    }
}

/// Dashboard aggregates for a business.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BusinessStats {
    pub total_submissions: usize,
    pub total_votes: i64,
    pub pending_review: usize,
}

/// URL-safe slug derived from a business name at creation time; immutable
/// thereafter. Strips punctuation, collapses whitespace runs into dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
        // other punctuation is dropped entirely
    }
    slug
}
