use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Viewer;
use crate::error::ApiError;
use crate::lifecycle::{AssetLifecycle, ImageChange, ImagePayload, SubmissionFields, SubmissionPatch};
use crate::models::*;
use crate::rate_limit::RateLimiterFacade;
use crate::reconcile::{SubmissionBoard, ToggleOutcome};
use crate::repo::Repo;
use crate::status;
use crate::storage::AssetStore;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/businesses")
                    .route(web::get().to(list_businesses))
                    .route(web::post().to(create_business)),
            )
            .service(web::resource("/businesses/me").route(web::get().to(my_business)))
            .service(web::resource("/businesses/{id}").route(web::patch().to(update_business)))
            .service(
                web::resource("/businesses/{id}/submissions")
                    .route(web::get().to(list_submissions)),
            )
            .service(web::resource("/businesses/{id}/stats").route(web::get().to(business_stats)))
            .service(web::resource("/p/{slug}").route(web::get().to(public_page)))
            .service(web::resource("/submissions").route(web::post().to(create_submission)))
            .service(
                web::resource("/submissions/{id}")
                    .route(web::patch().to(update_submission))
                    .route(web::delete().to(delete_submission)),
            )
            .service(web::resource("/submissions/{id}/status").route(web::post().to(set_status)))
            .service(web::resource("/submissions/{id}/vote").route(web::post().to(toggle_vote))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub assets: Arc<dyn AssetStore>,
    pub rate_limiter: Option<RateLimiterFacade>,
}

impl AppState {
    fn lifecycle(&self) -> AssetLifecycle {
        AssetLifecycle::new(self.assets.clone())
    }
}

// ---------------- businesses ----------------

#[utoipa::path(
    post,
    path = "/api/v1/businesses",
    request_body = NewBusiness,
    responses(
        (status = 201, description = "Business created", body = Business),
        (status = 401, description = "Authentication required"),
        (status = 409, description = "Slug taken or owner already has a business")
    )
)]
pub async fn create_business(
    viewer: Viewer,
    data: web::Data<AppState>,
    payload: web::Json<NewBusiness>,
) -> Result<HttpResponse, ApiError> {
    let owner = viewer.user_id().to_string();
    let business = data
        .repo
        .create_business(&owner, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(business))
}

#[utoipa::path(
    get,
    path = "/api/v1/businesses",
    responses((status = 200, description = "List businesses", body = [Business]))
)]
pub async fn list_businesses(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let businesses = data.repo.list_businesses().await?;
    Ok(HttpResponse::Ok().json(businesses))
}

#[utoipa::path(
    get,
    path = "/api/v1/businesses/me",
    responses(
        (status = 200, description = "The caller's business", body = Business),
        (status = 404, description = "Caller owns no business")
    )
)]
pub async fn my_business(
    viewer: Viewer,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let owner = viewer.user_id().to_string();
    let business = data.repo.get_business_for_owner(&owner).await?;
    Ok(HttpResponse::Ok().json(business))
}

#[utoipa::path(
    patch,
    path = "/api/v1/businesses/{id}",
    request_body = UpdateBusiness,
    params(("id" = Id, Path, description = "Business id")),
    responses(
        (status = 200, description = "Business updated", body = Business),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Business not found")
    )
)]
pub async fn update_business(
    viewer: Viewer,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateBusiness>,
) -> Result<HttpResponse, ApiError> {
    let owner = viewer.user_id().to_string();
    let business = data
        .repo
        .update_business(path.into_inner(), &owner, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(business))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicPage {
    pub business: Business,
    pub submissions: Vec<ProcessedSubmission>,
}

#[utoipa::path(
    get,
    path = "/api/v1/p/{slug}",
    params(("slug" = String, Path, description = "Business slug")),
    responses(
        (status = 200, description = "Public page: business + ranked submissions", body = PublicPage),
        (status = 404, description = "No business with that slug")
    )
)]
pub async fn public_page(
    viewer: Option<Viewer>,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let business = data.repo.get_business_by_slug(&path.into_inner()).await?;
    let board = SubmissionBoard::load(
        data.repo.as_ref(),
        business.id,
        viewer.map(|v| v.user_id().to_string()),
    )
    .await?;
    Ok(HttpResponse::Ok().json(PublicPage {
        business,
        submissions: board.into_submissions(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/businesses/{id}/submissions",
    params(("id" = Id, Path, description = "Business id")),
    responses(
        (status = 200, description = "Ranked submissions with viewer vote state", body = [ProcessedSubmission]),
        (status = 404, description = "Business not found")
    )
)]
pub async fn list_submissions(
    viewer: Option<Viewer>,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let board = SubmissionBoard::load(
        data.repo.as_ref(),
        path.into_inner(),
        viewer.map(|v| v.user_id().to_string()),
    )
    .await?;
    Ok(HttpResponse::Ok().json(board.into_submissions()))
}

#[utoipa::path(
    get,
    path = "/api/v1/businesses/{id}/stats",
    params(("id" = Id, Path, description = "Business id")),
    responses(
        (status = 200, description = "Dashboard aggregates", body = BusinessStats),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Business not found")
    )
)]
pub async fn business_stats(
    viewer: Viewer,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let business_id = path.into_inner();
    let business = data.repo.get_business(business_id).await?;
    if business.user_id != viewer.user_id() {
        return Err(ApiError::Forbidden);
    }
    let submissions = data.repo.list_submissions(business_id).await?;
    let counts = data.repo.vote_counts(business_id).await?;
    let stats = BusinessStats {
        total_submissions: submissions.len(),
        total_votes: counts.values().sum(),
        pending_review: submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .count(),
    };
    Ok(HttpResponse::Ok().json(stats))
}

// ---------------- submission intake (multipart) ----------------

const IMAGE_SIZE_LIMIT: usize = 10 * 1024 * 1024; // 10 MB
const TEXT_FIELD_LIMIT: usize = 64 * 1024;

const ALLOWED_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

struct SubmissionForm {
    business_id: Option<Id>,
    title: Option<String>,
    description: Option<String>,
    remove_image: bool,
    image: Option<ImagePayload>,
}

/// Drain a multipart payload into the fields a submission form carries.
/// Unknown field names are skipped; the image type is sniffed, not trusted.
async fn read_submission_form(mut payload: Multipart) -> Result<SubmissionForm, ApiError> {
    let mut form = SubmissionForm {
        business_id: None,
        title: None,
        description: None,
        remove_image: false,
        image: None,
    };
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::error!("multipart error: {e}");
        ApiError::BadRequest
    })? {
        let Some(name) = field.content_disposition().get_name().map(str::to_string) else {
            continue;
        };
        let limit = if name == "image" {
            IMAGE_SIZE_LIMIT
        } else {
            TEXT_FIELD_LIMIT
        };
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::error!("stream read error: {e}");
            ApiError::BadRequest
        })? {
            if bytes.len() + chunk.len() > limit {
                return Err(ApiError::BadRequest);
            }
            bytes.extend_from_slice(&chunk);
        }
        match name.as_str() {
            "business_id" => {
                form.business_id = String::from_utf8(bytes)
                    .ok()
                    .and_then(|v| v.trim().parse().ok());
            }
            "title" => form.title = String::from_utf8(bytes).ok(),
            "description" => form.description = String::from_utf8(bytes).ok(),
            "remove_image" => {
                form.remove_image =
                    matches!(String::from_utf8(bytes).as_deref(), Ok("1") | Ok("true"));
            }
            "image" => {
                if bytes.is_empty() {
                    continue;
                }
                let Some(kind) = infer::get(&bytes) else {
                    return Err(ApiError::BadRequest);
                };
                if !ALLOWED_MIME.contains(&kind.mime_type()) {
                    return Err(ApiError::BadRequest);
                }
                form.image = Some(ImagePayload {
                    bytes,
                    ext: kind.extension().to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

fn require_nonempty(v: Option<String>) -> Result<String, ApiError> {
    match v {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ApiError::BadRequest),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/submissions",
    responses(
        (status = 201, description = "Submission created", body = Submission),
        (status = 400, description = "Missing fields or unsupported image"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Business not found"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn create_submission(
    viewer: Viewer,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_submit(viewer.user_id()) {
            return Ok(HttpResponse::TooManyRequests().finish());
        }
    }
    let form = read_submission_form(payload).await?;
    if form.image.is_some() {
        if let Some(rl) = &data.rate_limiter {
            if !rl.allow_image(viewer.user_id()) {
                return Ok(HttpResponse::TooManyRequests().finish());
            }
        }
    }
    let business_id = form.business_id.ok_or(ApiError::BadRequest)?;
    let fields = SubmissionFields {
        title: require_nonempty(form.title)?,
        description: require_nonempty(form.description)?,
    };
    let submitted_by = viewer.user_id().to_string();
    let submission = data
        .lifecycle()
        .create_submission(
            data.repo.as_ref(),
            business_id,
            fields,
            &submitted_by,
            form.image,
        )
        .await?;
    Ok(HttpResponse::Created().json(submission))
}

#[utoipa::path(
    patch,
    path = "/api/v1/submissions/{id}",
    params(("id" = Id, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission updated", body = Submission),
        (status = 400, description = "Unsupported image"),
        (status = 403, description = "Neither submitter nor business owner"),
        (status = 404, description = "Submission not found")
    )
)]
pub async fn update_submission(
    viewer: Viewer,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_submission_form(payload).await?;
    if form.image.is_some() {
        if let Some(rl) = &data.rate_limiter {
            if !rl.allow_image(viewer.user_id()) {
                return Ok(HttpResponse::TooManyRequests().finish());
            }
        }
    }
    let image = match (form.image, form.remove_image) {
        (Some(img), _) => ImageChange::Replace(img),
        (None, true) => ImageChange::Remove,
        (None, false) => ImageChange::Keep,
    };
    let patch = SubmissionPatch {
        title: form.title.filter(|t| !t.trim().is_empty()),
        description: form.description.filter(|d| !d.trim().is_empty()),
    };
    let actor = viewer.user_id().to_string();
    let submission = data
        .lifecycle()
        .edit_submission(data.repo.as_ref(), path.into_inner(), &actor, patch, image)
        .await?;
    Ok(HttpResponse::Ok().json(submission))
}

#[utoipa::path(
    delete,
    path = "/api/v1/submissions/{id}",
    params(("id" = Id, Path, description = "Submission id")),
    responses(
        (status = 204, description = "Deleted (or already gone)"),
        (status = 403, description = "Neither submitter nor business owner"),
        (status = 409, description = "Blocked by dependent vote rows")
    )
)]
pub async fn delete_submission(
    viewer: Viewer,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let actor = viewer.user_id().to_string();
    data.lifecycle()
        .delete_submission(data.repo.as_ref(), path.into_inner(), &actor)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- status ----------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStatusRequest {
    pub status: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/submissions/{id}/status",
    request_body = SetStatusRequest,
    params(("id" = Id, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Updated submission with fresh vote aggregate", body = ProcessedSubmission),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Not the business owner"),
        (status = 404, description = "Submission not found")
    )
)]
pub async fn set_status(
    viewer: Viewer,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<SetStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let new_status = SubmissionStatus::parse(&payload.status).ok_or(ApiError::BadRequest)?;
    let owner = viewer.user_id().to_string();
    let processed =
        status::set_status(data.repo.as_ref(), path.into_inner(), new_status, &owner).await?;
    Ok(HttpResponse::Ok().json(processed))
}

// ---------------- voting ----------------

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    /// "applied", "resynced" or "rolled_back".
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// Present on resync/rollback: the authoritative ranked set the caller
    /// should replace its local state with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<Vec<ProcessedSubmission>>,
}

#[utoipa::path(
    post,
    path = "/api/v1/submissions/{id}/vote",
    params(("id" = Id, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Toggle outcome", body = ToggleResponse),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Submission not found"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn toggle_vote(
    viewer: Viewer,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_vote(viewer.user_id()) {
            return Ok(HttpResponse::TooManyRequests().finish());
        }
    }
    let submission_id = path.into_inner();
    let submission = data.repo.get_submission(submission_id).await?;
    let mut board = SubmissionBoard::load(
        data.repo.as_ref(),
        submission.business_id,
        Some(viewer.user_id().to_string()),
    )
    .await?;
    let outcome = board.toggle_vote(data.repo.as_ref(), submission_id).await?;
    let resp = match outcome {
        ToggleOutcome::Applied { voted, vote_count } => ToggleResponse {
            outcome: "applied",
            voted: Some(voted),
            vote_count: Some(vote_count),
            notice: None,
            submissions: None,
        },
        ToggleOutcome::Resynced => ToggleResponse {
            outcome: "resynced",
            voted: None,
            vote_count: None,
            notice: None,
            submissions: Some(board.into_submissions()),
        },
        ToggleOutcome::RolledBack { notice } => ToggleResponse {
            outcome: "rolled_back",
            voted: None,
            vote_count: None,
            notice: Some(notice),
            submissions: Some(board.into_submissions()),
        },
    };
    Ok(HttpResponse::Ok().json(resp))
}
