use crate::models::{
    Business, BusinessStats, NewBusiness, NewSubmission, ProcessedSubmission, Submission,
    SubmissionStatus, UpdateBusiness, UpdateSubmission, Vote,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_businesses,
        crate::routes::create_business,
        crate::routes::my_business,
        crate::routes::update_business,
        crate::routes::public_page,
        crate::routes::list_submissions,
        crate::routes::business_stats,
        crate::routes::create_submission,
        crate::routes::update_submission,
        crate::routes::delete_submission,
        crate::routes::set_status,
        crate::routes::toggle_vote,
    ),
    components(schemas(
        Business, NewBusiness, UpdateBusiness, BusinessStats,
        Submission, NewSubmission, UpdateSubmission, SubmissionStatus,
        ProcessedSubmission, Vote,
        crate::routes::PublicPage,
        crate::routes::SetStatusRequest,
        crate::routes::ToggleResponse,
    )),
    tags(
        (name = "businesses", description = "Business pages and owner settings"),
        (name = "submissions", description = "Product idea submissions"),
        (name = "votes", description = "Vote toggling and reconciliation"),
    )
)]
pub struct ApiDoc;
