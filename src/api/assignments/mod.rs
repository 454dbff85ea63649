mod handlers;
mod helpers;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_assignment))
        .route("/download/:file_id", get(handlers::download_file))
        .route("/student/submit/:assignment_id", post(handlers::submit_assignment))
        .route("/subgroup/:group_id/:subgroup_id", get(handlers::list_subgroup_assignments))
        .route("/:assignment_id", get(handlers::get_assignment))
        .route("/:assignment_id/files", post(handlers::upload_assignment_files))
        .route("/:assignment_id/close", post(handlers::close_assignment))
        .route("/:assignment_id/reminder", post(handlers::remind_assignment))
        .route("/:assignment_id/submissions", get(handlers::list_submissions))
        .route("/:assignment_id/submissions/bulk-grade", post(handlers::bulk_grade))
        .route("/:assignment_id/submissions/:student_id", patch(handlers::grade_submission))
        .route(
            "/:assignment_id/submissions/:student_id/reject",
            post(handlers::reject_submission),
        )
        .route(
            "/:assignment_id/submissions/:student_id/export",
            get(handlers::export_submission),
        )
}
