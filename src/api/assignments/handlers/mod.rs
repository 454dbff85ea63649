mod files;
mod manage;
mod review;
mod submit;

pub(super) use files::{download_file, export_submission};
pub(super) use manage::{
    close_assignment, create_assignment, get_assignment, list_subgroup_assignments,
    remind_assignment, upload_assignment_files,
};
pub(super) use review::{bulk_grade, grade_submission, list_submissions, reject_submission};
pub(super) use submit::submit_assignment;
