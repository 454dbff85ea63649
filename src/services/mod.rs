pub(crate) mod bulk_grading;
pub(crate) mod export;
pub(crate) mod notifications;
pub(crate) mod storage;
pub(crate) mod submission_workflow;
