pub(crate) mod assignment_files;
pub(crate) mod assignments;
pub(crate) mod groups;
pub(crate) mod health;
pub(crate) mod resources;
pub(crate) mod submission_files;
pub(crate) mod submissions;
pub(crate) mod users;
