pub(crate) mod assignments;
pub(crate) mod auth;
pub(crate) mod errors;
pub(crate) mod groups;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod notifications;
pub(crate) mod pagination;
pub(crate) mod resources;
pub(crate) mod router;
pub(crate) mod student;
pub(crate) mod uploads;
pub(crate) mod users;
pub(crate) mod validation;
