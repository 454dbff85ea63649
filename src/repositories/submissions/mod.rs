mod commands;
mod queries;
mod types;

pub(crate) use commands::{apply_review, upsert_submitted};
pub(crate) use queries::{find, list_roster};
pub(crate) use types::{ReviewUpdate, RosterRow, SubmitUpsert};
