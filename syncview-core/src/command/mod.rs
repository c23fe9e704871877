//! Per-file and bulk commands sent to the sync server

mod action;
mod bulk;
mod file;
mod http;
mod pending;

pub use action::{BulkAction, EligibilityCounts, eligible_names};
pub use bulk::{
    BULK_PATH, BulkExecutor, BulkFileResult, BulkResponse, BulkResult, BulkSummary, run_bulk,
};
pub use file::{FileCommands, WebReaction, command_path, run_command};
pub use http::{CommandTransport, UreqCommandTransport};
pub use pending::Pending;
