use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::action::BulkAction;
use super::http::CommandTransport;
use super::pending::Pending;
use crate::SyncError;

pub const BULK_PATH: &str = "/server/command/bulk";

/// Outcome for one file of a bulk request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BulkFileResult {
    pub file: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Structured success response of the bulk endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BulkResponse {
    pub results: Vec<BulkFileResult>,
    pub summary: BulkSummary,
}

#[derive(Serialize)]
struct BulkRequestBody<'a> {
    action: BulkAction,
    files: &'a [String],
}

/// Outcome of one bulk invocation.
///
/// `success` says whether the server processed the request at all.
/// Per-file failures are data in `response`, not a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkResult {
    pub action: BulkAction,
    pub files: Vec<String>,
    pub success: bool,
    pub response: Option<BulkResponse>,
    pub error_message: Option<String>,
}

impl BulkResult {
    fn processed(action: BulkAction, files: Vec<String>, response: BulkResponse) -> Self {
        Self {
            action,
            files,
            success: true,
            response: Some(response),
            error_message: None,
        }
    }

    fn rejected(action: BulkAction, files: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            action,
            files,
            success: false,
            response: None,
            error_message: Some(message.into()),
        }
    }

    fn failed_count(&self) -> Option<usize> {
        self.response.as_ref().map(|r| r.summary.failed)
    }

    pub fn all_succeeded(&self) -> bool {
        self.success && self.failed_count() == Some(0)
    }

    pub fn has_partial_failure(&self) -> bool {
        self.success && self.failed_count().is_some_and(|n| n > 0)
    }

    pub fn summary(&self) -> Option<BulkSummary> {
        self.response.as_ref().map(|r| r.summary)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BulkFileResult> {
        self.response
            .iter()
            .flat_map(|r| r.results.iter())
            .filter(|r| !r.success)
    }
}

/// Runs one action over many files with a single request
pub struct BulkExecutor<C> {
    transport: Arc<C>,
}

impl<C> Clone for BulkExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<C: CommandTransport + 'static> BulkExecutor<C> {
    pub fn new(transport: Arc<C>) -> Self {
        Self { transport }
    }

    /// Issue the request on a worker thread. Every clone of the returned
    /// handle observes the same result.
    pub fn execute(&self, action: BulkAction, files: Vec<String>) -> Pending<BulkResult> {
        if files.is_empty() {
            return Pending::ready(BulkResult::rejected(
                action,
                files,
                "files array is required and must not be empty",
            ));
        }

        info!(action = action.as_str(), files = files.len(), "executing bulk action");
        let transport = Arc::clone(&self.transport);
        let requested = files.clone();
        Pending::spawn(
            "syncview-bulk",
            move || run_bulk(transport.as_ref(), action, files),
            move || {
                BulkResult::rejected(action, requested.clone(), "Bulk worker stopped unexpectedly")
            },
        )
    }
}

/// Blocking form of [`BulkExecutor::execute`]
pub fn run_bulk<C: CommandTransport + ?Sized>(
    transport: &C,
    action: BulkAction,
    files: Vec<String>,
) -> BulkResult {
    let body = match serde_json::to_string(&BulkRequestBody {
        action,
        files: &files,
    }) {
        Ok(body) => body,
        Err(e) => return BulkResult::rejected(action, files, e.to_string()),
    };

    match transport.post_json(BULK_PATH, &body) {
        Ok(text) => interpret_success(action, files, &text),
        Err(e) => {
            let message = error_message(&e);
            warn!(action = action.as_str(), error = %message, "bulk action failed");
            BulkResult::rejected(action, files, message)
        }
    }
}

fn interpret_success(action: BulkAction, files: Vec<String>, text: &str) -> BulkResult {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return BulkResult::rejected(action, files, format!("Invalid response: {}", e)),
    };
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return BulkResult::rejected(action, files, error);
    }
    match serde_json::from_value::<BulkResponse>(value) {
        Ok(response) => {
            debug!(
                action = action.as_str(),
                succeeded = response.summary.succeeded,
                failed = response.summary.failed,
                "bulk response"
            );
            BulkResult::processed(action, files, response)
        }
        Err(e) => BulkResult::rejected(action, files, format!("Invalid response: {}", e)),
    }
}

/// Best message for a failed request: the JSON `error` field, else the
/// plain body, else the transport's own message
fn error_message(err: &SyncError) -> String {
    match err {
        SyncError::Http { body, .. } => {
            let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
                v.get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
            match from_json {
                Some(message) => message,
                None if !body.trim().is_empty() => body.trim().to_string(),
                None => err.to_string(),
            }
        }
        SyncError::Transport(message) => message.clone(),
        other => other.to_string(),
    }
}
