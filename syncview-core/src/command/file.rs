use std::sync::Arc;

use tracing::debug;

use super::action::BulkAction;
use super::http::CommandTransport;
use super::pending::Pending;
use crate::SyncError;

/// Outcome of a single-file command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebReaction {
    pub success: bool,
    pub data: Option<String>,
    pub error_message: Option<String>,
}

impl WebReaction {
    pub fn succeeded(data: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_message: Some(message.into()),
        }
    }

    fn lost() -> Self {
        Self::failed("Command worker stopped unexpectedly")
    }
}

/// Command URL for one file. The name is percent-encoded twice so that
/// slashes survive the server's routing.
pub fn command_path(action: BulkAction, name: &str) -> String {
    let once = urlencoding::encode(name);
    format!("/server/command/{}/{}", action.as_str(), urlencoding::encode(&once))
}

/// Issues per-file commands
pub struct FileCommands<C> {
    transport: Arc<C>,
}

impl<C> Clone for FileCommands<C> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<C: CommandTransport + 'static> FileCommands<C> {
    pub fn new(transport: Arc<C>) -> Self {
        Self { transport }
    }

    /// Send the command on a worker thread
    pub fn execute(&self, action: BulkAction, name: &str) -> Pending<WebReaction> {
        let transport = Arc::clone(&self.transport);
        let name = name.to_string();
        Pending::spawn(
            "syncview-command",
            move || run_command(transport.as_ref(), action, &name),
            WebReaction::lost,
        )
    }

    pub fn queue(&self, name: &str) -> Pending<WebReaction> {
        self.execute(BulkAction::Queue, name)
    }

    pub fn stop(&self, name: &str) -> Pending<WebReaction> {
        self.execute(BulkAction::Stop, name)
    }

    pub fn extract(&self, name: &str) -> Pending<WebReaction> {
        self.execute(BulkAction::Extract, name)
    }

    pub fn delete_local(&self, name: &str) -> Pending<WebReaction> {
        self.execute(BulkAction::DeleteLocal, name)
    }

    pub fn delete_remote(&self, name: &str) -> Pending<WebReaction> {
        self.execute(BulkAction::DeleteRemote, name)
    }
}

/// Blocking form of [`FileCommands::execute`]
pub fn run_command<C: CommandTransport + ?Sized>(
    transport: &C,
    action: BulkAction,
    name: &str,
) -> WebReaction {
    let path = command_path(action, name);
    match transport.get(&path) {
        Ok(body) => {
            debug!(action = action.as_str(), name, "command accepted");
            WebReaction::succeeded(body)
        }
        Err(SyncError::Http { body, .. }) if !body.trim().is_empty() => WebReaction::failed(body),
        Err(SyncError::Transport(message)) => WebReaction::failed(message),
        Err(e) => WebReaction::failed(e.to_string()),
    }
}
