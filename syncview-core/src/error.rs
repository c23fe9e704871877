use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Model entity named {0} already exists")]
    EntityExists(String),

    #[error("Failed to find model entity named {0}")]
    EntityMissing(String),

    #[error("Model entity has no name")]
    UnnamedEntity,

    #[error("Unrecognized event: {0}")]
    UnknownEvent(String),

    #[error("Unknown bulk action: {0}")]
    UnknownAction(String),

    #[error("Consumers must be registered before the channel is started")]
    ChannelStarted,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Preferences error: {0}")]
    Prefs(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
