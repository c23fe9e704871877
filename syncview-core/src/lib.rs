pub mod clock;
pub mod command;
pub mod engine;
pub mod error;
pub mod model;
pub mod prefs;
pub mod publish;
pub mod selection;
pub mod size;
pub mod stream;
pub mod view;

pub use command::{BulkAction, BulkResult, Pending, WebReaction};
pub use engine::{EngineConfig, SyncEngine};
pub use error::{Result, SyncError};
pub use model::{ModelEntity, ModelSnapshot, ModelState, ModelStore};
pub use selection::{SelectionManager, SelectionSnapshot};
pub use size::{download_percentage, format_eta, format_rate, format_size};
pub use stream::{ChannelConfig, ChannelStatus, EventChannel, RetryBackoff, StreamConsumer};
pub use view::{SortMethod, ViewEntity, ViewList, ViewProjector, ViewStatus};
