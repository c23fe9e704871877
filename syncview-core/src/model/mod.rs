//! Server-side file model and the events that keep it current

mod entity;
mod event;
mod store;

pub use entity::{ModelEntity, ModelState};
pub use event::{
    EVENT_ADDED, EVENT_INIT, EVENT_REMOVED, EVENT_UPDATED, MODEL_EVENT_NAMES, ModelEvent,
};
pub use store::{ModelSnapshot, ModelStore};
