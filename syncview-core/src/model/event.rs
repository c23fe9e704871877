use serde::Deserialize;

use super::entity::{ModelEntity, WireEntity};
use crate::{Result, SyncError};

pub const EVENT_INIT: &str = "model-init";
pub const EVENT_ADDED: &str = "model-added";
pub const EVENT_UPDATED: &str = "model-updated";
pub const EVENT_REMOVED: &str = "model-removed";

/// Every stream event name the model store listens for
pub const MODEL_EVENT_NAMES: [&str; 4] = [EVENT_INIT, EVENT_ADDED, EVENT_UPDATED, EVENT_REMOVED];

/// A decoded change to the backend model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Full replacement of the model
    Init(Vec<ModelEntity>),
    /// A new entity appeared
    Added(ModelEntity),
    /// An existing entity changed; carries the new value only
    Updated(ModelEntity),
    /// An entity went away; carries its last value
    Removed(ModelEntity),
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    #[serde(default, alias = "new_entity")]
    new_file: Option<WireEntity>,
    #[serde(default, alias = "old_entity")]
    old_file: Option<WireEntity>,
}

impl ModelEvent {
    /// Decode a raw stream event.
    ///
    /// `model-init` drops unnamed entries; for the incremental events an
    /// unnamed or missing entity is an error.
    pub fn decode(event_name: &str, data: &str) -> Result<Self> {
        match event_name {
            EVENT_INIT => {
                let wire: Vec<WireEntity> = serde_json::from_str(data)?;
                Ok(ModelEvent::Init(
                    wire.into_iter().filter_map(WireEntity::into_entity).collect(),
                ))
            }
            EVENT_ADDED => Ok(ModelEvent::Added(Self::named(
                serde_json::from_str::<ChangePayload>(data)?.new_file,
            )?)),
            EVENT_UPDATED => Ok(ModelEvent::Updated(Self::named(
                serde_json::from_str::<ChangePayload>(data)?.new_file,
            )?)),
            EVENT_REMOVED => Ok(ModelEvent::Removed(Self::named(
                serde_json::from_str::<ChangePayload>(data)?.old_file,
            )?)),
            other => Err(SyncError::UnknownEvent(other.to_string())),
        }
    }

    fn named(wire: Option<WireEntity>) -> Result<ModelEntity> {
        wire.and_then(WireEntity::into_entity)
            .ok_or(SyncError::UnnamedEntity)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelEvent::Init(_) => EVENT_INIT,
            ModelEvent::Added(_) => EVENT_ADDED,
            ModelEvent::Updated(_) => EVENT_UPDATED,
            ModelEvent::Removed(_) => EVENT_REMOVED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelState;

    #[test]
    fn test_decode_init_skips_unnamed() {
        let event = ModelEvent::decode(
            EVENT_INIT,
            r#"[{"name": "a", "children": []}, {"name": null}, {"name": "b"}]"#,
        )
        .unwrap();
        match event {
            ModelEvent::Init(entities) => {
                let names: Vec<_> = entities.iter().map(|e| e.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_updated_uses_new_value() {
        let event = ModelEvent::decode(
            EVENT_UPDATED,
            r#"{"old_file": {"name": "a", "state": "queued"},
                "new_file": {"name": "a", "state": "downloading"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ModelEvent::Updated(ModelEntity::new("a").with_state(ModelState::Downloading))
        );
    }

    #[test]
    fn test_decode_removed_uses_old_value() {
        let event =
            ModelEvent::decode(EVENT_REMOVED, r#"{"old_file": {"name": "gone"}, "new_file": null}"#)
                .unwrap();
        assert_eq!(event, ModelEvent::Removed(ModelEntity::new("gone")));
    }

    #[test]
    fn test_decode_accepts_entity_aliases() {
        let event = ModelEvent::decode(EVENT_ADDED, r#"{"new_entity": {"name": "x"}}"#).unwrap();
        assert_eq!(event, ModelEvent::Added(ModelEntity::new("x")));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            ModelEvent::decode(EVENT_ADDED, r#"{"new_file": {"name": null}}"#),
            Err(SyncError::UnnamedEntity)
        ));
        assert!(matches!(
            ModelEvent::decode(EVENT_ADDED, "not json"),
            Err(SyncError::Json(_))
        ));
        assert!(matches!(
            ModelEvent::decode("model-exploded", "{}"),
            Err(SyncError::UnknownEvent(_))
        ));
    }
}
