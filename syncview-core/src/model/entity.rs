use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Transfer state as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelState {
    #[default]
    Default,
    Queued,
    Downloading,
    Downloaded,
    Deleted,
    Extracting,
    Extracted,
}

impl ModelState {
    /// Parse a backend state name. Matching ignores case; anything
    /// unrecognised is treated as `Default`.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "queued" => ModelState::Queued,
            "downloading" => ModelState::Downloading,
            "downloaded" => ModelState::Downloaded,
            "deleted" => ModelState::Deleted,
            "extracting" => ModelState::Extracting,
            "extracted" => ModelState::Extracted,
            _ => ModelState::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Default => "default",
            ModelState::Queued => "queued",
            ModelState::Downloading => "downloading",
            ModelState::Downloaded => "downloaded",
            ModelState::Deleted => "deleted",
            ModelState::Extracting => "extracting",
            ModelState::Extracted => "extracted",
        }
    }
}

/// Backend-owned record for one file or directory.
///
/// Entities are values: a change on the backend arrives as a whole new
/// entity that replaces the previous one under the same `name`.
/// `children` is kept sorted by name so that equality does not depend on
/// the order the backend listed them in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelEntity {
    pub name: String,
    pub is_dir: bool,
    pub local_size: Option<u64>,
    pub remote_size: Option<u64>,
    pub state: ModelState,
    /// Bytes per second while downloading
    pub download_rate: Option<u64>,
    /// Seconds remaining while downloading
    pub eta: Option<u64>,
    pub full_path: Option<String>,
    /// Backend believes the file is an archive that can be extracted
    pub is_archive_candidate: bool,
    pub local_created: Option<SystemTime>,
    pub local_modified: Option<SystemTime>,
    pub remote_created: Option<SystemTime>,
    pub remote_modified: Option<SystemTime>,
    pub children: Vec<ModelEntity>,
}

impl ModelEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: ModelState) -> Self {
        self.state = state;
        self
    }

    pub fn with_sizes(mut self, local: u64, remote: u64) -> Self {
        self.local_size = Some(local);
        self.remote_size = Some(remote);
        self
    }

    pub fn with_archive(mut self, is_archive: bool) -> Self {
        self.is_archive_candidate = is_archive;
        self
    }

    pub fn with_children(mut self, mut children: Vec<ModelEntity>) -> Self {
        children.sort_by(|a, b| a.name.cmp(&b.name));
        self.children = children;
        self
    }
}

/// JSON shape of an entity on the wire. Every field may be null.
#[derive(Debug, Deserialize)]
pub(crate) struct WireEntity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_dir: Option<bool>,
    #[serde(default, deserialize_with = "lenient_u64")]
    local_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    remote_size: Option<u64>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    downloading_speed: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    eta: Option<u64>,
    #[serde(default)]
    full_path: Option<String>,
    #[serde(default)]
    is_extractable: Option<bool>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    local_created_timestamp: Option<SystemTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    local_modified_timestamp: Option<SystemTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    remote_created_timestamp: Option<SystemTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    remote_modified_timestamp: Option<SystemTime>,
    #[serde(default)]
    children: Option<Vec<WireEntity>>,
}

impl WireEntity {
    /// Convert into a model entity. Returns `None` when the entity has no
    /// name; unnamed children are dropped.
    pub(crate) fn into_entity(self) -> Option<ModelEntity> {
        let name = self.name?;
        let children = self
            .children
            .unwrap_or_default()
            .into_iter()
            .filter_map(WireEntity::into_entity)
            .collect();

        Some(
            ModelEntity {
                name,
                is_dir: self.is_dir.unwrap_or(false),
                local_size: self.local_size,
                remote_size: self.remote_size,
                state: self
                    .state
                    .as_deref()
                    .map(ModelState::parse)
                    .unwrap_or_default(),
                download_rate: self.downloading_speed,
                eta: self.eta,
                full_path: self.full_path,
                is_archive_candidate: self.is_extractable.unwrap_or(false),
                local_created: self.local_created_timestamp,
                local_modified: self.local_modified_timestamp,
                remote_created: self.remote_created_timestamp,
                remote_modified: self.remote_modified_timestamp,
                children: Vec::new(),
            }
            .with_children(children),
        )
    }
}

/// Numbers may arrive as integers, floats or numeric strings
fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite() && *v >= 0.0)
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(numeric).map(|v| v as u64))
}

/// Timestamps are seconds since the Unix epoch
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(numeric)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .and_then(|offset| UNIX_EPOCH.checked_add(offset)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Option<ModelEntity> {
        serde_json::from_str::<WireEntity>(json)
            .unwrap()
            .into_entity()
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(ModelState::parse("downloading"), ModelState::Downloading);
        assert_eq!(ModelState::parse("EXTRACTED"), ModelState::Extracted);
        assert_eq!(ModelState::parse("Queued"), ModelState::Queued);
        assert_eq!(ModelState::parse("bogus"), ModelState::Default);
    }

    #[test]
    fn test_decode_full_entity() {
        let entity = decode(
            r#"{
                "name": "show.mkv",
                "is_dir": false,
                "local_size": 10,
                "remote_size": 100,
                "state": "DOWNLOADING",
                "downloading_speed": 2048,
                "eta": 44,
                "full_path": "/remote/show.mkv",
                "is_extractable": true,
                "local_created_timestamp": "1500000000",
                "local_modified_timestamp": 1500000000.5,
                "remote_created_timestamp": null,
                "remote_modified_timestamp": null,
                "children": []
            }"#,
        )
        .unwrap();

        assert_eq!(entity.name, "show.mkv");
        assert_eq!(entity.state, ModelState::Downloading);
        assert_eq!(entity.local_size, Some(10));
        assert_eq!(entity.remote_size, Some(100));
        assert_eq!(entity.download_rate, Some(2048));
        assert_eq!(entity.eta, Some(44));
        assert!(entity.is_archive_candidate);
        assert_eq!(
            entity.local_created,
            Some(UNIX_EPOCH + Duration::from_secs(1_500_000_000))
        );
        assert!(entity.local_modified.is_some());
        assert!(entity.remote_created.is_none());
    }

    #[test]
    fn test_decode_nulls_and_missing_fields() {
        let entity = decode(r#"{"name": "a", "local_size": null, "state": null}"#).unwrap();
        assert_eq!(entity.local_size, None);
        assert_eq!(entity.state, ModelState::Default);
        assert!(!entity.is_dir);
        assert!(entity.children.is_empty());
    }

    #[test]
    fn test_unnamed_entity_is_rejected() {
        assert!(decode(r#"{"name": null, "is_dir": true}"#).is_none());
    }

    #[test]
    fn test_children_order_does_not_affect_equality() {
        let a = decode(
            r#"{"name": "dir", "is_dir": true,
                "children": [{"name": "b", "children": []}, {"name": "a", "children": []}]}"#,
        )
        .unwrap();
        let b = decode(
            r#"{"name": "dir", "is_dir": true,
                "children": [{"name": "a", "children": []}, {"name": "b", "children": []}]}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.children[0].name, "a");
    }

    #[test]
    fn test_unrepresentable_timestamps_decode_as_none() {
        let entity = decode(
            r#"{"name": "a",
                "local_modified_timestamp": 1e20,
                "remote_created_timestamp": 1e19,
                "remote_modified_timestamp": "1e300"}"#,
        )
        .unwrap();
        assert_eq!(entity.local_modified, None);
        assert_eq!(entity.remote_created, None);
        assert_eq!(entity.remote_modified, None);
    }
}
