use std::time::SystemTime;

use serde::Serialize;

use crate::model::{ModelEntity, ModelState};
use crate::size::download_percentage;

/// Status shown to the user, derived from the backend state and sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    #[default]
    Default,
    /// Partially downloaded and not currently transferring
    Stopped,
    Queued,
    Downloading,
    Downloaded,
    Deleted,
    Extracting,
    Extracted,
}

impl ViewStatus {
    pub const ALL: [ViewStatus; 8] = [
        ViewStatus::Default,
        ViewStatus::Stopped,
        ViewStatus::Queued,
        ViewStatus::Downloading,
        ViewStatus::Downloaded,
        ViewStatus::Deleted,
        ViewStatus::Extracting,
        ViewStatus::Extracted,
    ];

    pub fn derive(state: ModelState, local_size: u64, remote_size: u64) -> Self {
        match state {
            ModelState::Default if local_size > 0 && remote_size > 0 => ViewStatus::Stopped,
            ModelState::Default => ViewStatus::Default,
            ModelState::Queued => ViewStatus::Queued,
            ModelState::Downloading => ViewStatus::Downloading,
            ModelState::Downloaded => ViewStatus::Downloaded,
            ModelState::Deleted => ViewStatus::Deleted,
            ModelState::Extracting => ViewStatus::Extracting,
            ModelState::Extracted => ViewStatus::Extracted,
        }
    }

    /// Position in the status sort; lower sorts first
    pub fn priority(&self) -> u8 {
        match self {
            ViewStatus::Extracting => 0,
            ViewStatus::Downloading => 1,
            ViewStatus::Queued => 2,
            ViewStatus::Extracted => 3,
            ViewStatus::Downloaded => 4,
            ViewStatus::Stopped => 5,
            ViewStatus::Default | ViewStatus::Deleted => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewStatus::Default => "default",
            ViewStatus::Stopped => "stopped",
            ViewStatus::Queued => "queued",
            ViewStatus::Downloading => "downloading",
            ViewStatus::Downloaded => "downloaded",
            ViewStatus::Deleted => "deleted",
            ViewStatus::Extracting => "extracting",
            ViewStatus::Extracted => "extracted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw))
    }

    fn is_one_of(&self, set: &[ViewStatus]) -> bool {
        set.contains(self)
    }
}

/// Display projection of one model entity.
///
/// Like model entities these are values; changing one means building a
/// new one.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ViewEntity {
    pub name: String,
    pub is_dir: bool,
    pub local_size: u64,
    pub remote_size: u64,
    pub percent_downloaded: u64,
    pub status: ViewStatus,
    pub download_rate: Option<u64>,
    pub eta: Option<u64>,
    pub full_path: Option<String>,
    pub is_archive: bool,
    /// Single-selection highlight; at most one entity in a list has it
    pub selected: bool,
    pub queueable: bool,
    pub stoppable: bool,
    pub extractable: bool,
    pub locally_deletable: bool,
    pub remotely_deletable: bool,
    pub local_created: Option<SystemTime>,
    pub local_modified: Option<SystemTime>,
    pub remote_created: Option<SystemTime>,
    pub remote_modified: Option<SystemTime>,
}

const LOCAL_CONTENT: [ViewStatus; 4] = [
    ViewStatus::Default,
    ViewStatus::Stopped,
    ViewStatus::Downloaded,
    ViewStatus::Extracted,
];

impl ViewEntity {
    pub fn from_model(model: &ModelEntity, selected: bool) -> Self {
        let local_size = model.local_size.unwrap_or(0);
        let remote_size = model.remote_size.unwrap_or(0);
        let status = ViewStatus::derive(model.state, local_size, remote_size);

        let queueable = status.is_one_of(&[
            ViewStatus::Default,
            ViewStatus::Stopped,
            ViewStatus::Deleted,
        ]) && remote_size > 0;
        let stoppable = status.is_one_of(&[ViewStatus::Queued, ViewStatus::Downloading]);
        let extractable = status.is_one_of(&LOCAL_CONTENT) && local_size > 0;
        let locally_deletable = status.is_one_of(&LOCAL_CONTENT) && local_size > 0;
        let remotely_deletable = (status.is_one_of(&LOCAL_CONTENT)
            || status == ViewStatus::Deleted)
            && remote_size > 0;

        Self {
            name: model.name.clone(),
            is_dir: model.is_dir,
            local_size,
            remote_size,
            percent_downloaded: download_percentage(local_size, remote_size),
            status,
            download_rate: model.download_rate,
            eta: model.eta,
            full_path: model.full_path.clone(),
            is_archive: model.is_archive_candidate,
            selected,
            queueable,
            stoppable,
            extractable,
            locally_deletable,
            remotely_deletable,
            local_created: model.local_created,
            local_modified: model.local_modified,
            remote_created: model.remote_created,
            remote_modified: model.remote_modified,
        }
    }

    pub fn with_selected(&self, selected: bool) -> Self {
        Self {
            selected,
            ..self.clone()
        }
    }

    /// Extraction needs both the capability and the archive marker
    pub fn can_extract(&self) -> bool {
        self.extractable && self.is_archive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(state: ModelState, local: u64, remote: u64) -> ViewEntity {
        ViewEntity::from_model(
            &ModelEntity::new("f").with_state(state).with_sizes(local, remote),
            false,
        )
    }

    #[test]
    fn test_default_state_with_both_sizes_is_stopped() {
        assert_eq!(view(ModelState::Default, 5, 10).status, ViewStatus::Stopped);
        assert_eq!(view(ModelState::Default, 0, 10).status, ViewStatus::Default);
        assert_eq!(view(ModelState::Default, 5, 0).status, ViewStatus::Default);
        assert_eq!(view(ModelState::Deleted, 5, 10).status, ViewStatus::Deleted);
    }

    #[test]
    fn test_percent_with_empty_remote_is_full() {
        assert_eq!(view(ModelState::Default, 0, 0).percent_downloaded, 100);
        assert_eq!(view(ModelState::Default, 77, 0).percent_downloaded, 100);
        assert_eq!(view(ModelState::Downloading, 1, 3).percent_downloaded, 33);
    }

    #[test]
    fn test_missing_sizes_count_as_zero() {
        let v = ViewEntity::from_model(&ModelEntity::new("x"), false);
        assert_eq!(v.local_size, 0);
        assert_eq!(v.percent_downloaded, 100);
        assert!(!v.queueable);
    }

    #[test]
    fn test_capability_flags() {
        let v = view(ModelState::Default, 0, 100);
        assert!(v.queueable && v.remotely_deletable);
        assert!(!v.stoppable && !v.extractable && !v.locally_deletable);

        let v = view(ModelState::Downloading, 50, 100);
        assert!(v.stoppable);
        assert!(!v.queueable && !v.extractable && !v.locally_deletable && !v.remotely_deletable);

        let v = view(ModelState::Downloaded, 100, 100);
        assert!(v.extractable && v.locally_deletable && v.remotely_deletable);
        assert!(!v.queueable && !v.stoppable);

        let v = view(ModelState::Deleted, 0, 100);
        assert!(v.queueable && v.remotely_deletable);
        assert!(!v.locally_deletable);

        let v = view(ModelState::Extracting, 100, 100);
        assert!(!v.queueable && !v.stoppable && !v.extractable);
        assert!(!v.locally_deletable && !v.remotely_deletable);
    }

    #[test]
    fn test_can_extract_requires_archive() {
        let plain = view(ModelState::Downloaded, 10, 10);
        assert!(plain.extractable && !plain.can_extract());

        let archive = ViewEntity::from_model(
            &ModelEntity::new("a.rar")
                .with_state(ModelState::Downloaded)
                .with_sizes(10, 10)
                .with_archive(true),
            false,
        );
        assert!(archive.can_extract());
    }

    #[test]
    fn test_status_parse_and_priority() {
        assert_eq!(ViewStatus::parse("Stopped"), Some(ViewStatus::Stopped));
        assert_eq!(ViewStatus::parse("nope"), None);
        assert!(ViewStatus::Extracting.priority() < ViewStatus::Downloading.priority());
        assert_eq!(ViewStatus::Default.priority(), ViewStatus::Deleted.priority());
    }
}
