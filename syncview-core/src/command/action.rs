use serde::{Deserialize, Serialize};

use crate::selection::SelectionSnapshot;
use crate::view::{ViewEntity, ViewList};
use crate::{Result, SyncError};

/// Action the server can apply to a file, singly or in bulk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Queue,
    Stop,
    Extract,
    DeleteLocal,
    DeleteRemote,
}

impl BulkAction {
    pub const ALL: [BulkAction; 5] = [
        BulkAction::Queue,
        BulkAction::Stop,
        BulkAction::Extract,
        BulkAction::DeleteLocal,
        BulkAction::DeleteRemote,
    ];

    /// Name used in command URLs and request bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Queue => "queue",
            BulkAction::Stop => "stop",
            BulkAction::Extract => "extract",
            BulkAction::DeleteLocal => "delete_local",
            BulkAction::DeleteRemote => "delete_remote",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == raw || a.as_str().replace('_', "-") == raw)
            .ok_or_else(|| SyncError::UnknownAction(raw.to_string()))
    }

    /// Whether the action makes sense for the entity in its current state
    pub fn is_eligible(&self, entity: &ViewEntity) -> bool {
        match self {
            BulkAction::Queue => entity.queueable,
            BulkAction::Stop => entity.stoppable,
            BulkAction::Extract => entity.can_extract(),
            BulkAction::DeleteLocal => entity.locally_deletable,
            BulkAction::DeleteRemote => entity.remotely_deletable,
        }
    }
}

impl std::fmt::Display for BulkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selected entities of `items` the action applies to, in list order
pub fn eligible_names(
    action: BulkAction,
    items: &ViewList,
    selection: &SelectionSnapshot,
) -> Vec<String> {
    items
        .iter()
        .filter(|e| selection.contains(&e.name) && action.is_eligible(e))
        .map(|e| e.name.clone())
        .collect()
}

/// How many selected entities each action applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EligibilityCounts {
    pub queue: usize,
    pub stop: usize,
    pub extract: usize,
    pub delete_local: usize,
    pub delete_remote: usize,
}

impl EligibilityCounts {
    pub fn compute(items: &ViewList, selection: &SelectionSnapshot) -> Self {
        let mut counts = Self::default();
        if selection.is_empty() {
            return counts;
        }
        for entity in items.iter().filter(|e| selection.contains(&e.name)) {
            for action in BulkAction::ALL {
                if action.is_eligible(entity) {
                    *counts.slot(action) += 1;
                }
            }
        }
        counts
    }

    pub fn get(&self, action: BulkAction) -> usize {
        match action {
            BulkAction::Queue => self.queue,
            BulkAction::Stop => self.stop,
            BulkAction::Extract => self.extract,
            BulkAction::DeleteLocal => self.delete_local,
            BulkAction::DeleteRemote => self.delete_remote,
        }
    }

    fn slot(&mut self, action: BulkAction) -> &mut usize {
        match action {
            BulkAction::Queue => &mut self.queue,
            BulkAction::Stop => &mut self.stop,
            BulkAction::Extract => &mut self.extract,
            BulkAction::DeleteLocal => &mut self.delete_local,
            BulkAction::DeleteRemote => &mut self.delete_remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelEntity, ModelSnapshot, ModelState};
    use crate::selection::SelectionManager;
    use crate::view::{SortMethod, ViewProjector};

    fn items() -> ViewList {
        let mut projector = ViewProjector::new();
        projector.set_sort_method(SortMethod::NameAsc);
        projector.on_model(&ModelSnapshot::from_entities([
            ModelEntity::new("a").with_sizes(0, 10),
            ModelEntity::new("b")
                .with_state(ModelState::Downloading)
                .with_sizes(5, 10),
            ModelEntity::new("c")
                .with_state(ModelState::Downloaded)
                .with_sizes(10, 10)
                .with_archive(true),
            ModelEntity::new("d")
                .with_state(ModelState::Downloaded)
                .with_sizes(10, 10),
        ]));
        projector.files().clone()
    }

    #[test]
    fn test_parse() {
        assert_eq!(BulkAction::parse("delete_local").unwrap(), BulkAction::DeleteLocal);
        assert_eq!(BulkAction::parse("delete-remote").unwrap(), BulkAction::DeleteRemote);
        assert!(matches!(
            BulkAction::parse("explode"),
            Err(SyncError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_wire_name() {
        let json = serde_json::to_string(&BulkAction::DeleteRemote).unwrap();
        assert_eq!(json, "\"delete_remote\"");
    }

    #[test]
    fn test_eligible_names_follow_selection_and_flags() {
        let items = items();
        let mut selection = SelectionManager::new();
        selection.select_multiple(["a", "b", "c", "d"]);
        let snapshot = selection.snapshot();

        assert_eq!(eligible_names(BulkAction::Queue, &items, snapshot), vec!["a"]);
        assert_eq!(eligible_names(BulkAction::Stop, &items, snapshot), vec!["b"]);
        assert_eq!(eligible_names(BulkAction::Extract, &items, snapshot), vec!["c"]);
        assert_eq!(
            eligible_names(BulkAction::DeleteLocal, &items, snapshot),
            vec!["c", "d"]
        );

        selection.deselect("c");
        assert!(eligible_names(BulkAction::Extract, &items, selection.snapshot()).is_empty());
    }

    #[test]
    fn test_counts() {
        let items = items();
        let mut selection = SelectionManager::new();
        assert_eq!(
            EligibilityCounts::compute(&items, selection.snapshot()),
            EligibilityCounts::default()
        );

        selection.select_all_visible(items.names());
        let counts = EligibilityCounts::compute(&items, selection.snapshot());
        assert_eq!(counts.queue, 1);
        assert_eq!(counts.stop, 1);
        assert_eq!(counts.extract, 1);
        assert_eq!(counts.get(BulkAction::DeleteLocal), 2);
        assert_eq!(counts.get(BulkAction::DeleteRemote), 3);
    }
}
