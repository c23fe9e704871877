use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use super::entity::ViewEntity;
use super::filter::ViewFilter;
use super::sort::{Comparator, SortMethod};
use crate::model::ModelSnapshot;
use crate::publish::{Publisher, Subscription};

/// Immutable ordered list of view entities as handed to subscribers,
/// with a name index matching the order
#[derive(Debug, Clone, Default)]
pub struct ViewList {
    items: Arc<Vec<Arc<ViewEntity>>>,
    index: Arc<HashMap<String, usize>>,
}

impl ViewList {
    fn new(items: Vec<Arc<ViewEntity>>) -> Self {
        let index = name_index(&items);
        Self::with_index(items, Arc::new(index))
    }

    fn with_index(items: Vec<Arc<ViewEntity>>, index: Arc<HashMap<String, usize>>) -> Self {
        debug_assert_eq!(items.len(), index.len());
        Self {
            items: Arc::new(items),
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ViewEntity> {
        self.items.get(index).map(|e| e.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewEntity> {
        self.items.iter().map(|e| e.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|e| e.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn find(&self, name: &str) -> Option<&ViewEntity> {
        self.position(name).and_then(|index| self.get(index))
    }

    pub fn ptr_eq(&self, other: &ViewList) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

fn name_index(items: &[Arc<ViewEntity>]) -> HashMap<String, usize> {
    items
        .iter()
        .enumerate()
        .map(|(index, entity)| (entity.name.clone(), index))
        .collect()
}

/// Keeps the display list in step with the model.
///
/// Each new model snapshot is diffed against the previous one and only the
/// added, removed and changed entities are touched. The name index always
/// matches the list. After every change both the full list and the
/// filtered list are published.
pub struct ViewProjector {
    files: Vec<Arc<ViewEntity>>,
    indices: Arc<HashMap<String, usize>>,
    prev_model: ModelSnapshot,
    comparator: Option<Comparator>,
    filter: Option<Box<dyn ViewFilter>>,
    files_out: Publisher<ViewList>,
    filtered_out: Publisher<ViewList>,
}

impl Default for ViewProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewProjector {
    /// A projector with no comparator keeps entities in arrival order
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            indices: Arc::default(),
            prev_model: ModelSnapshot::default(),
            comparator: None,
            filter: None,
            files_out: Publisher::new(ViewList::default()),
            filtered_out: Publisher::new(ViewList::default()),
        }
    }

    pub fn files(&self) -> &ViewList {
        self.files_out.current()
    }

    pub fn filtered(&self) -> &ViewList {
        self.filtered_out.current()
    }

    /// The model snapshot the list was last built from
    pub fn model(&self) -> &ModelSnapshot {
        &self.prev_model
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    pub fn selected(&self) -> Option<&ViewEntity> {
        self.files.iter().find(|f| f.selected).map(|f| f.as_ref())
    }

    pub fn subscribe_files<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ViewList) + 'static,
    {
        self.files_out.subscribe(callback)
    }

    pub fn subscribe_filtered<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ViewList) + 'static,
    {
        self.filtered_out.subscribe(callback)
    }

    /// Patch the list to match a new model snapshot
    pub fn on_model(&mut self, model: &ModelSnapshot) {
        let start = Instant::now();

        let removed: HashSet<String> = self
            .prev_model
            .names()
            .filter(|name| !model.contains(name))
            .map(str::to_string)
            .collect();

        let mut added = Vec::new();
        let mut updated = Vec::new();
        for (name, entity) in model.iter() {
            match self.prev_model.get(name) {
                None => added.push(entity),
                Some(prev) if !Arc::ptr_eq(prev, entity) && prev != entity => updated.push(entity),
                Some(_) => {}
            }
        }
        // Map iteration order is arbitrary; keep appends deterministic
        added.sort_by(|a, b| a.name.cmp(&b.name));

        let mut resort = false;
        let mut reindex = false;

        // Updates first, while the indices are still valid
        for entity in &updated {
            let Some(&index) = self.indices.get(&entity.name) else {
                continue;
            };
            let old = &self.files[index];
            let new = Arc::new(ViewEntity::from_model(entity, old.selected));
            if let Some(cmp) = &self.comparator
                && cmp(old, &new) != Ordering::Equal
            {
                resort = true;
            }
            self.files[index] = new;
        }

        for entity in &added {
            resort = true;
            self.files.push(Arc::new(ViewEntity::from_model(entity, false)));
            Arc::make_mut(&mut self.indices).insert(entity.name.clone(), self.files.len() - 1);
        }

        if !removed.is_empty() {
            reindex = true;
            self.files.retain(|f| !removed.contains(&f.name));
        }

        if resort && let Some(cmp) = &self.comparator {
            debug!("re-sorting view list");
            self.files.sort_by(|a, b| cmp(a, b));
            reindex = true;
        }

        if reindex {
            self.rebuild_indices();
        }

        debug!(
            added = added.len(),
            updated = updated.len(),
            removed = removed.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "view list patched"
        );

        self.prev_model = model.clone();
        self.publish();
    }

    /// Give `name` the single-selection highlight, taking it from whichever
    /// entity had it
    pub fn set_selected(&mut self, name: &str) {
        if let Some(index) = self.files.iter().position(|f| f.selected) {
            if self.files[index].name == name {
                return;
            }
            self.files[index] = Arc::new(self.files[index].with_selected(false));
        }

        match self.indices.get(name) {
            Some(&index) => {
                self.files[index] = Arc::new(self.files[index].with_selected(true));
            }
            None => error!(name, "cannot find entity to select"),
        }
        self.publish();
    }

    pub fn unset_selected(&mut self) {
        if let Some(index) = self.files.iter().position(|f| f.selected) {
            self.files[index] = Arc::new(self.files[index].with_selected(false));
            self.publish();
        }
    }

    /// Replace the comparator and re-sort everything
    pub fn set_comparator(&mut self, comparator: Comparator) {
        self.files.sort_by(|a, b| comparator(a, b));
        self.comparator = Some(comparator);
        self.rebuild_indices();
        self.publish();
    }

    pub fn set_sort_method(&mut self, method: SortMethod) {
        debug!(method = method.as_str(), "comparator changed");
        self.set_comparator(method.comparator());
    }

    pub fn set_filter(&mut self, filter: impl ViewFilter + 'static) {
        self.set_filter_boxed(Some(Box::new(filter)));
    }

    /// Replace the filter; `None` lets everything through
    pub fn set_filter_boxed(&mut self, filter: Option<Box<dyn ViewFilter>>) {
        self.filter = filter;
        self.publish();
    }

    pub fn clear_filter(&mut self) {
        self.set_filter_boxed(None);
    }

    fn rebuild_indices(&mut self) {
        self.indices = Arc::new(name_index(&self.files));
    }

    fn publish(&mut self) {
        let files = ViewList::with_index(self.files.clone(), Arc::clone(&self.indices));
        let filtered = match &self.filter {
            Some(filter) => ViewList::new(
                self.files
                    .iter()
                    .filter(|f| filter.meets_criteria(f))
                    .cloned()
                    .collect(),
            ),
            None => files.clone(),
        };
        self.files_out.publish(files);
        self.filtered_out.publish(filtered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelEntity, ModelState};
    use crate::view::{NameFilter, StatusFilter, ViewStatus};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn snapshot(entities: Vec<ModelEntity>) -> ModelSnapshot {
        ModelSnapshot::from_entities(entities)
    }

    fn names(list: &ViewList) -> Vec<&str> {
        list.names().collect()
    }

    fn assert_index_consistent(projector: &ViewProjector) {
        let list = projector.files();
        assert_eq!(projector.indices.len(), list.len());
        for (i, name) in list.names().enumerate() {
            assert_eq!(projector.index_of(name), Some(i));
            assert_eq!(list.position(name), Some(i));
        }
    }

    fn sorted_projector() -> ViewProjector {
        let mut projector = ViewProjector::new();
        projector.set_sort_method(SortMethod::NameAsc);
        projector
    }

    #[test]
    fn test_published_lists_carry_their_own_index() {
        let mut projector = sorted_projector();
        projector.on_model(&snapshot(vec![
            ModelEntity::new("a.mkv"),
            ModelEntity::new("b.txt"),
            ModelEntity::new("c.mkv"),
        ]));
        projector.set_filter(NameFilter::new("mkv"));

        let before = projector.files().clone();
        let filtered = projector.filtered();
        assert_eq!(filtered.position("c.mkv"), Some(1));
        assert_eq!(filtered.position("b.txt"), None);
        assert_eq!(filtered.find("a.mkv").unwrap().name, "a.mkv");

        projector.on_model(&snapshot(vec![ModelEntity::new("b.txt"), ModelEntity::new("c.mkv")]));
        assert_eq!(projector.files().position("c.mkv"), Some(1));
        assert_eq!(projector.files().position("a.mkv"), None);
        // earlier lists keep the index they were published with
        assert_eq!(before.position("c.mkv"), Some(2));
        assert_eq!(before.position("a.mkv"), Some(0));
    }

    #[test]
    fn test_init_then_update_to_downloaded() {
        let mut projector = sorted_projector();
        projector.on_model(&snapshot(vec![
            ModelEntity::new("A").with_sizes(0, 100),
        ]));
        assert_eq!(projector.files().get(0).unwrap().status, ViewStatus::Default);

        projector.on_model(&snapshot(vec![
            ModelEntity::new("A")
                .with_state(ModelState::Downloaded)
                .with_sizes(100, 100),
        ]));

        let list = projector.files();
        assert_eq!(list.len(), 1);
        let a = list.get(0).unwrap();
        assert_eq!(a.status, ViewStatus::Downloaded);
        assert_eq!(a.percent_downloaded, 100);
        assert!(a.extractable);
        assert!(a.locally_deletable);
    }

    #[test]
    fn test_added_removed_and_resorted() {
        let mut projector = sorted_projector();
        projector.on_model(&snapshot(vec![ModelEntity::new("c"), ModelEntity::new("a")]));
        assert_eq!(names(projector.files()), vec!["a", "c"]);

        projector.on_model(&snapshot(vec![
            ModelEntity::new("c"),
            ModelEntity::new("b"),
            ModelEntity::new("d"),
        ]));
        assert_eq!(names(projector.files()), vec!["b", "c", "d"]);
        assert_index_consistent(&projector);
    }

    #[test]
    fn test_update_changing_order_resorts() {
        let mut projector = ViewProjector::new();
        projector.set_sort_method(SortMethod::Status);
        projector.on_model(&snapshot(vec![
            ModelEntity::new("a").with_sizes(0, 10),
            ModelEntity::new("b").with_sizes(0, 10),
        ]));
        assert_eq!(names(projector.files()), vec!["a", "b"]);

        projector.on_model(&snapshot(vec![
            ModelEntity::new("a").with_sizes(0, 10),
            ModelEntity::new("b")
                .with_state(ModelState::Downloading)
                .with_sizes(1, 10),
        ]));
        assert_eq!(names(projector.files()), vec!["b", "a"]);
        assert_index_consistent(&projector);
    }

    #[test]
    fn test_unchanged_entities_are_shared() {
        let mut projector = sorted_projector();
        let a = ModelEntity::new("a").with_sizes(1, 2);
        projector.on_model(&snapshot(vec![a.clone(), ModelEntity::new("b")]));
        let before = projector.files().clone();

        projector.on_model(&snapshot(vec![
            a,
            ModelEntity::new("b").with_state(ModelState::Queued),
        ]));
        let after = projector.files();

        assert!(Arc::ptr_eq(&before.items[0], &after.items[0]));
        assert!(!Arc::ptr_eq(&before.items[1], &after.items[1]));
    }

    #[test]
    fn test_single_selection() {
        let mut projector = sorted_projector();
        projector.on_model(&snapshot(vec![ModelEntity::new("a"), ModelEntity::new("b")]));

        projector.set_selected("a");
        projector.set_selected("b");
        let selected: Vec<_> = projector.files().iter().filter(|f| f.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "b");

        projector.unset_selected();
        assert!(projector.selected().is_none());
    }

    #[test]
    fn test_reselecting_same_entity_does_not_publish() {
        let mut projector = sorted_projector();
        projector.on_model(&snapshot(vec![ModelEntity::new("a")]));
        projector.set_selected("a");

        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let _sub = projector.subscribe_files(move |_| *sink.borrow_mut() += 1);
        projector.set_selected("a");
        projector.unset_selected();
        projector.unset_selected();

        // replay on subscribe, then one publish for the unset
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_selection_survives_update() {
        let mut projector = sorted_projector();
        projector.on_model(&snapshot(vec![ModelEntity::new("a")]));
        projector.set_selected("a");
        projector.on_model(&snapshot(vec![
            ModelEntity::new("a").with_state(ModelState::Queued),
        ]));
        let a = projector.files().get(0).unwrap();
        assert!(a.selected);
        assert_eq!(a.status, ViewStatus::Queued);
    }

    #[test]
    fn test_filter_preserves_order_and_full_list() {
        let mut projector = sorted_projector();
        projector.on_model(&snapshot(vec![
            ModelEntity::new("alpha").with_state(ModelState::Queued),
            ModelEntity::new("beta"),
            ModelEntity::new("gamma").with_state(ModelState::Queued),
        ]));

        projector.set_filter(StatusFilter(ViewStatus::Queued));
        assert_eq!(names(projector.filtered()), vec!["alpha", "gamma"]);
        assert_eq!(projector.files().len(), 3);

        projector.set_filter(NameFilter::new("ET"));
        assert_eq!(names(projector.filtered()), vec!["beta"]);

        projector.clear_filter();
        assert_eq!(projector.filtered().len(), 3);
    }

    #[test]
    fn test_both_lists_published_on_every_change() {
        let mut projector = sorted_projector();
        let files = Rc::new(RefCell::new(0));
        let filtered = Rc::new(RefCell::new(0));
        let f1 = Rc::clone(&files);
        let f2 = Rc::clone(&filtered);
        let _s1 = projector.subscribe_files(move |_| *f1.borrow_mut() += 1);
        let _s2 = projector.subscribe_filtered(move |_| *f2.borrow_mut() += 1);

        projector.on_model(&snapshot(vec![ModelEntity::new("a")]));
        projector.set_filter(|e: &ViewEntity| e.name.starts_with('a'));
        projector.set_sort_method(SortMethod::NameDesc);

        assert_eq!(*files.borrow(), 4);
        assert_eq!(*filtered.borrow(), 4);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Model(Vec<(u8, u8, u8)>),
        Sort(u8),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            4 => proptest::collection::vec((0u8..10, 0u8..4, 0u8..3), 0..10).prop_map(Step::Model),
            1 => (0u8..3).prop_map(Step::Sort),
        ]
    }

    fn entity(id: u8, state: u8, local: u8) -> ModelEntity {
        let state = match state {
            0 => ModelState::Default,
            1 => ModelState::Queued,
            2 => ModelState::Downloading,
            _ => ModelState::Downloaded,
        };
        ModelEntity::new(format!("f{}", id))
            .with_state(state)
            .with_sizes(local as u64, 2)
    }

    proptest! {
        #[test]
        fn test_index_matches_positions(steps in proptest::collection::vec(step(), 1..20)) {
            let mut projector = ViewProjector::new();
            let mut method = SortMethod::Status;
            projector.set_sort_method(method);

            for step in steps {
                match step {
                    Step::Model(entries) => {
                        let model = snapshot(
                            entries.iter().map(|&(id, state, local)| entity(id, state, local)).collect(),
                        );
                        projector.on_model(&model);

                        let mut expected: Vec<String> = model.names().map(str::to_string).collect();
                        let mut actual: Vec<String> = projector.files().names().map(str::to_string).collect();
                        expected.sort();
                        actual.sort();
                        prop_assert_eq!(expected, actual);
                    }
                    Step::Sort(i) => {
                        method = [SortMethod::Status, SortMethod::NameAsc, SortMethod::NameDesc][i as usize];
                        projector.set_sort_method(method);
                    }
                }

                let list = projector.files();
                prop_assert_eq!(projector.indices.len(), list.len());
                for (i, name) in list.names().enumerate() {
                    prop_assert_eq!(projector.index_of(name), Some(i));
                    prop_assert_eq!(list.position(name), Some(i));
                }
                let cmp = method.comparator();
                for pair in list.items.windows(2) {
                    prop_assert_ne!(cmp(&pair[0], &pair[1]), Ordering::Greater);
                }
            }
        }
    }
}
