//! Multi-select state for bulk actions.
//!
//! Independent of the single-selection highlight on the view list and of
//! display order. Every change publishes a fresh [`SelectionSnapshot`], so
//! subscribers can detect changes by identity.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::publish::{Publisher, Subscription};
use crate::view::ViewList;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    names: Arc<HashSet<String>>,
    select_all_matching_filter: bool,
}

impl SelectionSnapshot {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Selected names in lexicographic order
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().cloned().collect();
        names.sort();
        names
    }

    /// The selection stands for every entity matching the current filter,
    /// not only the ones listed
    pub fn is_select_all_matching_filter(&self) -> bool {
        self.select_all_matching_filter
    }

    pub fn ptr_eq(&self, other: &SelectionSnapshot) -> bool {
        Arc::ptr_eq(&self.names, &other.names)
    }
}

/// Tri-state of a "select all" header checkbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    None,
    Some,
    All,
}

pub struct SelectionManager {
    state: Publisher<SelectionSnapshot>,
    operation_in_progress: bool,
    last_clicked_index: Option<usize>,
}

impl Default for SelectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionManager {
    pub fn new() -> Self {
        Self {
            state: Publisher::new(SelectionSnapshot::default()),
            operation_in_progress: false,
            last_clicked_index: None,
        }
    }

    pub fn snapshot(&self) -> &SelectionSnapshot {
        self.state.current()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&SelectionSnapshot) + 'static,
    {
        self.state.subscribe(callback)
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.snapshot().contains(name)
    }

    pub fn selected_count(&self) -> usize {
        self.snapshot().len()
    }

    pub fn has_selection(&self) -> bool {
        !self.snapshot().is_empty()
    }

    pub fn is_select_all_matching_filter(&self) -> bool {
        self.snapshot().is_select_all_matching_filter()
    }

    pub fn select(&mut self, name: &str) {
        if self.is_selected(name) {
            return;
        }
        let mut names = (*self.snapshot().names).clone();
        names.insert(name.to_string());
        let flag = self.is_select_all_matching_filter();
        self.publish(names, flag);
    }

    pub fn deselect(&mut self, name: &str) {
        if !self.is_selected(name) {
            return;
        }
        let mut names = (*self.snapshot().names).clone();
        names.remove(name);
        self.publish(names, false);
    }

    pub fn toggle(&mut self, name: &str) {
        if self.is_selected(name) {
            self.deselect(name);
        } else {
            self.select(name);
        }
    }

    /// Add every given name; publishes once if any was new
    pub fn select_multiple<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let flag = self.is_select_all_matching_filter();
        if let Some(names) = self.union(names) {
            self.publish(names, flag);
        }
    }

    /// Select everything currently listed
    pub fn select_all_visible<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        self.select_multiple(names);
    }

    /// Select everything listed and record that the intent covers every
    /// entity matching the filter
    pub fn select_all_matching_filter<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        match self.union(names) {
            Some(names) => self.publish(names, true),
            None if !self.is_select_all_matching_filter() && self.has_selection() => {
                let names = (*self.snapshot().names).clone();
                self.publish(names, true);
            }
            None => {}
        }
    }

    pub fn clear_selection(&mut self) {
        self.last_clicked_index = None;
        if !self.has_selection() && !self.is_select_all_matching_filter() {
            return;
        }
        self.publish(HashSet::new(), false);
    }

    /// Replace the whole selection
    pub fn set_selection<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        self.publish(names, false);
    }

    /// Replace the selection with a contiguous run of names
    pub fn select_range<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_selection(names);
    }

    /// Drop selected names that no longer exist. Skipped while a bulk
    /// operation is in progress.
    pub fn prune_selection<'a>(&mut self, existing: impl IntoIterator<Item = &'a str>) {
        if self.operation_in_progress {
            debug!("bulk operation in progress, not pruning selection");
            return;
        }
        if !self.has_selection() {
            return;
        }

        let existing: HashSet<&str> = existing.into_iter().collect();
        let current = self.snapshot();
        if current.names().all(|n| existing.contains(n)) {
            return;
        }

        let names: HashSet<String> = current
            .names()
            .filter(|n| existing.contains(n))
            .map(str::to_string)
            .collect();
        let flag = current.is_select_all_matching_filter() && !names.is_empty();
        debug!(
            pruned = current.len() - names.len(),
            "pruned selection"
        );
        self.publish(names, flag);
    }

    pub fn begin_operation(&mut self) {
        self.operation_in_progress = true;
    }

    pub fn end_operation(&mut self) {
        self.operation_in_progress = false;
    }

    pub fn is_operation_in_progress(&self) -> bool {
        self.operation_in_progress
    }

    pub fn last_clicked_index(&self) -> Option<usize> {
        self.last_clicked_index
    }

    /// Checkbox click on `items[index]`. A plain click toggles the entity
    /// and remembers the position; a shift click selects the range from
    /// the remembered position.
    pub fn click(&mut self, items: &ViewList, index: usize, shift: bool) {
        let Some(item) = items.get(index) else {
            return;
        };

        match self.last_clicked_index {
            Some(last) if shift => {
                let (start, end) = (last.min(index), last.max(index));
                let names: Vec<&str> = (start..=end)
                    .filter_map(|i| items.get(i))
                    .map(|e| e.name.as_str())
                    .collect();
                self.select_range(names);
            }
            _ => {
                self.toggle(&item.name);
                self.last_clicked_index = Some(index);
            }
        }
    }

    /// Forget the remembered position when the list shrinks below it
    pub fn on_list_changed(&mut self, items: &ViewList) {
        if self.last_clicked_index.is_some_and(|i| i >= items.len()) {
            self.last_clicked_index = None;
        }
    }

    pub fn header_state(&self, items: &ViewList) -> HeaderState {
        let selection = self.snapshot();
        if items.is_empty() || selection.is_empty() {
            return HeaderState::None;
        }
        let visible_selected = items.names().filter(|n| selection.contains(n)).count();
        if visible_selected == 0 {
            HeaderState::None
        } else if visible_selected == items.len() {
            HeaderState::All
        } else {
            HeaderState::Some
        }
    }

    /// Current names plus `names`, or `None` when nothing is new
    fn union<I, S>(&self, names: I) -> Option<HashSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let current = self.snapshot();
        let new: Vec<String> = names
            .into_iter()
            .filter(|n| !current.contains(n.as_ref()))
            .map(|n| n.as_ref().to_string())
            .collect();
        if new.is_empty() {
            return None;
        }
        let mut all = (*current.names).clone();
        all.extend(new);
        Some(all)
    }

    fn publish(&mut self, names: HashSet<String>, select_all_matching_filter: bool) {
        let select_all_matching_filter = select_all_matching_filter && !names.is_empty();
        self.state.publish(SelectionSnapshot {
            names: Arc::new(names),
            select_all_matching_filter,
        });
    }
}
