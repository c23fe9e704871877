use tracing::{debug, warn};

use super::entity::ViewStatus;
use super::filter::{AllOf, NameFilter, StatusFilter, ViewFilter};
use super::sort::SortMethod;
use crate::prefs::{PrefsFile, StoredPrefs};
use crate::publish::{Publisher, Subscription};

/// Display options for the view list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewOptions {
    pub show_details: bool,
    pub sort_method: SortMethod,
    pub status_filter: Option<ViewStatus>,
    pub name_filter: Option<String>,
    /// Keep the filter bar visible
    pub pin_filter: bool,
}

impl ViewOptions {
    pub fn from_stored(stored: StoredPrefs) -> Self {
        Self {
            show_details: stored.show_details,
            sort_method: stored.sort_method,
            pin_filter: stored.pin_filter,
            ..Default::default()
        }
    }

    pub fn stored(&self) -> StoredPrefs {
        StoredPrefs {
            show_details: self.show_details,
            sort_method: self.sort_method,
            pin_filter: self.pin_filter,
        }
    }

    /// The predicate these options describe, or `None` when nothing is
    /// filtered
    pub fn filter(&self) -> Option<Box<dyn ViewFilter>> {
        let mut all = AllOf::new();
        if let Some(status) = self.status_filter {
            all = all.with(StatusFilter(status));
        }
        if let Some(name) = &self.name_filter {
            all = all.with(NameFilter::new(name));
        }
        if all.is_empty() {
            None
        } else {
            Some(Box::new(all))
        }
    }
}

/// Owns the current options and broadcasts changes.
///
/// Setters publish only when the value actually changes. Changes to the
/// persisted subset are written to the preferences file when one is
/// attached; write failures are logged and otherwise ignored.
pub struct ViewOptionsService {
    options: Publisher<ViewOptions>,
    prefs: Option<PrefsFile>,
}

impl ViewOptionsService {
    pub fn new(options: ViewOptions) -> Self {
        Self {
            options: Publisher::new(options),
            prefs: None,
        }
    }

    /// Start from the saved preferences and keep them up to date
    pub fn with_prefs(prefs: PrefsFile) -> Self {
        Self {
            options: Publisher::new(ViewOptions::from_stored(prefs.load())),
            prefs: Some(prefs),
        }
    }

    pub fn current(&self) -> &ViewOptions {
        self.options.current()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ViewOptions) + 'static,
    {
        self.options.subscribe(callback)
    }

    pub fn set_show_details(&mut self, show: bool) -> bool {
        self.update(|o| o.show_details = show)
    }

    pub fn set_sort_method(&mut self, method: SortMethod) -> bool {
        self.update(|o| o.sort_method = method)
    }

    pub fn set_status_filter(&mut self, status: Option<ViewStatus>) -> bool {
        self.update(|o| o.status_filter = status)
    }

    /// An empty name clears the filter
    pub fn set_name_filter(&mut self, name: Option<&str>) -> bool {
        let name = name.filter(|n| !n.is_empty()).map(str::to_string);
        self.update(|o| o.name_filter = name)
    }

    pub fn set_pin_filter(&mut self, pinned: bool) -> bool {
        self.update(|o| o.pin_filter = pinned)
    }

    fn update(&mut self, change: impl FnOnce(&mut ViewOptions)) -> bool {
        let current = self.options.current();
        let mut next = current.clone();
        change(&mut next);
        if next == *current {
            return false;
        }

        let persist = next.stored() != current.stored();
        debug!(options = ?next, "view options changed");
        self.options.publish(next);

        if persist && let Some(prefs) = &self.prefs {
            let stored = self.options.current().stored();
            if let Err(e) = prefs.save(&stored) {
                warn!(path = %prefs.path().display(), error = %e, "failed to save preferences");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewEntity;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[test]
    fn test_setters_publish_only_on_change() {
        let mut service = ViewOptionsService::new(ViewOptions::default());
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let _sub = service.subscribe(move |_| *sink.borrow_mut() += 1);

        assert!(service.set_sort_method(SortMethod::NameAsc));
        assert!(!service.set_sort_method(SortMethod::NameAsc));
        assert!(!service.set_name_filter(Some("")));
        assert!(service.set_name_filter(Some("abc")));
        assert!(service.set_name_filter(None));

        assert_eq!(*seen.borrow(), 4);
    }

    #[test]
    fn test_filter_from_options() {
        let mut options = ViewOptions::default();
        assert!(options.filter().is_none());

        options.status_filter = Some(ViewStatus::Queued);
        options.name_filter = Some("ab".into());
        let filter = options.filter().unwrap();

        let hit = ViewEntity {
            name: "xABy".into(),
            status: ViewStatus::Queued,
            ..Default::default()
        };
        let miss = ViewEntity {
            status: ViewStatus::Stopped,
            ..hit.clone()
        };
        assert!(filter.meets_criteria(&hit));
        assert!(!filter.meets_criteria(&miss));
    }

    #[test]
    fn test_persisted_fields_are_saved() {
        let temp = TempDir::new().unwrap();
        let prefs = PrefsFile::new(temp.path().join("view.prefs"));

        let mut service = ViewOptionsService::with_prefs(prefs.clone());
        assert_eq!(service.current(), &ViewOptions::default());
        service.set_sort_method(SortMethod::NameDesc);
        service.set_pin_filter(true);
        service.set_status_filter(Some(ViewStatus::Deleted));

        let reloaded = ViewOptionsService::with_prefs(prefs);
        assert_eq!(reloaded.current().sort_method, SortMethod::NameDesc);
        assert!(reloaded.current().pin_filter);
        // filters are per session
        assert_eq!(reloaded.current().status_filter, None);
    }
}
