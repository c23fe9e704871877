//! Single-threaded publish/subscribe with replay of the latest value.

use std::cell::RefCell;
use std::rc::Rc;

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Holds the latest published value and fans it out to subscribers.
///
/// New subscribers receive the current value immediately. Callbacks may
/// subscribe or unsubscribe other callbacks while being notified; such
/// changes apply from the next publish.
pub struct Publisher<T> {
    current: T,
    subscribers: Rc<RefCell<Subscribers<T>>>,
}

impl<T: 'static> Publisher<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: initial,
            subscribers: Rc::new(RefCell::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().entries.len()
    }

    pub fn publish(&mut self, value: T) {
        self.current = value;
        let callbacks: Vec<Callback<T>> = self
            .subscribers
            .borrow()
            .entries
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in callbacks {
            (cb.borrow_mut())(&self.current);
        }
    }

    pub fn subscribe<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        callback(&self.current);

        let id = {
            let mut subs = self.subscribers.borrow_mut();
            let id = subs.next_id;
            subs.next_id += 1;
            subs.entries.push((id, Rc::new(RefCell::new(callback))));
            id
        };

        let weak = Rc::downgrade(&self.subscribers);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(subs) = weak.upgrade() {
                    subs.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }
}

/// Handle returned by [`Publisher::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
