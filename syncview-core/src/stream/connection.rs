use tracing::info;

use super::StreamConsumer;
use crate::publish::{Publisher, Subscription};

/// Tracks whether the event channel currently has a live stream.
///
/// Registers for no events; it only follows the lifecycle notices and
/// publishes when the state actually flips.
pub struct ConnectionState {
    connected: Publisher<bool>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            connected: Publisher::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.current()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&bool) + 'static,
    {
        self.connected.subscribe(callback)
    }

    fn set(&mut self, connected: bool) {
        if self.is_connected() != connected {
            info!(connected, "connection state changed");
            self.connected.publish(connected);
        }
    }
}

impl StreamConsumer for ConnectionState {
    fn event_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn on_connected(&mut self) {
        self.set(true);
    }

    fn on_disconnected(&mut self) {
        self.set(false);
    }

    fn on_event(&mut self, _name: &str, _data: &str) {}
}
