//! Server event stream: one physical connection multiplexed to many
//! consumers, kept alive across failures and silent periods.

mod channel;
mod connection;
mod sse;
mod transport;

use std::cell::RefCell;
use std::rc::Rc;

pub use channel::{ChannelConfig, ChannelStatus, EventChannel, RetryBackoff};
pub use connection::ConnectionState;
pub use sse::{DEFAULT_EVENT_NAME, SseDecoder, SseFrame};
pub use transport::{
    CancellationToken, HttpStreamTransport, StreamConnection, StreamTransport, TransportMessage,
};

/// Receives named stream events and connection lifecycle notices.
///
/// A consumer is told it is connected before it sees any event of a
/// connection, and told it is disconnected whenever that connection ends.
pub trait StreamConsumer {
    /// Event names this consumer wants routed to it
    fn event_names(&self) -> Vec<String>;

    fn on_connected(&mut self);

    fn on_disconnected(&mut self);

    fn on_event(&mut self, name: &str, data: &str);
}

pub type SharedConsumer = Rc<RefCell<dyn StreamConsumer>>;
