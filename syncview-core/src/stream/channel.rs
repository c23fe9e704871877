use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use super::transport::{StreamConnection, StreamTransport, TransportMessage};
use super::SharedConsumer;
use crate::clock::{SharedClock, deadline};
use crate::{Result, SyncError};

/// How long to wait between reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryBackoff {
    /// Always wait `retry_delay`
    #[default]
    Fixed,
    /// Double `retry_delay` after each consecutive failure, up to `max_delay`
    Exponential { max_delay: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Path of the event stream, relative to the server URL
    pub stream_path: String,
    /// A stream silent for longer than this is considered dead
    pub idle_timeout: Duration,
    /// How often the idle check runs
    pub check_interval: Duration,
    pub retry_delay: Duration,
    pub backoff: RetryBackoff,
    /// Keep-alive event; refreshes activity but is never routed
    pub heartbeat_event: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            stream_path: "/server/stream".to_string(),
            idle_timeout: Duration::from_secs(30),
            check_interval: Duration::from_secs(5),
            retry_delay: Duration::from_secs(3),
            backoff: RetryBackoff::Fixed,
            heartbeat_event: "ping".to_string(),
        }
    }
}

/// Externally visible state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Stopped,
    /// A connection is being established
    Connecting,
    Connected,
    /// Waiting to reopen after a failure or idle timeout
    Reconnecting { retry_in: Duration },
}

enum ChannelState {
    Stopped,
    Open {
        connection: StreamConnection,
        announced: bool,
    },
    Waiting {
        reopen_at: Instant,
    },
}

/// Multiplexes one server event stream to registered consumers.
///
/// The channel is driven by [`pump`](Self::pump) or
/// [`pump_for`](Self::pump_for) from a single thread; all consumer callbacks
/// run on that thread. It keeps the stream alive on its own: a failed or
/// silent connection is closed, every consumer is told, and a new
/// connection is opened after the retry delay.
pub struct EventChannel<T> {
    transport: T,
    config: ChannelConfig,
    clock: SharedClock,
    consumers: Vec<SharedConsumer>,
    routes: HashMap<String, usize>,
    state: ChannelState,
    started: bool,
    last_activity: Instant,
    next_check: Instant,
    failures: u32,
    connect_attempts: u64,
}

impl<T: StreamTransport> EventChannel<T> {
    pub fn new(transport: T, config: ChannelConfig, clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            transport,
            config,
            clock,
            consumers: Vec::new(),
            routes: HashMap::new(),
            state: ChannelState::Stopped,
            started: false,
            last_activity: now,
            next_check: now,
            failures: 0,
            connect_attempts: 0,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register a consumer for the event names it declares. A later
    /// registration for the same name takes over that name.
    pub fn register_consumer(&mut self, consumer: SharedConsumer) -> Result<()> {
        if self.started {
            return Err(SyncError::ChannelStarted);
        }

        let index = self.consumers.len();
        for name in consumer.borrow().event_names() {
            if name == self.config.heartbeat_event {
                warn!(event = %name, "heartbeat events are never routed");
                continue;
            }
            if let Some(previous) = self.routes.insert(name.clone(), index) {
                warn!(event = %name, previous, consumer = index, "event route replaced");
            }
        }
        self.consumers.push(consumer);
        Ok(())
    }

    /// Open the stream. Calling it on a running channel closes the current
    /// connection and opens a fresh one.
    pub fn start(&mut self) {
        if self.started {
            info!("restarting event channel");
            self.close();
        }
        self.started = true;
        self.open();
    }

    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.close();
        self.started = false;
        info!("event channel stopped");
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn status(&self) -> ChannelStatus {
        match &self.state {
            ChannelState::Stopped => ChannelStatus::Stopped,
            ChannelState::Open {
                announced: true, ..
            } => ChannelStatus::Connected,
            ChannelState::Open { .. } => ChannelStatus::Connecting,
            ChannelState::Waiting { reopen_at } => ChannelStatus::Reconnecting {
                retry_in: reopen_at.saturating_duration_since(self.clock.now()),
            },
        }
    }

    /// Number of connections opened so far, including failed attempts
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    /// Handle every message already received, then run the idle and
    /// reconnect timers. Never blocks. Returns the number of messages
    /// handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(msg) = self.next_message() {
            handled += 1;
            self.handle(msg);
        }
        self.check_timers();
        handled
    }

    /// Like [`pump`](Self::pump) but first waits up to `timeout` for
    /// something to happen.
    pub fn pump_for(&mut self, timeout: Duration) -> usize {
        let wait = timeout.min(self.until_next_deadline(timeout));
        let first = match &self.state {
            ChannelState::Open { connection, .. } => connection.recv_timeout(wait),
            _ => {
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
                None
            }
        };

        let mut handled = 0;
        if let Some(msg) = first {
            handled += 1;
            self.handle(msg);
        }
        handled + self.pump()
    }

    fn until_next_deadline(&self, fallback: Duration) -> Duration {
        let deadline = match &self.state {
            ChannelState::Stopped => return fallback,
            ChannelState::Open { .. } => self.next_check,
            ChannelState::Waiting { reopen_at } => *reopen_at,
        };
        deadline.saturating_duration_since(self.clock.now())
    }

    fn next_message(&self) -> Option<TransportMessage> {
        match &self.state {
            ChannelState::Open { connection, .. } => connection.try_recv(),
            _ => None,
        }
    }

    fn handle(&mut self, msg: TransportMessage) {
        match msg {
            TransportMessage::Opened => {
                self.touch();
                self.failures = 0;
                self.announce_connected();
            }
            TransportMessage::Event { name, data } => {
                self.touch();
                self.announce_connected();
                if name == self.config.heartbeat_event {
                    trace!("heartbeat");
                    return;
                }
                self.dispatch(&name, &data);
            }
            TransportMessage::Error(reason) => {
                error!(reason = %reason, "event stream failed");
                self.fail();
            }
        }
    }

    fn dispatch(&self, name: &str, data: &str) {
        match self.routes.get(name).and_then(|&i| self.consumers.get(i)) {
            Some(consumer) => consumer.borrow_mut().on_event(name, data),
            None => debug!(event = name, "no consumer for event"),
        }
    }

    fn touch(&mut self) {
        self.last_activity = self.clock.now();
    }

    fn announce_connected(&mut self) {
        let ChannelState::Open { announced, .. } = &mut self.state else {
            return;
        };
        if *announced {
            return;
        }
        *announced = true;

        info!(attempt = self.connect_attempts, "connected to event stream");
        for consumer in &self.consumers {
            consumer.borrow_mut().on_connected();
        }
    }

    fn notify_disconnected(&self) {
        for consumer in &self.consumers {
            consumer.borrow_mut().on_disconnected();
        }
    }

    /// Drop the current connection. Consumers that were told about it are
    /// told it ended.
    fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, ChannelState::Stopped);
        if let ChannelState::Open {
            connection,
            announced,
        } = previous
        {
            drop(connection);
            if announced {
                self.notify_disconnected();
            }
        }
    }

    /// The connection failed or went silent
    fn fail(&mut self) {
        self.state = ChannelState::Stopped;
        self.notify_disconnected();
        self.schedule_reopen();
    }

    fn schedule_reopen(&mut self) {
        self.failures = self.failures.saturating_add(1);
        let delay = self.retry_delay();
        let now = self.clock.now();
        info!(
            delay_ms = delay.as_millis() as u64,
            failures = self.failures,
            "reconnecting after delay"
        );
        self.last_activity = now;
        self.state = ChannelState::Waiting {
            reopen_at: deadline(now, delay),
        };
    }

    fn retry_delay(&self) -> Duration {
        match self.config.backoff {
            RetryBackoff::Fixed => self.config.retry_delay,
            RetryBackoff::Exponential { max_delay } => {
                let doublings = self.failures.saturating_sub(1).min(16);
                self.config
                    .retry_delay
                    .saturating_mul(1u32 << doublings)
                    .min(max_delay)
            }
        }
    }

    fn open(&mut self) {
        self.connect_attempts += 1;
        let now = self.clock.now();
        self.last_activity = now;
        self.next_check = deadline(now, self.config.check_interval);

        debug!(attempt = self.connect_attempts, "opening event stream");
        match self.transport.open() {
            Ok(connection) => {
                self.state = ChannelState::Open {
                    connection,
                    announced: false,
                };
            }
            Err(e) => {
                error!(error = %e, "failed to open event stream");
                self.fail();
            }
        }
    }

    fn check_timers(&mut self) {
        let now = self.clock.now();
        let reopen_due = matches!(self.state, ChannelState::Waiting { reopen_at } if now >= reopen_at);
        if reopen_due {
            self.open();
            return;
        }

        let check_due = matches!(self.state, ChannelState::Open { .. }) && now >= self.next_check;
        if check_due {
            self.next_check = deadline(now, self.config.check_interval);
            let idle = now.saturating_duration_since(self.last_activity);
            if idle > self.config.idle_timeout {
                warn!(idle_secs = idle.as_secs(), "event stream idle, reconnecting");
                self.fail();
            }
        }
    }
}

impl<T> Drop for EventChannel<T> {
    fn drop(&mut self) {
        // Stop the reader thread even if nobody called stop()
        self.state = ChannelState::Stopped;
    }
}
