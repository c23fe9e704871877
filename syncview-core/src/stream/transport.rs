use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::debug;

use super::sse::SseDecoder;
use crate::Result;

/// What a physical stream connection reports to the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    /// The server accepted the stream
    Opened,
    /// A named event arrived
    Event { name: String, data: String },
    /// The connection failed or ended
    Error(String),
}

/// Cancellation token for stopping a reader thread
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of one physical connection.
///
/// Dropping it cancels the producer; anything the producer still sends is
/// discarded.
#[derive(Debug)]
pub struct StreamConnection {
    receiver: Receiver<TransportMessage>,
    cancel: CancellationToken,
}

impl StreamConnection {
    pub fn new(receiver: Receiver<TransportMessage>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Create a connection together with the sender its producer writes to
    pub fn pair() -> (Sender<TransportMessage>, CancellationToken, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancellationToken::new();
        (tx, cancel.clone(), Self::new(rx, cancel))
    }

    pub fn try_recv(&self) -> Option<TransportMessage> {
        match self.receiver.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(TransportMessage::Error("stream producer went away".to_string()))
            }
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<TransportMessage> {
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                Some(TransportMessage::Error("stream producer went away".to_string()))
            }
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Something that can open a physical event stream.
///
/// `open` must not block on the network: it hands back a connection whose
/// first message reports whether the stream actually opened.
pub trait StreamTransport {
    fn open(&mut self) -> Result<StreamConnection>;
}

/// Server-sent events over HTTP, read on a background thread
#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    url: String,
    agent: ureq::Agent,
}

impl HttpStreamTransport {
    /// `read_timeout` bounds how long the reader thread blocks on a silent
    /// socket after the channel has given up on it.
    pub fn new(url: impl Into<String>, connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .build();
        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl StreamTransport for HttpStreamTransport {
    fn open(&mut self) -> Result<StreamConnection> {
        let (tx, cancel, connection) = StreamConnection::pair();
        let agent = self.agent.clone();
        let url = self.url.clone();

        std::thread::Builder::new()
            .name("syncview-stream".to_string())
            .spawn(move || read_stream(agent, url, tx, cancel))?;

        Ok(connection)
    }
}

fn read_stream(
    agent: ureq::Agent,
    url: String,
    tx: Sender<TransportMessage>,
    cancel: CancellationToken,
) {
    let response = match agent
        .get(&url)
        .set("Accept", "text/event-stream")
        .set("Cache-Control", "no-cache")
        .call()
    {
        Ok(r) => r,
        Err(e) => {
            let _ = tx.send(TransportMessage::Error(e.to_string()));
            return;
        }
    };

    if tx.send(TransportMessage::Opened).is_err() {
        return;
    }

    let mut decoder = SseDecoder::new();
    let reader = BufReader::new(response.into_reader());
    for line in reader.lines() {
        if cancel.is_cancelled() {
            debug!(url = %url, "stream reader cancelled");
            return;
        }
        match line {
            Ok(line) => {
                if let Some(frame) = decoder.push_line(&line) {
                    let msg = TransportMessage::Event {
                        name: frame.event,
                        data: frame.data,
                    };
                    if tx.send(msg).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(TransportMessage::Error(e.to_string()));
                return;
            }
        }
    }

    let _ = tx.send(TransportMessage::Error("stream closed by server".to_string()));
}
