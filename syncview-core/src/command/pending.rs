use std::sync::{Arc, Mutex, OnceLock, PoisonError, TryLockError};

use crossbeam_channel::{Receiver, TryRecvError};

type LostFn<T> = Box<dyn Fn() -> T + Send + Sync>;

struct Shared<T> {
    result: OnceLock<Arc<T>>,
    receiver: Mutex<Receiver<T>>,
    lost: LostFn<T>,
}

enum State<T> {
    Ready(Arc<T>),
    Running(Arc<Shared<T>>),
}

/// Outcome of a command running on a worker thread.
///
/// Clones share one outcome: the request is made once and every holder
/// sees the same `Arc` once it settles.
pub struct Pending<T> {
    state: State<T>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        let state = match &self.state {
            State::Ready(value) => State::Ready(Arc::clone(value)),
            State::Running(shared) => State::Running(Arc::clone(shared)),
        };
        Self { state }
    }
}

impl<T: Send + 'static> Pending<T> {
    /// Run `job` on a new thread. `lost` supplies the outcome if the worker
    /// dies without producing one.
    pub fn spawn<F, L>(name: &str, job: F, lost: L) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
        L: Fn() -> T + Send + Sync + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let spawned = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _ = tx.send(job());
            });
        if spawned.is_err() {
            return Self::ready(lost());
        }

        Self {
            state: State::Running(Arc::new(Shared {
                result: OnceLock::new(),
                receiver: Mutex::new(rx),
                lost: Box::new(lost),
            })),
        }
    }

    /// An already settled outcome
    pub fn ready(value: T) -> Self {
        Self {
            state: State::Ready(Arc::new(value)),
        }
    }

    /// The outcome if it has arrived; never blocks
    pub fn poll(&self) -> Option<Arc<T>> {
        let shared = match &self.state {
            State::Ready(value) => return Some(Arc::clone(value)),
            State::Running(shared) => shared,
        };
        if let Some(result) = shared.result.get() {
            return Some(Arc::clone(result));
        }
        let receiver = match shared.receiver.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return None,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        if let Some(result) = shared.result.get() {
            return Some(Arc::clone(result));
        }
        match receiver.try_recv() {
            Ok(value) => Some(shared.settle(value)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(shared.settle((shared.lost)())),
        }
    }

    /// Block until the outcome arrives
    pub fn wait(&self) -> Arc<T> {
        let shared = match &self.state {
            State::Ready(value) => return Arc::clone(value),
            State::Running(shared) => shared,
        };
        if let Some(result) = shared.result.get() {
            return Arc::clone(result);
        }
        let receiver = shared
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(result) = shared.result.get() {
            return Arc::clone(result);
        }
        let value = receiver.recv().unwrap_or_else(|_| (shared.lost)());
        shared.settle(value)
    }

    pub fn is_settled(&self) -> bool {
        match &self.state {
            State::Ready(_) => true,
            State::Running(shared) => shared.result.get().is_some(),
        }
    }
}

impl<T> Shared<T> {
    fn settle(&self, value: T) -> Arc<T> {
        Arc::clone(self.result.get_or_init(|| Arc::new(value)))
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let settled = match &self.state {
            State::Ready(_) => true,
            State::Running(shared) => shared.result.get().is_some(),
        };
        f.debug_struct("Pending").field("settled", &settled).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_clones_share_one_outcome() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let pending = Pending::spawn(
            "test-job",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                42
            },
            || 0,
        );
        let other = pending.clone();

        let a = pending.wait();
        let b = other.wait();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &pending.poll().unwrap()));
        assert_eq!(*a, 42);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_poll_before_completion() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let pending = Pending::spawn(
            "test-gate",
            move || {
                let _ = gate_rx.recv();
                "done"
            },
            || "lost",
        );
        assert!(pending.poll().is_none());
        assert!(!pending.is_settled());

        gate_tx.send(()).unwrap();
        let mut result = None;
        for _ in 0..200 {
            result = pending.poll();
            if result.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*result.unwrap(), "done");
    }

    #[test]
    fn test_panicking_worker_yields_fallback() {
        let pending: Pending<&str> = Pending::spawn("test-panic", || panic!("boom"), || "lost");
        assert_eq!(*pending.wait(), "lost");
    }

    #[test]
    fn test_ready() {
        let pending = Pending::ready(7);
        assert!(pending.is_settled());
        assert_eq!(*pending.wait(), 7);
    }
}
