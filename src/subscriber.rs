//! Event fan-out to subscribers

use crate::error::{AmiError, AmiResult, StopCause};
use crate::message::AmiMessage;
use futures_util::Stream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

type EventItem = AmiResult<AmiMessage>;

struct Subscriber {
    tx: mpsc::Sender<EventItem>,
    /// Set when events have been dropped due to a full queue.
    overflow: AtomicBool,
}

struct SetInner {
    subscribers: Mutex<HashMap<u64, Arc<Subscriber>>>,
    next_id: AtomicU64,
    /// Total count of dropped events across all subscribers.
    dropped_events: AtomicU64,
    /// Set once a terminal signal has gone out; late subscribers complete
    /// immediately instead of dangling.
    closed: AtomicBool,
}

/// Concurrent set of event subscribers.
///
/// Each subscriber owns a bounded queue; delivery never blocks the worker.
/// When a queue is full the event is dropped, a counter is bumped, and a
/// one-time [`AmiError::QueueFull`] notification is delivered once the queue
/// has room again.
pub(crate) struct SubscriberSet {
    inner: Arc<SetInner>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SetInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                dropped_events: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a subscriber with the given queue capacity and return its
    /// stream handle.
    pub fn add(&self, capacity: usize) -> AmiEventStream {
        let id = self
            .inner
            .next_id
            .fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(capacity.max(1));
        {
            // the closed check shares the set lock with dispatch_terminal,
            // so a subscriber is either drained by the terminal or never
            // registered at all
            let mut subscribers = self
                .inner
                .subscribers
                .lock();
            if !self
                .inner
                .closed
                .load(Ordering::Relaxed)
            {
                subscribers.insert(
                    id,
                    Arc::new(Subscriber {
                        tx,
                        overflow: AtomicBool::new(false),
                    }),
                );
            }
        }
        // when closed, tx is dropped here and the stream completes at once
        AmiEventStream {
            id,
            rx,
            set: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `message` to every current subscriber, in wire order per
    /// subscriber. Iteration is snapshot-based; a subscriber added during a
    /// dispatch may miss that message.
    pub fn dispatch_next(&self, message: &AmiMessage) {
        let snapshot: Vec<(u64, Arc<Subscriber>)> = {
            let subscribers = self
                .inner
                .subscribers
                .lock();
            subscribers
                .iter()
                .map(|(id, sub)| (*id, sub.clone()))
                .collect()
        };
        for (id, subscriber) in snapshot {
            if !self.deliver(&subscriber, Ok(message.clone())) {
                debug!(subscriber = id, "subscriber gone, removing");
                self.inner
                    .subscribers
                    .lock()
                    .remove(&id);
            }
        }
    }

    /// Deliver the terminal signal to every subscriber and empty the set.
    ///
    /// A fault cause is delivered as an error item before the queue closes;
    /// a voluntary stop (or clean EOF) just closes the queue. Each
    /// subscriber observes exactly one terminal signal.
    pub fn dispatch_terminal(&self, cause: Option<&StopCause>) {
        let drained: Vec<Arc<Subscriber>> = {
            let mut subscribers = self
                .inner
                .subscribers
                .lock();
            self.inner
                .closed
                .store(true, Ordering::Relaxed);
            subscribers
                .drain()
                .map(|(_, sub)| sub)
                .collect()
        };
        if drained.is_empty() {
            return;
        }
        debug!(
            subscribers = drained.len(),
            fault = cause.is_some_and(StopCause::is_fault),
            "delivering terminal signal"
        );
        for subscriber in drained {
            if let Some(cause) = cause {
                if cause.is_fault() {
                    // best-effort: a full queue loses the error detail but
                    // still observes the close below
                    let _ = subscriber
                        .tx
                        .try_send(Err(cause.to_error()));
                }
            }
            // sender drops here; the receiver sees the queue close after
            // any buffered items
        }
    }

    /// Try to deliver one item; `false` means the subscriber is gone.
    fn deliver(&self, subscriber: &Subscriber, item: EventItem) -> bool {
        if subscriber
            .overflow
            .load(Ordering::Relaxed)
        {
            match subscriber
                .tx
                .try_send(Err(AmiError::QueueFull))
            {
                Ok(()) => {
                    subscriber
                        .overflow
                        .store(false, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return false,
                Err(mpsc::error::TrySendError::Full(_)) => {}
            }
        }

        match subscriber
            .tx
            .try_send(item)
        {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
            Err(mpsc::error::TrySendError::Full(_)) => {
                subscriber
                    .overflow
                    .store(true, Ordering::Relaxed);
                self.inner
                    .dropped_events
                    .fetch_add(1, Ordering::Relaxed);
                warn!("subscriber queue full, dropping event");
                true
            }
        }
    }

    /// Total events dropped across all subscribers.
    pub fn dropped_event_count(&self) -> u64 {
        self.inner
            .dropped_events
            .load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .len()
    }
}

/// Stream of unsolicited events delivered to one subscriber.
///
/// Items are `Ok(message)` for events, or `Err(AmiError::QueueFull)` when
/// one or more events were dropped because the application fell behind
/// (a one-time notification per overflow episode). A fault terminating the
/// client arrives as one final `Err`, then the stream ends; a voluntary stop
/// or clean server EOF ends the stream without an error.
///
/// Dropping the handle unsubscribes.
pub struct AmiEventStream {
    id: u64,
    rx: mpsc::Receiver<EventItem>,
    set: Weak<SetInner>,
}

impl AmiEventStream {
    /// Receive the next event, or `None` once the subscription has
    /// completed.
    pub async fn recv(&mut self) -> Option<EventItem> {
        self.rx
            .recv()
            .await
    }

    /// Remove this subscriber. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for AmiEventStream {
    fn drop(&mut self) {
        if let Some(set) = self
            .set
            .upgrade()
        {
            set.subscribers
                .lock()
                .remove(&self.id);
        }
    }
}

impl Stream for AmiEventStream {
    type Item = EventItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_recv(cx)
    }
}

impl std::fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiEventStream")
            .field("id", &self.id)
            .finish()
    }
}
