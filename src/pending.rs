//! In-flight request correlation

use crate::error::StopCause;
use crate::message::AmiMessage;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Outcome delivered to a `publish` caller through its pending slot.
#[derive(Debug)]
pub(crate) enum PublishOutcome {
    /// The correlated response arrived.
    Response(AmiMessage),
    /// The client stopped voluntarily (or saw clean EOF) first.
    Cancelled,
    /// The client stopped on a fault first.
    Failed(StopCause),
}

/// Concurrent map from in-flight `ActionID` to its one-shot completion slot.
///
/// Keys are ASCII-lowercased so correlation is case-insensitive. A slot
/// enters the table before its request bytes are written and leaves it
/// exactly once: taken by the worker on response arrival, drained on stop,
/// or removed by the publisher's cleanup.
#[derive(Default)]
pub(crate) struct PendingTable {
    slots: Mutex<HashMap<String, oneshot::Sender<PublishOutcome>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically insert a slot. Returns `false` when `action_id` is already
    /// in flight.
    pub fn try_insert(&self, action_id: &str, slot: oneshot::Sender<PublishOutcome>) -> bool {
        let mut slots = self
            .slots
            .lock();
        match slots.entry(action_id.to_ascii_lowercase()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(slot);
                true
            }
        }
    }

    /// Atomically remove and return the slot for `action_id`.
    pub fn try_take(&self, action_id: &str) -> Option<oneshot::Sender<PublishOutcome>> {
        self.slots
            .lock()
            .remove(&action_id.to_ascii_lowercase())
    }

    /// Remove every entry and complete each slot: `Cancelled` for a voluntary
    /// stop (or clean EOF), `Failed(cause)` for a fault.
    pub fn drain_with(&self, cause: Option<&StopCause>) {
        let drained: Vec<_> = {
            let mut slots = self
                .slots
                .lock();
            slots
                .drain()
                .collect()
        };
        for (_, slot) in drained {
            let outcome = match cause {
                Some(cause) if cause.is_fault() => PublishOutcome::Failed(cause.clone()),
                _ => PublishOutcome::Cancelled,
            };
            // the receiver may already be gone (publish future dropped)
            let _ = slot.send(outcome);
        }
    }

    /// Number of requests currently in flight.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .len()
    }
}
