//! Finalizer registrations for instances that define `__del__`.
//!
//! A registration is a weak reference from the runtime's registry to the
//! instance. When the instance's last strong reference goes away, the
//! registration moves the instance's class and store onto the pending queue;
//! `CallCx::run_pending_finalizers` later rebuilds an instance from them and
//! calls its `__del__`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;

use crate::builtins::classes::OldClass;
use crate::builtins::instance::{InstanceInner, OldInstance};
use crate::object::dict::DictRef;

/// Class and store of an instance whose finalizer has not run yet.
pub struct PendingFinalizer {
    pub(crate) id: u64,
    pub(crate) class: OldClass,
    pub(crate) dict: DictRef,
}

impl fmt::Debug for PendingFinalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFinalizer")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .finish()
    }
}

struct FinalizerShared {
    live: DashMap<u64, Weak<InstanceInner>>,
    pending_tx: Sender<PendingFinalizer>,
    pending_rx: Receiver<PendingFinalizer>,
    next_id: AtomicU64,
}

/// Tracks every live finalizer registration of one runtime.
#[derive(Clone)]
pub struct FinalizerRegistry {
    shared: Arc<FinalizerShared>,
}

impl FinalizerRegistry {
    pub fn new() -> Self {
        let (pending_tx, pending_rx) = unbounded();
        Self {
            shared: Arc::new(FinalizerShared {
                live: DashMap::new(),
                pending_tx,
                pending_rx,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub(crate) fn register(&self, inst: &OldInstance) -> FinalizerRegistration {
        let id = self.shared.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        self.shared.live.insert(id, inst.downgrade());
        tracing::debug!(id, class = %inst.class().name(), "finalizer registered");
        FinalizerRegistration {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Registrations whose instance is still alive.
    pub fn live_count(&self) -> usize {
        self.shared
            .live
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Finalizers queued but not yet run.
    pub fn pending_count(&self) -> usize {
        self.shared.pending_rx.len()
    }

    pub(crate) fn drain_pending(&self) -> Vec<PendingFinalizer> {
        self.shared.pending_rx.try_iter().collect()
    }
}

impl Default for FinalizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FinalizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizerRegistry")
            .field("live", &self.shared.live.len())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// An instance's claim on running `__del__` when it dies.
pub(crate) struct FinalizerRegistration {
    id: u64,
    shared: Arc<FinalizerShared>,
}

impl FinalizerRegistration {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Withdraws the registration without running anything.
    pub(crate) fn clear(self) {
        self.shared.live.remove(&self.id);
        tracing::debug!(id = self.id, "finalizer cleared");
    }

    /// Queues the dying instance's class and store for finalization.
    pub(crate) fn fire(self, class: OldClass, dict: DictRef) {
        self.shared.live.remove(&self.id);
        let pending = PendingFinalizer {
            id: self.id,
            class,
            dict,
        };
        // The registry owns the receiver, so the channel cannot be closed
        // while `shared` is alive.
        let _ = self.shared.pending_tx.send(pending);
    }
}

impl fmt::Debug for FinalizerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FinalizerRegistration").field(&self.id).finish()
    }
}
