use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::wrapper::signal::DoneSignal;
use crate::wrapper::Instance;

/// The materialization state of one wrapper within one context.
///
/// A record starts out empty and is driven through at most one resolution:
/// first marked pending while a resolver runs the factory, then resolved
/// once the instance is published. The record upholds that a resolved record
/// always holds an instance; callers must check [`is_resolved`] before
/// trusting [`instance`].
///
/// [`is_resolved`]: InstancePerContext::is_resolved
/// [`instance`]: InstancePerContext::instance
pub struct InstancePerContext {
    instance: Option<Instance>,
    is_resolved: bool,
    is_pending: bool,
    done_signal: Option<DoneSignal>,
}

impl InstancePerContext {
    /// Creates an empty record: no instance, not resolved, not pending.
    pub fn new() -> Self {
        Self {
            instance: None,
            is_resolved: false,
            is_pending: false,
            done_signal: None,
        }
    }

    /// Creates a record already resolved to `instance`, the shape a resolver
    /// publishes once construction completes.
    pub fn resolved(instance: Instance) -> Self {
        Self {
            instance: Some(instance),
            is_resolved: true,
            is_pending: false,
            done_signal: None,
        }
    }

    /// Creates a record for an in-flight construction awaiting `signal`.
    pub fn pending(signal: DoneSignal) -> Self {
        Self {
            instance: None,
            is_resolved: false,
            is_pending: true,
            done_signal: Some(signal),
        }
    }

    pub fn instance(&self) -> Option<Instance> {
        self.instance.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.is_resolved
    }

    pub fn is_pending(&self) -> bool {
        self.is_pending
    }

    pub fn done_signal(&self) -> Option<DoneSignal> {
        self.done_signal.clone()
    }

    /// Overwrites the instance value, leaving every flag untouched.
    pub fn set_instance(&mut self, instance: Option<Instance>) {
        self.instance = instance;
    }
}

impl Debug for InstancePerContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InstancePerContext")
            .field("has_instance", &self.instance.is_some())
            .field("is_resolved", &self.is_resolved)
            .field("is_pending", &self.is_pending)
            .finish_non_exhaustive()
    }
}

/// A cheaply clonable handle to one shared [`InstancePerContext`] record.
///
/// Record identity is handle identity: two handles obtained for the same
/// `(wrapper, context)` pair compare equal under [`InstanceRef::ptr_eq`] and
/// observe each other's mutations. The owning wrapper keeps the only map of
/// records; everything else holds [`InstanceRef`]s.
#[derive(Clone)]
pub struct InstanceRef {
    record: Arc<RwLock<InstancePerContext>>,
}

/// The outcome of atomically acquiring a record for resolution.
pub enum Acquisition {
    /// The record is already resolved; the instance is ready to use.
    Resolved(Instance),
    /// Another resolver is constructing; wait on the signal, then acquire
    /// again.
    Pending(DoneSignal),
    /// The caller became the constructor and must eventually call
    /// [`InstanceRef::complete`] or [`InstanceRef::abort`].
    Construct(DoneSignal),
}

impl InstanceRef {
    pub fn new(record: InstancePerContext) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
        }
    }

    pub fn empty() -> Self {
        Self::new(InstancePerContext::new())
    }

    /// Returns true if both handles refer to the same underlying record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }

    pub fn instance(&self) -> Option<Instance> {
        self.record.read().instance()
    }

    /// Returns the instance only once the record is resolved.
    pub fn resolved_instance(&self) -> Option<Instance> {
        let record = self.record.read();
        if record.is_resolved {
            record.instance()
        } else {
            None
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.record.read().is_resolved
    }

    pub fn is_pending(&self) -> bool {
        self.record.read().is_pending
    }

    pub fn done_signal(&self) -> Option<DoneSignal> {
        self.record.read().done_signal()
    }

    /// Overwrites the instance value, leaving every flag untouched.
    pub fn set_instance(&self, instance: Option<Instance>) {
        self.record.write().set_instance(instance);
    }

    /// Atomically decides how the calling resolver should proceed.
    ///
    /// Exactly one caller per unresolved record observes
    /// [`Acquisition::Construct`]; the check-pending and mark-pending steps
    /// happen under a single lock acquisition, so no interleaving can admit
    /// a second constructor.
    pub fn acquire(&self) -> Acquisition {
        let mut record = self.record.write();

        if record.is_resolved {
            let Some(instance) = record.instance() else {
                unreachable!("a resolved record should hold an instance")
            };
            return Acquisition::Resolved(instance);
        }

        if record.is_pending {
            let signal = match record.done_signal() {
                Some(signal) => signal,
                None => {
                    let signal = DoneSignal::new();
                    record.done_signal = Some(signal.clone());
                    signal
                }
            };
            return Acquisition::Pending(signal);
        }

        let signal = DoneSignal::new();
        record.is_pending = true;
        record.done_signal = Some(signal.clone());
        Acquisition::Construct(signal)
    }

    /// Publishes the constructed instance, marks the record resolved and
    /// wakes every waiter.
    pub fn complete(&self, instance: Instance) {
        let signal = {
            let mut record = self.record.write();
            record.instance = Some(instance);
            record.is_resolved = true;
            record.is_pending = false;
            record.done_signal.clone()
        };
        if let Some(signal) = signal {
            signal.complete();
        }
    }

    /// Gives up an in-flight construction. Waiters are woken and the next
    /// acquirer becomes the constructor.
    pub fn abort(&self) {
        let signal = {
            let mut record = self.record.write();
            record.is_pending = false;
            record.done_signal.take()
        };
        if let Some(signal) = signal {
            signal.complete();
        }
    }

    /// Derives a fresh record for a new context: the done signal carries
    /// over as a default, the instance and both flags are reset.
    pub(crate) fn clone_for_context(&self) -> InstanceRef {
        let record = self.record.read();
        InstanceRef::new(InstancePerContext {
            instance: None,
            is_resolved: false,
            is_pending: false,
            done_signal: record.done_signal(),
        })
    }
}

impl Debug for InstanceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Debug::fmt(&*self.record.read(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ref_acquire_transitions_to_construct_once() {
        let record = InstanceRef::empty();

        assert!(matches!(record.acquire(), Acquisition::Construct(_)));
        assert!(record.is_pending());
        assert!(matches!(record.acquire(), Acquisition::Pending(_)));
    }

    #[test]
    fn instance_ref_complete_publishes_instance() {
        let record = InstanceRef::empty();
        let Acquisition::Construct(signal) = record.acquire() else {
            panic!("first acquisition should construct");
        };

        record.complete(Arc::new(42i32));

        assert!(signal.is_completed());
        assert!(record.is_resolved());
        assert!(!record.is_pending());
        assert!(matches!(record.acquire(), Acquisition::Resolved(_)));
    }

    #[test]
    fn instance_ref_abort_hands_construction_to_next_acquirer() {
        let record = InstanceRef::empty();
        let Acquisition::Construct(signal) = record.acquire() else {
            panic!("first acquisition should construct");
        };

        record.abort();

        assert!(signal.is_completed());
        assert!(!record.is_pending());
        assert!(matches!(record.acquire(), Acquisition::Construct(_)));
    }

    #[test]
    fn instance_ref_set_instance_leaves_flags_untouched() {
        let record = InstanceRef::new(InstancePerContext::pending(DoneSignal::new()));

        record.set_instance(Some(Arc::new(7i32)));

        assert!(record.instance().is_some());
        assert!(record.is_pending());
        assert!(!record.is_resolved());
        assert!(record.resolved_instance().is_none());
    }

    #[test]
    fn instance_ref_clone_for_context_resets_state() {
        let record = InstanceRef::new(InstancePerContext::resolved(Arc::new(1i32)));
        let derived = record.clone_for_context();

        assert!(!record.ptr_eq(&derived));
        assert!(derived.instance().is_none());
        assert!(!derived.is_resolved());
        assert!(!derived.is_pending());
    }
}
