use std::mem;
use std::sync::Arc;

use oneshot::{Receiver, Sender};
use parking_lot::Mutex;

use crate::wrapper::ResolutionError;

/// A completion signal shared by every resolver interested in one in-flight
/// construction.
///
/// The resolver that starts constructing an instance holds the signal and
/// calls [`DoneSignal::complete`] once the instance is published. Any other
/// resolver that finds the same record pending blocks on
/// [`DoneSignal::wait`] instead of invoking the factory a second time, which
/// keeps construction at-most-once per record.
///
/// Cloning a [`DoneSignal`] yields another handle to the same signal.
#[derive(Clone)]
pub struct DoneSignal {
    state: Arc<Mutex<SignalState>>,
}

impl DoneSignal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SignalState::new())),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Registers a waiter on this signal. Returns [`None`] if the signal has
    /// already completed, in which case there is nothing to wait for.
    pub fn subscribe(&self) -> Option<Receiver<()>> {
        let mut state = self.state.lock();
        if state.completed {
            None
        } else {
            let (sender, receiver) = oneshot::channel();
            state.waiters.push(sender);
            Some(receiver)
        }
    }

    /// Completes the signal and wakes every registered waiter. Completing an
    /// already completed signal is a no-op.
    pub fn complete(&self) {
        let waiters = {
            let mut state = self.state.lock();
            state.completed = true;
            mem::take(&mut state.waiters)
        };
        for sender in waiters {
            let _ = sender.send(());
        }
    }

    /// Blocks the current thread until the signal completes.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Abandoned`] if every handle capable of
    /// completing the signal was dropped first.
    pub fn wait(&self) -> Result<(), ResolutionError> {
        match self.subscribe() {
            Some(receiver) => receiver.recv().map_err(|_| ResolutionError::Abandoned),
            None => Ok(()),
        }
    }
}

struct SignalState {
    completed: bool,
    waiters: Vec<Sender<()>>,
}

impl SignalState {
    fn new() -> Self {
        Self {
            completed: false,
            waiters: Vec::new(),
        }
    }
}
