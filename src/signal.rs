//! At-most-once stop flag shared by everything driving the run.

use crate::error::Error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Signals that no further transfer attempts may be initiated.
///
/// Tripped at most once per run, by the first unrecoverable write failure.
/// In-flight work is allowed to finish; the flag only gates new admissions.
/// Once tripped it is terminal for the run.
#[derive(Debug, Default)]
pub struct StopSignal {
    tripped: AtomicBool,
    reason: Mutex<Option<Error>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the signal with the fatal error. The first caller wins; a
    /// concurrent second trip is ignored.
    pub fn trip(&self, error: Error) {
        let mut slot = self.reason.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
        self.tripped.store(true, Ordering::SeqCst);
    }

    /// Cheap check used before admitting new work.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Take the fatal error, if the signal was tripped.
    pub fn take_reason(&self) -> Option<Error> {
        self.reason.lock().take()
    }
}
