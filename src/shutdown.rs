use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A one-shot flag raised by the coordinator once every client has finished.
///
/// Cloning shares the same flag. The write uses `Release` and reads use
/// `Acquire`, so a trader that observes the flag also observes everything the
/// coordinator did before raising it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Creates a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Raising twice has no further effect.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Returns whether the signal has been raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
