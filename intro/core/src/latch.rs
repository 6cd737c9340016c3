//! Completion Latch
//!
//! Single-fire gate between the sequencer and its host. The first
//! [`CompletionLatch::signal`] runs the host callback; every later call is
//! absorbed. The latch is owned by one controller instance, so a remounted
//! intro gets a fresh latch instead of sharing a global "already done" flag.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Host callback run when the sequence finishes
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Idempotent single-fire completion signal
pub struct CompletionLatch {
    fired: AtomicBool,
    callback: Mutex<Option<CompletionCallback>>,
}

impl CompletionLatch {
    /// Create a latch that forwards to `callback`
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            fired: AtomicBool::new(false),
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    /// Create a latch with no host callback
    #[must_use]
    pub fn noop() -> Self {
        Self {
            fired: AtomicBool::new(false),
            callback: Mutex::new(None),
        }
    }

    /// Fire the latch
    ///
    /// Returns `true` only for the call that fired it. The host callback
    /// runs on the caller's stack, outside any internal lock.
    pub fn signal(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            tracing::trace!("Completion latch already fired, ignoring signal");
            return false;
        }

        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            callback();
        }
        true
    }

    /// Whether the latch has fired
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CompletionLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("fired", &self.is_fired())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_latch() -> (CompletionLatch, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let latch = CompletionLatch::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (latch, count)
    }

    #[test]
    fn test_first_signal_fires() {
        let (latch, count) = counting_latch();
        assert!(!latch.is_fired());

        assert!(latch.signal());
        assert!(latch.is_fired());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_signals_fire_once() {
        let (latch, count) = counting_latch();

        let fired: Vec<bool> = (0..5).map(|_| latch.signal()).collect();
        assert_eq!(fired, vec![true, false, false, false, false]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_signals_fire_once() {
        let (latch, count) = counting_latch();
        let latch = Arc::new(latch);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || latch.signal())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_latch() {
        let latch = CompletionLatch::noop();
        assert!(latch.signal());
        assert!(!latch.signal());
    }

    #[test]
    fn test_callback_may_inspect_latch_state() {
        // The callback runs after `fired` is set and outside the lock
        let latch = Arc::new(CompletionLatch::noop());
        let observed = Arc::new(AtomicBool::new(false));

        let inner = Arc::clone(&latch);
        let seen = Arc::clone(&observed);
        *latch.callback.lock() = Some(Box::new(move || {
            seen.store(inner.is_fired(), Ordering::SeqCst);
            assert!(!inner.signal());
        }));

        assert!(latch.signal());
        assert!(observed.load(Ordering::SeqCst));
    }
}
