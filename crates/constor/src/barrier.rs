use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::job::{CompletionCallback, JobOutcome};

type Notify = Box<dyn FnOnce() + Send + 'static>;

/// Fires a notification once every part of a logical unit has completed.
///
/// Each part reports its [`JobOutcome`] exactly once through [`arrive`]
/// (usually via [`callback`] attached to an upload job). The notification
/// runs on the last arrival, in whichever order the parts finish, and only
/// if no part failed. Arrivals beyond the expected count are ignored.
///
/// [`arrive`]: CompletionBarrier::arrive
/// [`callback`]: CompletionBarrier::callback
pub struct CompletionBarrier {
    remaining: AtomicUsize,
    failed: AtomicBool,
    notify: Mutex<Option<Notify>>,
}

impl CompletionBarrier {
    pub fn new(parts: usize, notify: impl FnOnce() + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(parts),
            failed: AtomicBool::new(false),
            notify: Mutex::new(Some(Box::new(notify))),
        })
    }

    /// Records one part. Returns `true` if this arrival ran the notification.
    pub fn arrive(&self, outcome: JobOutcome) -> bool {
        if !outcome.is_success() {
            self.failed.store(true, Ordering::Release);
        }
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous != Ok(1) || self.failed.load(Ordering::Acquire) {
            return false;
        }
        let notify = self
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match notify {
            Some(notify) => {
                notify();
                true
            }
            None => false,
        }
    }

    /// Number of parts still outstanding.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// A job completion callback that arrives at this barrier.
    pub fn callback(self: &Arc<Self>) -> CompletionCallback {
        let barrier = Arc::clone(self);
        Box::new(move |outcome| {
            barrier.arrive(outcome);
        })
    }
}
