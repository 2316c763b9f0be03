//! Coalescing reload signal.
//!
//! # Responsibility
//! - Record "regenerate this kind early" requests from producers.
//! - Forward the first request per kind to the host's reload sink.
//!
//! # Invariants
//! - `signal` never blocks on the renderer and never reports an outcome.
//! - Any number of signals for one kind before the next drain yield exactly
//!   one pending entry; the pending set never grows beyond the kind count.

use log::debug;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Host hook notified when a kind becomes pending (the OS widget center).
pub trait ReloadSink: Send + Sync {
    fn reload_timelines(&self, kind: &str);
}

/// Pending-reload set shared by producer-side callers and the render host.
#[derive(Default)]
pub struct ReloadSignal {
    pending: Mutex<BTreeSet<String>>,
    sink: Option<Arc<dyn ReloadSink>>,
}

impl ReloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn ReloadSink>) -> Self {
        Self {
            pending: Mutex::new(BTreeSet::new()),
            sink: Some(sink),
        }
    }

    /// Requests an early regeneration of `kind`.
    pub fn signal(&self, kind: &str) {
        let newly_pending = self.lock().insert(kind.to_string());
        if !newly_pending {
            debug!(
                "event=reload_signal module=widget status=coalesced kind={}",
                kind
            );
            return;
        }

        debug!(
            "event=reload_signal module=widget status=pending kind={}",
            kind
        );
        if let Some(sink) = &self.sink {
            sink.reload_timelines(kind);
        }
    }

    /// Whether `kind` awaits regeneration.
    pub fn is_pending(&self, kind: &str) -> bool {
        self.lock().contains(kind)
    }

    /// Drains and returns every pending kind, sorted.
    pub fn take_pending(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock()).into_iter().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::{ReloadSignal, ReloadSink};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
    }

    impl ReloadSink for RecordingSink {
        fn reload_timelines(&self, kind: &str) {
            self.calls.lock().unwrap().push(kind.to_string());
        }
    }

    #[test]
    fn repeated_signals_coalesce_into_one_pending_kind() {
        let signal = ReloadSignal::new();
        for _ in 0..10 {
            signal.signal("MyHomeWidget");
        }
        assert!(signal.is_pending("MyHomeWidget"));
        assert_eq!(signal.take_pending(), vec!["MyHomeWidget".to_string()]);
        assert!(signal.take_pending().is_empty());
    }

    #[test]
    fn sink_is_notified_once_per_pending_window() {
        let sink = Arc::new(RecordingSink::default());
        let signal = ReloadSignal::with_sink(sink.clone());

        signal.signal("A");
        signal.signal("A");
        signal.signal("B");
        assert_eq!(*sink.calls.lock().unwrap(), vec!["A", "B"]);

        assert_eq!(signal.take_pending(), vec!["A", "B"]);
        signal.signal("A");
        assert_eq!(*sink.calls.lock().unwrap(), vec!["A", "B", "A"]);
    }

    #[test]
    fn concurrent_signals_leave_a_single_entry() {
        let signal = Arc::new(ReloadSignal::new());
        let handles = (0..8)
            .map(|_| {
                let signal = Arc::clone(&signal);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        signal.signal("MyHomeWidget");
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(signal.take_pending().len(), 1);
    }
}
