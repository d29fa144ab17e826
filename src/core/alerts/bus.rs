// Alert bus - the single dispatch point for user-facing alerts.
//
// Constructed once by the composition root and shared by `Arc`. Holds at most
// one sink; delivery is synchronous and last-write-wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::model::{Alert, AlertKind};

/// Receiver of dispatched alerts
pub type AlertSink = Arc<dyn Fn(Alert) + Send + Sync>;

/// Identifies one `register_sink` call so its owner can detach only itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkId(u64);

struct Registered {
    id: SinkId,
    sink: AlertSink,
}

pub struct AlertBus {
    sink: Mutex<Option<Registered>>,
    next_id: AtomicU64,
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertBus {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Replace the current sink. Future show calls deliver to `sink`.
    pub fn register_sink(&self, sink: AlertSink) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut slot = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            log::debug!("Alert sink replaced by {:?}", id);
        }
        *slot = Some(Registered { id, sink });
        id
    }

    /// Reset to the no-op sink, but only if `id` is still the registered one.
    /// Returns true if the sink was detached.
    pub fn clear_sink(&self, id: SinkId) -> bool {
        let mut slot = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(registered) if registered.id == id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn show_error(&self, message: impl Into<String>, title: Option<&str>) {
        self.show(AlertKind::Error, message, title);
    }

    pub fn show_warning(&self, message: impl Into<String>, title: Option<&str>) {
        self.show(AlertKind::Warning, message, title);
    }

    pub fn show_info(&self, message: impl Into<String>, title: Option<&str>) {
        self.show(AlertKind::Info, message, title);
    }

    /// Build an alert and hand it to the current sink. Never fails: invalid
    /// alerts and alerts sent with no sink registered are dropped.
    pub fn show(&self, kind: AlertKind, message: impl Into<String>, title: Option<&str>) {
        match Alert::new(kind, message, title.map(str::to_string)) {
            Ok(alert) => self.dispatch(alert),
            Err(e) => log::warn!("Dropping {} alert: {}", kind.as_str(), e),
        }
    }

    pub fn dispatch(&self, alert: Alert) {
        // Clone the sink out so it runs without the lock held; a sink may
        // dispatch or re-register.
        let sink = {
            let slot = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
            slot.as_ref().map(|registered| registered.sink.clone())
        };
        match sink {
            Some(sink) => sink(alert),
            None => log::debug!("No alert sink registered, dropping: {}", alert.message()),
        }
    }
}
