// Alert provider - subscribes to the bus and owns the visible alert.
//
// States: NoAlert, Showing(alert). Info alerts schedule a one-shot dismiss timer
// on the tokio runtime. Every inbound alert bumps a generation counter and aborts
// the previous timer, and a firing timer re-checks the generation under the lock,
// so an old dismiss can never clear a newer alert.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::bus::{AlertBus, AlertSink, SinkId};
use super::model::{Alert, AlertDisplay};
use crate::core::telemetry::{self, TelemetryEvent};

/// Default auto-dismiss delay for info alerts
pub const INFO_DISMISS_AFTER: Duration = Duration::from_millis(5000);

struct ProviderState {
    display: AlertDisplay,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<ProviderState>,
    updates: watch::Sender<AlertDisplay>,
    runtime: Handle,
    dismiss_after: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn receive(self: &Arc<Self>, alert: Alert) {
        let mut state = self.lock();
        cancel_timer(&mut state);
        state.generation += 1;

        telemetry::record(TelemetryEvent::AlertShown { kind: alert.kind() });

        if alert.kind().auto_dismisses() {
            let generation = state.generation;
            // Deadline is fixed at delivery time, not when the task first runs
            let deadline = Instant::now() + self.dismiss_after;
            let weak = Arc::downgrade(self);
            state.timer = Some(self.runtime.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(shared) = weak.upgrade() {
                    shared.expire(generation);
                }
            }));
        }

        state.display = AlertDisplay::Showing(alert);
        self.updates.send_replace(state.display.clone());
    }

    fn expire(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("Ignoring stale dismiss timer (generation {})", generation);
            return;
        }
        state.timer = None;
        self.clear(&mut state, true);
    }

    fn dismiss(&self) {
        let mut state = self.lock();
        cancel_timer(&mut state);
        state.generation += 1;
        self.clear(&mut state, false);
    }

    fn clear(&self, state: &mut ProviderState, automatic: bool) {
        if let AlertDisplay::Showing(alert) = &state.display {
            telemetry::record(TelemetryEvent::AlertDismissed {
                kind: alert.kind(),
                automatic,
            });
        }
        state.display = AlertDisplay::NoAlert;
        self.updates.send_replace(AlertDisplay::NoAlert);
    }
}

fn cancel_timer(state: &mut ProviderState) {
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }
}

/// The mounted display subscriber. Dropping it unmounts.
pub struct AlertProvider {
    shared: Arc<Shared>,
    bus: Arc<AlertBus>,
    sink_id: Option<SinkId>,
}

impl AlertProvider {
    /// Register with `bus` and start accepting alerts. Timers are spawned on `runtime`.
    pub fn mount(bus: Arc<AlertBus>, runtime: Handle, dismiss_after: Duration) -> Self {
        let (updates, _) = watch::channel(AlertDisplay::NoAlert);
        let shared = Arc::new(Shared {
            state: Mutex::new(ProviderState {
                display: AlertDisplay::NoAlert,
                generation: 0,
                timer: None,
            }),
            updates,
            runtime,
            dismiss_after,
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let sink: AlertSink = Arc::new(move |alert: Alert| {
            if let Some(shared) = weak.upgrade() {
                shared.receive(alert);
            }
        });
        let sink_id = bus.register_sink(sink);
        log::debug!("Alert provider mounted");

        Self {
            shared,
            bus,
            sink_id: Some(sink_id),
        }
    }

    /// Snapshot of what is currently displayed
    pub fn display(&self) -> AlertDisplay {
        self.shared.lock().display.clone()
    }

    /// Receiver that observes every display change
    pub fn subscribe(&self) -> watch::Receiver<AlertDisplay> {
        self.shared.updates.subscribe()
    }

    /// True while an auto-dismiss timer is pending
    pub fn has_pending_timer(&self) -> bool {
        self.shared
            .lock()
            .timer
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Manual close. Applies to every alert kind.
    pub fn dismiss(&self) {
        self.shared.dismiss();
    }

    /// Cancel any pending timer and detach from the bus.
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(id) = self.sink_id.take() {
            cancel_timer(&mut self.shared.lock());
            self.bus.clear_sink(id);
            log::debug!("Alert provider unmounted");
        }
    }
}

impl Drop for AlertProvider {
    fn drop(&mut self) {
        self.teardown();
    }
}
