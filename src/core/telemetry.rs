//! Structured telemetry records.
//!
//! Records are serialised to JSON and written through the `log` facade under
//! the `telemetry` target, so any installed logger can route them separately.

use serde::Serialize;

use super::alerts::model::AlertKind;

pub const TARGET: &str = "telemetry";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    StepChanged {
        flow: &'static str,
        from: String,
        to: String,
    },
    AlertShown {
        kind: AlertKind,
    },
    AlertDismissed {
        kind: AlertKind,
        automatic: bool,
    },
    ProcessReset {
        flow: &'static str,
    },
}

impl TelemetryEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

pub fn record(event: TelemetryEvent) {
    log::info!(target: TARGET, "{}", event.to_json());
}
