// Error taxonomy and the policy that routes errors into alerts.
//
// Validation and network failures are non-fatal and become alerts. Faults
// propagate to whatever boundary renders the fallback screen.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

use super::alerts::bus::AlertBus;
use super::alerts::model::AlertKind;

pub const VALIDATION_TITLE: &str = "Validation Error";
pub const NETWORK_TITLE: &str = "API Request Failed";

/// One rejected form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// All field errors collected from one form submission
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationFailure {
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join(" "))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(ValidationFailure),
    #[error("request to {endpoint} failed ({})", describe_status(.status))]
    Network {
        endpoint: String,
        status: Option<u16>,
    },
    #[error("application fault: {0}")]
    Fault(String),
    #[error("configuration error: {0}")]
    Config(#[from] io::Error),
}

impl AppError {
    pub fn network(endpoint: impl Into<String>, status: Option<u16>) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Kind, message and title of the alert this error is surfaced as, if any
    pub fn alert_parts(&self) -> Option<(AlertKind, String, &'static str)> {
        match self {
            Self::Validation(failure) => {
                Some((AlertKind::Warning, failure.to_string(), VALIDATION_TITLE))
            }
            Self::Network { status, .. } => Some((
                AlertKind::Error,
                network_message(*status).to_string(),
                NETWORK_TITLE,
            )),
            Self::Fault(_) | Self::Config(_) => None,
        }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no response".to_string(),
    }
}

fn network_message(status: Option<u16>) -> &'static str {
    match status {
        Some(400) => "Request failed due to invalid parameters.",
        Some(401) | Some(403) => "You are not authorised to perform this request.",
        Some(404) => "The requested resource was not found.",
        Some(s) if s >= 500 => "The server encountered an error. Please try again later.",
        Some(_) => "The request could not be completed.",
        None => "Unable to reach the server. Check your connection and try again.",
    }
}

/// Surface alert-worthy errors on the bus; anything else is handed back.
pub fn report(bus: &AlertBus, err: AppError) -> Result<(), AppError> {
    match err.alert_parts() {
        Some((kind, message, title)) => {
            log::warn!("{}", err);
            bus.show(kind, message, Some(title));
            Ok(())
        }
        None => {
            log::error!("{}", err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::model::Alert;
    use std::sync::{Arc, Mutex};

    fn bus_with_recorder() -> (AlertBus, Arc<Mutex<Vec<Alert>>>) {
        let bus = AlertBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let captured = received.clone();
        bus.register_sink(Arc::new(move |alert: Alert| captured.lock().unwrap().push(alert)));
        (bus, received)
    }

    #[test]
    fn test_bad_request_maps_to_invalid_parameters() {
        let (bus, received) = bus_with_recorder();
        report(&bus, AppError::network("/calculations", Some(400))).unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received[0].kind(), AlertKind::Error);
        assert_eq!(received[0].message(), "Request failed due to invalid parameters.");
        assert_eq!(received[0].title(), Some(NETWORK_TITLE));
    }

    #[test]
    fn test_validation_becomes_warning() {
        let (bus, received) = bus_with_recorder();
        let mut failure = ValidationFailure::default();
        failure.push("member_id", "Member ID is required.");
        failure.push("annual_salary", "Annual salary must be a positive number.");

        report(&bus, AppError::Validation(failure)).unwrap();
        let received = received.lock().unwrap();
        assert_eq!(received[0].kind(), AlertKind::Warning);
        assert_eq!(
            received[0].message(),
            "Member ID is required. Annual salary must be a positive number."
        );
    }

    #[test]
    fn test_fault_propagates_without_alert() {
        let (bus, received) = bus_with_recorder();
        let result = report(&bus, AppError::Fault("render failed".to_string()));
        assert!(matches!(result, Err(AppError::Fault(_))));
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_network_status_messages() {
        assert!(network_message(Some(503)).contains("server"));
        assert!(network_message(None).contains("reach"));
        assert!(network_message(Some(403)).contains("authorised"));
        assert_eq!(
            AppError::network("/x", None).to_string(),
            "request to /x failed (no response)"
        );
    }
}
