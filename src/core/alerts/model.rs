// Alert model types and the view contract rendered by the front end.
//
// NOTE: TypeScript mirror types live with the front end.
// Keep both files in sync when modifying data structures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of an alert, which also selects its visual treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Error,
    Warning,
    Info,
}

impl AlertKind {
    /// Only info alerts dismiss themselves; errors and warnings stay until closed
    pub fn auto_dismisses(&self) -> bool {
        matches!(self, Self::Info)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Get all alert kinds
    #[cfg(test)]
    pub fn all() -> &'static [AlertKind] {
        &[Self::Error, Self::Warning, Self::Info]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    #[error("alert message must not be empty")]
    EmptyMessage,
}

/// A transient user-facing notification.
///
/// Fields are private so a constructed alert always carries a non-empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    kind: AlertKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        message: impl Into<String>,
        title: Option<String>,
    ) -> Result<Self, AlertError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(AlertError::EmptyMessage);
        }
        // An empty title renders the same as no title
        let title = title.filter(|t| !t.trim().is_empty());
        Ok(Self {
            kind,
            message,
            title,
        })
    }

    pub fn kind(&self) -> AlertKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Build the render model for this alert
    pub fn view(&self) -> AlertView {
        AlertView {
            tone: self.kind,
            classes: tone_classes(self.kind),
            icon: tone_icon(self.kind),
            title: self.title.clone(),
            message: self.message.clone(),
            close_label: "Dismiss",
        }
    }
}

/// Display state held by the alert provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AlertDisplay {
    #[default]
    NoAlert,
    Showing(Alert),
}

impl AlertDisplay {
    pub fn current(&self) -> Option<&Alert> {
        match self {
            Self::NoAlert => None,
            Self::Showing(alert) => Some(alert),
        }
    }

    pub fn is_showing(&self) -> bool {
        matches!(self, Self::Showing(_))
    }
}

/// What the front end renders for a visible alert.
///
/// Exactly one tone is applied; the close control always performs a manual dismiss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertView {
    pub tone: AlertKind,
    pub classes: &'static str,
    pub icon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    pub close_label: &'static str,
}

fn tone_classes(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Error => "alert alert-error border-red-500 bg-red-50 text-red-800",
        AlertKind::Warning => "alert alert-warning border-amber-500 bg-amber-50 text-amber-800",
        AlertKind::Info => "alert alert-info border-sky-500 bg-sky-50 text-sky-800",
    }
}

fn tone_icon(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Error => "circle-x",
        AlertKind::Warning => "triangle-alert",
        AlertKind::Info => "info",
    }
}
