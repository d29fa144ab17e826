// Alert system module for transient user-facing notifications.
//
// Architecture:
// - model.rs: Alert value type, display state and render model
// - bus.rs: Single-sink dispatcher shared by the composition root
// - provider.rs: Display state machine with cancellable auto-dismiss

pub mod bus;
pub mod model;
pub mod provider;

pub use bus::{AlertBus, AlertSink, SinkId};
pub use model::{Alert, AlertDisplay, AlertKind, AlertView};
pub use provider::AlertProvider;
