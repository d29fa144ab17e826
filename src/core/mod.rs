pub mod alerts;
pub mod config;
pub mod error;
pub mod form;
pub mod navigation;
pub mod telemetry;
