// Wizard navigation: flow tables and the step state machine.

pub mod controller;
pub mod model;

pub use controller::{BenefitFlow, CalculatorFlow, FlowTable, NavigationController};
pub use model::{BenefitStep, CalculatorStep, FlowFlags, ProcessKind, Unlock};
