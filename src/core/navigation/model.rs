// Step and flag types for the wizard flows.
//
// NOTE: TypeScript mirror types live with the front end.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which branch the user picked on the home step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    Standard,
    Bulk,
}

impl ProcessKind {
    pub fn all() -> &'static [ProcessKind] {
        &[Self::Standard, Self::Bulk]
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "bulk" => Some(Self::Bulk),
            _ => None,
        }
    }
}

/// Steps of the benefit flow entered from the home page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenefitStep {
    Home,
    Standard,
    Bulk,
    Details,
    Results,
}

impl BenefitStep {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "home" => Some(Self::Home),
            "standard" => Some(Self::Standard),
            "bulk" => Some(Self::Bulk),
            "details" => Some(Self::Details),
            "results" => Some(Self::Results),
            _ => None,
        }
    }
}

impl fmt::Display for BenefitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Home => "home",
            Self::Standard => "standard",
            Self::Bulk => "bulk",
            Self::Details => "details",
            Self::Results => "results",
        };
        f.write_str(name)
    }
}

/// Steps of the two-step calculator flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorStep {
    Calculator,
    Details,
    Results,
}

impl fmt::Display for CalculatorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Calculator => "calculator",
            Self::Details => "details",
            Self::Results => "results",
        };
        f.write_str(name)
    }
}

/// A flag whose rising edge unlocks a forward transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlock {
    ProcessInstance,
    ResultReady,
}

/// Externally mutated flow state. The controller only reads these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowFlags {
    pub process_instance_id: Option<String>,
    pub result_ready: bool,
}

impl FlowFlags {
    pub fn is_set(&self, unlock: Unlock) -> bool {
        match unlock {
            Unlock::ProcessInstance => self
                .process_instance_id
                .as_deref()
                .map(|id| !id.is_empty())
                .unwrap_or(false),
            Unlock::ResultReady => self.result_ready,
        }
    }
}
