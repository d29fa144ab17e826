//! Step state machine for the wizard flows.
//!
//! A [`FlowTable`] describes a flow as data: its initial step, optional branch
//! targets, the gated forward edge out of each step and the back edge into it.
//! [`NavigationController`] drives one flow. Reactive transitions are explicit:
//! callers hand updated flags to [`NavigationController::advance_if_ready`],
//! which advances at most once per rising edge of the flag that unlocks the
//! current step.

use std::fmt;
use std::marker::PhantomData;

use super::model::{BenefitStep, CalculatorStep, FlowFlags, ProcessKind, Unlock};
use crate::core::telemetry::{self, TelemetryEvent};

/// Transition table of one flow
pub trait FlowTable {
    type Step: Copy + Eq + fmt::Debug + fmt::Display;

    const NAME: &'static str;

    fn initial() -> Self::Step;

    /// Step entered from the initial step when a process of `kind` starts
    fn branch(kind: ProcessKind) -> Option<Self::Step>;

    /// Gated forward edge: the flag that must be set and the step it leads to
    fn forward(step: Self::Step) -> Option<(Unlock, Self::Step)>;

    /// Back edge, given the branch taken (if any)
    fn previous(step: Self::Step, kind: Option<ProcessKind>) -> Option<Self::Step>;
}

/// home -> standard | bulk -> details -> results
pub struct BenefitFlow;

impl FlowTable for BenefitFlow {
    type Step = BenefitStep;

    const NAME: &'static str = "benefit";

    fn initial() -> BenefitStep {
        BenefitStep::Home
    }

    fn branch(kind: ProcessKind) -> Option<BenefitStep> {
        Some(match kind {
            ProcessKind::Standard => BenefitStep::Standard,
            ProcessKind::Bulk => BenefitStep::Bulk,
        })
    }

    fn forward(step: BenefitStep) -> Option<(Unlock, BenefitStep)> {
        match step {
            BenefitStep::Standard => Some((Unlock::ProcessInstance, BenefitStep::Details)),
            BenefitStep::Details | BenefitStep::Bulk => {
                Some((Unlock::ResultReady, BenefitStep::Results))
            }
            BenefitStep::Home | BenefitStep::Results => None,
        }
    }

    fn previous(step: BenefitStep, kind: Option<ProcessKind>) -> Option<BenefitStep> {
        match step {
            BenefitStep::Home => None,
            BenefitStep::Standard | BenefitStep::Bulk => Some(BenefitStep::Home),
            BenefitStep::Details => Some(BenefitStep::Standard),
            BenefitStep::Results => match kind {
                Some(ProcessKind::Bulk) => Some(BenefitStep::Bulk),
                _ => Some(BenefitStep::Details),
            },
        }
    }
}

/// calculator -> details -> results
pub struct CalculatorFlow;

impl FlowTable for CalculatorFlow {
    type Step = CalculatorStep;

    const NAME: &'static str = "calculator";

    fn initial() -> CalculatorStep {
        CalculatorStep::Calculator
    }

    fn branch(_kind: ProcessKind) -> Option<CalculatorStep> {
        None
    }

    fn forward(step: CalculatorStep) -> Option<(Unlock, CalculatorStep)> {
        match step {
            CalculatorStep::Calculator => {
                Some((Unlock::ProcessInstance, CalculatorStep::Details))
            }
            CalculatorStep::Details => Some((Unlock::ResultReady, CalculatorStep::Results)),
            CalculatorStep::Results => None,
        }
    }

    fn previous(step: CalculatorStep, _kind: Option<ProcessKind>) -> Option<CalculatorStep> {
        match step {
            CalculatorStep::Calculator => None,
            CalculatorStep::Details => Some(CalculatorStep::Calculator),
            CalculatorStep::Results => Some(CalculatorStep::Details),
        }
    }
}

pub struct NavigationController<F: FlowTable> {
    step: F::Step,
    kind: Option<ProcessKind>,
    flags: FlowFlags,
    _flow: PhantomData<F>,
}

impl<F: FlowTable> Default for NavigationController<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FlowTable> NavigationController<F> {
    pub fn new() -> Self {
        Self {
            step: F::initial(),
            kind: None,
            flags: FlowFlags::default(),
            _flow: PhantomData,
        }
    }

    pub fn current_step(&self) -> F::Step {
        self.step
    }

    pub fn flags(&self) -> &FlowFlags {
        &self.flags
    }

    pub fn process_kind(&self) -> Option<ProcessKind> {
        self.kind
    }

    pub fn can_go_back(&self) -> bool {
        F::previous(self.step, self.kind).is_some()
    }

    /// Whether `handle_next_step` would move right now
    pub fn can_go_next(&self) -> bool {
        F::forward(self.step)
            .map(|(unlock, _)| self.flags.is_set(unlock))
            .unwrap_or(false)
    }

    /// Unconditional transition
    pub fn navigate_to_step(&mut self, step: F::Step) {
        self.transition(step);
    }

    /// Branch out of the initial step. No-op anywhere else.
    pub fn handle_process_start(&mut self, kind: ProcessKind) -> bool {
        if self.step != F::initial() {
            log::debug!("Ignoring process start from {} in {} flow", self.step, F::NAME);
            return false;
        }
        match F::branch(kind) {
            Some(target) => {
                self.transition(target);
                true
            }
            None => false,
        }
    }

    /// Forward transition if the unlocking flag is already set
    pub fn handle_next_step(&mut self) -> bool {
        match F::forward(self.step) {
            Some((unlock, target)) if self.flags.is_set(unlock) => {
                self.transition(target);
                true
            }
            _ => false,
        }
    }

    pub fn handle_back(&mut self) -> bool {
        match F::previous(self.step, self.kind) {
            Some(target) => {
                self.transition(target);
                true
            }
            None => false,
        }
    }

    /// Back to the initial step with every flag cleared
    pub fn reset_process(&mut self) {
        let already_reset =
            self.step == F::initial() && self.kind.is_none() && self.flags == FlowFlags::default();
        self.step = F::initial();
        self.kind = None;
        self.flags = FlowFlags::default();
        if !already_reset {
            telemetry::record(TelemetryEvent::ProcessReset { flow: F::NAME });
        }
    }

    /// Record newly observed flags and advance once if the flag unlocking the
    /// current step has just become set. Returns the new step when it moved.
    pub fn advance_if_ready(&mut self, flags: FlowFlags) -> Option<F::Step> {
        let previous = std::mem::replace(&mut self.flags, flags);
        let (unlock, target) = F::forward(self.step)?;
        let rose = !previous.is_set(unlock) && self.flags.is_set(unlock);
        if !rose {
            return None;
        }
        self.transition(target);
        Some(target)
    }

    pub fn set_process_instance_id(&mut self, id: Option<String>) -> Option<F::Step> {
        let flags = FlowFlags {
            process_instance_id: id,
            ..self.flags.clone()
        };
        self.advance_if_ready(flags)
    }

    pub fn set_result_ready(&mut self, ready: bool) -> Option<F::Step> {
        let flags = FlowFlags {
            result_ready: ready,
            ..self.flags.clone()
        };
        self.advance_if_ready(flags)
    }

    fn transition(&mut self, to: F::Step) {
        // The branch follows the step: entering a branch step picks it, the
        // initial step forgets it, other steps keep it
        if to == F::initial() {
            self.kind = None;
        } else if let Some(kind) = ProcessKind::all()
            .iter()
            .copied()
            .find(|kind| F::branch(*kind) == Some(to))
        {
            self.kind = Some(kind);
        }
        if to == self.step {
            return;
        }
        telemetry::record(TelemetryEvent::StepChanged {
            flow: F::NAME,
            from: self.step.to_string(),
            to: to.to_string(),
        });
        self.step = to;
    }
}
