// Module: Events
// Everything the runner reports goes through an injected EventSink, so tests
// can capture output without touching the global subscriber.

use std::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    CheckingStep {
        scenario: String,
        step: String,
    },
    /// Validation found a step whose action was never imported.
    ActionNotFound {
        scenario: String,
        step: String,
        code: String,
    },
    ArityMismatch {
        scenario: String,
        step: String,
        code: String,
        actual: usize,
        expected: usize,
    },
    TestStarted {
        test: String,
    },
    ScenarioSkipped {
        scenario: String,
    },
    ScenarioIteration {
        scenario: String,
        iteration: u32,
        total: u32,
    },
    StepSkipped {
        scenario: String,
        step: String,
    },
    StepIteration {
        step: String,
        iteration: u32,
        total: u32,
    },
    Dispatching {
        action: String,
        arg_count: usize,
    },
    DispatchFailed {
        action: String,
        code: String,
        error: String,
    },
    TestFinished {
        test: String,
        dispatched: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Error,
    Info,
    Debug,
}

impl RunEvent {
    pub fn level(&self) -> EventLevel {
        match self {
            Self::ActionNotFound { .. }
            | Self::ArityMismatch { .. }
            | Self::DispatchFailed { .. } => EventLevel::Error,
            Self::TestStarted { .. }
            | Self::ScenarioSkipped { .. }
            | Self::ScenarioIteration { .. }
            | Self::StepSkipped { .. }
            | Self::TestFinished { .. } => EventLevel::Info,
            Self::CheckingStep { .. } | Self::StepIteration { .. } | Self::Dispatching { .. } => {
                EventLevel::Debug
            }
        }
    }
}

/// Destination for runner events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Default sink: forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::CheckingStep { scenario, step } => {
                debug!(scenario = %scenario, step = %step, "Checking step");
            }
            RunEvent::ActionNotFound {
                scenario,
                step,
                code,
            } => {
                error!(scenario = %scenario, step = %step, code = %code, "❌ Action not registered");
            }
            RunEvent::ArityMismatch {
                scenario,
                step,
                code,
                actual,
                expected,
            } => {
                error!(
                    scenario = %scenario,
                    step = %step,
                    code = %code,
                    total_args = actual,
                    expected_args = expected,
                    "❌ Invalid args for action"
                );
            }
            RunEvent::TestStarted { test } => {
                info!(test = %test, "🚀 Running test");
            }
            RunEvent::ScenarioSkipped { scenario } => {
                info!(scenario = %scenario, "⏭️  Scenario disabled, skipping");
            }
            RunEvent::ScenarioIteration {
                scenario,
                iteration,
                total,
            } => {
                info!(
                    scenario = %scenario,
                    iteration = iteration,
                    total = total,
                    "Running scenario iteration {} out of {}",
                    iteration,
                    total
                );
            }
            RunEvent::StepSkipped { scenario, step } => {
                info!(scenario = %scenario, step = %step, "⏭️  Step disabled, skipping");
            }
            RunEvent::StepIteration {
                step,
                iteration,
                total,
            } => {
                debug!(
                    step = %step,
                    iteration = iteration,
                    total = total,
                    "Running step iteration {} out of {}",
                    iteration,
                    total
                );
            }
            RunEvent::Dispatching { action, arg_count } => {
                debug!(action = %action, arg_count = arg_count, "▶️  Dispatching");
            }
            RunEvent::DispatchFailed {
                action,
                code,
                error,
            } => {
                error!(action = %action, code = %code, error = %error, "❌ Dispatch failed");
            }
            RunEvent::TestFinished {
                test,
                dispatched,
                failed,
            } => {
                info!(
                    test = %test,
                    dispatched = dispatched,
                    failed = failed,
                    "🏁 Test finished"
                );
            }
        }
    }
}

/// Sink that keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RunEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<RunEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level() == EventLevel::Error)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
