use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level shape of a test document: everything lives under `test`.
#[derive(Debug, Deserialize, Serialize)]
pub struct TestDocument {
    pub test: TestSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSpec {
    pub name: String,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowOverrides>,
    /// `None` keeps the scenario loopable but it never dispatches anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
}

impl Scenario {
    pub fn steps(&self) -> &[Step] {
        self.steps.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    /// Action identifier looked up in the registry.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

impl Step {
    pub fn arg_count(&self) -> usize {
        self.args.as_ref().map_or(0, Map::len)
    }

    /// Argument values in the order they were declared in the document.
    pub fn arg_values(&self) -> Vec<Value> {
        self.args
            .as_ref()
            .map(|args| args.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Raw `flow` block. Keys other than `loop` and `enable` are ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlowOverrides {
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Passed,
    Failed,
}

/// One attempt to call an action.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchRecord {
    pub scenario: String,
    pub step: String,
    pub scenario_iteration: u32,
    pub step_iteration: u32,
    pub status: DispatchStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct ExecutionReport {
    pub run_id: String,
    pub test_name: String,
    pub status: RunStatus,
    pub start_time: String,
    pub end_time: String,
    pub scenarios_skipped: usize,
    pub steps_skipped: usize,
    pub dispatches: Vec<DispatchRecord>,
}

impl ExecutionReport {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn failed_count(&self) -> usize {
        self.dispatches
            .iter()
            .filter(|d| d.status == DispatchStatus::Failed)
            .count()
    }

    /// Step names in dispatch order.
    pub fn dispatch_order(&self) -> Vec<&str> {
        self.dispatches.iter().map(|d| d.step.as_str()).collect()
    }
}
