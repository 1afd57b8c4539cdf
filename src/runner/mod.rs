// Module: Runner
// Loads a test, holds the imported actions and drives validation + execution.

use chrono::Utc;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

use crate::actions::ActionRegistry;
use crate::errors::{DispatchError, LoadError, ValidationError};
use crate::events::{EventSink, RunEvent, TracingSink};
use crate::flow::FlowControl;
use crate::loader;
use crate::protocol::{
    DispatchRecord, DispatchStatus, ExecutionReport, RunStatus, Scenario, Step, TestSpec,
};
use crate::validation;

/// Executes one test document against a set of imported actions.
///
/// Scenarios run in document order, then each scenario iteration walks its
/// steps in order and each step runs its own loop. With a scenario loop of 3
/// and steps `a`, `b` the dispatch order is `a b a b a b`.
pub struct Runner {
    test: TestSpec,
    actions: Arc<ActionRegistry>,
    sink: Arc<dyn EventSink>,
}

/// Mutable bookkeeping for a single `execute` call.
#[derive(Default)]
struct RunState {
    dispatches: Vec<DispatchRecord>,
    scenarios_skipped: usize,
    steps_skipped: usize,
}

impl Runner {
    /// Loads the test document at `path`. Events go to `tracing` until
    /// [`with_sink`](Self::with_sink) says otherwise.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let test = loader::load_test_from_file(path)?;
        Ok(Self::from_spec(test))
    }

    pub fn from_spec(test: TestSpec) -> Self {
        Self {
            test,
            actions: Arc::new(ActionRegistry::new()),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn spec(&self) -> &TestSpec {
        &self.test
    }

    /// Replaces the registry used by validation and dispatch. Nothing from
    /// a previous import is kept.
    pub fn import_actions(&mut self, registry: impl Into<Arc<ActionRegistry>>) {
        self.actions = registry.into();
    }

    /// First validation error, if any.
    pub fn try_validate(&self) -> Result<(), ValidationError> {
        validation::validate_test(&self.test, &self.actions, self.sink.as_ref())
    }

    /// `true` only if every step names a registered action with matching arity.
    pub fn validate(&self) -> bool {
        self.try_validate().is_ok()
    }

    /// Runs every enabled scenario. Dispatch failures are recorded and the
    /// run carries on; `validate` is not called here.
    #[instrument(skip(self), fields(test = %self.test.name))]
    pub async fn execute(&self) -> ExecutionReport {
        let start_time = Utc::now();
        self.sink.emit(RunEvent::TestStarted {
            test: self.test.name.clone(),
        });

        let mut state = RunState::default();
        for scenario in &self.test.scenarios {
            self.execute_scenario(scenario, &mut state).await;
        }

        let failed = state
            .dispatches
            .iter()
            .filter(|d| d.status == DispatchStatus::Failed)
            .count();
        self.sink.emit(RunEvent::TestFinished {
            test: self.test.name.clone(),
            dispatched: state.dispatches.len(),
            failed,
        });

        ExecutionReport {
            run_id: Uuid::new_v4().to_string(),
            test_name: self.test.name.clone(),
            status: if failed == 0 {
                RunStatus::Passed
            } else {
                RunStatus::Failed
            },
            start_time: start_time.to_rfc3339(),
            end_time: Utc::now().to_rfc3339(),
            scenarios_skipped: state.scenarios_skipped,
            steps_skipped: state.steps_skipped,
            dispatches: state.dispatches,
        }
    }

    async fn execute_scenario(&self, scenario: &Scenario, state: &mut RunState) {
        let flow = FlowControl::resolve(scenario.flow.as_ref());

        // Checked once, before the loop.
        if !flow.enable {
            self.sink.emit(RunEvent::ScenarioSkipped {
                scenario: scenario.name.clone(),
            });
            state.scenarios_skipped += 1;
            return;
        }

        for iteration in 1..=flow.loop_count {
            self.sink.emit(RunEvent::ScenarioIteration {
                scenario: scenario.name.clone(),
                iteration,
                total: flow.loop_count,
            });

            for step in scenario.steps() {
                self.execute_step(scenario, iteration, step, state).await;
            }
        }
    }

    async fn execute_step(
        &self,
        scenario: &Scenario,
        scenario_iteration: u32,
        step: &Step,
        state: &mut RunState,
    ) {
        let flow = FlowControl::resolve(step.flow.as_ref());

        // Same policy as scenarios: a disabled step never enters its loop.
        if !flow.enable {
            self.sink.emit(RunEvent::StepSkipped {
                scenario: scenario.name.clone(),
                step: step.name.clone(),
            });
            state.steps_skipped += 1;
            return;
        }

        for iteration in 1..=flow.loop_count {
            self.sink.emit(RunEvent::StepIteration {
                step: step.name.clone(),
                iteration,
                total: flow.loop_count,
            });

            let start = Instant::now();
            let outcome = self.dispatch(step).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let mut record = DispatchRecord {
                scenario: scenario.name.clone(),
                step: step.name.clone(),
                scenario_iteration,
                step_iteration: iteration,
                status: DispatchStatus::Passed,
                duration_ms,
                output: None,
                error: None,
                error_code: None,
            };

            match outcome {
                Ok(output) => {
                    if !output.is_null() {
                        record.output = Some(output);
                    }
                }
                Err(err) => {
                    self.sink.emit(RunEvent::DispatchFailed {
                        action: step.name.clone(),
                        code: err.code().formatted(),
                        error: err.to_string(),
                    });
                    record.status = DispatchStatus::Failed;
                    record.error_code = Some(err.code().formatted());
                    record.error = Some(err.to_string());
                }
            }

            state.dispatches.push(record);
        }
    }

    /// Calls the step's action once with its argument values in declared
    /// order. A missing action is an error value, never a panic.
    pub async fn dispatch(&self, step: &Step) -> Result<Value, DispatchError> {
        let action = self
            .actions
            .get(&step.name)
            .ok_or_else(|| DispatchError::ActionNotFound(step.name.clone()))?;

        let args = step.arg_values();
        self.sink.emit(RunEvent::Dispatching {
            action: step.name.clone(),
            arg_count: args.len(),
        });

        action.call(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

    fn spec(value: Value) -> TestSpec {
        serde_json::from_value(value).unwrap()
    }

    /// Registers `name` as an action that appends each call to `log`.
    fn record_calls(registry: &mut ActionRegistry, log: &CallLog, name: &str, arity: usize) {
        let log = log.clone();
        let action_name = name.to_string();
        registry.register_fn(name, arity, move |args| {
            log.lock().unwrap().push((action_name.clone(), args));
            Ok(Value::Null)
        });
    }

    fn runner_with(test: Value, registry: ActionRegistry) -> (Runner, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut runner = Runner::from_spec(spec(test)).with_sink(sink.clone());
        runner.import_actions(registry);
        (runner, sink)
    }

    fn names(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    #[tokio::test]
    async fn test_loads_from_file_and_dispatches_twice() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"test":{"name":"t","scenarios":[{"name":"s","flow":{"loop":2},"steps":[{"name":"ping","args":{"x":1}}]}]}}"#,
        )
        .unwrap();

        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "ping", 1);

        let mut runner = Runner::new(file.path())
            .unwrap()
            .with_sink(Arc::new(MemorySink::new()));
        runner.import_actions(registry);

        assert!(runner.validate());
        let report = runner.execute().await;

        assert!(report.passed());
        let calls = log.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("ping".to_string(), vec![json!(1)]),
                ("ping".to_string(), vec![json!(1)]),
            ]
        );
    }

    #[test]
    fn test_demo_document_validates_with_builtins() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/smoke.json");
        let mut runner = Runner::new(path)
            .unwrap()
            .with_sink(Arc::new(MemorySink::new()));
        runner.import_actions(crate::actions::builtin_registry());

        assert_eq!(runner.spec().name, "smoke");
        assert_eq!(runner.try_validate(), Ok(()));
    }

    #[test]
    fn test_missing_file_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let result = Runner::new(dir.path().join("nope.json"));
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }

    #[test]
    fn test_validate_without_import_fails() {
        let runner = Runner::from_spec(spec(json!({
            "name": "t",
            "scenarios": [{ "name": "s", "steps": [{ "name": "ping" }] }]
        })))
        .with_sink(Arc::new(MemorySink::new()));

        assert!(!runner.validate());
    }

    #[test]
    fn test_import_replaces_previous_registry() {
        let test = json!({
            "name": "t",
            "scenarios": [{ "name": "s", "steps": [{ "name": "ping" }] }]
        });
        let mut first = ActionRegistry::new();
        first.register_fn("ping", 0, |_| Ok(Value::Null));
        let mut second = ActionRegistry::new();
        second.register_fn("pong", 0, |_| Ok(Value::Null));

        let (mut runner, _sink) = runner_with(test, first);
        assert!(runner.validate());

        runner.import_actions(second);
        assert!(!runner.validate());
    }

    #[tokio::test]
    async fn test_disabled_scenario_never_dispatches() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "ping", 0);

        let (runner, sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{
                    "name": "off",
                    "flow": { "loop": 5, "enable": false },
                    "steps": [{ "name": "ping" }]
                }]
            }),
            registry,
        );

        let report = runner.execute().await;

        assert!(log.lock().unwrap().is_empty());
        assert!(report.dispatches.is_empty());
        assert_eq!(report.scenarios_skipped, 1);
        assert!(!sink
            .events()
            .iter()
            .any(|e| matches!(e, RunEvent::ScenarioIteration { .. })));
    }

    #[tokio::test]
    async fn test_scenario_loop_interleaves_steps() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "s1", 0);
        record_calls(&mut registry, &log, "s2", 0);

        let (runner, _sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{
                    "name": "loop",
                    "flow": { "loop": 3 },
                    "steps": [{ "name": "s1" }, { "name": "s2" }]
                }]
            }),
            registry,
        );

        let report = runner.execute().await;

        assert_eq!(names(&log), vec!["s1", "s2", "s1", "s2", "s1", "s2"]);
        assert_eq!(report.dispatch_order(), vec!["s1", "s2", "s1", "s2", "s1", "s2"]);
        let iterations: Vec<u32> = report
            .dispatches
            .iter()
            .map(|d| d.scenario_iteration)
            .collect();
        assert_eq!(iterations, vec![1, 1, 2, 2, 3, 3]);
    }

    #[tokio::test]
    async fn test_step_loop_nested_in_scenario_loop() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "a", 0);
        record_calls(&mut registry, &log, "b", 0);

        let (runner, _sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{
                    "name": "s",
                    "flow": { "loop": 2 },
                    "steps": [{ "name": "a", "flow": { "loop": 2 } }, { "name": "b" }]
                }]
            }),
            registry,
        );

        let report = runner.execute().await;

        assert_eq!(names(&log), vec!["a", "a", "b", "a", "a", "b"]);
        let step_iterations: Vec<u32> = report
            .dispatches
            .iter()
            .map(|d| d.step_iteration)
            .collect();
        assert_eq!(step_iterations, vec![1, 2, 1, 1, 2, 1]);
    }

    #[tokio::test]
    async fn test_disabled_step_is_skipped_before_its_loop() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "on", 0);
        record_calls(&mut registry, &log, "off", 0);

        let (runner, sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{
                    "name": "s",
                    "flow": { "loop": 2 },
                    "steps": [
                        { "name": "off", "flow": { "loop": 4, "enable": false } },
                        { "name": "on" }
                    ]
                }]
            }),
            registry,
        );

        let report = runner.execute().await;

        assert_eq!(names(&log), vec!["on", "on"]);
        assert_eq!(report.steps_skipped, 2);
        let skipped = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, RunEvent::StepSkipped { step, .. } if step == "off"))
            .count();
        assert_eq!(skipped, 2);
    }

    #[tokio::test]
    async fn test_step_without_args_gets_no_arguments() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "noop", 0);

        let (runner, _sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{ "name": "s", "steps": [{ "name": "noop" }] }]
            }),
            registry,
        );

        runner.execute().await;

        let calls = log.lock().unwrap().clone();
        assert_eq!(calls, vec![("noop".to_string(), vec![])]);
    }

    #[tokio::test]
    async fn test_arguments_follow_declared_order() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "login", 3);

        let (runner, _sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{ "name": "s", "steps": [{
                    "name": "login",
                    "args": { "zeta": "first", "alpha": 2, "mid": [true] }
                }]}]
            }),
            registry,
        );

        runner.execute().await;

        let calls = log.lock().unwrap().clone();
        assert_eq!(calls[0].1, vec![json!("first"), json!(2), json!([true])]);
    }

    #[tokio::test]
    async fn test_unknown_action_does_not_stop_the_run() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        record_calls(&mut registry, &log, "after", 0);

        let (runner, sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{ "name": "s", "steps": [
                    { "name": "missing" },
                    { "name": "after" }
                ]}]
            }),
            registry,
        );

        let report = runner.execute().await;

        assert_eq!(names(&log), vec!["after"]);
        assert!(!report.passed());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.dispatches[0].status, DispatchStatus::Failed);
        assert_eq!(report.dispatches[0].error_code.as_deref(), Some("E3001"));
        assert_eq!(report.dispatches[1].status, DispatchStatus::Passed);
        assert!(sink
            .errors()
            .iter()
            .any(|e| matches!(e, RunEvent::DispatchFailed { action, .. } if action == "missing")));
    }

    #[tokio::test]
    async fn test_failing_action_is_recorded_and_run_continues() {
        let log = CallLog::default();
        let mut registry = ActionRegistry::new();
        registry.register_fn("boom", 0, |_| Err(DispatchError::failed("boom", "exploded")));
        record_calls(&mut registry, &log, "after", 0);

        let (runner, _sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{ "name": "s", "steps": [{ "name": "boom" }, { "name": "after" }] }]
            }),
            registry,
        );

        let report = runner.execute().await;

        assert_eq!(names(&log), vec!["after"]);
        assert_eq!(report.dispatches[0].error_code.as_deref(), Some("E3003"));
        assert!(report.dispatches[0]
            .error
            .as_deref()
            .unwrap()
            .contains("exploded"));
    }

    #[tokio::test]
    async fn test_scenario_without_steps_consumes_iterations() {
        let (runner, sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{ "name": "idle", "flow": { "loop": 4 } }]
            }),
            ActionRegistry::new(),
        );

        let report = runner.execute().await;

        assert!(report.passed());
        assert!(report.dispatches.is_empty());
        let iterations: Vec<u32> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::ScenarioIteration { iteration, total, .. } => {
                    assert_eq!(total, 4);
                    Some(iteration)
                }
                _ => None,
            })
            .collect();
        assert_eq!(iterations, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_action_output_is_kept_in_report() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("sum", 2, |args| {
            let total: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(total))
        });

        let (runner, _sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{ "name": "s", "steps": [{ "name": "sum", "args": { "a": 2, "b": 3 } }] }]
            }),
            registry,
        );

        let report = runner.execute().await;

        assert_eq!(report.dispatches[0].output, Some(json!(5)));
        assert_eq!(report.test_name, "t");
        assert!(!report.run_id.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_reports_missing_action() {
        let (runner, _sink) = runner_with(
            json!({ "name": "t", "scenarios": [] }),
            ActionRegistry::new(),
        );
        let step: Step = serde_json::from_value(json!({ "name": "ghost" })).unwrap();

        let result = runner.dispatch(&step).await;

        assert_eq!(result, Err(DispatchError::ActionNotFound("ghost".to_string())));
    }

    #[tokio::test]
    async fn test_events_follow_execution_order() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("ping", 0, |_| Ok(Value::Null));

        let (runner, sink) = runner_with(
            json!({
                "name": "t",
                "scenarios": [{ "name": "s", "steps": [{ "name": "ping" }] }]
            }),
            registry,
        );

        runner.execute().await;

        assert_eq!(
            sink.events(),
            vec![
                RunEvent::TestStarted { test: "t".into() },
                RunEvent::ScenarioIteration {
                    scenario: "s".into(),
                    iteration: 1,
                    total: 1
                },
                RunEvent::StepIteration {
                    step: "ping".into(),
                    iteration: 1,
                    total: 1
                },
                RunEvent::Dispatching {
                    action: "ping".into(),
                    arg_count: 0
                },
                RunEvent::TestFinished {
                    test: "t".into(),
                    dispatched: 1,
                    failed: 0
                },
            ]
        );
    }
}
