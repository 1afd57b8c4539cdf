// Module: Actions
// Callables that steps dispatch to, and the registry that names them.

pub mod http;
pub mod log;
pub mod wait;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::DispatchError;

/// Contract for anything a step can call.
///
/// Arity is declared, not discovered: validation compares it against the
/// number of entries in the step's `args` map.
#[async_trait]
pub trait Action: Send + Sync {
    /// Number of positional arguments the action requires.
    fn arity(&self) -> usize;

    /// Runs the action with argument values in declared order.
    async fn call(&self, args: Vec<Value>) -> Result<Value, DispatchError>;
}

/// Adapts a synchronous closure into an [`Action`].
pub struct FnAction<F> {
    arity: usize,
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(Vec<Value>) -> Result<Value, DispatchError> + Send + Sync,
{
    pub fn new(arity: usize, func: F) -> Self {
        Self { arity, func }
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(Vec<Value>) -> Result<Value, DispatchError> + Send + Sync + 'static,
{
    fn arity(&self) -> usize {
        self.arity
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, DispatchError> {
        (self.func)(args)
    }
}

/// Name → action map handed to the runner through `import_actions`.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) an action under `name`.
    pub fn register(&mut self, name: impl Into<String>, action: impl Action + 'static) -> &mut Self {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    /// Same as [`register`](Self::register), for an action shared with other registries.
    pub fn register_shared(&mut self, name: impl Into<String>, action: Arc<dyn Action>) -> &mut Self {
        self.actions.insert(name.into(), action);
        self
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, arity: usize, func: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Result<Value, DispatchError> + Send + Sync + 'static,
    {
        self.register(name, FnAction::new(arity, func))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

/// Registry with the actions the CLI ships with.
pub fn builtin_registry() -> ActionRegistry {
    let wait: Arc<dyn Action> = Arc::new(wait::WaitAction::new());
    let mut registry = ActionRegistry::new();
    registry
        .register_shared("wait", wait.clone())
        .register_shared("sleep", wait)
        .register("log", log::LogAction::new())
        .register("http_request", http::HttpRequestAction::new());
    registry
}
