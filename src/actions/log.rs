use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::errors::DispatchError;

use super::Action;

/// Action `log`: writes its single argument as an info line.
///
/// Strings are logged without quotes; any other value as compact JSON.
pub struct LogAction;

impl LogAction {
    pub fn new() -> Self {
        Self
    }

    fn render(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl Default for LogAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for LogAction {
    fn arity(&self) -> usize {
        1
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, DispatchError> {
        let message = args
            .first()
            .map(Self::render)
            .ok_or_else(|| DispatchError::invalid_argument("log", "missing message"))?;

        info!(message = %message, "📝 log");
        Ok(Value::Null)
    }
}
