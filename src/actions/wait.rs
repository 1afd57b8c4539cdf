//! # Action Wait/Sleep - Pausas na execução
//!
//! Esta action pausa a execução pelo tempo informado.
//! É útil para simular delays entre chamadas ou aguardar processamento.
//!
//! ## Nomes registrados:
//! - `wait` - Pausa a execução pelo tempo especificado
//! - `sleep` - Alias de `wait` (mesma instância)
//!
//! ## Exemplo de uso no teste:
//!
//! ```json
//! {
//!   "name": "wait",
//!   "args": { "duration_ms": 2000 }
//! }
//! ```
//!
//! O nome da chave não importa: só o valor, na posição 0, é usado.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::errors::DispatchError;

use super::Action;

/// Action que aguarda `duration_ms` milissegundos.
///
/// Não tem estado interno, então a mesma instância pode ser
/// registrada sob `wait` e `sleep`.
pub struct WaitAction;

impl WaitAction {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WaitAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for WaitAction {
    /// Um argumento: a duração em milissegundos.
    fn arity(&self) -> usize {
        1
    }

    /// Executa o delay e retorna `{ "elapsed_ms": <duração real> }`.
    ///
    /// ## Nota sobre precisão:
    ///
    /// A duração real pode ser ligeiramente maior que a especificada
    /// devido ao overhead do sistema operacional e do runtime Tokio.
    #[instrument(skip(self, args), fields(duration_ms))]
    async fn call(&self, args: Vec<Value>) -> Result<Value, DispatchError> {
        let start = Instant::now();

        // Aceita apenas inteiros não negativos.
        let duration_ms = args.first().and_then(Value::as_u64).ok_or_else(|| {
            DispatchError::invalid_argument(
                "wait",
                format!(
                    "expected an integer number of milliseconds, got {}",
                    args.first().map_or_else(|| "nothing".to_string(), Value::to_string)
                ),
            )
        })?;

        tracing::Span::current().record("duration_ms", duration_ms);
        debug!(duration_ms = duration_ms, "⏳ Waiting...");

        sleep(Duration::from_millis(duration_ms)).await;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(actual_duration_ms = elapsed, "✅ Wait finished");

        Ok(json!({ "elapsed_ms": elapsed }))
    }
}
