//! # Módulo de Validação de Aridade
//!
//! Este módulo confere um teste carregado contra o registro de actions
//! **antes** da execução.
//!
//! ## Para leigos:
//!
//! Cada step diz "chame a action X com estes argumentos".
//! Antes de rodar qualquer coisa, verificamos duas coisas:
//!
//! 1. **A action existe?** Alguém registrou uma action com esse nome?
//! 2. **A quantidade de argumentos bate?** Se a action pede 2 argumentos,
//!    o step precisa declarar exatamente 2 em `args`.
//!
//! Nomes e tipos dos argumentos **não** são verificados, só a contagem.
//!
//! ## Fail-fast
//!
//! A validação para no primeiro problema. Steps depois do primeiro erro
//! nem são visitados, então nunca aparecem nos eventos.
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! match validate_test(&test, &registry, &TracingSink) {
//!     Ok(()) => runner.execute().await,
//!     Err(err) => eprintln!("Teste inválido: {}", err),
//! }
//! ```

use crate::actions::ActionRegistry;
use crate::errors::ValidationError;
use crate::events::{EventSink, RunEvent};
use crate::protocol::TestSpec;

/// Valida todos os steps de todos os cenários, em ordem de documento.
///
/// ## Retorno:
///
/// - `Ok(())`: toda action existe e toda aridade bate
/// - `Err(ValidationError)`: o **primeiro** problema encontrado
///
/// Cada step visitado gera um `CheckingStep`; o erro, se houver,
/// gera `ActionNotFound` ou `ArityMismatch` no sink.
pub fn validate_test(
    test: &TestSpec,
    actions: &ActionRegistry,
    sink: &dyn EventSink,
) -> Result<(), ValidationError> {
    for scenario in &test.scenarios {
        for step in scenario.steps() {
            sink.emit(RunEvent::CheckingStep {
                scenario: scenario.name.clone(),
                step: step.name.clone(),
            });

            // `args` ausente conta como mapa vazio.
            let actual = step.arg_count();

            // Action ausente é falha imediata; não há aridade para comparar.
            let Some(action) = actions.get(&step.name) else {
                let err = ValidationError::ActionNotFound {
                    step: step.name.clone(),
                    scenario: scenario.name.clone(),
                };
                sink.emit(RunEvent::ActionNotFound {
                    scenario: scenario.name.clone(),
                    step: step.name.clone(),
                    code: err.code().formatted(),
                });
                return Err(err);
            };

            let expected = action.arity();
            if expected != actual {
                let err = ValidationError::ArityMismatch {
                    step: step.name.clone(),
                    scenario: scenario.name.clone(),
                    actual,
                    expected,
                };
                sink.emit(RunEvent::ArityMismatch {
                    scenario: scenario.name.clone(),
                    step: step.name.clone(),
                    code: err.code().formatted(),
                    actual,
                    expected,
                });
                return Err(err);
            }
        }
    }

    Ok(())
}

// ============================================================================
// TESTES
// ============================================================================
