//! # Módulo de Erros Estruturados
//!
//! Define os três tipos de erro do runner e os códigos estruturados
//! usados em logs e no relatório de execução.
//!
//! ## Para todos entenderem:
//!
//! Cada fase do runner tem seu próprio tipo de erro:
//!
//! | Fase        | Tipo              | Fatal? | Como aparece                 |
//! |-------------|-------------------|--------|------------------------------|
//! | Carregamento| `LoadError`       | Sim    | `Err` no construtor          |
//! | Validação   | `ValidationError` | Não    | `validate()` retorna `false` |
//! | Dispatch    | `DispatchError`   | Não    | Step marcado como falho      |
//!
//! ## Faixas de código
//!
//! | Faixa  | Fase         | Descrição                          |
//! |--------|--------------|------------------------------------|
//! | E1xxx  | Carregamento | Arquivo de teste ilegível/inválido |
//! | E2xxx  | Validação    | Action ausente ou aridade errada   |
//! | E3xxx  | Dispatch     | Falha ao chamar uma action         |
//! | E4xxx  | Limites      | Teste excede limites de execução   |
//!
//! ## Exemplo:
//!
//! ```text
//! [E2002] Invalid args for action 'ping' in scenario 'smoke': total args = 2, expected args = 1
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// CÓDIGO DE ERRO
// ============================================================================

/// Código de erro estruturado.
///
/// O primeiro dígito é a fase (1-4), os três últimos
/// identificam o erro específico.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // ========================================================================
    // E1xxx: Carregamento
    // ========================================================================

    /// Arquivo de teste não encontrado ou sem permissão de leitura.
    pub const TEST_FILE_UNREADABLE: Self = Self(1001);

    /// JSON inválido ou estrutura incompatível (ex: falta `test` ou `name`).
    pub const INVALID_TEST_FORMAT: Self = Self(1002);

    /// `flow.loop` menor que 1.
    pub const INVALID_LOOP: Self = Self(1003);

    // ========================================================================
    // E2xxx: Validação
    // ========================================================================

    /// Step referencia uma action que não foi importada.
    pub const ACTION_NOT_REGISTERED: Self = Self(2001);

    /// Número de argumentos diferente da aridade da action.
    pub const ARITY_MISMATCH: Self = Self(2002);

    // ========================================================================
    // E3xxx: Dispatch
    // ========================================================================

    /// Action ausente no momento da chamada.
    pub const DISPATCH_ACTION_NOT_FOUND: Self = Self(3001);

    /// Argumento com tipo ou valor que a action não aceita.
    pub const INVALID_ARGUMENT: Self = Self(3002);

    /// A action executou e retornou erro.
    pub const ACTION_FAILED: Self = Self(3003);

    // ========================================================================
    // E4xxx: Limites
    // ========================================================================

    /// Teste excede algum limite de `ExecutionLimits`.
    pub const LIMIT_EXCEEDED: Self = Self(4001);

    /// Retorna o código numérico.
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Código formatado com prefixo "E" (ex: "E2002").
    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

// ============================================================================
// ERROS DE CARREGAMENTO
// ============================================================================

/// Falha ao construir o runner a partir de um arquivo de teste.
///
/// Sempre fatal: sem um teste parseado não há o que validar nem executar.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Arquivo não existe ou não pode ser lido.
    #[error("Failed to read test file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON malformado, campo `test` ausente, step sem `name`, tipos errados...
    #[error("Failed to parse test ({origin}): {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// `flow.loop` precisa ser pelo menos 1.
    #[error("{scope} '{name}': flow.loop must be >= 1 (got {value})")]
    InvalidLoop {
        scope: &'static str,
        name: String,
        value: u32,
    },
}

impl LoadError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::TEST_FILE_UNREADABLE,
            Self::Parse { .. } => ErrorCode::INVALID_TEST_FORMAT,
            Self::InvalidLoop { .. } => ErrorCode::INVALID_LOOP,
        }
    }
}

// ============================================================================
// ERROS DE VALIDAÇÃO
// ============================================================================

/// Primeiro problema encontrado pela validação de aridade.
///
/// A validação para no primeiro erro, então nunca existe mais de um.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Nenhuma action registrada com o nome do step.
    #[error("Step '{step}' in scenario '{scenario}': action is not registered")]
    ActionNotFound { step: String, scenario: String },

    /// Quantidade de argumentos declarada difere da aridade da action.
    #[error(
        "Invalid args for action '{step}' in scenario '{scenario}': total args = {actual}, expected args = {expected}"
    )]
    ArityMismatch {
        step: String,
        scenario: String,
        actual: usize,
        expected: usize,
    },
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ActionNotFound { .. } => ErrorCode::ACTION_NOT_REGISTERED,
            Self::ArityMismatch { .. } => ErrorCode::ARITY_MISMATCH,
        }
    }
}

// ============================================================================
// ERROS DE DISPATCH
// ============================================================================

/// Falha ao chamar uma action. Nunca interrompe a execução.
#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("Action '{0}' is not registered")]
    ActionNotFound(String),

    #[error("Invalid argument for '{action}': {message}")]
    InvalidArgument { action: String, message: String },

    #[error("Action '{action}' failed: {message}")]
    Failed { action: String, message: String },
}

impl DispatchError {
    pub fn invalid_argument(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ActionNotFound(_) => ErrorCode::DISPATCH_ACTION_NOT_FOUND,
            Self::InvalidArgument { .. } => ErrorCode::INVALID_ARGUMENT,
            Self::Failed { .. } => ErrorCode::ACTION_FAILED,
        }
    }
}
