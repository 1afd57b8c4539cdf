//! # Módulo de Limites de Execução
//!
//! Define limites para proteger o runner contra testes que nunca
//! terminariam na prática (ex: `"loop": 4000000000`).
//!
//! ## Para todos entenderem:
//!
//! Loops se multiplicam: um cenário com `loop: 1000` e um step com
//! `loop: 1000` geram **um milhão** de chamadas. Este módulo calcula
//! esse total antes de executar e recusa o teste se passar do limite.
//!
//! ## Limites configuráveis:
//!
//! | Limite         | Padrão  | Descrição                                  |
//! |----------------|---------|--------------------------------------------|
//! | max_loop       | 10000   | Maior `flow.loop` aceito (cenário ou step) |
//! | max_steps      | 1000    | Total de steps declarados no teste         |
//! | max_dispatches | 100000  | Total de chamadas no pior caso             |
//!
//! Só contam loops que geram chamadas: cenários ou steps desabilitados e
//! cenários sem steps nunca violam `max_loop` nem `max_dispatches`.
//!
//! O CLI só aplica estes limites com `--limits`; sem a flag, qualquer
//! documento válido roda.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorCode;
use crate::flow::FlowControl;
use crate::protocol::TestSpec;

// ============================================================================
// LIMITES PADRÃO (CONSTANTES)
// ============================================================================

/// Maior valor de `flow.loop` aceito.
pub const DEFAULT_MAX_LOOP: u32 = 10_000;

/// Número máximo de steps declarados no teste inteiro.
pub const DEFAULT_MAX_STEPS: usize = 1_000;

/// Número máximo de chamadas de action em uma execução.
pub const DEFAULT_MAX_DISPATCHES: u64 = 100_000;

// ============================================================================
// ESTRUTURA DE LIMITES
// ============================================================================

/// Configuração de limites de execução.
///
/// ## Exemplo de uso:
///
/// ```ignore
/// let limits = ExecutionLimits::default();
/// // Ou personalizado:
/// let limits = ExecutionLimits {
///     max_loop: 50,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maior `flow.loop` permitido em cenários e steps.
    pub max_loop: u32,

    /// Total de steps somando todos os cenários.
    pub max_steps: usize,

    /// Total de chamadas no pior caso (loops multiplicados).
    pub max_dispatches: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_loop: DEFAULT_MAX_LOOP,
            max_steps: DEFAULT_MAX_STEPS,
            max_dispatches: DEFAULT_MAX_DISPATCHES,
        }
    }
}

impl ExecutionLimits {
    /// Cria limites a partir de variáveis de ambiente.
    ///
    /// Variáveis suportadas:
    /// - `TESTFLOW_MAX_LOOP`: Maior loop aceito
    /// - `TESTFLOW_MAX_STEPS`: Máximo de steps
    /// - `TESTFLOW_MAX_DISPATCHES`: Máximo de chamadas
    ///
    /// Valores que não parseiam são ignorados (fica o padrão).
    pub fn from_env() -> Self {
        let mut limits = Self::default();

        if let Ok(val) = std::env::var("TESTFLOW_MAX_LOOP") {
            if let Ok(n) = val.parse() {
                limits.max_loop = n;
            }
        }

        if let Ok(val) = std::env::var("TESTFLOW_MAX_STEPS") {
            if let Ok(n) = val.parse() {
                limits.max_steps = n;
            }
        }

        if let Ok(val) = std::env::var("TESTFLOW_MAX_DISPATCHES") {
            if let Ok(n) = val.parse() {
                limits.max_dispatches = n;
            }
        }

        limits
    }

    /// Limites restritivos para CI.
    pub fn strict() -> Self {
        Self {
            max_loop: 100,
            max_steps: 50,
            max_dispatches: 1_000,
        }
    }

    /// Limites permissivos para testes de carga locais.
    pub fn relaxed() -> Self {
        Self {
            max_loop: 1_000_000,
            max_steps: 10_000,
            max_dispatches: 10_000_000,
        }
    }
}

// ============================================================================
// VALIDAÇÃO DE LIMITES
// ============================================================================

/// Resultado da validação de limites.
#[derive(Debug)]
pub struct LimitValidationResult {
    pub passed: bool,
    pub violations: Vec<LimitViolation>,
}

/// Violação de limite detectada.
#[derive(Debug, Clone)]
pub struct LimitViolation {
    /// Sempre `ErrorCode::LIMIT_EXCEEDED`.
    pub code: ErrorCode,
    /// Nome do limite violado.
    pub limit_name: String,
    /// Valor máximo permitido.
    pub limit_value: String,
    /// Valor encontrado no teste.
    pub actual_value: String,
    /// Mensagem descritiva.
    pub message: String,
}

/// Total de chamadas que o teste faria, no pior caso.
///
/// Soma, para cada cenário habilitado, `loop do cenário × Σ loop dos
/// steps habilitados`. Satura em `u64::MAX` em vez de estourar.
pub fn estimated_dispatches(test: &TestSpec) -> u64 {
    test.scenarios
        .iter()
        .map(|scenario| {
            let per_iteration: u64 = scenario
                .steps()
                .iter()
                .map(|step| FlowControl::resolve(step.flow.as_ref()).effective_iterations() as u64)
                .fold(0, u64::saturating_add);
            let iterations =
                FlowControl::resolve(scenario.flow.as_ref()).effective_iterations() as u64;
            iterations.saturating_mul(per_iteration)
        })
        .fold(0, u64::saturating_add)
}

/// Valida se um teste está dentro dos limites.
///
/// Diferente da validação de aridade, aqui **todas** as violações
/// são reportadas de uma vez.
pub fn validate_limits(test: &TestSpec, limits: &ExecutionLimits) -> LimitValidationResult {
    let mut violations = Vec::new();

    // Verifica limite de steps
    let step_count: usize = test.scenarios.iter().map(|s| s.steps().len()).sum();
    if step_count > limits.max_steps {
        violations.push(LimitViolation {
            code: ErrorCode::LIMIT_EXCEEDED,
            limit_name: "max_steps".to_string(),
            limit_value: limits.max_steps.to_string(),
            actual_value: step_count.to_string(),
            message: format!(
                "Test declares {} steps, maximum allowed is {}",
                step_count, limits.max_steps
            ),
        });
    }

    // Verifica os loops que de fato geram chamadas
    for scenario in &test.scenarios {
        let flow = FlowControl::resolve(scenario.flow.as_ref());
        if flow.effective_iterations() == 0 || scenario.steps().is_empty() {
            continue;
        }
        if flow.loop_count > limits.max_loop {
            violations.push(loop_violation("Scenario", &scenario.name, flow.loop_count, limits));
        }
        for step in scenario.steps() {
            let flow = FlowControl::resolve(step.flow.as_ref());
            if flow.effective_iterations() > limits.max_loop {
                violations.push(loop_violation("Step", &step.name, flow.loop_count, limits));
            }
        }
    }

    // Verifica total de chamadas
    let dispatches = estimated_dispatches(test);
    if dispatches > limits.max_dispatches {
        violations.push(LimitViolation {
            code: ErrorCode::LIMIT_EXCEEDED,
            limit_name: "max_dispatches".to_string(),
            limit_value: limits.max_dispatches.to_string(),
            actual_value: dispatches.to_string(),
            message: format!(
                "Test would dispatch up to {} calls, maximum allowed is {}",
                dispatches, limits.max_dispatches
            ),
        });
    }

    LimitValidationResult {
        passed: violations.is_empty(),
        violations,
    }
}

fn loop_violation(scope: &str, name: &str, value: u32, limits: &ExecutionLimits) -> LimitViolation {
    LimitViolation {
        code: ErrorCode::LIMIT_EXCEEDED,
        limit_name: "max_loop".to_string(),
        limit_value: limits.max_loop.to_string(),
        actual_value: value.to_string(),
        message: format!(
            "{} '{}' loops {} times, maximum allowed is {}",
            scope, name, value, limits.max_loop
        ),
    }
}

// ============================================================================
// TESTES
// ============================================================================
