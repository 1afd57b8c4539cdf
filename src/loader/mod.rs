//! # Módulo de Carregamento - Leitura de Arquivos de Teste
//!
//! Este módulo é responsável por **ler, parsear e checar a estrutura**
//! dos documentos JSON de teste.
//!
//! ## O que este módulo faz?
//!
//! 1. Lê o conteúdo de um arquivo do sistema de arquivos
//! 2. Converte o JSON em estruturas Rust (deserialização)
//! 3. Rejeita valores de `flow.loop` menores que 1
//! 4. Retorna um `LoadError` claro se algo der errado
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! use testflow::loader::load_test_from_file;
//!
//! let test = load_test_from_file("./tests/smoke.json")?;
//! println!("Teste carregado: {}", test.name);
//! ```
//!
//! Um step sem `name` é um erro de parse aqui, nunca uma falha
//! de lookup durante a execução.

use crate::errors::LoadError;
use crate::protocol::{FlowOverrides, TestDocument, TestSpec};
use std::fs;
use std::path::Path;

/// Carrega um teste de um arquivo JSON.
///
/// ## Retorno:
/// - `Ok(TestSpec)`: teste carregado e checado
/// - `Err(LoadError::Read)`: arquivo não existe ou sem permissão
/// - `Err(LoadError::Parse)`: JSON malformado ou estrutura inválida
/// - `Err(LoadError::InvalidLoop)`: algum `flow.loop` é 0
pub fn load_test_from_file<P: AsRef<Path>>(path: P) -> Result<TestSpec, LoadError> {
    let path_ref = path.as_ref();

    let content = fs::read_to_string(path_ref).map_err(|source| LoadError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;

    parse_test(&content, &path_ref.display().to_string())
}

/// Parseia um documento de teste já em memória.
///
/// `origin` só aparece nas mensagens de erro (caminho do arquivo,
/// `"<inline>"`, etc).
pub fn parse_test(content: &str, origin: &str) -> Result<TestSpec, LoadError> {
    let document: TestDocument =
        serde_json::from_str(content).map_err(|source| LoadError::Parse {
            origin: origin.to_string(),
            source,
        })?;

    check_structure(&document.test)?;
    Ok(document.test)
}

/// Garante que todo `flow.loop` declarado é pelo menos 1.
///
/// Tipos errados (loop negativo, string, etc) já falham no parse;
/// aqui sobra apenas o caso `0`, que o serde aceita como `u32`.
fn check_structure(test: &TestSpec) -> Result<(), LoadError> {
    for scenario in &test.scenarios {
        check_loop(scenario.flow.as_ref(), "Scenario", &scenario.name)?;
        for step in scenario.steps() {
            check_loop(step.flow.as_ref(), "Step", &step.name)?;
        }
    }
    Ok(())
}

fn check_loop(
    flow: Option<&FlowOverrides>,
    scope: &'static str,
    name: &str,
) -> Result<(), LoadError> {
    match flow.and_then(|f| f.loop_count) {
        Some(0) => Err(LoadError::InvalidLoop {
            scope,
            name: name.to_string(),
            value: 0,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_file() {
        let file = write_temp(
            r#"{"test":{"name":"t","scenarios":[{"name":"s","flow":{"loop":2},"steps":[{"name":"ping","args":{"x":1}}]}]}}"#,
        );

        let test = load_test_from_file(file.path()).unwrap();

        assert_eq!(test.name, "t");
        assert_eq!(test.scenarios.len(), 1);
        assert_eq!(test.scenarios[0].steps().len(), 1);
        assert_eq!(test.scenarios[0].steps()[0].name, "ping");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_test_from_file(dir.path().join("missing.json"));
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let file = write_temp("{ not json");
        let result = load_test_from_file(file.path());
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_missing_test_field_is_parse_error() {
        let result = parse_test(r#"{"name":"t","scenarios":[]}"#, "<inline>");
        match result {
            Err(LoadError::Parse { origin, .. }) => assert_eq!(origin, "<inline>"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_step_without_name_is_parse_error() {
        let result = parse_test(
            r#"{"test":{"name":"t","scenarios":[{"name":"s","steps":[{"args":{}}]}]}}"#,
            "<inline>",
        );
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_missing_scenarios_defaults_to_empty() {
        let test = parse_test(r#"{"test":{"name":"empty"}}"#, "<inline>").unwrap();
        assert!(test.scenarios.is_empty());
    }

    #[test]
    fn test_zero_loop_rejected() {
        let result = parse_test(
            r#"{"test":{"name":"t","scenarios":[{"name":"s","steps":[{"name":"a","flow":{"loop":0}}]}]}}"#,
            "<inline>",
        );
        match result {
            Err(LoadError::InvalidLoop { scope, name, value }) => {
                assert_eq!(scope, "Step");
                assert_eq!(name, "a");
                assert_eq!(value, 0);
            }
            other => panic!("expected invalid loop, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_scenario_loop_message() {
        let err = parse_test(
            r#"{"test":{"name":"t","scenarios":[{"name":"idle","flow":{"loop":0}}]}}"#,
            "<inline>",
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Scenario 'idle': flow.loop must be >= 1 (got 0)"
        );
    }

    #[test]
    fn test_negative_loop_rejected_by_parser() {
        let result = parse_test(
            r#"{"test":{"name":"t","scenarios":[{"name":"s","flow":{"loop":-1}}]}}"#,
            "<inline>",
        );
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }
}
