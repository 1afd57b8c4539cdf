//! # Módulo de Telemetria
//!
//! Configura o `tracing-subscriber` do binário e, opcionalmente,
//! a exportação de spans via OpenTelemetry (OTLP/gRPC).
//!
//! ## Para todos entenderem:
//!
//! O runner nunca escreve logs diretamente: ele emite eventos para um
//! `EventSink`. O sink padrão (`TracingSink`) transforma esses eventos em
//! chamadas `tracing`, e é **este** módulo que decide para onde elas vão:
//!
//! - Console (formato compacto), filtrado por `RUST_LOG`
//! - Coletor OTLP (Jaeger, Tempo...), se `OTEL_EXPORTER_OTLP_ENDPOINT` existir
//!
//! Bibliotecas que usam o runner podem ignorar este módulo e instalar o
//! subscriber que quiserem.
//!
//! ## Configuração via variáveis de ambiente:
//!
//! - `OTEL_SERVICE_NAME`: Nome do serviço
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: URL do coletor OTLP
//! - `OTEL_TRACES_SAMPLER_ARG`: Taxa de sampling (0.0-1.0)
//! - `TESTFLOW_LOG_LEVEL`: Nível padrão quando `RUST_LOG` não existe
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! init_telemetry(TelemetryConfig::from_env())?;
//!
//! // ... executar testes ...
//!
//! shutdown_telemetry(); // Flush dos spans pendentes
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime::Tokio;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{trace as sdktrace, Resource};
use tracing::Level;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CONFIGURAÇÃO
// ============================================================================

/// Configuração do sistema de telemetria.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Nome do serviço para identificação nos traces.
    pub service_name: String,

    /// Endpoint OTLP para envio de traces.
    /// Se None, apenas loga para console.
    pub otlp_endpoint: Option<String>,

    /// Taxa de sampling (0.0 a 1.0).
    pub sampling_ratio: f64,

    /// Se deve habilitar logging para console.
    pub enable_console_logging: bool,

    /// Nível de log mínimo quando `RUST_LOG` não está definido.
    pub log_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "testflow".to_string(),
            otlp_endpoint: None,
            sampling_ratio: 1.0,
            enable_console_logging: true,
            log_level: Level::INFO,
        }
    }
}

impl TelemetryConfig {
    /// Cria configuração a partir de variáveis de ambiente.
    ///
    /// Valores inválidos são ignorados e o padrão é mantido.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.otlp_endpoint = Some(endpoint);
        }

        if let Ok(ratio) = std::env::var("OTEL_TRACES_SAMPLER_ARG") {
            if let Ok(r) = ratio.parse::<f64>() {
                config.sampling_ratio = r.clamp(0.0, 1.0);
            }
        }

        if let Some(level) = std::env::var("TESTFLOW_LOG_LEVEL")
            .ok()
            .and_then(|raw| parse_level(&raw))
        {
            config.log_level = level;
        }

        config
    }
}

/// Converte "debug", "INFO", "warn"... em `Level`.
fn parse_level(raw: &str) -> Option<Level> {
    raw.trim().parse().ok()
}

// ============================================================================
// INICIALIZAÇÃO
// ============================================================================

/// Inicializa o subscriber global.
///
/// ## Retorno:
///
/// - `Ok(Some(Tracer))`: OTLP configurado, tracer retornado
/// - `Ok(None)`: Apenas console logging (sem OTLP)
/// - `Err`: Erro ao configurar o exporter
///
/// Deve ser chamada uma única vez, dentro do runtime Tokio.
pub fn init_telemetry(config: TelemetryConfig) -> anyhow::Result<Option<Tracer>> {
    // Primeiro tenta ler de RUST_LOG, senão usa o nível configurado.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(endpoint) = &config.otlp_endpoint {
        let tracer = init_otlp_tracer(&config.service_name, endpoint, config.sampling_ratio)?;
        let telemetry_layer = OpenTelemetryLayer::new(tracer.clone());

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(telemetry_layer);

        if config.enable_console_logging {
            subscriber
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        } else {
            subscriber.init();
        }

        tracing::info!(
            service_name = %config.service_name,
            endpoint = %endpoint,
            sampling_ratio = config.sampling_ratio,
            "OTEL telemetry initialised"
        );

        Ok(Some(tracer))
    } else {
        let subscriber = tracing_subscriber::registry().with(env_filter);

        if config.enable_console_logging {
            subscriber
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        } else {
            subscriber.init();
        }

        tracing::debug!("Telemetry initialised (console only, no OTLP)");
        Ok(None)
    }
}

/// Cria um tracer com OTLP exporter (gRPC via tonic) e o registra globalmente.
fn init_otlp_tracer(
    service_name: &str,
    endpoint: &str,
    sampling_ratio: f64,
) -> anyhow::Result<Tracer> {
    let sampler = if sampling_ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if sampling_ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(sampling_ratio)
    };

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .build_span_exporter()?,
            Tokio,
        )
        .with_config(
            sdktrace::Config::default()
                .with_sampler(sampler)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )])),
        )
        .build();

    let tracer = tracer_provider.tracer(service_name.to_string());
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}

/// Encerra a telemetria, fazendo flush dos spans pendentes.
///
/// **IMPORTANTE**: o batch exporter acumula spans em memória; sem esta
/// chamada antes de sair, eles se perdem.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
