use openapi_mcp_server::config::{
    remediation_message, Config, ConfigError, EnvironmentRegistry, ServerConfig,
};
use openapi_mcp_server::{create_app, run_server};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Existing environment variables take precedence over .env
    let dotenv = dotenvy::dotenv();

    init_tracing();

    if let Err(e) = dotenv {
        tracing::debug!("No .env file loaded: {}", e);
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<ConfigError>(), Some(ConfigError::NoEnvironments)) {
                eprintln!("{}", remediation_message());
            } else {
                eprintln!("Fatal error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let server = ServerConfig::default();
    println!("Starting {}...", server.name);
    println!("Server name: {}", server.name);

    let lookup = |key: &str| std::env::var(key).ok();

    // Environments are checked before any other setting is parsed
    let registry = EnvironmentRegistry::from_lookup(&lookup)?;
    registry.validate_non_empty()?;
    registry.validate_default()?;

    let config = Config::with_registry(registry, &lookup)?;

    for line in config.registry.describe() {
        println!("{}", line);
    }

    info!(
        environments = config.registry.environments().len(),
        default_environment = %config.registry.default_environment(),
        port = config.port,
        insecure_tls = config.tls.accept_invalid_certs,
        "Configuration loaded"
    );

    let config = Arc::new(config);
    let app = create_app(Arc::clone(&config))?;

    run_server(app, config.port, &config.server.name).await?;
    Ok(())
}

/// LOG_FORMAT=json for structured logs, anything else for human-readable output
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "openapi_mcp_server=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
