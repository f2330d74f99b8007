use std::{net::SocketAddr, path::Path, sync::Arc};

use bankgate::{
    GatewayHandler, GatewayService, HttpClient, InMemoryAccountStore, PeerHttpClient,
    StaticServiceRegistry,
    config::{GatewayConfigValidator, loader::load_config},
    core::{CustomerAggregator, Dispatcher},
    tracing_setup,
    utils::GracefulShutdown,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "bankgate.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "bankgate.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "bankgate.toml")]
        config: String,
    },
    /// Start the gateway (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "bankgate.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config),
    };

    match command {
        "validate" => return validate_config_command(&config_path),
        "init" => return init_config_command(&config_path).await,
        "serve" => {}
        _ => unreachable!(),
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loading configuration from {config_path}");
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    GatewayConfigValidator::validate(&config).wrap_err("Configuration rejected")?;

    let config = Arc::new(config);
    let gateway = Arc::new(
        GatewayService::new(config.clone()).map_err(|e| eyre!("Failed to build gateway: {e}"))?,
    );

    let http_client: Arc<dyn HttpClient> =
        Arc::new(PeerHttpClient::new().context("Failed to create peer HTTP client")?);
    let registry = Arc::new(StaticServiceRegistry::new(&config.services));
    let store = Arc::new(InMemoryAccountStore::new(config.accounts.clone()));
    tracing::info!(accounts = store.len(), "seeded in-memory account store");

    let dispatcher = Arc::new(Dispatcher::new(
        http_client.clone(),
        registry.clone(),
        gateway.client_timeout(),
    ));
    let aggregator = Arc::new(CustomerAggregator::new(
        store,
        dispatcher,
        gateway.breakers(),
    ));
    let handler = Arc::new(GatewayHandler::new(
        gateway.clone(),
        http_client,
        registry,
        aggregator,
    ));

    let graceful_shutdown = Arc::new(GracefulShutdown::new());

    use std::convert::Infallible;

    use axum::{Router, body::Body, extract::Request, response::Response, routing::any};

    let make_request_route = |handler: Arc<GatewayHandler>| {
        any(move |req: Request| {
            let handler = handler.clone();
            async move {
                match handler.handle_request(req).await {
                    Ok(response) => Ok::<Response<Body>, Infallible>(response),
                    Err(e) => {
                        tracing::error!("Request handling error: {:?}", e);
                        let error_response = Response::builder()
                            .status(500)
                            .body(Body::from("Internal Server Error"))
                            .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")));
                        Ok(error_response)
                    }
                }
            }
        })
    };

    let app = Router::new()
        .route("/{*path}", make_request_route(handler.clone()))
        .route("/", make_request_route(handler.clone()));

    for rule in &config.routes {
        tracing::info!(
            pattern = %rule.pattern,
            service = %rule.service,
            "configured route"
        );
    }

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!(
        "Bankgate listening on {} ({} routes, {} services)",
        addr,
        config.routes.len(),
        config.services.len()
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Server error")?;
        }
        shutdown_reason = graceful_shutdown.wait_for_shutdown_signal() => {
            tracing::info!("Shutdown signal received: {:?}", shutdown_reason);
        }
    }

    tracing::info!("Bankgate stopped");
    Ok(())
}

/// Validate configuration file and exit
fn validate_config_command(config_path: &str) -> Result<()> {
    println!("Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("Error: configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("Configuration parsing failed:\n   {e}");
            std::process::exit(1);
        }
    };

    match GatewayConfigValidator::validate(&config) {
        Ok(()) => {
            println!("Configuration validation: OK");
            println!();
            println!("Summary:");
            println!("   Listen Address: {}", config.listen_addr);
            println!("   Routes: {}", config.routes.len());
            println!("   Services: {}", config.services.len());
            println!(
                "   Breaker: {} failures / {} open",
                config.breaker.failure_threshold, config.breaker.open_duration
            );
            println!("   Rate limit buckets: {}", config.rate_limits.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration validation failed:\n{e}");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file with the default bank routing table
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("Error: configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Bankgate configuration

listen_addr = "127.0.0.1:8072"

# Ordered routing table: first match wins.
[[routes]]
pattern = "/bank/accounts/(?<segment>.*)"
rewrite = "/${segment}"
service = "ACCOUNTS"

[[routes]]
pattern = "/bank/loans/(?<segment>.*)"
rewrite = "/${segment}"
service = "LOANS"

[[routes]]
pattern = "/bank/cards/(?<segment>.*)"
rewrite = "/${segment}"
service = "CARDS"

# Logical service names resolved to base addresses.
[services.ACCOUNTS]
base_url = "http://localhost:8080"

[services.LOANS]
base_url = "http://localhost:8090"

[services.CARDS]
base_url = "http://localhost:9000"

[breaker]
failure_threshold = 5
open_duration = "30s"

[rate_limits.sayHello]
requests = 2
period = "5s"

[client]
timeout = "2s"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("Created default configuration at: {config_path}");
    println!("   Run 'bankgate serve --config {config_path}' to start the gateway");
    Ok(())
}

// Sanity check: the generated default config must round-trip through the
// loader and validator.
#[cfg(test)]
mod tests {
    use bankgate::config::models::GatewayConfig;

    use super::*;

    #[tokio::test]
    async fn init_then_validate_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bankgate.toml");
        let path_str = path.to_str().unwrap();

        init_config_command(path_str).await.unwrap();
        let config: GatewayConfig = load_config(path_str).unwrap();
        GatewayConfigValidator::validate(&config).unwrap();
        assert_eq!(config.routes.len(), 3);
    }
}
