//! Hello World - greeting service
//!
//! Serves `GET /hello`, the content of the first row of the `messages` table.
//! The schema is created by the `migrate` binary.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use hello_world::{
    api,
    config::{LogFormat, LogTarget, LoggingConfig},
    db, AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("hello-world {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = init_logging(&config.logging);

    info!("Hello World starting up");

    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection pool initialized");

    let state = AppState {
        config: config.clone(),
        db,
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    api::routes()
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the logging/tracing infrastructure
fn init_logging(log_config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_config.level));

    let (file_writer, guard) = match log_config.target {
        LogTarget::Console => (None, None),
        LogTarget::File | LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            (Some(writer), Some(guard))
        }
    };
    let console = log_config.target != LogTarget::File;

    // One boxed fmt layer per output
    let mut layers = Vec::new();

    if console {
        layers.push(match log_config.format {
            LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
            LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .boxed(),
        });
    }

    if let Some(writer) = file_writer {
        layers.push(match log_config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_writer(writer)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(writer)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    guard
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Print help message
fn print_help() {
    println!(
        r#"hello-world {}

USAGE:
    hello-world [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information

ENVIRONMENT:
    DB_URL              SQLite connection string (required, e.g. sqlite://data/hello.db)
    HELLO_CONFIG        Path to configuration file (default: config.yaml)
    HELLO_HOST          Listen address (default: 0.0.0.0)
    HELLO_PORT          Listen port (default: 8080)

ENDPOINTS:
    GET /hello          Content of message 1 as plain text
    GET /health         Liveness and version

Run `migrate up` first to create the schema."#,
        env!("CARGO_PKG_VERSION")
    );
}
