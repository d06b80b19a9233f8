//! Main binary for the notification fan-out service
//!
//! Serves the HTTP API, runs the per-channel worker pools and the scheduler
//! loop, and shuts all of them down on SIGINT or SIGTERM.

use notification_fanout::{config::NotificationConfig, NotificationService};

use axum::serve;
use clap::{Arg, ArgMatches, Command};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env file: {}", e);
        }
    }

    let matches = create_cli().get_matches();

    init_tracing(log_format(&matches))?;

    let config = load_config(&matches)?;

    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        e
    })?;

    info!("Starting notification fan-out service");
    info!(
        "Configuration: Server {}:{}",
        config.server.host, config.server.port
    );
    info!(
        "Senders: Email={}, Chat={}, APNs={}, FCM={}, fallback dir={}",
        config.email.enabled,
        config.chat.enabled,
        config.push.apns.enabled,
        config.push.fcm.enabled,
        config.fallback.directory
    );
    if config.server.api_key.is_none() {
        warn!("No API key configured, API routes are unauthenticated");
    }

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .map_err(|e| format!("Invalid host address: {}", e))?,
        config.server.port,
    );

    let service = NotificationService::new(config).await.map_err(|e| {
        error!("Failed to initialize notification service: {}", e);
        e
    })?;
    let app = service.router();
    let cancellation_token = service.shutdown_token();

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!("Notification service started successfully on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Metrics: http://{}/metrics", addr);

    let server_task = tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            let server = serve(listener, app)
                .with_graceful_shutdown(async move { cancellation_token.cancelled().await });
            if let Err(e) = server.await {
                error!("Server error: {}", e);
            }
        }
    });

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    service.shutdown().await;

    if let Err(e) = server_task.await {
        error!("Server task error during shutdown: {}", e);
    }

    info!("Notification service stopped gracefully");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn log_format(matches: &ArgMatches) -> LogFormat {
    match matches.get_one::<String>("log-format").map(String::as_str) {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "notification_fanout=info,tower_http=info,axum=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init()?,
    }

    Ok(())
}

/// Create CLI argument parser
fn create_cli() -> Command {
    Command::new("notification-fanout-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Notification fan-out service - email, chat and push delivery")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Server host address"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .default_value("pretty")
                .help("Log output format"),
        )
}

/// Load configuration from file and environment, then apply CLI overrides
fn load_config(
    matches: &ArgMatches,
) -> Result<NotificationConfig, Box<dyn std::error::Error + Send + Sync>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(config_file) => {
            info!("Loading configuration from file: {}", config_file);
            NotificationConfig::load(Some(config_file))
                .map_err(|e| format!("Failed to load configuration from file: {}", e))?
        }
        None => {
            info!("Using default configuration with environment overrides");
            NotificationConfig::from_env()
                .map_err(|e| format!("Failed to load configuration: {}", e))?
        }
    };

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }

    if let Some(port_str) = matches.get_one::<String>("port") {
        config.server.port = port_str
            .parse()
            .map_err(|e| format!("Invalid port number '{}': {}", port_str, e))?;
    }

    Ok(config)
}

/// Wait for shutdown signals
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
