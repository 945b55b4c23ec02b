//! # Hash Web Server Binary
//!
//! Runs the hash service until `/shutdown` is requested or the process
//! receives SIGINT/SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! # Listen on the default 127.0.0.1:8080
//! hash-web
//!
//! # Listen on another address
//! hash-web 0.0.0.0:9000
//!
//! # Make digests available only after five real seconds
//! hash-web --visibility elapsed --visibility-delay 5
//!
//! # With environment variables
//! export HASH_WEB_BIND_ADDR=0.0.0.0:8080
//! export LOG_LEVEL=debug
//! hash-web
//! ```

use hash_web::{server::ServerConfig, HashWebServer, ShutdownHandle};
use std::process;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main entry point for the hash web server
///
/// ## Exit Codes
/// - 0: Clean shutdown
/// - 1: Configuration or runtime setup error
/// - 2: Critical server error
/// - 3: Other server error
fn main() {
    let config = ServerConfig::from_args();

    if let Err(e) = setup_logging(&config) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    info!("Starting Hash Web Server v{}", hash_web::VERSION);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e.internal_message());
        process::exit(1);
    }

    display_startup_info(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.get_worker_threads())
        .thread_name("hash-web-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build Tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let exit_code = runtime.block_on(run(config));
    process::exit(exit_code);
}

/// Serve until shutdown and map the outcome to an exit code
async fn run(config: ServerConfig) -> i32 {
    let server = HashWebServer::new(config);
    let shutdown = server.shutdown_handle();

    tokio::spawn(forward_shutdown_signals(shutdown));

    match server.start().await {
        Ok(()) => {
            info!("Server shut down cleanly");
            0
        }
        Err(e) => {
            error!("Server error: {}", e.internal_message());
            if e.is_critical() {
                2
            } else {
                3
            }
        }
    }
}

/// Setup structured logging based on configuration
///
/// ## Log Format
/// - **Development**: Pretty-printed with colors
/// - **Production** (`ENVIRONMENT=production`): JSON lines
fn setup_logging(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let is_production = std::env::var("ENVIRONMENT")
        .map(|env| env.to_lowercase() == "production")
        .unwrap_or(false);

    let env_filter = EnvFilter::builder()
        .with_default_directive(config.log_level.level().into())
        .from_env()?
        .add_directive("hyper=info".parse()?)
        .add_directive("tokio=info".parse()?)
        .add_directive("mio=warn".parse()?);

    if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();

        info!("Initialized structured JSON logging for production");
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();

        info!("Initialized pretty-printed logging for development");
    }

    Ok(())
}

/// Trigger server shutdown on SIGINT or SIGTERM
async fn forward_shutdown_signals(shutdown: ShutdownHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        },
        () = terminate => {
            info!("Received SIGTERM");
        },
    }

    shutdown.trigger();
}

/// Log a configuration summary and the endpoint URLs
fn display_startup_info(config: &ServerConfig) {
    info!("=== Hash Web Server Configuration ===");
    info!("Version: {}", hash_web::VERSION);
    info!("Bind Address: {}", config.bind_addr);
    info!("Log Level: {}", config.log_level);
    info!("Max Payload Size: {} bytes", config.max_payload_size);
    info!("Request Timeout: {}ms", config.request_timeout_ms);
    info!("Worker Threads: {}", config.get_worker_threads());
    info!(
        "Visibility: {} ({}s)",
        config.visibility_policy, config.visibility_delay_secs
    );

    info!("Submit endpoint: http://{}/hash", config.bind_addr);
    info!("Fetch endpoint: http://{}/hash/{{key}}", config.bind_addr);
    info!("Stats endpoint: http://{}/stats", config.bind_addr);

    if config.enable_health_check {
        info!("Health endpoint: http://{}/health", config.bind_addr);
    }

    if config.enable_metrics {
        info!("Metrics endpoint: http://{}/metrics", config.bind_addr);
    }
    info!("=====================================");
}
