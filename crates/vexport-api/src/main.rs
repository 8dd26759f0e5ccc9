//! Video processing server binary.
//!
//! Serves the HTTP/WebSocket API and runs the queue scheduler in-process.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vexport_api::{create_router, metrics, ApiConfig, AppState};
use vexport_queue::JobQueue;
use vexport_worker::{EffectsProcessor, QueueScheduler, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    init_tracing();

    info!("Starting vexport-api");

    // Load configuration
    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    info!("Worker config: {:?}", worker_config);

    if let Err(e) = vexport_media::check_ffmpeg() {
        warn!("{}; jobs will fail until it is installed", e);
    }

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                error!("Failed to install Prometheus recorder: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let queue = Arc::new(JobQueue::new());

    let processor = match EffectsProcessor::new(&worker_config) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!("Failed to create effects processor: {}", e);
            std::process::exit(1);
        }
    };

    // Start the scheduler
    let scheduler = Arc::new(QueueScheduler::new(
        Arc::clone(&queue),
        processor,
        &worker_config,
    ));
    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    // Create router
    let state = AppState::new(config.clone(), queue);
    let app = create_router(state, metrics_handle);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    // Let the processing job finish, up to the shutdown timeout
    scheduler.shutdown();
    match tokio::time::timeout(worker_config.shutdown_timeout, scheduler_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!("Scheduler error: {}", e),
        Ok(Err(e)) => error!("Scheduler task failed: {}", e),
        Err(_) => warn!("Scheduler did not stop within the shutdown timeout"),
    }

    info!("Server shutdown complete");
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vexport=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
