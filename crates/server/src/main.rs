use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelwork_core::{
    create_artifact_store, create_authenticator, housekeeping, load_config, validate_config,
    Authenticator, Dispatcher, Downloader, FfmpegRunner, JobStore, PipelineEngine,
    ProcessRunner, SqliteJobStore,
};
use reelwork_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("REELWORK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);
    info!("Work dir: {:?}", config.storage.work_dir);

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Prepare scratch space
    let work_dir = config.storage.work_dir.clone();
    let log_dir = config.storage.log_dir();
    tokio::fs::create_dir_all(&log_dir)
        .await
        .with_context(|| format!("Failed to create work dir {:?}", log_dir))?;

    // Create SQLite job store and recover from an unclean shutdown
    let store = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");
    housekeeping::recover_interrupted_jobs(store.as_ref())
        .context("Failed to recover interrupted jobs")?;
    housekeeping::sweep_work_root(&work_dir, Duration::ZERO, store.as_ref())
        .await
        .context("Failed to clear leftover working directories")?;

    // Create ffmpeg runner
    let runner: Arc<dyn ProcessRunner> =
        Arc::new(FfmpegRunner::new(config.runner.clone(), log_dir));
    match runner.validate().await {
        Ok(()) => info!("ffmpeg found at {:?}", config.runner.ffmpeg_path),
        Err(e) => warn!("ffmpeg is not usable, jobs will fail: {}", e),
    }

    // Create transfer clients
    let downloader =
        Downloader::new(&config.transfer).context("Failed to create download client")?;
    let artifacts =
        create_artifact_store(config.upload.as_ref()).context("Failed to create artifact store")?;
    let upload_configured = artifacts.is_configured();
    if upload_configured {
        info!("Artifact store: {}", artifacts.name());
    } else {
        warn!("No upload section configured, every job will fail at its upload step");
    }

    // Create pipeline engine and dispatcher
    let engine = PipelineEngine::new(
        Arc::clone(&runner),
        downloader,
        artifacts,
        work_dir,
        config.runner.clone(),
    );
    let dispatcher = Arc::new(Dispatcher::new(
        config.workers.clone(),
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::new(engine),
    ));
    info!(
        "Worker pool: {} concurrent, {} queued",
        config.workers.max_concurrent_jobs, config.workers.max_queued_jobs
    );

    // Start janitor
    let (shutdown_tx, _) = broadcast::channel(1);
    let janitor = housekeeping::spawn_janitor(
        config.storage.clone(),
        Arc::clone(&store) as Arc<dyn JobStore>,
        shutdown_tx.subscribe(),
    );

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        dispatcher,
        runner,
        upload_configured,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // Jobs still running are failed by recovery on the next start
    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    let _ = janitor.await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
