use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlister_core::{
    load_config, validate_config, AutomationPipeline, Dispatcher, GpmController, LockRegistry,
    MemoryStatusStore, ResultRecorder, SessionController, SqliteRecorder, StatusStore,
    WebDriverFactory,
};
use playlister_server::{api::create_router, state::AppState};

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
    let config_path = std::env::var("PLAYLISTER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Session controller: {}", config.controller.base_url);

    // Remote session controller and driver attachment
    let controller: Arc<dyn SessionController> = Arc::new(
        GpmController::new(config.controller.clone())
            .context("Failed to create session controller client")?,
    );
    let drivers = Arc::new(
        WebDriverFactory::new(config.webdriver.clone())
            .context("Failed to create WebDriver factory")?,
    );
    match &config.webdriver.url {
        Some(url) => info!("Using WebDriver endpoint at {}", url),
        None => info!("WebDriver binaries will be spawned per session"),
    }

    // Result recorder
    let recorder: Arc<dyn ResultRecorder> = Arc::new(
        SqliteRecorder::new(&config.database.path).context("Failed to create result recorder")?,
    );
    info!("Result recorder initialized");

    // Status store with background expiry
    let memory_store = Arc::new(MemoryStatusStore::new());
    let sweeper = Arc::clone(&memory_store).spawn_sweeper(config.status.sweep_interval());
    let status_store: Arc<dyn StatusStore> = memory_store;

    // Pipeline and dispatcher
    let pipeline = Arc::new(AutomationPipeline::new(
        Arc::clone(&controller),
        drivers,
        Arc::new(LockRegistry::new()),
        Arc::clone(&recorder),
        config.automation.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::spawn(
        pipeline,
        Arc::clone(&status_store),
        config.dispatcher.clone(),
        config.status.ttl(),
    ));
    info!(
        "Dispatcher ready (default concurrency {}, max {})",
        config.dispatcher.default_concurrency, config.dispatcher.max_concurrency
    );

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&dispatcher),
        status_store,
        recorder,
        controller,
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
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let running jobs finish and clean up their sessions
    info!("Server shutting down, waiting for running jobs...");
    dispatcher.drain().await;
    sweeper.abort();
    info!("All jobs finished");

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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
