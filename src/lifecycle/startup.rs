//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the first deployment
//! - Start background tasks (metrics, config watcher, signal listeners)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{self, JoinError};

use crate::adapter::{Adapter, AdapterError};
use crate::config::{load_config, AdapterConfig, ConfigWatcher};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("initial deployment failed: {0}")]
    Deployment(#[from] AdapterError),

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("deployment task failed: {0}")]
    Join(#[from] JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Deploy, bind and serve until SIGINT/SIGTERM.
///
/// With `config_path` set, SIGHUP reloads the file and redeploys; with
/// `deployment.hot_reload` also set, so does any change to the file.
pub async fn serve(
    adapter: Arc<Adapter>,
    config: AdapterConfig,
    config_path: Option<PathBuf>,
) -> Result<(), StartupError> {
    // The deploy function is user code and may block.
    let deploying = adapter.clone();
    let initial = config.clone();
    task::spawn_blocking(move || deploying.start(&initial)).await??;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_shutdown_listener(shutdown.clone());

    // Held until the server stops; dropping it stops file events.
    let mut _watcher = None;
    if let Some(path) = &config_path {
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        signals::spawn_reload_listener(reload_tx, shutdown.clone());
        spawn_reload_on_request(adapter.clone(), path.clone(), reload_rx);

        if config.deployment.hot_reload {
            let (watcher, updates) = ConfigWatcher::new(path);
            _watcher = Some(watcher.run()?);
            spawn_redeploy_on_change(adapter.clone(), updates);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let server = HttpServer::new(config, adapter.handler());
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}

/// Redeploy with each validated configuration the watcher forwards.
fn spawn_redeploy_on_change(
    adapter: Arc<Adapter>,
    mut updates: mpsc::UnboundedReceiver<AdapterConfig>,
) {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            let adapter = adapter.clone();
            // Failures are logged by the adapter; the old routes keep serving.
            if let Err(e) = task::spawn_blocking(move || adapter.redeploy(&config)).await {
                tracing::error!(error = %e, "Redeploy task failed");
            }
        }
    });
}

/// Reload the config file and redeploy on each request (SIGHUP).
fn spawn_reload_on_request(
    adapter: Arc<Adapter>,
    path: PathBuf,
    mut requests: mpsc::UnboundedReceiver<()>,
) {
    tokio::spawn(async move {
        while requests.recv().await.is_some() {
            reload(adapter.clone(), path.clone()).await;
        }
    });
}

/// Load `path` and redeploy, off the async workers.
async fn reload(adapter: Arc<Adapter>, path: PathBuf) {
    let outcome = task::spawn_blocking(move || match load_config(&path) {
        Ok(config) => {
            let _ = adapter.redeploy(&config);
        }
        Err(e) => tracing::error!(
            path = ?path,
            error = %e,
            "Failed to reload config, keeping current deployment"
        ),
    })
    .await;
    if let Err(e) = outcome {
        tracing::error!(error = %e, "Reload task failed");
    }
}
