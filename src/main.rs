//! Exchange adapter server.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum, request ID, timeout, body buffer)
//!                         │
//!                         ▼
//!                     adapter deployment (current routing table)
//!                         │
//!                         ▼
//!                     routing (method → template → predicate) ──▶ fallback
//!                         │
//!                         ▼
//!                     ScriptHandler: resolve injections, build facade
//!                         │
//!                         ▼
//!                     user closure (ex, params)
//!     Client Response
//!     ◀────────────── exchange rendered (status, headers, body)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use exchange_adapter::adapter::{EnvProvider, StaticProvider};
use exchange_adapter::config::{load_config, AdapterConfig};
use exchange_adapter::http::ResponseHandler;
use exchange_adapter::lifecycle::serve;
use exchange_adapter::observability::logging::init_logging;
use exchange_adapter::{handler, inject, Adapter, AdapterError, Routes};

#[derive(Parser)]
#[command(name = "exchange-adapter")]
#[command(about = "Serve closure-based route handlers over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AdapterConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability.log_level);
    tracing::info!("exchange-adapter v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        hot_reload = config.deployment.hot_reload,
        "Configuration loaded"
    );

    let adapter = Adapter::builder()
        .add_injection_provider(
            "jndi",
            StaticProvider::new().with("java:datasources/DefaultDS", "DefaultDS".to_string()),
        )
        .add_injection_provider("env", EnvProvider)
        .with_fallback(ResponseHandler::new(200, "Default Response"))
        .deploy(demo_routes)
        .build()?;

    serve(Arc::new(adapter), config, cli.config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_routes(routes: &mut Routes, _config: &AdapterConfig) -> Result<(), AdapterError> {
    routes
        .alias("ds", "jndi:java:datasources/DefaultDS")?
        .on_get("/testResponseSender", handler(|ex, _| Ok(ex.send("Response Sender")?)))?
        .on_get(
            "/testRequestHeaders",
            handler(|ex, _| {
                let value = ex.get_request_header("my-header").map(str::to_owned);
                Ok(ex.send(value)?)
            }),
        )?
        .on_get(
            "/testResponseHeaders",
            handler(|ex, _| Ok(ex.set_response_header("my-header", "my-header-value")?)),
        )?
        .on_get(
            "/testArrayParam",
            inject(["$entity:json", "ds"], |ex, _| Ok(ex.send("Array Param")?)),
        )?
        .on_get(
            "/testSendRedirect",
            handler(|ex, _| Ok(ex.send_redirect("/testResponseSender")?)),
        )?
        .on_post(
            "/echo",
            inject(["$entity:json"], |ex, params| {
                match params.get::<serde_json::Value>(0) {
                    Some(body) => ex.send(body)?,
                    None => {
                        ex.set_status(400)?;
                        ex.send("expected a JSON body")?;
                    }
                }
                Ok(())
            }),
        )?
        .on_get_if(
            "/hello",
            "query[name]",
            handler(|ex, _| {
                let name = ex.query_param("name").unwrap_or_default().to_owned();
                Ok(ex.send(format!("hi {name}"))?)
            }),
        )?
        .on_get("/hello", handler(|ex, _| Ok(ex.send("hi")?)))?;
    Ok(())
}
