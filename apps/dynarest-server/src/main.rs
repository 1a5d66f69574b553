//! DynaRest Server - REST resources over hash/range key-value tables.
//!
//! The server creates the tables listed in a definitions file in an
//! in-memory store and serves every declared resource under
//! `/<api_prefix>/<api_name>/`.
//!
//! # Usage
//!
//! ```text
//! DYNAREST_DEFINITIONS=definitions.json dynarest-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DYNAREST_LISTEN` | `0.0.0.0:8000` | Bind address |
//! | `DYNAREST_API_PREFIX` | `/api` | First path segment of every resource |
//! | `DYNAREST_API_NAME` | `v1` | Second path segment of every resource |
//! | `DYNAREST_DEFAULT_LIMIT` | `20` | Page size when `limit` is absent |
//! | `DYNAREST_MAX_LIMIT` | `1000` | Largest accepted `limit` |
//! | `DYNAREST_DEFINITIONS` | *(unset)* | JSON file with tables and resources |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod definitions;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dynarest_core::config::AdapterConfig;
use dynarest_core::handler::DynaRestHandler;
use dynarest_core::registry::ResourceRegistry;
use dynarest_http::server::serve;
use dynarest_http::service::{RestHttpConfig, RestHttpService};
use dynarest_storage::MemoryStore;

use crate::definitions::Definitions;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

fn build_registry(config: &AdapterConfig, store: &MemoryStore) -> Result<ResourceRegistry> {
    match &config.definitions_path {
        Some(path) => Definitions::load(Path::new(path))?.apply(store, config),
        None => {
            warn!("DYNAREST_DEFINITIONS is not set, serving no resources");
            Ok(ResourceRegistry::new(config.base_path()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AdapterConfig::from_env();
    init_tracing(&config.log_level)?;

    let store = MemoryStore::new();
    let registry = build_registry(&config, &store)?;
    let resources = registry.names();

    let handler = DynaRestHandler::new(Arc::new(registry));
    let service = RestHttpService::new(
        Arc::new(handler),
        RestHttpConfig {
            base_path: config.base_path(),
        },
    );

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        base_path = %config.base_path(),
        resources = ?resources,
        version = VERSION,
        "starting DynaRest server",
    );

    serve(listener, service, shutdown_signal()).await;
    Ok(())
}
