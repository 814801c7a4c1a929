// # dynrd
//
// Thin HTTP shell around `dynr_core::UpdateHandler`.
//
// - `config`: `DYNR_*` environment variables → `DaemonConfig`
// - `http`: axum routes translating requests into handler calls
//
// No DNS, credential, or retry logic lives here.

pub mod config;
pub mod http;

use anyhow::{Context, Result};
use dynr_core::{DynrConfig, StoreRegistry, UpdateHandler};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

pub use config::DaemonConfig;
pub use http::{HttpSettings, router};

/// Registry with every store this build supports
pub fn store_registry() -> StoreRegistry {
    let registry = StoreRegistry::with_builtins();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare record store");
        dynr_store_cloudflare::register(&registry);
    }

    registry
}

/// Create the stores named in the configuration and wire up a handler
pub async fn build_handler(config: &DynrConfig, registry: &StoreRegistry) -> Result<UpdateHandler> {
    let record_store = registry
        .create_record_store(&config.record_store)
        .await
        .with_context(|| {
            format!(
                "Failed to create '{}' record store",
                config.record_store.type_name()
            )
        })?;

    let secret_store = registry
        .create_secret_store(&config.secret_store)
        .with_context(|| {
            format!(
                "Failed to create '{}' secret store",
                config.secret_store.type_name()
            )
        })?;

    UpdateHandler::new(config, record_store, secret_store).context("Invalid configuration")
}

/// Serve the router until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: axum::Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}
