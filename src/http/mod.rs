//! HTTP lookup API.
//!
//! Thin facade over [`LookupService`]: four GET endpoints and a JSON
//! envelope. All logic lives below the handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::error::{Error, Result};
use crate::service::{LookupService, MetaCache, MetaLookup};

pub mod dto;
pub mod handlers;

/// Shared handler state.
pub struct AppState<L, C> {
    pub service: LookupService<L, C>,
}

/// Build the API router.
pub fn router<L, C>(state: Arc<AppState<L, C>>) -> Router
where
    L: MetaLookup + Send + Sync + 'static,
    C: MetaCache + Send + Sync + 'static,
{
    Router::new()
        .route("/lookup/ip/{addr}", get(handlers::lookup_ip))
        .route("/lookup/ip", get(handlers::lookup_peer_ip))
        .route("/lookup/subnet/{*prefix}", get(handlers::lookup_subnet))
        .route("/types", get(handlers::network_types))
        .with_state(state)
}

/// Bind and serve the API until the listener fails.
pub async fn serve<L, C>(listen: SocketAddr, state: Arc<AppState<L, C>>) -> Result<()>
where
    L: MetaLookup + Send + Sync + 'static,
    C: MetaCache + Send + Sync + 'static,
{
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(Error::Io)?;

    log::info!("http api listening on {listen}");

    axum::serve(listener, app).await.map_err(Error::Io)?;
    Ok(())
}
