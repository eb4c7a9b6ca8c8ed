//! HTTP request handlers.
//!
//! Parse errors are returned to the client verbatim; lookup internals
//! are logged and masked behind a generic message.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ipnet::IpNet;

use super::dto::{ApiResponse, LookupDto};
use super::AppState;
use crate::meta::IpMetadata;
use crate::service::{class_dictionary, MetaCache, MetaLookup};

/// Per-request deadline on the lookup path.
const LOOKUP_DEADLINE: Duration = Duration::from_secs(1);

fn respond<T: serde::Serialize>(resp: ApiResponse<T>) -> Response {
    let status = StatusCode::from_u16(resp.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(resp)).into_response()
}

async fn run_lookup<L, C>(state: &AppState<L, C>, addr: IpAddr) -> Response
where
    L: MetaLookup + Send + Sync + 'static,
    C: MetaCache + Send + Sync + 'static,
{
    let start = Instant::now();

    let outcome = tokio::time::timeout(LOOKUP_DEADLINE, state.service.lookup_ip(addr)).await;
    let meta: IpMetadata = match outcome {
        Ok(Ok(meta)) => meta,
        Ok(Err(e)) => {
            log::error!("ip lookup failed: ip={addr} error={e}");
            return respond::<LookupDto>(ApiResponse::error(500, "lookup failed"));
        }
        Err(_) => {
            log::error!("ip lookup deadline exceeded: ip={addr}");
            return respond::<LookupDto>(ApiResponse::error(500, "lookup failed"));
        }
    };

    let dto = LookupDto::from_meta(&meta, addr, start.elapsed());
    respond(ApiResponse::ok(dto))
}

/// `GET /lookup/ip/{addr}`
pub async fn lookup_ip<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path(addr): Path<String>,
) -> Response
where
    L: MetaLookup + Send + Sync + 'static,
    C: MetaCache + Send + Sync + 'static,
{
    let addr: IpAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(_) => {
            return respond::<LookupDto>(ApiResponse::error(400, "invalid ip address in path"));
        }
    };

    run_lookup(&state, addr).await
}

/// `GET /lookup/ip` — the queried address is the request peer.
pub async fn lookup_peer_ip<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response
where
    L: MetaLookup + Send + Sync + 'static,
    C: MetaCache + Send + Sync + 'static,
{
    run_lookup(&state, peer.ip()).await
}

/// `GET /lookup/subnet/{prefix}`
pub async fn lookup_subnet<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path(prefix): Path<String>,
) -> Response
where
    L: MetaLookup + Send + Sync + 'static,
    C: MetaCache + Send + Sync + 'static,
{
    let net: IpNet = match prefix.parse() {
        Ok(net) => net,
        Err(e) => {
            return respond::<LookupDto>(
                ApiResponse::error(400, "invalid subnet").with_errors(vec![e.to_string()]),
            );
        }
    };

    run_lookup(&state, net.addr()).await
}

/// `GET /types` — static classification dictionary.
pub async fn network_types() -> Response {
    respond(ApiResponse::ok(class_dictionary()))
}
