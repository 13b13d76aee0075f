//! Per-connection request pipeline.
//!
//! Every connection walks the same ordered stages, each of which may end it:
//! read, noise filter, dashboard, rate limit, cache, route, forward, respond.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bastion_admin::{dashboard, SnapshotSource};
use bastion_core::admission::RateDecision;
use bastion_core::cache::CacheKey;
use bastion_core::domain::backend::{BackendId, SharedBackend};
use bastion_core::domain::request::{self, RequestLine};
use bastion_core::domain::routing::{RouteVia, RoutingDecision};
use bastion_filters::RequestClass;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::error::HandlerError;
use crate::forward;
use crate::response;
use crate::state::ProxyState;

/// How a connection that produced a response (or was deliberately dropped) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Noise request, dropped without a response.
    Dropped,
    /// Served the stats dashboard.
    Dashboard,
    /// Rejected by the rate limiter.
    RateLimited,
    /// Served from the response cache.
    CacheHit,
    /// No backend alive.
    Unavailable,
    /// Relayed a fresh backend response.
    Forwarded {
        /// Backend that answered.
        backend: BackendId,
        /// How it was selected.
        via: RouteVia,
    },
}

/// Runs the request pipeline for one accepted client connection.
pub struct ConnectionHandler {
    state: Arc<ProxyState>,
    peer: SocketAddr,
}

impl ConnectionHandler {
    pub fn new(state: Arc<ProxyState>, peer: SocketAddr) -> Self {
        Self { state, peer }
    }

    pub async fn handle(&self, client: &mut TcpStream) -> Result<Outcome, HandlerError> {
        let raw = read_request(
            client,
            self.state.timeouts.client_read(),
            self.state.limits.max_request_bytes,
        )
        .await?;
        let line = RequestLine::parse(&raw)?;

        match self.state.filter.classify(&line) {
            RequestClass::Noise => return Ok(Outcome::Dropped),
            RequestClass::Dashboard => {
                let head_only = line.method().eq_ignore_ascii_case("HEAD");
                let page = dashboard::http_response(&self.state.snapshot(), head_only);
                self.reply(client, &page).await?;
                return Ok(Outcome::Dashboard);
            }
            RequestClass::Forward => {}
        }

        let decision = self.state.limiter.check(self.peer.ip());
        if let RateDecision::Banned { newly_banned, .. } = decision {
            let secs = decision.retry_after_secs().unwrap_or_default();
            self.reply(client, &response::rate_limited(secs, newly_banned))
                .await?;
            return Ok(Outcome::RateLimited);
        }

        let cache_key = CacheKey::for_request(&line);
        if let Some(key) = &cache_key {
            if let Some(payload) = self.state.cache.get(key) {
                self.reply(client, &payload).await?;
                return Ok(Outcome::CacheHit);
            }
            tracing::debug!(key = %key, "cache miss");
        }

        let Some((backend, via, payload)) = self.fetch(&line, &raw).await? else {
            self.reply(client, &response::no_servers_available()).await?;
            return Ok(Outcome::Unavailable);
        };

        backend.record_request();
        if let Some(key) = cache_key {
            self.state.cache.put(key, payload.clone());
        }
        self.reply(client, &payload).await?;

        Ok(Outcome::Forwarded {
            backend: backend.id,
            via,
        })
    }

    /// Route and forward, selecting again when a backend refuses the connection.
    async fn fetch(
        &self,
        line: &RequestLine,
        raw: &[u8],
    ) -> Result<Option<(SharedBackend, RouteVia, Bytes)>, HandlerError> {
        let timeouts = &self.state.timeouts;
        let mut retries_left = self.state.limits.connect_retries;

        loop {
            let RoutingDecision::Selected { backend, via } =
                self.state.policy.select(&self.state.pool, line)
            else {
                return Ok(None);
            };

            let mut upstream = match forward::connect(&backend, timeouts.backend_connect()).await {
                Ok(stream) => stream,
                Err(e) if retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        backend = %backend.address(),
                        error = %e,
                        "backend connect failed, selecting again"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            tracing::debug!(
                backend = %backend.address(),
                weight = backend.weight().get(),
                request = %line,
                "forwarding"
            );
            let payload =
                forward::exchange(&mut upstream, &backend, raw, timeouts.backend_io()).await?;
            return Ok(Some((backend, via, payload)));
        }
    }

    async fn reply(&self, client: &mut TcpStream, bytes: &[u8]) -> Result<(), HandlerError> {
        let deadline = self.state.timeouts.client_write();
        time::timeout(deadline, client.write_all(bytes))
            .await
            .map_err(|_| HandlerError::ClientWriteTimeout(deadline))??;
        Ok(())
    }
}

/// Read one request: the head plus any declared body, within `deadline`.
async fn read_request(
    client: &mut TcpStream,
    deadline: Duration,
    max_bytes: usize,
) -> Result<Vec<u8>, HandlerError> {
    let mut buf = Vec::with_capacity(4096);
    time::timeout(deadline, read_until_complete(client, &mut buf, max_bytes))
        .await
        .map_err(|_| HandlerError::ClientTimeout(deadline))??;

    if buf.is_empty() {
        return Err(HandlerError::EmptyRequest);
    }
    Ok(buf)
}

async fn read_until_complete(
    client: &mut TcpStream,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<(), HandlerError> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = client.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        let declared = request::expected_len(buf).unwrap_or(0);
        if buf.len() > max_bytes || declared > max_bytes {
            return Err(HandlerError::RequestTooLarge { limit: max_bytes });
        }
        if request::is_complete(buf) {
            return Ok(());
        }
    }
}
