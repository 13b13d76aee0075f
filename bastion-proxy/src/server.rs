//! Listener loop with bounded concurrency.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time;

use crate::handler::{ConnectionHandler, Outcome};
use crate::state::ProxyState;

/// Accepts connections on `listener` until `shutdown` resolves.
///
/// Each connection runs as its own task. At most `limits.max_connections` run at
/// once; further connections wait in the accept backlog until a worker finishes.
/// After shutdown the loop stops accepting and waits for running workers to drain.
pub async fn start_server<F>(
    listener: TcpListener,
    state: Arc<ProxyState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let max = state.limits.max_connections;
    let workers = Arc::new(Semaphore::new(max));
    tracing::info!(addr = %listener.local_addr()?, max_connections = max, "listening");

    tokio::pin!(shutdown);
    loop {
        if workers.available_permits() == 0 {
            tracing::debug!("connection limit reached, waiting for a worker");
        }

        let permit = tokio::select! {
            _ = &mut shutdown => break,
            permit = Arc::clone(&workers).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning.
                    tracing::warn!(error = %e, "accept failed");
                    time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let _permit = permit;
            serve_connection(stream, peer, state).await;
        });
    }

    drain(&workers, max, &state).await;
    Ok(())
}

async fn serve_connection(mut stream: TcpStream, peer: SocketAddr, state: Arc<ProxyState>) {
    let handler = ConnectionHandler::new(state, peer);
    match handler.handle(&mut stream).await {
        Ok(Outcome::Forwarded { backend, via }) => {
            tracing::debug!(%peer, %backend, ?via, "request forwarded")
        }
        Ok(outcome) => tracing::debug!(%peer, ?outcome, "connection finished"),
        Err(e) if e.is_expected() => tracing::debug!(%peer, error = %e, "connection closed"),
        Err(e) => tracing::warn!(%peer, error = %e, "connection failed"),
    }
    let _ = stream.shutdown().await;
}

/// Wait until every worker has returned its permit, bounded by the longest a worker can take.
async fn drain(workers: &Semaphore, max: usize, state: &ProxyState) {
    let t = &state.timeouts;
    let budget = t.client_read() + t.backend_connect() + t.backend_io() + t.client_write();
    let permits = u32::try_from(max).unwrap_or(u32::MAX);

    match time::timeout(budget, workers.acquire_many(permits)).await {
        Ok(_) => tracing::info!("all connections drained"),
        Err(_) => tracing::warn!(
            in_flight = max.saturating_sub(workers.available_permits()),
            "shutdown deadline reached with connections still open"
        ),
    }
}
