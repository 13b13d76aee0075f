//! Optional admin HTTP listener.
//!
//! Serves `/stats` (HTML), `/stats.json` and `/healthz` on an address separate
//! from the proxy listener. It is read-only and not rate limited.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bastion_core::stats::StatsSnapshot;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::dashboard;
use crate::SnapshotSource;

/// Accept admin connections on `listener` until the task is dropped.
pub async fn start_admin_server(
    listener: TcpListener,
    source: Arc<dyn SnapshotSource>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "admin listener ready");
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "admin accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let source = Arc::clone(&source);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let source = Arc::clone(&source);
                async move { Ok::<_, Infallible>(route(&req, source.as_ref())) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, error = %e, "admin connection error");
            }
        });
    }
}

/// Dispatch one admin request.
pub fn route<B>(req: &Request<B>, source: &dyn SnapshotSource) -> Response<Full<Bytes>> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "method not allowed");
    }

    match req.uri().path() {
        "/healthz" => respond(StatusCode::OK, "text/plain", "ok"),
        "/stats" => respond(
            StatusCode::OK,
            "text/html; charset=utf-8",
            dashboard::render_html(&source.snapshot()),
        ),
        "/stats.json" => json(&source.snapshot()),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
    }
}

fn json(snapshot: &StatsSnapshot) -> Response<Full<Bytes>> {
    match serde_json::to_vec(snapshot) {
        Ok(body) => respond(StatusCode::OK, "application/json", body),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize stats snapshot");
            respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "internal error")
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::stats::BackendStats;
    use std::net::SocketAddr;

    struct Fixed;

    impl SnapshotSource for Fixed {
        fn snapshot(&self) -> StatsSnapshot {
            StatsSnapshot {
                backends: vec![BackendStats {
                    id: 0,
                    address: "127.0.0.1:9001".to_string(),
                    weight: 2,
                    alive: true,
                    requests: 9,
                }],
                cache_entries: 1,
                cache_ttl_secs: 4,
                tracked_clients: 0,
                banned: Vec::new(),
                pinned_fallbacks: 0,
            }
        }
    }

    async fn spawn_admin() -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = start_admin_server(listener, Arc::new(Fixed)).await;
        });
        (addr, handle)
    }

    /// Plain HTTP GET over a tokio TcpStream.
    async fn get(addr: SocketAddr, path: &str) -> (u16, String) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        let status = response
            .lines()
            .next()
            .unwrap()
            .split_whitespace()
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        let body = response.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
        (status, body)
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (addr, handle) = spawn_admin().await;
        assert_eq!(get(addr, "/healthz").await, (200, "ok".to_string()));
        handle.abort();
    }

    #[tokio::test]
    async fn stats_renders_html() {
        let (addr, handle) = spawn_admin().await;
        let (status, body) = get(addr, "/stats").await;
        assert_eq!(status, 200);
        assert!(body.contains("127.0.0.1:9001"));
        assert!(body.contains("ONLINE"));
        handle.abort();
    }

    #[tokio::test]
    async fn stats_json_serializes_snapshot() {
        let (addr, handle) = spawn_admin().await;
        let (status, body) = get(addr, "/stats.json").await;
        assert_eq!(status, 200);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["backends"][0]["requests"], 9);
        assert_eq!(value["cache_ttl_secs"], 4);
        handle.abort();
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (addr, handle) = spawn_admin().await;
        assert_eq!(get(addr, "/nope").await.0, 404);
        handle.abort();
    }

    #[test]
    fn writes_are_rejected() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/stats")
            .body(())
            .unwrap();
        assert_eq!(route(&req, &Fixed).status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
