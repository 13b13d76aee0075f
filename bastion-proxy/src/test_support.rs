//! Loopback fixtures shared by the proxy tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bastion_core::config::{BackendConfig, ProxyConfig};
use bastion_core::domain::request;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::server::start_server;
use crate::state::ProxyState;

/// A scripted HTTP backend that answers `"{name} #{n}"` and closes.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    pub last_request: Arc<Mutex<Vec<u8>>>,
}

pub async fn spawn_backend(name: &'static str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let last_request = Arc::new(Mutex::new(Vec::new()));

    let (h, l) = (hits.clone(), last_request.clone());
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let (hits, last_request) = (h.clone(), l.clone());
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                    if request::is_complete(&buf) {
                        break;
                    }
                }
                // Health probes and refused attempts never send a request.
                if buf.is_empty() {
                    return;
                }

                let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                *last_request.lock().await = buf;
                let body = format!("{name} #{n}");
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    MockBackend {
        addr,
        hits,
        last_request,
    }
}

/// Weight-1 backends, no route rules and a rate limit high enough to stay out of the way.
pub fn test_config(backends: &[SocketAddr]) -> ProxyConfig {
    let mut config = ProxyConfig {
        backends: backends
            .iter()
            .map(|addr| BackendConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                weight: 1,
            })
            .collect(),
        routes: Vec::new(),
        ..ProxyConfig::default()
    };
    config.rate_limit.max_requests = 100;
    config.timeouts.client_read_ms = 1000;
    config.timeouts.backend_connect_ms = 1000;
    config.timeouts.backend_io_ms = 1000;
    config
}

pub async fn spawn_proxy(config: ProxyConfig) -> (SocketAddr, Arc<ProxyState>) {
    let state = Arc::new(ProxyState::from_config(&config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_state = state.clone();
    tokio::spawn(async move {
        let _ = start_server(listener, server_state, std::future::pending()).await;
    });
    (addr, state)
}

/// Write `raw` and read until the proxy closes the connection.
pub async fn send(proxy: SocketAddr, raw: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    let _ = stream.read_to_end(&mut out).await;
    out
}
