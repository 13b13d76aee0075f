//! Backend exchange with connect and I/O deadlines.

use std::time::Duration;

use bastion_core::domain::backend::Backend;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::error::HandlerError;

/// Open a connection to `backend`, giving up after `timeout`.
pub async fn connect(backend: &Backend, timeout: Duration) -> Result<TcpStream, HandlerError> {
    match time::timeout(timeout, TcpStream::connect((backend.host(), backend.port()))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(HandlerError::BackendUnreachable {
            backend: backend.address(),
            source,
        }),
        Err(_) => Err(HandlerError::BackendTimeout {
            backend: backend.address(),
            timeout,
        }),
    }
}

/// Send `request` verbatim and buffer the whole response until the backend closes.
///
/// The deadline covers the write and the full read. A response cut short by the
/// deadline or an error is discarded, never returned.
pub async fn exchange(
    stream: &mut TcpStream,
    backend: &Backend,
    request: &[u8],
    timeout: Duration,
) -> Result<Bytes, HandlerError> {
    let io = async {
        stream.write_all(request).await?;
        let mut response = Vec::with_capacity(4096);
        stream.read_to_end(&mut response).await?;
        Ok::<_, std::io::Error>(response)
    };

    match time::timeout(timeout, io).await {
        Ok(Ok(response)) => Ok(Bytes::from(response)),
        Ok(Err(source)) => Err(HandlerError::BackendUnreachable {
            backend: backend.address(),
            source,
        }),
        Err(_) => Err(HandlerError::BackendTimeout {
            backend: backend.address(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::domain::backend::BackendId;
    use std::num::NonZeroU32;
    use tokio::net::TcpListener;

    fn backend_at(addr: std::net::SocketAddr) -> Backend {
        Backend::new(BackendId(0), addr.ip().to_string(), addr.port(), NonZeroU32::MIN)
    }

    #[tokio::test]
    async fn exchange_buffers_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend = backend_at(listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = s.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"PING");
            s.write_all(b"part one, ").await.unwrap();
            time::sleep(Duration::from_millis(20)).await;
            s.write_all(b"part two").await.unwrap();
        });

        let mut stream = connect(&backend, Duration::from_secs(1)).await.unwrap();
        let response = exchange(&mut stream, &backend, b"PING", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&response[..], b"part one, part two");
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend = backend_at(listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (_s, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(5)).await;
        });

        let mut stream = connect(&backend, Duration::from_secs(1)).await.unwrap();
        let err = exchange(&mut stream, &backend, b"GET / HTTP/1.1\r\n\r\n", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::BackendTimeout { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend = backend_at(listener.local_addr().unwrap());
        drop(listener);

        let err = connect(&backend, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, HandlerError::BackendUnreachable { .. }));
    }
}
