//! Traffic server: TCP/UDP echo and HTTP status servers (§4.2).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

use crate::connection::StopEvent;
use crate::types::{Protocol, MAX_PAYLOAD_SIZE};

/// Runs the echo/status server for `protocol` on `bind_addr` until `stop` is set.
///
/// The accept/recv loop races against `stop.wait()` so `Stop()` unblocks a
/// pending accept or recv within the bounded time §5 requires.
pub async fn run_server(protocol: Protocol, bind_addr: SocketAddr, stop: StopEvent) -> std::io::Result<()> {
    match protocol {
        Protocol::Tcp => run_tcp_server(bind_addr, stop).await,
        Protocol::Udp => run_udp_server(bind_addr, stop).await,
        Protocol::Http => run_http_server(bind_addr, stop).await,
    }
}

async fn run_tcp_server(bind_addr: SocketAddr, stop: StopEvent) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    loop {
        tokio::select! {
            _ = stop.wait() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!("tcp echo accept failed: {err}");
                        continue;
                    }
                };
                let stop = stop.clone();
                tokio::spawn(async move {
                    if let Err(err) = echo_tcp_connection(stream, stop).await {
                        tracing::debug!("tcp echo connection ended: {err}");
                    }
                });
            }
        }
    }
}

async fn echo_tcp_connection(mut stream: tokio::net::TcpStream, stop: StopEvent) -> std::io::Result<()> {
    let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];
    loop {
        tokio::select! {
            _ = stop.wait() => return Ok(()),
            read = stream.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(());
                }
                stream.write_all(&buf[..n]).await?;
            }
        }
    }
}

async fn run_udp_server(bind_addr: SocketAddr, stop: StopEvent) -> std::io::Result<()> {
    let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
    let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];
    loop {
        tokio::select! {
            _ = stop.wait() => return Ok(()),
            received = socket.recv_from(&mut buf) => {
                let (n, peer) = received?;
                socket.send_to(&buf[..n], peer).await?;
            }
        }
    }
}

async fn run_http_server(bind_addr: SocketAddr, stop: StopEvent) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    loop {
        tokio::select! {
            _ = stop.wait() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!("http echo accept failed: {err}");
                        continue;
                    }
                };
                tokio::spawn(async move {
                    if let Err(err) = serve_http_request(stream).await {
                        tracing::debug!("http echo connection ended: {err}");
                    }
                });
            }
        }
    }
}

/// Answers one `GET /<payload>` request with `{"status":200,"payload":<path>}`,
/// matching `lydian.traffic.server._HTTPRequestHandler.do_GET`.
async fn serve_http_request(mut stream: tokio::net::TcpStream) -> std::io::Result<()> {
    let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .trim_start_matches('/')
        .to_string();

    let body = serde_json::json!({ "status": 200, "payload": path }).to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::probe_once;
    use std::time::Duration;

    #[tokio::test]
    async fn tcp_server_echoes_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let stop = StopEvent::new();
        stop.clear();
        let server_stop = stop.clone();
        let handle = tokio::spawn(run_server(Protocol::Tcp, addr, server_stop));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let outcome = probe_once(Protocol::Tcp, addr, b"hello", Duration::from_secs(1)).await;
        assert!(outcome.echoed, "error: {}", outcome.error);

        stop.set();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn http_server_returns_payload_in_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let stop = StopEvent::new();
        stop.clear();
        let server_stop = stop.clone();
        let handle = tokio::spawn(run_server(Protocol::Http, addr, server_stop));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let outcome = probe_once(Protocol::Http, addr, b"abc", Duration::from_secs(1)).await;
        assert!(outcome.echoed, "error: {}", outcome.error);

        stop.set();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
