//! Traffic client: TCP/UDP/HTTP probes with retry-on-attempts and latency capture (§4.1).

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::types::MAX_ERROR_LEN;

/// Default per-probe socket deadline, matching the original's `sockettimeout`.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// The outcome of a single probe, pre-`expected` combination (§8's
/// `result == (expected == (echo == payload))` invariant is applied by the
/// task layer, which knows the rule's `connected` flag; this struct only
/// reports whether the echo matched).
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub echoed: bool,
    pub latency_ms: f64,
    pub error: String,
}

impl ProbeOutcome {
    fn truncate_error(mut self) -> Self {
        if self.error.len() > MAX_ERROR_LEN {
            let mut end = MAX_ERROR_LEN;
            while !self.error.is_char_boundary(end) {
                end -= 1;
            }
            self.error.truncate(end);
        }
        self
    }
}

fn round_latency(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// Performs a single probe attempt; the task layer calls this up to
/// `rule.attempts` times per ping.
pub async fn probe_once(
    protocol: crate::types::Protocol,
    addr: SocketAddr,
    payload: &[u8],
    socket_timeout: Duration,
) -> ProbeOutcome {
    use crate::types::Protocol;
    match protocol {
        Protocol::Tcp => probe_tcp(addr, payload, socket_timeout).await,
        Protocol::Udp => probe_udp(addr, payload, socket_timeout).await,
        Protocol::Http => probe_http(addr, payload, socket_timeout).await,
    }
}

async fn probe_tcp(addr: SocketAddr, payload: &[u8], deadline: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let attempt = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(payload).await?;
        let _ = stream.shutdown().await;
        let mut echo = Vec::with_capacity(payload.len());
        stream.read_to_end(&mut echo).await?;
        Ok::<Vec<u8>, std::io::Error>(echo)
    };

    match timeout(deadline, attempt).await {
        Ok(Ok(echo)) => ProbeOutcome {
            echoed: echo == payload,
            latency_ms: round_latency(started.elapsed()),
            error: String::new(),
        }
        .truncate_error(),
        Ok(Err(err)) => ProbeOutcome {
            echoed: false,
            latency_ms: round_latency(started.elapsed()),
            error: err.to_string(),
        }
        .truncate_error(),
        Err(_) => ProbeOutcome {
            echoed: false,
            latency_ms: round_latency(started.elapsed()),
            error: "timed out".to_string(),
        },
    }
}

async fn probe_udp(addr: SocketAddr, payload: &[u8], deadline: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let attempt = async {
        let local: SocketAddr = if addr.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.send_to(payload, addr).await?;
        let mut buf = vec![0u8; crate::types::MAX_PAYLOAD_SIZE];
        let (n, _) = socket.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok::<Vec<u8>, std::io::Error>(buf)
    };

    match timeout(deadline, attempt).await {
        Ok(Ok(echo)) => ProbeOutcome {
            echoed: echo == payload,
            latency_ms: round_latency(started.elapsed()),
            error: String::new(),
        }
        .truncate_error(),
        Ok(Err(err)) => ProbeOutcome {
            echoed: false,
            latency_ms: round_latency(started.elapsed()),
            error: err.to_string(),
        }
        .truncate_error(),
        Err(_) => ProbeOutcome {
            echoed: false,
            latency_ms: round_latency(started.elapsed()),
            error: "timed out".to_string(),
        },
    }
}

async fn probe_http(addr: SocketAddr, payload: &[u8], deadline: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let path = String::from_utf8_lossy(payload).to_string();
    let attempt = async {
        let mut stream = TcpStream::connect(addr).await?;
        let request = format!("GET /{path} HTTP/1.1\r\n\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok::<Vec<u8>, std::io::Error>(response)
    };

    match timeout(deadline, attempt).await {
        Ok(Ok(response)) => {
            let outcome = parse_http_response(&response, &path);
            ProbeOutcome {
                echoed: outcome,
                latency_ms: round_latency(started.elapsed()),
                error: if outcome {
                    String::new()
                } else {
                    "unexpected http response".to_string()
                },
            }
            .truncate_error()
        }
        Ok(Err(err)) => ProbeOutcome {
            echoed: false,
            latency_ms: round_latency(started.elapsed()),
            error: err.to_string(),
        }
        .truncate_error(),
        Err(_) => ProbeOutcome {
            echoed: false,
            latency_ms: round_latency(started.elapsed()),
            error: "timed out".to_string(),
        },
    }
}

/// Success iff the first line contains `200 OK` and the last line is JSON
/// with a `payload` field equal to the original payload (§4.1, §6).
fn parse_http_response(response: &[u8], expected_payload: &str) -> bool {
    let text = String::from_utf8_lossy(response);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(status_line) = lines.next() else {
        return false;
    };
    if !status_line.contains("200 OK") {
        return false;
    }
    let Some(body_line) = text.lines().filter(|l| !l.trim().is_empty()).last() else {
        return false;
    };
    match serde_json::from_str::<serde_json::Value>(body_line) {
        Ok(value) => value
            .get("payload")
            .and_then(|p| p.as_str())
            .map(|p| p == expected_payload)
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_latency_to_two_decimals() {
        let latency = round_latency(Duration::from_micros(1234));
        assert_eq!(latency, 1.23);
    }

    #[test]
    fn parses_successful_http_response() {
        let response = b"HTTP/1.1 200 OK\r\n\r\n{\"status\":200,\"payload\":\"abc\"}";
        assert!(parse_http_response(response, "abc"));
        assert!(!parse_http_response(response, "xyz"));
    }

    #[test]
    fn rejects_non_200_http_response() {
        let response = b"HTTP/1.1 404 Not Found\r\n\r\n{\"status\":404}";
        assert!(!parse_http_response(response, "abc"));
    }

    #[tokio::test]
    async fn tcp_probe_against_closed_port_records_error() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let outcome = probe_tcp(addr, b"hi", Duration::from_millis(200)).await;
        assert!(!outcome.echoed);
        assert!(!outcome.error.is_empty());
    }
}
