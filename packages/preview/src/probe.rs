// ABOUTME: TCP port probing for the preview port
// ABOUTME: Bind-based availability checks and connect-based reachability checks, no retries

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Map a bind address to the address a local client should connect to.
///
/// Wildcard addresses accept connections on every interface but cannot be
/// connected to portably, so they are probed through loopback.
pub fn connect_host(bind_host: &str) -> String {
    match bind_host.trim() {
        "" | "0.0.0.0" => "127.0.0.1".to_string(),
        "::" | "[::]" => "::1".to_string(),
        other => other.to_string(),
    }
}

fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            debug!("Could not resolve {}:{}: {}", host, port, e);
            None
        }
    }
}

/// Check whether `(host, port)` can be bound right now.
///
/// Binds and listens on a throwaway socket with address reuse enabled; the
/// socket is dropped before returning whatever the outcome.
pub fn is_port_available(host: &str, port: u16) -> bool {
    let Some(addr) = resolve(host, port) else {
        return false;
    };

    let socket = match Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)) {
        Ok(socket) => socket,
        Err(e) => {
            warn!("Failed to create probe socket for {}: {}", addr, e);
            return false;
        }
    };

    if let Err(e) = socket.set_reuse_address(true) {
        debug!("Could not set SO_REUSEADDR on probe socket: {}", e);
    }

    socket
        .bind(&addr.into())
        .and_then(|_| socket.listen(1))
        .is_ok()
}

/// Check whether something accepts TCP connections on `(host, port)`.
///
/// Any resolution error, refusal or timeout counts as "not reachable".
pub async fn probe_connect(host: &str, port: u16, connect_timeout: Duration) -> bool {
    let Some(addr) = resolve(host, port) else {
        return false;
    };

    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("Connect probe to {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!(
                "Connect probe to {} timed out after {:?}",
                addr, connect_timeout
            );
            false
        }
    }
}

/// Poll until `(host, port)` can be bound, at most `attempts` times.
pub async fn wait_for_port_release(
    host: &str,
    port: u16,
    attempts: u32,
    interval: Duration,
) -> bool {
    for attempt in 1..=attempts {
        if is_port_available(host, port) {
            debug!("Port {} is available", port);
            return true;
        }
        info!(
            "Port {} still busy, waiting... (attempt {}/{})",
            port, attempt, attempts
        );
        sleep(interval).await;
    }

    // One last look after the final sleep
    let available = is_port_available(host, port);
    if !available {
        warn!(
            "Port {} is still not available after {} attempts",
            port, attempts
        );
    }
    available
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_connect_host_maps_wildcards() {
        assert_eq!(connect_host("0.0.0.0"), "127.0.0.1");
        assert_eq!(connect_host(""), "127.0.0.1");
        assert_eq!(connect_host("::"), "::1");
        assert_eq!(connect_host("localhost"), "localhost");
        assert_eq!(connect_host("192.168.1.20"), "192.168.1.20");
    }

    #[test]
    fn test_port_in_use_is_not_available() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(!is_port_available("127.0.0.1", port));
        drop(listener);
        assert!(is_port_available("127.0.0.1", port));
    }

    #[test]
    fn test_availability_check_releases_socket() {
        let port = free_port();
        assert!(is_port_available("127.0.0.1", port));
        // A second check would fail if the first one leaked its socket
        assert!(is_port_available("127.0.0.1", port));
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }

    #[test]
    fn test_unresolvable_host_is_not_available() {
        assert!(!is_port_available("host.invalid", 7861));
    }

    #[tokio::test]
    async fn test_probe_connect_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(probe_connect("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_connect_closed_port() {
        let port = free_port();
        assert!(!probe_connect("127.0.0.1", port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_wait_for_port_release_succeeds_once_freed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            drop(listener);
        });

        assert!(wait_for_port_release("127.0.0.1", port, 20, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_wait_for_port_release_gives_up() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(!wait_for_port_release("127.0.0.1", port, 2, Duration::from_millis(20)).await);
        drop(listener);
    }
}
