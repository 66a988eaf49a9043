//! WebSocket Server for Live Reload
//!
//! Accepts browser connections on the configured path and hands each one to
//! the WsActor. Handshakes run off the accept thread so one stalled client
//! cannot block the rest.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message;
use tungstenite::{Error as WsError, WebSocket};

use super::channel::{Connection, ConnectionError};
use crate::actor::messages::WsMsg;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Poll interval for the accept and reader loops
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound for a client to finish the opening handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Server
// =============================================================================

/// Bind `interface:port` and start accepting clients on `ws_path`.
///
/// Returns the port actually bound, which differs from `base_port` when it
/// was in use.
pub fn start_ws_server(
    interface: IpAddr,
    base_port: u16,
    ws_path: &str,
    ws_tx: mpsc::Sender<WsMsg>,
) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    if actual_port != base_port && base_port != 0 {
        crate::log!("serve"; "port {} in use, using {} instead", base_port, actual_port);
    }

    let ws_path: Arc<str> = Arc::from(ws_path);
    std::thread::spawn(move || {
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    crate::debug!("ws"; "tcp connection from {}", addr);
                    let tx = ws_tx.clone();
                    let path = Arc::clone(&ws_path);
                    std::thread::spawn(move || handshake(stream, addr, &path, tx));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    if ws_tx.is_closed() || crate::core::is_shutdown() {
                        break;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    crate::log!("ws"; "accept error: {}", e);
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
        crate::debug!("ws"; "acceptor stopped");
    });

    Ok(actual_port)
}

/// Upgrade a raw stream and send the connection to the actor.
fn handshake(stream: TcpStream, addr: SocketAddr, ws_path: &str, tx: mpsc::Sender<WsMsg>) {
    // Blocking during the handshake, bounded by a read timeout
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT));

    let check_path = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == ws_path {
            return Ok(resp);
        }
        crate::debug!("ws"; "rejected {} (expected {})", req.uri().path(), ws_path);
        let mut not_found = ErrorResponse::new(Some("not found".to_string()));
        *not_found.status_mut() = StatusCode::NOT_FOUND;
        Err(not_found)
    };

    let ws = match tungstenite::accept_hdr(stream, check_path) {
        Ok(ws) => ws,
        Err(e) => {
            crate::debug!("ws"; "handshake with {} failed: {}", addr, e);
            return;
        }
    };

    // Non-blocking from here on so the reader can poll
    let _ = ws.get_ref().set_read_timeout(None);
    if let Err(e) = ws.get_ref().set_nonblocking(true) {
        crate::log!("ws"; "failed to configure socket for {}: {}", addr, e);
        return;
    }

    let conn = Arc::new(WsConnection::new(ws, addr.to_string()));
    if tx.blocking_send(WsMsg::AddClient(conn)).is_err() {
        crate::debug!("ws"; "actor gone, dropping {}", addr);
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server on {} after {} attempts (ports {}-{}): {}",
        interface,
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// =============================================================================
// Connection
// =============================================================================

/// A handshaken WebSocket on a non-blocking socket.
pub struct WsConnection {
    ws: Mutex<WebSocket<TcpStream>>,
    open: AtomicBool,
    peer: String,
}

impl WsConnection {
    pub fn new(ws: WebSocket<TcpStream>, peer: String) -> Self {
        Self {
            ws: Mutex::new(ws),
            open: AtomicBool::new(true),
            peer,
        }
    }

    /// Poll the socket on a dedicated thread until the peer goes away,
    /// then run `on_close` once.
    pub fn spawn_reader<F>(self: &Arc<Self>, on_close: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let conn = Arc::clone(self);
        std::thread::spawn(move || {
            conn.read_until_closed();
            on_close();
        });
    }

    fn read_until_closed(&self) {
        while self.is_open() {
            std::thread::sleep(POLL_INTERVAL);
            if !self.drain() {
                break;
            }
        }
        self.open.store(false, Ordering::SeqCst);
    }

    /// Read every frame that has arrived since the last poll.
    ///
    /// Returns `false` once the peer has gone. The close reply queued by
    /// `read` is flushed before that.
    fn drain(&self) -> bool {
        let mut ws = self.ws.lock();
        loop {
            match ws.read() {
                Ok(Message::Close(_)) => {
                    let _ = ws.flush();
                    return false;
                }
                // Pings are answered inside `read`; client text is ignored
                Ok(_) => {}
                Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => return true,
                Err(e) => {
                    crate::debug!("ws"; "read from {} failed: {}", self.peer, e);
                    let _ = ws.flush();
                    return false;
                }
            }
        }
    }
}

impl Connection for WsConnection {
    fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }

        let mut ws = self.ws.lock();
        match ws.send(Message::Text(text.into())) {
            Ok(()) => Ok(()),
            // Frame is queued; the next write or read flushes it
            Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                self.open.store(false, Ordering::SeqCst);
                Err(ConnectionError::Closed)
            }
            Err(e) => {
                self.open.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut ws = self.ws.lock();
        let _ = ws.close(None);
        let _ = ws.flush();
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn start() -> (u16, mpsc::Receiver<WsMsg>) {
        let (tx, rx) = mpsc::channel(8);
        let port = start_ws_server(LOCALHOST, 0, "/figwheel-ws", tx).unwrap();
        (port, rx)
    }

    fn accept_client(rx: &mut mpsc::Receiver<WsMsg>) -> Arc<WsConnection> {
        match rx.blocking_recv() {
            Some(WsMsg::AddClient(conn)) => conn,
            _ => panic!("expected a client"),
        }
    }

    #[test]
    fn test_try_bind_port_skips_busy_port() {
        let (first, port) = try_bind_port(LOCALHOST, 0, 1).unwrap();
        let (_second, next) = try_bind_port(LOCALHOST, port, MAX_PORT_RETRIES).unwrap();
        assert_ne!(port, next);
        drop(first);
    }

    #[test]
    fn test_send_reaches_client() {
        let (port, mut rx) = start();
        let (mut client, _) =
            tungstenite::connect(format!("ws://127.0.0.1:{port}/figwheel-ws")).unwrap();
        let conn = accept_client(&mut rx);

        conn.send_text(r#"{"msg-name":"ping"}"#.to_string()).unwrap();
        let frame = client.read().unwrap();
        assert_eq!(frame.into_text().unwrap().as_str(), r#"{"msg-name":"ping"}"#);
    }

    #[test]
    fn test_wrong_path_rejected() {
        let (port, _rx) = start();
        let result = tungstenite::connect(format!("ws://127.0.0.1:{port}/other"));

        match result {
            Err(WsError::Http(resp)) => assert_eq!(resp.status(), StatusCode::NOT_FOUND),
            other => panic!("expected 404, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_client_close_fires_callback() {
        let (port, mut rx) = start();
        let (mut client, _) =
            tungstenite::connect(format!("ws://127.0.0.1:{port}/figwheel-ws")).unwrap();
        let conn = accept_client(&mut rx);

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        conn.spawn_reader(move || {
            let _ = done_tx.send(());
        });

        client.close(None).unwrap();
        let _ = client.flush();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!conn.is_open());
    }

    #[test]
    fn test_client_close_is_acknowledged() {
        let (port, mut rx) = start();
        let (mut client, _) =
            tungstenite::connect(format!("ws://127.0.0.1:{port}/figwheel-ws")).unwrap();
        if let tungstenite::stream::MaybeTlsStream::Plain(stream) = client.get_ref() {
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        }
        let conn = accept_client(&mut rx);

        // Chatter ahead of the close frame, all read in one poll
        for i in 0..3 {
            client.send(Message::Text(format!("hello {i}").into())).unwrap();
        }
        client.close(None).unwrap();
        let _ = client.flush();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        conn.spawn_reader(move || {
            let _ = done_tx.send(());
        });
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // `conn` stays alive, so only the close reply can end this read
        loop {
            match client.read() {
                Ok(Message::Close(_)) | Err(WsError::ConnectionClosed) => break,
                Ok(_) => {}
                Err(e) => panic!("close was not acknowledged: {e}"),
            }
        }
        assert!(!conn.is_open());
    }

    #[test]
    fn test_send_after_close_is_closed_error() {
        let (port, mut rx) = start();
        let (_client, _) =
            tungstenite::connect(format!("ws://127.0.0.1:{port}/figwheel-ws")).unwrap();
        let conn = accept_client(&mut rx);

        conn.close();
        conn.close();
        assert!(matches!(
            conn.send_text("x".to_string()),
            Err(ConnectionError::Closed)
        ));
    }
}
