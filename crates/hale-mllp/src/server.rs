//! MLLP server
//!
//! Accepts TCP connections, reassembles MLLP frames, parses each payload,
//! and hands parsed messages to a callback interface together with a
//! [`Reply`] handle that frames and writes back on the owning connection.
//!
//! Frames on one connection are decoded in arrival order and handed off
//! without waiting for the handler to reply, so a slow handler overlaps
//! with the next frame's handler on the same connection. Replies are
//! written in the order the handles are invoked.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use hale_core::error::{Error, Result};
use hale_core::message::Message;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::codec::{MllpCodec, DEFAULT_MAX_FRAME_SIZE};

/// MLLP server configuration
#[derive(Debug, Clone)]
pub struct MllpServerConfig {
    pub host: String,
    pub port: u16,
    /// Connections beyond this cap are accepted and immediately closed
    pub max_connections: usize,
    /// A connection with no inbound bytes for this long is closed
    pub idle_timeout: Duration,
    pub max_frame_size: usize,
}

impl Default for MllpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2575,
            max_connections: 100,
            idle_timeout: Duration::from_secs(300),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Book-keeping for one live connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: u64,
    pub remote: SocketAddr,
    pub connected_at: Instant,
    pub messages_received: u64,
}

/// Callback interface for server events
///
/// Implementations must be thread-safe; `on_message` is called from the
/// connection's read task and should spawn its own work rather than
/// block.
pub trait MllpEvents: Send + Sync {
    /// A frame was decoded and parsed; `reply` writes back on the same
    /// connection.
    fn on_message(&self, message: Message, reply: Reply);

    /// A frame failed to decode or parse; the connection continues.
    fn on_error(&self, error: Error, connection_id: u64) {
        let _ = (error, connection_id);
    }

    fn on_connection_open(&self, info: &ConnectionInfo) {
        let _ = info;
    }

    fn on_connection_close(&self, connection_id: u64) {
        let _ = connection_id;
    }
}

/// Handle for writing a framed reply on the connection a message arrived
/// on
///
/// Replies enqueued through clones of the same handle are written in
/// enqueue order.
#[derive(Clone)]
pub struct Reply {
    connection_id: u64,
    tx: mpsc::UnboundedSender<String>,
}

impl Reply {
    /// Frame and write a payload back to the peer
    pub fn send(&self, payload: &str) -> Result<()> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| Error::network("connection closed before reply"))
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }
}

/// MLLP server
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use hale_mllp::{MllpEvents, MllpServer, MllpServerConfig, Reply};
/// use hale_core::{AckFactory, Message};
///
/// struct AckAll;
///
/// impl MllpEvents for AckAll {
///     fn on_message(&self, message: Message, reply: Reply) {
///         let _ = reply.send(&AckFactory::for_message(&message).accept().build());
///     }
/// }
///
/// # async fn example() -> hale_core::Result<()> {
/// let config = MllpServerConfig { port: 2575, ..Default::default() };
/// let server = MllpServer::start(config, Arc::new(AckAll)).await?;
/// // ... later
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct MllpServer {
    local_addr: SocketAddr,
    connections: Arc<Mutex<HashMap<u64, ConnectionInfo>>>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl MllpServer {
    /// Bind and start accepting connections
    pub async fn start(config: MllpServerConfig, events: Arc<dyn MllpEvents>) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|e| Error::network(format!("failed to bind: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::network(format!("failed to read local addr: {}", e)))?;

        info!(%local_addr, "MLLP server listening");

        let connections: Arc<Mutex<HashMap<u64, ConnectionInfo>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            config,
            events,
            connections.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            connections,
            shutdown,
            accept_task,
        })
    }

    /// The bound address (useful when the port was 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Snapshot of the connection table
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections
            .lock()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Stop accepting, close all connections, and release the listener
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.accept_task.await;
        info!("MLLP server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: MllpServerConfig,
    events: Arc<dyn MllpEvents>,
    connections: Arc<Mutex<HashMap<u64, ConnectionInfo>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let next_id = AtomicU64::new(1);

    loop {
        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, remote) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let at_capacity = connections
            .lock()
            .map(|c| c.len() >= config.max_connections)
            .unwrap_or(true);
        if at_capacity {
            warn!(%remote, max = config.max_connections, "connection limit reached, closing");
            drop(stream);
            continue;
        }

        let id = next_id.fetch_add(1, Ordering::Relaxed);
        let info = ConnectionInfo {
            id,
            remote,
            connected_at: Instant::now(),
            messages_received: 0,
        };
        if let Ok(mut table) = connections.lock() {
            table.insert(id, info.clone());
        }
        events.on_connection_open(&info);
        info!(connection = id, %remote, "connection opened");

        tokio::spawn(connection_loop(
            stream,
            id,
            config.clone(),
            events.clone(),
            connections.clone(),
            shutdown.clone(),
        ));
    }
}

async fn connection_loop(
    stream: TcpStream,
    id: u64,
    config: MllpServerConfig,
    events: Arc<dyn MllpEvents>,
    connections: Arc<Mutex<HashMap<u64, ConnectionInfo>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let framed = Framed::new(stream, MllpCodec::new(config.max_frame_size));
    let (mut sink, mut frames) = framed.split::<String>();

    // A single writer task serializes replies on this connection.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = sink.send(payload).await {
                debug!(error = %e, "reply write failed");
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = tokio::time::timeout(config.idle_timeout, frames.next()) => frame,
        };

        match frame {
            Err(_) => {
                info!(connection = id, "idle timeout, closing connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                error!(connection = id, error = %e, "socket read failed");
                events.on_error(e, id);
                break;
            }
            Ok(Some(Ok(Err(e)))) => {
                // Malformed frame: report and keep reading
                error!(connection = id, error = %e, "frame decode failed");
                events.on_error(e, id);
            }
            Ok(Some(Ok(Ok(payload)))) => {
                if let Ok(mut table) = connections.lock() {
                    if let Some(info) = table.get_mut(&id) {
                        info.messages_received += 1;
                    }
                }
                match hale_parser::parse(&payload) {
                    Ok(message) => {
                        let reply = Reply {
                            connection_id: id,
                            tx: tx.clone(),
                        };
                        events.on_message(message, reply);
                    }
                    Err(e) => {
                        error!(connection = id, error = %e, "message parse failed");
                        events.on_error(e, id);
                    }
                }
            }
        }
    }

    drop(tx);
    let _ = writer.await;
    if let Ok(mut table) = connections.lock() {
        table.remove(&id);
    }
    events.on_connection_close(id);
    info!(connection = id, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hale_core::builder::ack::AckFactory;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const ADT: &str = "MSH|^~\\&|TRIBAL|FACILITY|DEST|FAC|20240115120000||ADT^A01|MSG001|P|2.5.1\rEVN|A01\rPID|1||MRN001||DOE^JOHN\rPV1|1|I";

    struct AckEvents;

    impl MllpEvents for AckEvents {
        fn on_message(&self, message: Message, reply: Reply) {
            let ack = AckFactory::for_message(&message).accept().build();
            let _ = reply.send(&ack);
        }
    }

    async fn start_server(max_connections: usize) -> MllpServer {
        let config = MllpServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_connections,
            ..Default::default()
        };
        MllpServer::start(config, Arc::new(AckEvents)).await.unwrap()
    }

    async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
        let mut collected = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before a full frame");
            collected.extend_from_slice(&buf[..n]);
            if collected.len() >= 2
                && collected[collected.len() - 2] == crate::codec::END_OF_BLOCK
                && collected[collected.len() - 1] == crate::codec::CARRIAGE_RETURN
            {
                return collected;
            }
        }
    }

    #[tokio::test]
    async fn test_message_gets_ack_on_same_connection() {
        let server = start_server(10).await;
        let addr = server.local_addr();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&MllpCodec::frame(ADT)).await.unwrap();

        let frame = read_frame(&mut stream).await;
        let ack = String::from_utf8(frame[1..frame.len() - 2].to_vec()).unwrap();
        assert!(ack.contains("MSA|AA|MSG001"));
        // The ACK swaps sender and receiver
        assert!(ack.starts_with("MSH|^~\\&|DEST|FAC|TRIBAL|FACILITY|"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_connection_cap_closes_excess() {
        let server = start_server(1).await;
        let addr = server.local_addr();

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(&MllpCodec::frame(ADT)).await.unwrap();
        let _ = read_frame(&mut first).await;
        assert_eq!(server.connection_count(), 1);

        // Second connection is accepted then closed without service
        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 16];
        match second.read(&mut buf).await {
            Ok(n) => assert_eq!(n, 0, "excess connection should be closed"),
            Err(_) => {} // reset by peer is also a close
        }
        assert_eq!(server.connection_count(), 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_multiple_frames_one_connection() {
        let server = start_server(10).await;
        let addr = server.local_addr();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut bytes = MllpCodec::frame(ADT);
        bytes.extend(MllpCodec::frame(&ADT.replace("MSG001", "MSG002")));
        stream.write_all(&bytes).await.unwrap();

        let first = read_frame(&mut stream).await;
        let second = read_frame(&mut stream).await;
        let first = String::from_utf8(first).unwrap();
        let second = String::from_utf8(second).unwrap();
        assert!(first.contains("MSA|AA|MSG001"));
        assert!(second.contains("MSA|AA|MSG002"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_closes_connections() {
        let server = start_server(10).await;
        let addr = server.local_addr();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&MllpCodec::frame(ADT)).await.unwrap();
        let _ = read_frame(&mut stream).await;

        server.stop().await;

        let mut buf = [0u8; 16];
        match stream.read(&mut buf).await {
            Ok(n) => assert_eq!(n, 0, "server stop should close the socket"),
            Err(_) => {}
        }
    }
}
