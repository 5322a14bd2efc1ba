//! MLLP client
//!
//! Sends framed messages and awaits the framed acknowledgment on the same
//! connection, retrying with exponential backoff. The client does not
//! deduplicate: a response that times out after the peer processed the
//! message leads to a resend with the same control ID, and receivers are
//! expected to handle the repeat.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hale_core::error::{Error, Result};
use hale_core::message::Message;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::{MllpCodec, DEFAULT_MAX_FRAME_SIZE};

/// MLLP client configuration
#[derive(Debug, Clone)]
pub struct MllpClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Backoff before retry n is `base_backoff * 2^(n-1)`
    pub base_backoff: Duration,
    pub max_frame_size: usize,
}

impl Default for MllpClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2575,
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Client connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Sending,
    Awaiting,
}

#[derive(Default)]
struct CancelFlag {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle for aborting a client's in-flight waits from another task
#[derive(Clone)]
pub struct MllpClientHandle {
    cancel: Arc<CancelFlag>,
}

impl MllpClientHandle {
    /// Abort in-flight connects, sends, and backoff sleeps with
    /// [`Error::Cancelled`]
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// MLLP client
///
/// # Example
///
/// ```no_run
/// use hale_mllp::{MllpClient, MllpClientConfig};
///
/// # async fn example() -> hale_core::Result<()> {
/// let config = MllpClientConfig {
///     host: "lab.example.org".to_string(),
///     port: 2575,
///     ..Default::default()
/// };
/// let mut client = MllpClient::new(config);
/// let ack = client.send("MSH|^~\\&|EHR|FAC|LAB|LABFAC|20240101120000||ORM^O01|MSG1|P|2.5.1").await?;
/// assert!(ack.find_segment("MSA").is_some());
/// # Ok(())
/// # }
/// ```
pub struct MllpClient {
    config: MllpClientConfig,
    framed: Option<Framed<TcpStream, MllpCodec>>,
    state: ClientState,
    cancel: Arc<CancelFlag>,
}

impl MllpClient {
    pub fn new(config: MllpClientConfig) -> Self {
        Self {
            config,
            framed: None,
            state: ClientState::Disconnected,
            cancel: Arc::new(CancelFlag::default()),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Handle for cancelling from another task
    pub fn handle(&self) -> MllpClientHandle {
        MllpClientHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Send a raw message and await the parsed response
    ///
    /// Makes up to `max_retries + 1` attempts; between attempts the socket
    /// is destroyed and the client sleeps `base_backoff * 2^n`. After
    /// exhaustion, [`Error::SendFailed`] carries the last underlying
    /// error.
    pub async fn send(&mut self, message: &str) -> Result<Message> {
        let total_attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..total_attempts {
            if attempt > 0 {
                let backoff = self.config.base_backoff * 2u32.pow(attempt - 1);
                debug!(attempt, ?backoff, "retrying after backoff");
                if self.cancelled_during(tokio::time::sleep(backoff)).await {
                    return Err(Error::Cancelled);
                }
            }

            match self.try_send(message).await {
                Ok(response) => return Ok(response),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(attempt, error = %e, "send attempt failed");
                    self.disconnect();
                    last_error = Some(e);
                }
            }
        }

        Err(Error::SendFailed {
            attempts: total_attempts,
            last: Box::new(last_error.unwrap_or(Error::Cancelled)),
        })
    }

    /// Close the socket and return to the disconnected state
    pub fn disconnect(&mut self) {
        self.framed = None;
        self.state = ClientState::Disconnected;
    }

    async fn try_send(&mut self, message: &str) -> Result<Message> {
        if self.framed.is_none() {
            self.connect().await?;
        }
        let framed = match self.framed.as_mut() {
            Some(framed) => framed,
            None => return Err(Error::network("not connected")),
        };

        self.state = ClientState::Sending;
        let write = framed.send(message.to_string());
        tokio::select! {
            _ = self.cancel.wait() => return Err(Error::Cancelled),
            result = write => result?,
        }

        self.state = ClientState::Awaiting;
        let response = tokio::select! {
            _ = self.cancel.wait() => return Err(Error::Cancelled),
            response = tokio::time::timeout(self.config.response_timeout, framed.next()) => response,
        };

        let payload = match response {
            Err(_) => return Err(Error::Timeout(self.config.response_timeout)),
            Ok(None) => return Err(Error::network("connection closed before response")),
            Ok(Some(Err(e))) => return Err(e),
            Ok(Some(Ok(Err(e)))) => return Err(e),
            Ok(Some(Ok(Ok(payload)))) => payload,
        };

        self.state = ClientState::Connected;
        hale_parser::parse(&payload)
    }

    async fn connect(&mut self) -> Result<()> {
        self.state = ClientState::Connecting;
        let addr = (self.config.host.as_str(), self.config.port);

        let connect = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr));
        let stream = tokio::select! {
            _ = self.cancel.wait() => {
                self.state = ClientState::Disconnected;
                return Err(Error::Cancelled);
            }
            connected = connect => match connected {
                Err(_) => {
                    self.state = ClientState::Disconnected;
                    return Err(Error::Timeout(self.config.connect_timeout));
                }
                Ok(Err(e)) => {
                    self.state = ClientState::Disconnected;
                    return Err(Error::network(format!("connect failed: {}", e)));
                }
                Ok(Ok(stream)) => stream,
            },
        };

        self.framed = Some(Framed::new(
            stream,
            MllpCodec::new(self.config.max_frame_size),
        ));
        self.state = ClientState::Connected;
        Ok(())
    }

    async fn cancelled_during<F: std::future::Future>(&self, fut: F) -> bool {
        tokio::select! {
            _ = self.cancel.wait() => true,
            _ = fut => self.cancel.is_cancelled(),
        }
    }
}
