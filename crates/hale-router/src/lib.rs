//! Message routing for HL7 v2.x messages
//!
//! The router dispatches parsed messages to registered handlers keyed by
//! message type and trigger event (either may be the `*` wildcard),
//! translates handler results into application acknowledgments, and keeps
//! messages that could not be processed in a bounded in-memory dead-letter
//! queue keyed by control ID.
//!
//! ## Example
//!
//! ```
//! use hale_router::{HandlerResult, MessageRouter};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), hale_router::RouterError> {
//! let router = MessageRouter::new();
//! router.register("ADT", "A01", |_message| async move {
//!     Ok(HandlerResult::accept())
//! });
//!
//! let raw = "MSH|^~\\&|A|B|C|D|20240115120000||ADT^A01|MSG1|P|2.5.1\rEVN|A01\rPID|1||MRN||DOE^J\rPV1|1|I";
//! let message = hale_parser::parse(raw)?;
//! let ack = router.route(&message).await?;
//! assert_eq!(ack.find_segment("MSA").unwrap().field_value(1), "AA");
//! # Ok(())
//! # }
//! ```

pub mod dlq;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use hale_core::builder::ack::{AckCode, AckFactory};
use hale_core::message::Message;
use hale_mllp::{MllpEvents, Reply};
use thiserror::Error;
use tracing::{error, info, warn};

pub use dlq::{DeadLetterEntry, DeadLetterQueue};

/// Router errors surfaced to callers
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("no dead-letter entry for control ID {0}")]
    UnknownControlId(String),

    #[error(transparent)]
    Core(#[from] hale_core::Error),
}

/// Outcome a handler reports for one message
#[derive(Debug, Clone)]
pub struct HandlerResult {
    pub success: bool,
    pub ack_code: AckCode,
    pub error_message: Option<String>,
}

impl HandlerResult {
    /// Successful processing, AA acknowledgment
    pub fn accept() -> Self {
        Self {
            success: true,
            ack_code: AckCode::Accept,
            error_message: None,
        }
    }

    /// Processing error, AE acknowledgment with a diagnostic
    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            ack_code: AckCode::Error,
            error_message: Some(message.to_string()),
        }
    }

    /// Rejection, AR acknowledgment with a reason
    pub fn reject(message: &str) -> Self {
        Self {
            success: false,
            ack_code: AckCode::Reject,
            error_message: Some(message.to_string()),
        }
    }
}

/// Boxed async message handler
pub type Handler = Arc<
    dyn Fn(Message) -> Pin<Box<dyn Future<Output = anyhow::Result<HandlerResult>> + Send>>
        + Send
        + Sync,
>;

struct Registration {
    message_type: String,
    trigger_event: String,
    handler: Handler,
}

enum RouteOutcome {
    Handled(bool),
    DeadLettered,
}

/// Handler registry and dispatcher
///
/// Registrations and the dead-letter queue each sit behind their own lock;
/// routing reads a snapshot of the matching handler and never holds a lock
/// across the handler call.
pub struct MessageRouter {
    registrations: RwLock<Vec<Registration>>,
    dlq: DeadLetterQueue,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    /// Create a router with the default dead-letter capacity (1000)
    pub fn new() -> Self {
        Self::with_max_dead_letters(dlq::DEFAULT_MAX_DEAD_LETTERS)
    }

    /// Create a router with a custom dead-letter capacity
    pub fn with_max_dead_letters(max: usize) -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            dlq: DeadLetterQueue::new(max),
        }
    }

    /// Register a handler for a message type and trigger event
    ///
    /// Either key may be `"*"`. Registering the same pair again replaces
    /// the previous handler.
    pub fn register<F, Fut>(&self, message_type: &str, trigger_event: &str, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<HandlerResult>> + Send + 'static,
    {
        let message_type = message_type.to_uppercase();
        let trigger_event = trigger_event.to_uppercase();
        let handler: Handler = Arc::new(move |message| Box::pin(handler(message)));

        if let Ok(mut registrations) = self.registrations.write() {
            if let Some(existing) = registrations
                .iter_mut()
                .find(|r| r.message_type == message_type && r.trigger_event == trigger_event)
            {
                warn!(%message_type, %trigger_event, "replacing existing handler");
                existing.handler = handler;
            } else {
                info!(%message_type, %trigger_event, "handler registered");
                registrations.push(Registration {
                    message_type,
                    trigger_event,
                    handler,
                });
            }
        }
    }

    /// Remove the handler for a message type and trigger event
    pub fn unregister(&self, message_type: &str, trigger_event: &str) {
        let message_type = message_type.to_uppercase();
        let trigger_event = trigger_event.to_uppercase();

        if let Ok(mut registrations) = self.registrations.write() {
            let before = registrations.len();
            registrations
                .retain(|r| !(r.message_type == message_type && r.trigger_event == trigger_event));
            if registrations.len() == before {
                warn!(%message_type, %trigger_event, "unregister for unknown handler");
            }
        }
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.registrations.read().map(|r| r.len()).unwrap_or(0)
    }

    /// The dead-letter queue
    pub fn dead_letters(&self) -> &DeadLetterQueue {
        &self.dlq
    }

    /// Route a message to its handler and build the acknowledgment
    ///
    /// Every call yields an ACK: AA/AE/AR from the handler's result, AE
    /// when the handler fails, AR when no handler matches. Failures land
    /// in the dead-letter queue.
    pub async fn route(&self, message: &Message) -> Result<Message, RouterError> {
        let (ack, _) = self.route_inner(message).await?;
        Ok(ack)
    }

    async fn route_inner(&self, message: &Message) -> Result<(Message, RouteOutcome), RouterError> {
        let message_type = message.header.type_code().to_uppercase();
        let trigger_event = message.header.trigger_event().to_uppercase();

        let handler = self.lookup(&message_type, &trigger_event);

        let handler = match handler {
            Some(handler) => handler,
            None => {
                let reason = format!(
                    "no handler registered for {}^{}",
                    message_type, trigger_event
                );
                warn!(control_id = message.control_id(), %reason, "message dead-lettered");
                self.dlq.add(message.clone(), "no handler", &reason);
                let ack = AckFactory::for_message(message).reject(&reason).build();
                return Ok((hale_parser::parse(&ack)?, RouteOutcome::DeadLettered));
            }
        };

        match handler(message.clone()).await {
            Ok(result) => {
                let mut factory = AckFactory::for_message(message).code(result.ack_code);
                if let Some(text) = &result.error_message {
                    factory = factory.text_message(text);
                }
                let ack = factory.build();
                Ok((
                    hale_parser::parse(&ack)?,
                    RouteOutcome::Handled(result.success),
                ))
            }
            Err(e) => {
                let text = e.to_string();
                error!(control_id = message.control_id(), error = %text, "handler failed");
                self.dlq.add(message.clone(), "handler exception", &text);
                let ack = AckFactory::for_message(message).error(&text).build();
                Ok((hale_parser::parse(&ack)?, RouteOutcome::DeadLettered))
            }
        }
    }

    /// Re-route a dead-lettered message
    ///
    /// On success the entry is removed; on another failure the standard
    /// dead-letter path updates it in place with a bumped attempt count.
    pub async fn retry(&self, control_id: &str) -> Result<Message, RouterError> {
        let message = self
            .dlq
            .get(control_id)
            .ok_or_else(|| RouterError::UnknownControlId(control_id.to_string()))?
            .message;

        let (ack, outcome) = self.route_inner(&message).await?;
        if matches!(outcome, RouteOutcome::Handled(true)) {
            self.dlq.remove(control_id);
            info!(control_id, "dead-letter retry succeeded");
        }
        Ok(ack)
    }

    /// Lookup order: exact, then `(type, *)`, then `(*, *)`
    fn lookup(&self, message_type: &str, trigger_event: &str) -> Option<Handler> {
        let registrations = self.registrations.read().ok()?;

        for (wanted_type, wanted_trigger) in [
            (message_type, trigger_event),
            (message_type, "*"),
            ("*", "*"),
        ] {
            if let Some(registration) = registrations
                .iter()
                .find(|r| r.message_type == wanted_type && r.trigger_event == wanted_trigger)
            {
                return Some(registration.handler.clone());
            }
        }
        None
    }
}

/// Adapter that feeds MLLP server events through a router
///
/// Each inbound message is routed on its own task and the ACK written back
/// through the connection's reply handle, so a slow handler never blocks
/// dispatch on other frames or connections.
pub struct MllpRouterBridge {
    router: Arc<MessageRouter>,
}

impl MllpRouterBridge {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self { router }
    }
}

impl MllpEvents for MllpRouterBridge {
    fn on_message(&self, message: Message, reply: Reply) {
        let router = self.router.clone();
        tokio::spawn(async move {
            match router.route(&message).await {
                Ok(ack) => {
                    if let Err(e) = reply.send(&ack.raw) {
                        warn!(error = %e, "failed to write ACK");
                    }
                }
                Err(e) => error!(error = %e, "routing failed"),
            }
        });
    }

    fn on_error(&self, error: hale_core::Error, connection_id: u64) {
        warn!(connection_id, error = %error, "inbound message error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADT: &str = "MSH|^~\\&|TRIBAL|FACILITY|DEST|FAC|20240115120000||ADT^A01|MSG001|P|2.5.1\rEVN|A01\rPID|1||MRN001||DOE^JOHN\rPV1|1|I";

    fn parse(raw: &str) -> Message {
        hale_parser::parse(raw).unwrap()
    }

    fn msa(ack: &Message, field: usize) -> String {
        ack.find_segment("MSA").unwrap().field_value(field).to_string()
    }

    #[tokio::test]
    async fn test_dispatch_and_ack() {
        let router = MessageRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        router.register("ADT", "A01", move |_message| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerResult::accept())
            }
        });

        let ack = router.route(&parse(ADT)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(ack.header.message_type.starts_with("ACK"));
        assert_eq!(msa(&ack, 1), "AA");
        assert_eq!(msa(&ack, 2), "MSG001");
        assert!(router.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_order() {
        let router = MessageRouter::new();
        let hits: Arc<std::sync::Mutex<Vec<&'static str>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));

        for (ty, trigger, label) in [("*", "*", "any"), ("ADT", "*", "adt"), ("ADT", "A01", "exact")] {
            let hits = hits.clone();
            router.register(ty, trigger, move |_message| {
                let hits = hits.clone();
                async move {
                    hits.lock().unwrap().push(label);
                    Ok(HandlerResult::accept())
                }
            });
        }

        router.route(&parse(ADT)).await.unwrap();
        router
            .route(&parse(&ADT.replace("ADT^A01", "ADT^A08")))
            .await
            .unwrap();
        router
            .route(&parse(&ADT.replace("ADT^A01", "ORU^R01")))
            .await
            .unwrap();

        assert_eq!(*hits.lock().unwrap(), vec!["exact", "adt", "any"]);
    }

    #[tokio::test]
    async fn test_no_handler_rejects_and_dead_letters() {
        let router = MessageRouter::new();
        let ack = router.route(&parse(ADT)).await.unwrap();

        assert_eq!(msa(&ack, 1), "AR");
        assert!(msa(&ack, 3).contains("no handler"));
        let err = ack.find_segment("ERR").unwrap();
        assert_eq!(err.field_value(3), "200^Unsupported message type");
        assert_eq!(err.field_value(4), "E");

        let entries = router.dead_letters().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, "no handler");
        assert_eq!(entries[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_handler_error_produces_ae() {
        let router = MessageRouter::new();
        router.register("ADT", "A01", |_message| async move {
            Err(anyhow::anyhow!("database connection lost"))
        });

        let ack = router.route(&parse(ADT)).await.unwrap();

        assert_eq!(msa(&ack, 1), "AE");
        assert_eq!(msa(&ack, 3), "database connection lost");
        let err = ack.find_segment("ERR").unwrap();
        assert_eq!(err.field_value(3), "207^Application internal error");
        assert_eq!(err.field_value(7), "database connection lost");

        let entries = router.dead_letters().entries();
        assert_eq!(entries[0].reason, "handler exception");
    }

    #[tokio::test]
    async fn test_handler_reject_result() {
        let router = MessageRouter::new();
        router.register("ADT", "A01", |_message| async move {
            Ok(HandlerResult::reject("processing disabled"))
        });

        let ack = router.route(&parse(ADT)).await.unwrap();
        assert_eq!(msa(&ack, 1), "AR");
        // A handled rejection is not dead-lettered
        assert!(router.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_unregister() {
        let router = MessageRouter::new();
        router.register("ADT", "A01", |_message| async move {
            Ok(HandlerResult::accept())
        });
        assert_eq!(router.handler_count(), 1);

        router.unregister("ADT", "A01");
        assert_eq!(router.handler_count(), 0);

        let ack = router.route(&parse(ADT)).await.unwrap();
        assert_eq!(msa(&ack, 1), "AR");

        // Unknown unregistration only logs
        router.unregister("ORU", "R01");
    }

    #[tokio::test]
    async fn test_register_replaces() {
        let router = MessageRouter::new();
        router.register("ADT", "A01", |_message| async move {
            Ok(HandlerResult::accept())
        });
        router.register("ADT", "A01", |_message| async move {
            Ok(HandlerResult::error("second handler"))
        });

        assert_eq!(router.handler_count(), 1);
        let ack = router.route(&parse(ADT)).await.unwrap();
        assert_eq!(msa(&ack, 1), "AE");
    }

    #[tokio::test]
    async fn test_retry_redelivers() {
        let router = MessageRouter::new();

        // First routing fails: no handler
        router.route(&parse(ADT)).await.unwrap();
        assert_eq!(router.dead_letters().len(), 1);

        // Still no handler: the entry stays with a bumped count
        let ack = router.retry("MSG001").await.unwrap();
        assert_eq!(msa(&ack, 1), "AR");
        assert_eq!(router.dead_letters().get("MSG001").unwrap().attempts, 2);

        // Now register and retry to success
        router.register("ADT", "A01", |_message| async move {
            Ok(HandlerResult::accept())
        });
        let ack = router.retry("MSG001").await.unwrap();
        assert_eq!(msa(&ack, 1), "AA");
        assert!(router.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_retry_unknown_control_id() {
        let router = MessageRouter::new();
        assert!(matches!(
            router.retry("NOPE").await,
            Err(RouterError::UnknownControlId(_))
        ));
    }
}
