//! CDS service registry and dispatcher
//!
//! Services register under `(service_id, hook)`. Invoking a hook fans out
//! to every matching service in parallel with a per-service timeout and
//! settle-all collection: one service failing or timing out never affects
//! the others, and cards aggregate in registration order.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CdsError, Result};
use crate::overrides::OverrideLog;
use crate::types::{CdsRequest, CdsResponse, ServiceDescriptor};

/// Default per-service invocation timeout
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(10);

/// Boxed async service handler
pub type ServiceHandler = Arc<
    dyn Fn(CdsRequest) -> Pin<Box<dyn Future<Output = Result<CdsResponse>> + Send>> + Send + Sync,
>;

struct RegisteredService {
    descriptor: ServiceDescriptor,
    handler: ServiceHandler,
}

/// The CDS engine
///
/// # Example
///
/// ```
/// use hale_cds::{CdsCard, CdsEngine, CdsRequest, CdsResponse, Indicator, ServiceDescriptor};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let engine = CdsEngine::new();
/// engine.register(
///     ServiceDescriptor {
///         id: "hello".to_string(),
///         hook: "patient-view".to_string(),
///         title: "Hello".to_string(),
///         description: "Greets the chart".to_string(),
///         prefetch: None,
///         usage_requirements: None,
///     },
///     |_request| async move {
///         Ok(CdsResponse::with_cards(vec![CdsCard::new(
///             "Hello", Indicator::Info, "Demo",
///         )]))
///     },
/// );
///
/// let response = engine.invoke_hook(&CdsRequest::for_hook("patient-view")).await;
/// assert_eq!(response.cards.len(), 1);
/// assert!(!response.cards[0].uuid.is_empty());
/// # }
/// ```
pub struct CdsEngine {
    services: RwLock<Vec<RegisteredService>>,
    overrides: OverrideLog,
    service_timeout: Duration,
}

impl Default for CdsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CdsEngine {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SERVICE_TIMEOUT)
    }

    /// An engine with a custom per-service timeout
    pub fn with_timeout(service_timeout: Duration) -> Self {
        Self {
            services: RwLock::new(Vec::new()),
            overrides: OverrideLog::new(),
            service_timeout,
        }
    }

    /// Register a service; a duplicate ID replaces the previous handler
    pub fn register<F, Fut>(&self, descriptor: ServiceDescriptor, handler: F)
    where
        F: Fn(CdsRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CdsResponse>> + Send + 'static,
    {
        let handler: ServiceHandler = Arc::new(move |request| Box::pin(handler(request)));
        let service = RegisteredService {
            descriptor,
            handler,
        };

        if let Ok(mut services) = self.services.write() {
            if let Some(existing) = services
                .iter_mut()
                .find(|s| s.descriptor.id == service.descriptor.id)
            {
                warn!(service = %service.descriptor.id, "replacing existing CDS service");
                *existing = service;
            } else {
                info!(service = %service.descriptor.id, hook = %service.descriptor.hook, "CDS service registered");
                services.push(service);
            }
        }
    }

    /// Remove a service by ID; unknown IDs only log
    pub fn unregister(&self, service_id: &str) {
        if let Ok(mut services) = self.services.write() {
            let before = services.len();
            services.retain(|s| s.descriptor.id != service_id);
            if services.len() == before {
                warn!(service = service_id, "unregister for unknown CDS service");
            }
        }
    }

    /// Number of registered services
    pub fn service_count(&self) -> usize {
        self.services.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Service descriptors for the discovery document
    pub fn discovery(&self) -> Vec<ServiceDescriptor> {
        self.services
            .read()
            .map(|services| services.iter().map(|s| s.descriptor.clone()).collect())
            .unwrap_or_default()
    }

    /// The override log
    pub fn overrides(&self) -> &OverrideLog {
        &self.overrides
    }

    /// Invoke one service by ID (the `POST /cds-services/{id}` path)
    pub async fn invoke(&self, service_id: &str, request: &CdsRequest) -> Result<CdsResponse> {
        let handler = {
            let services = self
                .services
                .read()
                .map_err(|_| CdsError::service("service registry poisoned"))?;
            services
                .iter()
                .find(|s| s.descriptor.id == service_id)
                .map(|s| s.handler.clone())
                .ok_or_else(|| CdsError::UnknownService(service_id.to_string()))?
        };

        let response = tokio::time::timeout(self.service_timeout, handler(request.clone()))
            .await
            .map_err(|_| CdsError::Timeout(self.service_timeout))??;

        Ok(assign_card_uuids(response))
    }

    /// Invoke every service registered for the request's hook
    ///
    /// Handlers run in parallel, each under the service timeout. Failures
    /// and timeouts are logged and contribute nothing; cards aggregate in
    /// registration order and every card is guaranteed a UUID.
    pub async fn invoke_hook(&self, request: &CdsRequest) -> CdsResponse {
        let matching: Vec<(String, ServiceHandler)> = self
            .services
            .read()
            .map(|services| {
                services
                    .iter()
                    .filter(|s| s.descriptor.hook == request.hook)
                    .map(|s| (s.descriptor.id.clone(), s.handler.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let timeout = self.service_timeout;
        let tasks: Vec<_> = matching
            .into_iter()
            .map(|(id, handler)| {
                let request = request.clone();
                let task = tokio::spawn(async move {
                    tokio::time::timeout(timeout, handler(request)).await
                });
                (id, task)
            })
            .collect();

        let mut cards = Vec::new();
        let mut system_actions = Vec::new();
        for (id, task) in tasks {
            match task.await {
                Ok(Ok(Ok(response))) => {
                    cards.extend(response.cards);
                    system_actions.extend(response.system_actions.unwrap_or_default());
                }
                Ok(Ok(Err(e))) => warn!(service = %id, error = %e, "CDS service failed"),
                Ok(Err(_)) => warn!(service = %id, ?timeout, "CDS service timed out"),
                Err(e) => warn!(service = %id, error = %e, "CDS service task aborted"),
            }
        }

        assign_card_uuids(CdsResponse {
            cards,
            system_actions: if system_actions.is_empty() {
                None
            } else {
                Some(system_actions)
            },
        })
    }
}

fn assign_card_uuids(mut response: CdsResponse) -> CdsResponse {
    for card in &mut response.cards {
        if card.uuid.is_empty() {
            card.uuid = Uuid::new_v4().to_string();
        }
    }
    response
}
