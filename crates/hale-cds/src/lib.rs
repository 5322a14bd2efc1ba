//! Clinical decision support engine (CDS Hooks)
//!
//! Hosts rule handlers invoked at hook points (`patient-view`,
//! `order-select`, `order-sign`, `medication-prescribe`):
//! - Registry with discovery, parallel fan-out, and per-service timeouts
//! - Failure isolation: one misbehaving service never spoils the response
//! - Built-in rule handlers over FHIR-shaped prefetch data
//! - External service proxying over HTTP
//! - Override tracking for dismissed cards
//! - The CDS Hooks HTTP surface (`/cds-services`)

pub mod engine;
pub mod error;
pub mod external;
pub mod handlers;
pub mod http;
pub mod overrides;
pub mod prefetch;
pub mod types;

pub use engine::{CdsEngine, ServiceHandler, DEFAULT_SERVICE_TIMEOUT};
pub use error::{CdsError, Result};
pub use external::register_external_services;
pub use handlers::register_builtin;
pub use http::{cds_router, serve};
pub use overrides::OverrideLog;
pub use types::{
    CardLink, CardSource, CdsCard, CdsRequest, CdsResponse, Coding, DiscoveryResponse, Indicator,
    OverrideRecord, ServiceDescriptor, Suggestion, SuggestionAction,
};
