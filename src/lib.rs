//! # hale - HL7 v2.x Messaging Engine
//!
//! The interoperability spine of an EHR: parse, build, validate, route,
//! and acknowledge HL7 v2.x messages transported over MLLP, plus a CDS
//! Hooks engine for clinical decision support.
//!
//! ## Features
//!
//! - **Parsing and Serialization**: Delimiter- and escape-aware
//!   decomposition into segments, fields, components, and subcomponents
//! - **Message Builder**: Fluent builder with typed helpers for the
//!   common clinical segments, plus the ACK factory
//! - **Validation**: Rule-driven structural and field-format checks per
//!   message type
//! - **MLLP Transport**: Framed TCP server and client with timeouts,
//!   connection limits, and retry
//! - **Routing**: Handler registry with wildcard matching, automatic
//!   acknowledgments, and a dead-letter queue
//! - **CDS Hooks**: Service registry, parallel fan-out, rule handlers,
//!   and the `/cds-services` HTTP surface
//!
//! ## Supported Message Types
//!
//! ADT (A01-A04, A08, A11, A13), ORM^O01, ORU^R01, OML^O21, VXU^V04,
//! RDE^O11, SIU (S12-S15, S26), MDM^T02, and ACK.
//!
//! ## Quick Start
//!
//! ```rust
//! let raw = "MSH|^~\\&|SendApp|SendFac|RecApp|RecFac|20240315120000||ADT^A01|12345|P|2.5.1\rEVN|A01\rPID|1||67890^^^MRN||DOE^JOHN^A||19800101|M\rPV1|1|I";
//!
//! let message = hale::parser::parse(raw).unwrap();
//! assert_eq!(message.header.message_type, "ADT^A01");
//!
//! let pid = message.find_segment("PID").unwrap();
//! assert_eq!(pid.component_value(5, 1), "DOE");
//!
//! let result = hale::validator::Validator::new().validate(&message);
//! assert!(result.is_valid());
//! ```

pub use hale_cds as cds;
pub use hale_core as core;
pub use hale_mllp as mllp;
pub use hale_parser as parser;
pub use hale_router as router;
pub use hale_validator as validator;

// Re-export commonly used types
pub use hale_core::{
    builder::ack::{AckCode, AckFactory},
    builder::{MessageBuilder, MshConfig},
    encoding::EncodingSet,
    error::{Error, Result},
    field::{Component, Field},
    header::MessageHeader,
    message::Message,
    segment::Segment,
};
