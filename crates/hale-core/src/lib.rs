//! Core data structures and types for HL7 v2.x message processing
//!
//! This crate provides the foundational types used throughout the hale engine:
//! - Message structure hierarchy (Message, Segment, Field, Component)
//! - The encoding character set and escape sequence handling
//! - A fluent message builder with typed segment helpers
//! - The ACK factory for application acknowledgments
//! - Error types

pub mod builder;
pub mod encoding;
pub mod error;
pub mod escape;
pub mod field;
pub mod header;
pub mod message;
pub mod segment;

pub use builder::{MessageBuilder, MshConfig};
pub use builder::ack::{AckCode, AckFactory};
pub use encoding::EncodingSet;
pub use error::{Error, Result};
pub use field::{Component, Field};
pub use header::MessageHeader;
pub use message::Message;
pub use segment::Segment;
