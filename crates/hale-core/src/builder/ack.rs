//! ACK factory
//!
//! Builds application acknowledgments (AA / AE / AR) for a received
//! message: sending and receiving applications and facilities are swapped,
//! MSA-2 echoes the original control ID, and AE/AR acknowledgments with a
//! diagnostic also carry an ERR segment.
//!
//! # Example
//!
//! ```
//! use hale_core::builder::ack::AckFactory;
//! # use hale_core::{EncodingSet, Message, MessageHeader, Segment, Field};
//! # let mut msh = Segment::new("MSH");
//! # for v in ["|", "^~\\&", "LAB", "LABFAC", "EHR", "EHRFAC", "20240101120000", "",
//! #           "ORU^R01", "MSG42", "P", "2.5.1"] {
//! #     msh.push_field(Field::from_value(v));
//! # }
//! # let header = MessageHeader::from_msh(&msh);
//! # let original = Message { raw: String::new(), segments: vec![msh], header,
//! #                          encoding: EncodingSet::default() };
//! let ack = AckFactory::for_message(&original).accept().build();
//! assert!(ack.contains("MSA|AA|MSG42"));
//! ```

use super::{MessageBuilder, MshConfig, DEFAULT_VERSION_ID};
use crate::message::Message;

/// Application acknowledgment codes (original mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    /// AA - Application Accept
    Accept,
    /// AE - Application Error
    Error,
    /// AR - Application Reject
    Reject,
}

impl AckCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckCode::Accept => "AA",
            AckCode::Error => "AE",
            AckCode::Reject => "AR",
        }
    }
}

/// Builder for application acknowledgments
#[derive(Debug, Clone)]
pub struct AckFactory {
    trigger_event: String,
    original_control_id: String,
    sending_application: String,
    sending_facility: String,
    receiving_application: String,
    receiving_facility: String,
    processing_id: String,
    version_id: String,
    code: AckCode,
    text_message: Option<String>,
}

impl AckFactory {
    /// Create an ACK factory for a received message
    ///
    /// The original receiving application/facility become the ACK's
    /// sender, and vice versa.
    pub fn for_message(original: &Message) -> Self {
        let header = &original.header;

        let version_id = if header.version_id.is_empty() {
            DEFAULT_VERSION_ID.to_string()
        } else {
            header.version_id.clone()
        };
        let processing_id = if header.processing_id.is_empty() {
            "P".to_string()
        } else {
            header.processing_id.clone()
        };

        Self {
            trigger_event: header.trigger_event().to_string(),
            original_control_id: header.message_control_id.clone(),
            sending_application: header.receiving_application.clone(),
            sending_facility: header.receiving_facility.clone(),
            receiving_application: header.sending_application.clone(),
            receiving_facility: header.sending_facility.clone(),
            processing_id,
            version_id,
            code: AckCode::Accept,
            text_message: None,
        }
    }

    /// Acknowledge successful processing (AA)
    pub fn accept(mut self) -> Self {
        self.code = AckCode::Accept;
        self
    }

    /// Report a processing error (AE) with a diagnostic
    pub fn error(mut self, message: &str) -> Self {
        self.code = AckCode::Error;
        self.text_message = Some(message.to_string());
        self
    }

    /// Reject the message (AR) with a reason
    pub fn reject(mut self, message: &str) -> Self {
        self.code = AckCode::Reject;
        self.text_message = Some(message.to_string());
        self
    }

    /// Set the acknowledgment code directly
    pub fn code(mut self, code: AckCode) -> Self {
        self.code = code;
        self
    }

    /// Set the MSA-3 text message
    pub fn text_message(mut self, message: &str) -> Self {
        self.text_message = Some(message.to_string());
        self
    }

    /// Build the raw ACK message text
    pub fn build(&self) -> String {
        let mut builder = MessageBuilder::new();
        builder.create_message("ACK", &self.trigger_event);
        builder.add_msh(MshConfig {
            sending_application: self.sending_application.clone(),
            sending_facility: self.sending_facility.clone(),
            receiving_application: self.receiving_application.clone(),
            receiving_facility: self.receiving_facility.clone(),
            processing_id: self.processing_id.clone(),
            version_id: self.version_id.clone(),
            ..Default::default()
        });

        // The ACK structure name is always ACK, regardless of trigger
        let msh9 = if self.trigger_event.is_empty() {
            "ACK".to_string()
        } else {
            format!("ACK^{}^ACK", self.trigger_event)
        };
        builder.set_field(0, 9, &msh9).ok();

        let text = self.text_message.as_deref().unwrap_or("");
        builder.add_segment_with_fields(
            "MSA",
            &[self.code.as_str(), &self.original_control_id, text],
        );

        if !text.is_empty() {
            let error_code = match self.code {
                AckCode::Error => Some("207^Application internal error"),
                AckCode::Reject => Some("200^Unsupported message type"),
                AckCode::Accept => None,
            };
            if let Some(error_code) = error_code {
                builder.add_segment_with_fields(
                    "ERR",
                    &["", "", error_code, "E", "", "", text, text],
                );
            }
        }

        builder.build()
    }
}
