//! Structured view of the MSH segment

use crate::segment::Segment;

/// The MSH-3 through MSH-12 fields of a message header
///
/// `message_type` keeps the raw MSH-9 value (e.g. `ADT^A01` or
/// `ADT^A01^ADT_A01`); the `type_code`/`trigger_event` accessors split it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
    pub timestamp: String,
    pub security: String,
    pub message_type: String,
    pub message_control_id: String,
    pub processing_id: String,
    pub version_id: String,
}

impl MessageHeader {
    /// Build the header view from a parsed MSH segment
    pub fn from_msh(msh: &Segment) -> Self {
        Self {
            sending_application: msh.field_value(3).to_string(),
            sending_facility: msh.field_value(4).to_string(),
            receiving_application: msh.field_value(5).to_string(),
            receiving_facility: msh.field_value(6).to_string(),
            timestamp: msh.field_value(7).to_string(),
            security: msh.field_value(8).to_string(),
            message_type: msh.field_value(9).to_string(),
            message_control_id: msh.field_value(10).to_string(),
            processing_id: msh.field_value(11).to_string(),
            version_id: msh.field_value(12).to_string(),
        }
    }

    /// The message type code (first component of MSH-9)
    pub fn type_code(&self) -> &str {
        self.message_type.split('^').next().unwrap_or("")
    }

    /// The trigger event (second component of MSH-9)
    pub fn trigger_event(&self) -> &str {
        self.message_type.split('^').nth(1).unwrap_or("")
    }
}
