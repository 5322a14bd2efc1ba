//! Fluent builder for HL7 v2.x messages
//!
//! The builder accumulates segments as wire-format field strings and emits
//! the raw message text. Typed helpers for the common clinical segments
//! live in [`segments`]; the ACK factory in [`ack`].
//!
//! Field values are emitted verbatim; composite helpers join their parts
//! with the component separator. Callers embedding reserved characters in
//! free text should escape them with [`crate::escape::encode`].

pub mod ack;
pub mod segments;

use crate::error::{Error, Result};
use chrono::{Local, NaiveDateTime};
use uuid::Uuid;

/// Default sending application for outbound messages
pub const DEFAULT_SENDING_APPLICATION: &str = "TRIBAL-EHR";

/// Default HL7 version for outbound messages
pub const DEFAULT_VERSION_ID: &str = "2.5.1";

/// Configuration for the MSH segment of a built message
#[derive(Debug, Clone)]
pub struct MshConfig {
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
    pub security: String,
    /// MSH-7; generated from the local clock when `None`
    pub timestamp: Option<String>,
    /// MSH-10; generated when `None`
    pub message_control_id: Option<String>,
    pub processing_id: String,
    pub version_id: String,
}

impl Default for MshConfig {
    fn default() -> Self {
        Self {
            sending_application: DEFAULT_SENDING_APPLICATION.to_string(),
            sending_facility: String::new(),
            receiving_application: String::new(),
            receiving_facility: String::new(),
            security: String::new(),
            timestamp: None,
            message_control_id: None,
            processing_id: "P".to_string(),
            version_id: DEFAULT_VERSION_ID.to_string(),
        }
    }
}

struct RawSegment {
    name: String,
    /// Fields in 1-based external order (for MSH, index 0 holds the field
    /// separator and index 1 the encoding characters)
    fields: Vec<String>,
}

/// Fluent accumulator producing raw HL7 message text
///
/// # Example
///
/// ```
/// use hale_core::builder::{MessageBuilder, MshConfig};
///
/// let mut builder = MessageBuilder::new();
/// builder.create_message("ADT", "A01");
/// builder.add_msh(MshConfig::default());
/// builder.add_segment("EVN");
/// let raw = builder.build();
/// assert!(raw.starts_with("MSH|^~\\&|TRIBAL-EHR|"));
/// ```
#[derive(Default)]
pub struct MessageBuilder {
    message_type: String,
    trigger_event: String,
    segments: Vec<RawSegment>,
}

impl MessageBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            message_type: String::new(),
            trigger_event: String::new(),
            segments: Vec::new(),
        }
    }

    /// Reset the builder and record the message type and trigger event
    pub fn create_message(&mut self, message_type: &str, trigger_event: &str) -> &mut Self {
        self.message_type = message_type.to_string();
        self.trigger_event = trigger_event.to_string();
        self.segments.clear();
        self
    }

    /// Append the MSH segment
    ///
    /// MSH-9 is `TYPE^TRIGGER^TYPE_TRIGGER` from the pair recorded by
    /// [`create_message`](Self::create_message).
    pub fn add_msh(&mut self, config: MshConfig) -> &mut Self {
        let message_type = format!(
            "{}^{}^{}_{}",
            self.message_type, self.trigger_event, self.message_type, self.trigger_event
        );

        let fields = vec![
            "|".to_string(),
            "^~\\&".to_string(),
            config.sending_application,
            config.sending_facility,
            config.receiving_application,
            config.receiving_facility,
            config.timestamp.unwrap_or_else(now_timestamp),
            config.security,
            message_type,
            config.message_control_id.unwrap_or_else(generate_control_id),
            config.processing_id,
            config.version_id,
        ];

        self.segments.push(RawSegment {
            name: "MSH".to_string(),
            fields,
        });
        self
    }

    /// Open a new empty segment
    pub fn add_segment(&mut self, name: &str) -> &mut Self {
        self.segments.push(RawSegment {
            name: name.to_string(),
            fields: Vec::new(),
        });
        self
    }

    /// Append a segment with its fields already laid out in order
    pub fn add_segment_with_fields(&mut self, name: &str, fields: &[&str]) -> &mut Self {
        self.segments.push(RawSegment {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    /// Set a field on a segment, extending the field list as needed
    ///
    /// `segment_index` is 0-based into the segments added so far and must
    /// exist; `field_index` is the 1-based HL7 field number.
    pub fn set_field(
        &mut self,
        segment_index: usize,
        field_index: usize,
        value: &str,
    ) -> Result<&mut Self> {
        if field_index == 0 {
            return Err(Error::builder("field index is 1-based"));
        }
        let count = self.segments.len();
        let segment = self.segments.get_mut(segment_index).ok_or_else(|| {
            Error::builder(format!(
                "segment index {} out of range ({} segments)",
                segment_index, count
            ))
        })?;

        while segment.fields.len() < field_index {
            segment.fields.push(String::new());
        }
        segment.fields[field_index - 1] = value.to_string();
        Ok(self)
    }

    /// Set a single component within a field, preserving its siblings
    pub fn set_component(
        &mut self,
        segment_index: usize,
        field_index: usize,
        component_index: usize,
        value: &str,
    ) -> Result<&mut Self> {
        if component_index == 0 {
            return Err(Error::builder("component index is 1-based"));
        }

        let current = {
            let segment = self.segments.get(segment_index).ok_or_else(|| {
                Error::builder(format!("segment index {} out of range", segment_index))
            })?;
            segment
                .fields
                .get(field_index.wrapping_sub(1))
                .cloned()
                .unwrap_or_default()
        };

        let mut components: Vec<String> = if current.is_empty() {
            Vec::new()
        } else {
            current.split('^').map(str::to_string).collect()
        };
        while components.len() < component_index {
            components.push(String::new());
        }
        components[component_index - 1] = value.to_string();

        self.set_field(segment_index, field_index, &components.join("^"))
    }

    /// Number of segments accumulated so far
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Emit the raw message: segments joined by `\r`, trailing empty
    /// fields trimmed from each line
    pub fn build(&self) -> String {
        self.segments
            .iter()
            .map(encode_segment)
            .collect::<Vec<_>>()
            .join("\r")
    }
}

fn encode_segment(segment: &RawSegment) -> String {
    let (prefix, fields) = if segment.name == "MSH" {
        // The separator and encoding characters are part of the literal
        // prefix, not pipe-delimited fields.
        ("MSH|^~\\&".to_string(), segment.fields.get(2..).unwrap_or(&[]))
    } else {
        (segment.name.clone(), &segment.fields[..])
    };

    let last = fields.iter().rposition(|f| !f.is_empty());
    let mut line = prefix;
    if let Some(last) = last {
        for field in &fields[..=last] {
            line.push('|');
            line.push_str(field);
        }
    }
    line
}

/// Join composite-field parts with `^`, trimming trailing empties
pub(crate) fn join_components(parts: &[&str]) -> String {
    let last = parts.iter().rposition(|p| !p.is_empty());
    match last {
        Some(last) => parts[..=last].join("^"),
        None => String::new(),
    }
}

/// Generate a 20-character uppercase hex message control ID
///
/// Drawn from a random UUID, so collisions over any realistic message
/// volume are negligible.
pub fn generate_control_id() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    hex[..20].to_string()
}

/// Format a timestamp as HL7 `YYYYMMDDHHMMSS`
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%d%H%M%S").to_string()
}

/// Current local time as HL7 `YYYYMMDDHHMMSS`
pub fn now_timestamp() -> String {
    format_timestamp(&Local::now().naive_local())
}
