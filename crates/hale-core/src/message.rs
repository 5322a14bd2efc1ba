//! HL7 message structure

use crate::encoding::EncodingSet;
use crate::header::MessageHeader;
use crate::segment::Segment;

/// A parsed HL7 message
///
/// Messages are produced by the parser (or by parsing builder output) and
/// are immutable afterwards. The first segment is always MSH and `header`
/// is the structured view of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The raw text the message was parsed from
    pub raw: String,
    /// Message segments, MSH first
    pub segments: Vec<Segment>,
    /// Structured view of MSH-3 through MSH-12
    pub header: MessageHeader,
    /// Delimiters declared by the MSH prefix
    pub encoding: EncodingSet,
}

impl Message {
    /// Find the first segment with the given name
    pub fn find_segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Find all segments with the given name, in message order
    pub fn find_segments(&self, name: &str) -> Vec<&Segment> {
        self.segments.iter().filter(|s| s.name == name).collect()
    }

    /// The MSH segment
    pub fn msh(&self) -> Option<&Segment> {
        self.segments.first().filter(|s| s.name == "MSH")
    }

    /// Message control ID from MSH-10
    pub fn control_id(&self) -> &str {
        &self.header.message_control_id
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Check if this is an acknowledgment message
    pub fn is_acknowledgment(&self) -> bool {
        self.header.type_code() == "ACK"
    }

    /// Re-encode the message to wire form, segments joined by `\r`
    pub fn encode(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.encode(&self.encoding))
            .collect::<Vec<_>>()
            .join("\r")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn sample() -> Message {
        let mut msh = Segment::new("MSH");
        for value in [
            "|", "^~\\&", "APP", "FAC", "DEST", "DESTFAC", "20240115120000", "", "ADT^A01",
            "MSG001", "P", "2.5.1",
        ] {
            msh.push_field(Field::from_value(value));
        }
        let header = MessageHeader::from_msh(&msh);

        let mut pid = Segment::new("PID");
        pid.push_field(Field::from_value("1"));

        Message {
            raw: String::new(),
            segments: vec![msh, pid.clone(), pid],
            header,
            encoding: EncodingSet::default(),
        }
    }

    #[test]
    fn test_find_segment() {
        let msg = sample();
        assert!(msg.find_segment("PID").is_some());
        assert!(msg.find_segment("OBX").is_none());
        assert_eq!(msg.find_segments("PID").len(), 2);
    }

    #[test]
    fn test_control_id() {
        let msg = sample();
        assert_eq!(msg.control_id(), "MSG001");
    }

    #[test]
    fn test_encode() {
        let msg = sample();
        let encoded = msg.encode();
        assert!(encoded.starts_with("MSH|^~\\&|APP|FAC|"));
        assert_eq!(encoded.matches('\r').count(), 2);
    }

    #[test]
    fn test_is_acknowledgment() {
        let mut msg = sample();
        assert!(!msg.is_acknowledgment());
        msg.header.message_type = "ACK^A01".to_string();
        assert!(msg.is_acknowledgment());
    }
}
