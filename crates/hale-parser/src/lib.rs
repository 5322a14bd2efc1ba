//! HL7 v2.x message parser
//!
//! Decomposes raw message text into the segment/field/component/
//! subcomponent tree. Parsing is deliberately permissive: only a missing
//! or truncated MSH prefix fails. Unknown segments, excess delimiters, and
//! malformed fields are retained so the validator can report on them.

use hale_core::{
    encoding::EncodingSet,
    error::{Error, Result},
    escape,
    field::{Component, Field},
    header::MessageHeader,
    message::Message,
    segment::Segment,
};

/// Parse a complete HL7 message
///
/// # Errors
///
/// - [`Error::EmptyMessage`] on empty input
/// - [`Error::MissingMsh`] when the first segment is not MSH
/// - [`Error::ShortMsh`] when the MSH prefix is under 8 bytes
/// - [`Error::MalformedEncoding`] when the delimiters cannot be extracted
///
/// # Example
///
/// ```
/// let raw = "MSH|^~\\&|APP|FAC|DEST|DFAC|20240115120000||ADT^A01|MSG001|P|2.5.1\rPID|1||MRN001||DOE^JOHN";
/// let message = hale_parser::parse(raw).unwrap();
/// assert_eq!(message.header.message_type, "ADT^A01");
/// let pid = message.find_segment("PID").unwrap();
/// assert_eq!(pid.component_value(5, 1), "DOE");
/// ```
pub fn parse(input: &str) -> Result<Message> {
    if input.is_empty() {
        return Err(Error::EmptyMessage);
    }

    // Normalize line endings: \r\n and bare \n both become \r
    let normalized = input.replace("\r\n", "\r").replace('\n', "\r");

    let segment_lines: Vec<&str> = normalized
        .split('\r')
        .filter(|s| !s.is_empty())
        .collect();

    if segment_lines.is_empty() {
        return Err(Error::EmptyMessage);
    }

    let first = segment_lines[0];
    if !first.starts_with("MSH") {
        return Err(Error::MissingMsh);
    }

    let encoding = EncodingSet::from_msh_prefix(first)?;

    let mut segments = Vec::with_capacity(segment_lines.len());
    for (idx, line) in segment_lines.iter().enumerate() {
        let segment = if idx == 0 {
            parse_msh_segment(line, &encoding)
        } else {
            parse_segment(line, &encoding)
        };
        segments.push(segment);
    }

    let header = MessageHeader::from_msh(&segments[0]);

    Ok(Message {
        raw: input.to_string(),
        segments,
        header,
        encoding,
    })
}

/// Parse the MSH segment
///
/// The external field list starts with the field separator itself (MSH-1)
/// and the encoding-character string (MSH-2), so MSH-3 and up keep their
/// HL7 field numbers.
fn parse_msh_segment(line: &str, encoding: &EncodingSet) -> Segment {
    let mut segment = Segment::new("MSH");

    segment.push_field(Field::from_value(encoding.field.to_string()));
    segment.push_field(Field::from_value(encoding.encoding_characters()));

    // Skip "MSH", the separator, the four encoding characters, and the
    // separator before MSH-3 when present.
    let prefix_len = "MSH".len()
        + encoding.field.len_utf8()
        + encoding.encoding_characters().len()
        + encoding.field.len_utf8();
    if line.len() >= prefix_len && line.is_char_boundary(prefix_len) {
        for raw_field in line[prefix_len..].split(encoding.field) {
            segment.push_field(parse_field(raw_field, encoding));
        }
    }

    segment
}

/// Parse a non-MSH segment: three-character name, then pipe-split fields
fn parse_segment(line: &str, encoding: &EncodingSet) -> Segment {
    // First three characters, at a safe byte boundary
    let name_len = line
        .char_indices()
        .nth(3)
        .map(|(idx, _)| idx)
        .unwrap_or(line.len());
    let mut segment = Segment::new(&line[..name_len]);

    let body_start = name_len + encoding.field.len_utf8();
    if line.len() >= body_start && line.is_char_boundary(body_start) {
        for raw_field in line[body_start..].split(encoding.field) {
            segment.push_field(parse_field(raw_field, encoding));
        }
    }

    segment
}

/// Parse a raw field
///
/// A field containing the repetition separator keeps its primary
/// repetition in `components` and the full list in `repetitions`;
/// otherwise `repetitions` stays empty.
fn parse_field(raw: &str, encoding: &EncodingSet) -> Field {
    if raw.contains(encoding.repetition) {
        let repetitions: Vec<Field> = raw
            .split(encoding.repetition)
            .map(|rep| parse_field(rep, encoding))
            .collect();
        let components = repetitions
            .first()
            .map(|primary| primary.components.clone())
            .unwrap_or_default();

        return Field {
            value: escape::resolve(raw, encoding),
            components,
            repetitions,
        };
    }

    let components = raw
        .split(encoding.component)
        .map(|comp| parse_component(comp, encoding))
        .collect();

    Field {
        value: escape::resolve(raw, encoding),
        components,
        repetitions: Vec::new(),
    }
}

fn parse_component(raw: &str, encoding: &EncodingSet) -> Component {
    let subcomponents = raw
        .split(encoding.subcomponent)
        .map(|sub| escape::resolve(sub, encoding))
        .collect();

    Component {
        value: escape::resolve(raw, encoding),
        subcomponents,
    }
}
