//! HL7 segment structure

use crate::encoding::EncodingSet;
use crate::field::Field;

/// An HL7 segment: a three-character name and its ordered fields
///
/// Field access is 1-based, matching HL7 addressing. For MSH the stored
/// field list begins with the field separator itself (MSH-1) and the
/// encoding-character string (MSH-2), so MSH-3 and up land on the same
/// external indices other systems use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Segment name (e.g., "MSH", "PID")
    pub name: String,
    /// Fields in 1-based external order
    pub fields: Vec<Field>,
}

impl Segment {
    /// Create a new empty segment
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field
    pub fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Get a field by 1-based index
    pub fn field(&self, index: usize) -> Option<&Field> {
        if index == 0 {
            return None;
        }
        self.fields.get(index - 1)
    }

    /// Get a field's resolved value by 1-based index
    ///
    /// Returns the empty string when the index is out of range; never
    /// panics.
    pub fn field_value(&self, index: usize) -> &str {
        self.field(index).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Get a component value by 1-based field and component indices
    ///
    /// Returns the empty string when either index is out of range; never
    /// panics.
    pub fn component_value(&self, field_index: usize, component_index: usize) -> &str {
        self.field(field_index)
            .map(|f| f.component_value(component_index))
            .unwrap_or("")
    }

    /// Number of fields present
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Encode the segment to its wire line
    pub fn encode(&self, encoding: &EncodingSet) -> String {
        let mut line = self.name.clone();

        if self.name == "MSH" {
            // MSH-1 is the separator itself and MSH-2 the raw encoding
            // characters; neither goes through escape encoding.
            line.push(encoding.field);
            line.push_str(&encoding.encoding_characters());
            for field in self.fields.iter().skip(2) {
                line.push(encoding.field);
                line.push_str(&field.encode(encoding));
            }
        } else {
            for field in &self.fields {
                line.push(encoding.field);
                line.push_str(&field.encode(encoding));
            }
        }

        line
    }
}
