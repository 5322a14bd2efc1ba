//! HL7 field and component structures
//!
//! The hierarchy below a segment is field -> component -> subcomponent,
//! with fields optionally repeating. A field that repeats keeps its primary
//! repetition in `components` and the full ordered list in `repetitions`;
//! a field that does not repeat has an empty `repetitions` list.

use crate::encoding::EncodingSet;
use crate::escape;

/// A component within a field
///
/// `value` is the escape-resolved text of the whole component;
/// `subcomponents` is the ordered `&`-split of it (always at least one
/// entry, possibly empty).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Component {
    pub value: String,
    pub subcomponents: Vec<String>,
}

impl Component {
    /// Create a component from a single resolved value
    pub fn from_value<S: Into<String>>(value: S) -> Self {
        let value = value.into();
        Self {
            subcomponents: vec![value.clone()],
            value,
        }
    }

    /// Get a subcomponent by 1-based index, empty string when out of range
    pub fn subcomponent(&self, index: usize) -> &str {
        if index == 0 {
            return "";
        }
        self.subcomponents.get(index - 1).map(String::as_str).unwrap_or("")
    }

    /// Check if the component carries no content
    pub fn is_empty(&self) -> bool {
        self.subcomponents.iter().all(|s| s.is_empty())
    }

    /// Encode the component back to wire form
    pub fn encode(&self, encoding: &EncodingSet) -> String {
        self.subcomponents
            .iter()
            .map(|s| escape::encode(s, encoding))
            .collect::<Vec<_>>()
            .join(&encoding.subcomponent.to_string())
    }
}

/// A field within a segment
///
/// `value` is the escape-resolved text of the raw field. When the raw
/// field contained the repetition separator, `components` holds the primary
/// repetition and `repetitions` the full list; otherwise `repetitions` is
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub value: String,
    pub components: Vec<Component>,
    pub repetitions: Vec<Field>,
}

impl Field {
    /// Create a field from a single resolved value
    pub fn from_value<S: Into<String>>(value: S) -> Self {
        let value = value.into();
        Self {
            components: vec![Component::from_value(value.clone())],
            repetitions: Vec::new(),
            value,
        }
    }

    /// Get a component by 1-based index, empty component when out of range
    pub fn component(&self, index: usize) -> Option<&Component> {
        if index == 0 {
            return None;
        }
        self.components.get(index - 1)
    }

    /// Get a component value by 1-based index, empty string when out of range
    pub fn component_value(&self, index: usize) -> &str {
        self.component(index).map(|c| c.value.as_str()).unwrap_or("")
    }

    /// Check if the field carries no content in any repetition
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
            && self.components.iter().all(|c| c.is_empty())
            && self.repetitions.iter().all(|r| r.is_empty())
    }

    /// Encode the field back to wire form
    pub fn encode(&self, encoding: &EncodingSet) -> String {
        if !self.repetitions.is_empty() {
            return self
                .repetitions
                .iter()
                .map(|r| r.encode_single(encoding))
                .collect::<Vec<_>>()
                .join(&encoding.repetition.to_string());
        }
        self.encode_single(encoding)
    }

    fn encode_single(&self, encoding: &EncodingSet) -> String {
        self.components
            .iter()
            .map(|c| c.encode(encoding))
            .collect::<Vec<_>>()
            .join(&encoding.component.to_string())
    }
}
