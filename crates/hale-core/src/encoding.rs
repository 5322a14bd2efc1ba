//! HL7 encoding character set
//!
//! Every HL7 v2.x message declares its own delimiters in the MSH prefix:
//! the field separator at byte 3 and the four encoding characters
//! (component, repetition, escape, subcomponent) at bytes 4-7.

use crate::error::{Error, Result};

pub const DEFAULT_FIELD_SEPARATOR: char = '|';
pub const DEFAULT_COMPONENT_SEPARATOR: char = '^';
pub const DEFAULT_REPETITION_SEPARATOR: char = '~';
pub const DEFAULT_ESCAPE_CHARACTER: char = '\\';
pub const DEFAULT_SUBCOMPONENT_SEPARATOR: char = '&';

/// The five delimiter characters of an HL7 v2.x message
///
/// Invariant: all five are distinct printable ASCII characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingSet {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for EncodingSet {
    fn default() -> Self {
        Self {
            field: DEFAULT_FIELD_SEPARATOR,
            component: DEFAULT_COMPONENT_SEPARATOR,
            repetition: DEFAULT_REPETITION_SEPARATOR,
            escape: DEFAULT_ESCAPE_CHARACTER,
            subcomponent: DEFAULT_SUBCOMPONENT_SEPARATOR,
        }
    }
}

impl EncodingSet {
    /// Create the standard `|^~\&` set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an encoding set from the field separator and the MSH-2
    /// encoding-character string (component, repetition, escape,
    /// subcomponent, in that order).
    pub fn from_encoding_characters(field: char, encoding_chars: &str) -> Result<Self> {
        let chars: Vec<char> = encoding_chars.chars().collect();
        if chars.len() != 4 {
            return Err(Error::MalformedEncoding(format!(
                "encoding characters must be exactly 4 characters, got {}",
                chars.len()
            )));
        }

        let set = Self {
            field,
            component: chars[0],
            repetition: chars[1],
            escape: chars[2],
            subcomponent: chars[3],
        };
        set.validate()?;
        Ok(set)
    }

    /// Extract the encoding set from a raw MSH segment line
    ///
    /// Byte 3 is the field separator; bytes 4-7 are the encoding characters.
    pub fn from_msh_prefix(msh: &str) -> Result<Self> {
        let chars: Vec<char> = msh.chars().take(8).collect();
        if chars.len() < 8 {
            return Err(Error::ShortMsh);
        }
        let encoding: String = chars[4..8].iter().collect();
        Self::from_encoding_characters(chars[3], &encoding)
    }

    /// Get the encoding characters as the MSH-2 string
    pub fn encoding_characters(&self) -> String {
        format!(
            "{}{}{}{}",
            self.component, self.repetition, self.escape, self.subcomponent
        )
    }

    /// Check that all five characters are distinct printable ASCII
    pub fn validate(&self) -> Result<()> {
        let chars = [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ];

        for &c in &chars {
            if !c.is_ascii() || c.is_ascii_control() {
                return Err(Error::MalformedEncoding(format!(
                    "delimiter {:?} is not printable ASCII",
                    c
                )));
            }
        }

        for (i, &c1) in chars.iter().enumerate() {
            if chars[i + 1..].contains(&c1) {
                return Err(Error::MalformedEncoding(format!(
                    "duplicate delimiter character: '{}'",
                    c1
                )));
            }
        }

        Ok(())
    }

    /// Check if a character is one of the structural separators
    pub fn is_separator(&self, c: char) -> bool {
        c == self.field || c == self.component || c == self.repetition || c == self.subcomponent
    }
}
