//! Rule-driven validation for HL7 v2.x messages
//!
//! Validation never fails the caller: every finding is accumulated as a
//! [`ValidationError`] with a severity, and the result is valid exactly
//! when no error-severity finding was recorded. Three rule layers run in
//! order:
//!
//! 1. Universal invariants (MSH present, MSH-9..12 populated, PID-3/PID-5
//!    populated when a PID is present)
//! 2. Required segments for the message type (`TYPE^TRIGGER`); unknown
//!    types get a single warning and skip this layer
//! 3. Field-format warnings (timestamps, processing ID, patient class,
//!    sex, OBX value types)
//!
//! Custom per-segment rules can be registered on top.

use std::collections::HashMap;

use hale_core::message::Message;
use hale_core::segment::Segment;
use once_cell::sync::Lazy;
use regex::Regex;

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// A single validation finding
///
/// `field` is the 1-based HL7 field number, or 0 for segment-level
/// findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub segment: String,
    pub field: usize,
    pub code: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationError {
    fn new(segment: &str, field: usize, code: &str, message: String, severity: Severity) -> Self {
        Self {
            segment: segment.to_string(),
            field,
            code: code.to_string(),
            message,
            severity,
        }
    }
}

/// Accumulated validation findings
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// True when no error-severity finding was recorded
    pub fn is_valid(&self) -> bool {
        self.errors.iter().all(|e| e.severity != Severity::Error)
    }

    /// Findings at error severity
    pub fn errors_only(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .collect()
    }

    /// Findings at warning severity
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .collect()
    }

    fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }
}

/// A custom rule applied to every segment with a matching name
pub type SegmentRule = Box<dyn Fn(&Segment) -> Vec<ValidationError> + Send + Sync>;

/// Required-segment lists per `TYPE^TRIGGER`
///
/// ACK is handled separately because its trigger echoes the original
/// message.
static REQUIRED_SEGMENTS: &[(&str, &[&str])] = &[
    ("ADT^A01", &["MSH", "EVN", "PID", "PV1"]),
    ("ADT^A02", &["MSH", "EVN", "PID", "PV1"]),
    ("ADT^A03", &["MSH", "EVN", "PID", "PV1"]),
    ("ADT^A04", &["MSH", "EVN", "PID", "PV1"]),
    ("ADT^A08", &["MSH", "EVN", "PID", "PV1"]),
    ("ADT^A11", &["MSH", "EVN", "PID", "PV1"]),
    ("ADT^A13", &["MSH", "EVN", "PID", "PV1"]),
    ("ORM^O01", &["MSH", "PID", "ORC", "OBR"]),
    ("ORU^R01", &["MSH", "PID", "OBR", "OBX"]),
    ("OML^O21", &["MSH", "PID", "ORC", "OBR"]),
    ("VXU^V04", &["MSH", "PID", "ORC", "RXA"]),
    ("RDE^O11", &["MSH", "PID", "ORC", "RXE"]),
    ("SIU^S12", &["MSH", "SCH", "PID"]),
    ("SIU^S13", &["MSH", "SCH", "PID"]),
    ("SIU^S14", &["MSH", "SCH", "PID"]),
    ("SIU^S15", &["MSH", "SCH", "PID"]),
    ("SIU^S26", &["MSH", "SCH", "PID"]),
    ("MDM^T02", &["MSH", "EVN", "PID", "TXA"]),
];

/// HL7 value types accepted in OBX-2
static OBX_VALUE_TYPES: &[&str] = &[
    "NM", "ST", "TX", "CE", "CF", "CK", "CN", "CP", "CX", "DT", "ED", "FT", "ID", "MO", "PN",
    "RP", "SN", "TM", "TN", "TS", "AD", "XAD", "XCN", "XON", "XPN", "XTN",
];

// YYYYMMDD[HHMM[SS[.SSSS]]][+/-ZZZZ]
static DATETIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}(\d{4}(\d{2}(\.\d{1,4})?)?)?([+-]\d{4})?$").unwrap());
static PROCESSING_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[PDT]$").unwrap());
static PATIENT_CLASS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[IOEPBRNU]$").unwrap());
static SEX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[MFOUANC]$").unwrap());

fn required_segments(type_code: &str, trigger: &str) -> Option<&'static [&'static str]> {
    if type_code == "ACK" {
        return Some(&["MSH", "MSA"]);
    }
    let key = format!("{}^{}", type_code, trigger);
    REQUIRED_SEGMENTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, segments)| *segments)
}

/// HL7 message validator
///
/// # Example
///
/// ```
/// use hale_validator::Validator;
///
/// let raw = "MSH|^~\\&|A|B|C|D|20240115120000||ADT^A01|MSG1|P|2.5.1\rEVN|A01\rPID|1||MRN||DOE^J\rPV1|1|I";
/// let message = hale_parser::parse(raw).unwrap();
/// let result = Validator::new().validate(&message);
/// assert!(result.is_valid());
/// ```
#[derive(Default)]
pub struct Validator {
    custom_rules: HashMap<String, Vec<SegmentRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            custom_rules: HashMap::new(),
        }
    }

    /// Register a custom rule for segments with the given name
    pub fn add_rule<F>(&mut self, segment_name: &str, rule: F)
    where
        F: Fn(&Segment) -> Vec<ValidationError> + Send + Sync + 'static,
    {
        self.custom_rules
            .entry(segment_name.to_string())
            .or_default()
            .push(Box::new(rule));
    }

    /// Validate a parsed message
    pub fn validate(&self, message: &Message) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.check_universal(message, &mut result);
        self.check_required_segments(message, &mut result);
        self.check_field_formats(message, &mut result);
        self.apply_custom_rules(message, &mut result);

        result
    }

    fn check_universal(&self, message: &Message, result: &mut ValidationResult) {
        let msh = match message.msh() {
            Some(msh) => msh,
            None => {
                result.push(ValidationError::new(
                    "MSH",
                    0,
                    "MISSING_MSH",
                    "message has no MSH segment".to_string(),
                    Severity::Error,
                ));
                return;
            }
        };

        for (field, name) in [
            (9, "message type"),
            (10, "message control ID"),
            (11, "processing ID"),
            (12, "version ID"),
        ] {
            if msh.field_value(field).is_empty() {
                result.push(ValidationError::new(
                    "MSH",
                    field,
                    "MISSING_REQUIRED_FIELD",
                    format!("MSH-{} ({}) is required", field, name),
                    Severity::Error,
                ));
            }
        }

        if let Some(pid) = message.find_segment("PID") {
            for (field, name) in [(3, "patient identifier list"), (5, "patient name")] {
                if pid.field_value(field).is_empty() {
                    result.push(ValidationError::new(
                        "PID",
                        field,
                        "MISSING_REQUIRED_FIELD",
                        format!("PID-{} ({}) is required", field, name),
                        Severity::Error,
                    ));
                }
            }
        }
    }

    fn check_required_segments(&self, message: &Message, result: &mut ValidationResult) {
        let type_code = message.header.type_code().to_string();
        let trigger = message.header.trigger_event().to_string();
        if type_code.is_empty() {
            // Already reported as a missing MSH-9
            return;
        }

        let required = match required_segments(&type_code, &trigger) {
            Some(required) => required,
            None => {
                result.push(ValidationError::new(
                    "MSH",
                    9,
                    "UNKNOWN_MESSAGE_TYPE",
                    format!("no segment requirements known for {}^{}", type_code, trigger),
                    Severity::Warning,
                ));
                return;
            }
        };

        for name in required {
            if message.find_segment(name).is_none() {
                result.push(ValidationError::new(
                    name,
                    0,
                    "MISSING_REQUIRED_SEGMENT",
                    format!("{}^{} requires a {} segment", type_code, trigger, name),
                    Severity::Error,
                ));
            }
        }
    }

    fn check_field_formats(&self, message: &Message, result: &mut ValidationResult) {
        if let Some(msh) = message.msh() {
            check_format(
                msh, 7, &DATETIME_PATTERN, "INVALID_DATE_FORMAT",
                "MSH-7 is not a valid HL7 timestamp", result,
            );
            check_format(
                msh, 11, &PROCESSING_ID_PATTERN, "INVALID_VALUE",
                "MSH-11 must be P, D, or T", result,
            );
        }

        for pid in message.find_segments("PID") {
            check_format(
                pid, 7, &DATETIME_PATTERN, "INVALID_DATE_FORMAT",
                "PID-7 is not a valid HL7 date", result,
            );
            check_format(
                pid, 8, &SEX_PATTERN, "INVALID_VALUE",
                "PID-8 is not a recognized administrative sex code", result,
            );
        }

        for pv1 in message.find_segments("PV1") {
            check_format(
                pv1, 2, &PATIENT_CLASS_PATTERN, "INVALID_VALUE",
                "PV1-2 is not a recognized patient class", result,
            );
        }

        for obx in message.find_segments("OBX") {
            let value_type = obx.field_value(2);
            if !value_type.is_empty() && !OBX_VALUE_TYPES.contains(&value_type) {
                result.push(ValidationError::new(
                    "OBX",
                    2,
                    "INVALID_VALUE_TYPE",
                    format!("OBX-2 value type '{}' is not recognized", value_type),
                    Severity::Warning,
                ));
            }
        }
    }

    fn apply_custom_rules(&self, message: &Message, result: &mut ValidationResult) {
        for segment in &message.segments {
            if let Some(rules) = self.custom_rules.get(&segment.name) {
                for rule in rules {
                    result.errors.extend(rule(segment));
                }
            }
        }
    }
}

fn check_format(
    segment: &Segment,
    field: usize,
    pattern: &Regex,
    code: &str,
    message: &str,
    result: &mut ValidationResult,
) {
    let value = segment.field_value(field);
    if !value.is_empty() && !pattern.is_match(value) {
        result.push(ValidationError::new(
            &segment.name,
            field,
            code,
            format!("{} (got '{}')", message, value),
            Severity::Warning,
        ));
    }
}
