//! Built-in CDS rule handlers
//!
//! Stateless evaluators over the request's context and prefetch bags.
//! Classification runs two lookups in order: exact code match against a
//! curated table keyed by coding system, then case-insensitive keyword
//! match against the display text.

pub mod allergy;
pub mod drug_interaction;
pub mod duplicate_orders;
pub mod immunization;
pub mod vitals;

use serde_json::Value;

use crate::engine::CdsEngine;
use crate::prefetch;
use crate::types::Coding;

/// Coding system for the override reasons the built-in rules attach
pub const OVERRIDE_REASON_SYSTEM: &str =
    "https://tribal-ehr.org/fhir/CodeSystem/cds-override-reasons";

/// Register all built-in rule handlers on an engine
pub fn register_builtin(engine: &CdsEngine) {
    drug_interaction::register(engine);
    allergy::register(engine);
    vitals::register(engine);
    immunization::register(engine);
    duplicate_orders::register(engine);
}

/// A clinical entity pulled out of a FHIR-shaped value: display text plus
/// any (system, code) pairs
#[derive(Debug, Clone)]
pub(crate) struct CodedEntry {
    pub display: String,
    pub codes: Vec<(String, String)>,
}

/// Extract coded entries from a bundle, array, or single resource
///
/// Looks for the concept under `medicationCodeableConcept`, `vaccineCode`,
/// or `code`, falling back to the resource itself (so bare
/// `{"text": "..."}` objects work too).
pub(crate) fn coded_entries(value: &Value) -> Vec<CodedEntry> {
    prefetch::resources(value)
        .into_iter()
        .filter_map(|resource| {
            let concept = resource
                .get("medicationCodeableConcept")
                .or_else(|| resource.get("vaccineCode"))
                .or_else(|| resource.get("code"))
                .unwrap_or(resource);

            let display = prefetch::concept_text(concept).unwrap_or("").to_string();
            let codes: Vec<(String, String)> = prefetch::codings(concept)
                .into_iter()
                .filter(|(_, code, _)| !code.is_empty())
                .map(|(system, code, _)| (system.to_string(), code.to_string()))
                .collect();

            if display.is_empty() && codes.is_empty() {
                None
            } else {
                Some(CodedEntry { display, codes })
            }
        })
        .collect()
}

/// Case-insensitive keyword match against a display string
pub(crate) fn contains_keyword(display: &str, keywords: &[&str]) -> bool {
    let lowered = display.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

/// Exact code match (system hint narrows the coding system), then keyword
/// fallback
pub(crate) fn matches_class(
    entry: &CodedEntry,
    system_hint: &str,
    codes: &[&str],
    keywords: &[&str],
) -> bool {
    let code_hit = entry.codes.iter().any(|(system, code)| {
        system.to_lowercase().contains(system_hint) && codes.contains(&code.as_str())
    });
    code_hit || contains_keyword(&entry.display, keywords)
}

/// Build an override reason coding in the engine's reason system
pub(crate) fn override_reason(code: &str, display: &str) -> Coding {
    Coding::new(code, OVERRIDE_REASON_SYSTEM, display)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coded_entries_from_medication_requests() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [{
                "resource": {
                    "resourceType": "MedicationRequest",
                    "medicationCodeableConcept": {
                        "text": "Warfarin 5mg",
                        "coding": [{"system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": "11289"}]
                    }
                }
            }]
        });

        let entries = coded_entries(&bundle);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display, "Warfarin 5mg");
        assert_eq!(entries[0].codes[0].1, "11289");
    }

    #[test]
    fn test_coded_entries_from_bare_text() {
        let entries = coded_entries(&json!([{"text": "Ibuprofen 400mg"}]));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display, "Ibuprofen 400mg");
        assert!(entries[0].codes.is_empty());
    }

    #[test]
    fn test_matches_class_prefers_codes() {
        let entry = CodedEntry {
            display: "some obscure brand name".to_string(),
            codes: vec![(
                "http://www.nlm.nih.gov/research/umls/rxnorm".to_string(),
                "5640".to_string(),
            )],
        };
        assert!(matches_class(&entry, "rxnorm", &["5640"], &["ibuprofen"]));
        assert!(!matches_class(&entry, "rxnorm", &["999"], &["ibuprofen"]));
    }

    #[test]
    fn test_matches_class_keyword_fallback() {
        let entry = CodedEntry {
            display: "Ibuprofen 400mg tablets".to_string(),
            codes: Vec::new(),
        };
        assert!(matches_class(&entry, "rxnorm", &[], &["ibuprofen"]));
    }
}
