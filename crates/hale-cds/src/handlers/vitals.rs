//! Vital-sign range alerts on `patient-view`
//!
//! The latest observation per vital is compared against reference ranges
//! keyed by LOINC code. Values past the panic bounds produce critical
//! cards; values merely outside the reference range produce warnings.

use std::collections::HashMap;

use serde_json::Value;

use crate::engine::CdsEngine;
use crate::prefetch;
use crate::types::{CdsCard, CdsRequest, CdsResponse, Indicator, ServiceDescriptor};

use super::{contains_keyword, override_reason};

pub const SERVICE_ID: &str = "vital-signs-alert";

struct VitalRange {
    loinc: &'static [&'static str],
    name: &'static str,
    keywords: &'static [&'static str],
    unit: &'static str,
    low: f64,
    high: f64,
    panic_low: f64,
    panic_high: f64,
}

static RANGES: &[VitalRange] = &[
    VitalRange {
        loinc: &["8867-4"],
        name: "Heart rate",
        keywords: &["heart rate", "pulse"],
        unit: "bpm",
        low: 60.0,
        high: 100.0,
        panic_low: 40.0,
        panic_high: 130.0,
    },
    VitalRange {
        loinc: &["8480-6"],
        name: "Systolic blood pressure",
        keywords: &["systolic"],
        unit: "mmHg",
        low: 90.0,
        high: 140.0,
        panic_low: 70.0,
        panic_high: 180.0,
    },
    VitalRange {
        loinc: &["8462-4"],
        name: "Diastolic blood pressure",
        keywords: &["diastolic"],
        unit: "mmHg",
        low: 60.0,
        high: 90.0,
        panic_low: 40.0,
        panic_high: 120.0,
    },
    VitalRange {
        loinc: &["8310-5"],
        name: "Body temperature",
        keywords: &["temperature"],
        unit: "Cel",
        low: 36.1,
        high: 38.0,
        panic_low: 35.0,
        panic_high: 40.0,
    },
    VitalRange {
        loinc: &["9279-1"],
        name: "Respiratory rate",
        keywords: &["respiratory rate"],
        unit: "/min",
        low: 12.0,
        high: 20.0,
        panic_low: 8.0,
        panic_high: 30.0,
    },
    VitalRange {
        loinc: &["2708-6", "59408-5"],
        name: "Oxygen saturation",
        keywords: &["oxygen saturation", "spo2"],
        unit: "%",
        low: 94.0,
        high: 100.0,
        panic_low: 88.0,
        panic_high: 101.0,
    },
];

pub fn register(engine: &CdsEngine) {
    engine.register(descriptor(), |request| async move {
        Ok(evaluate(&request))
    });
}

pub fn descriptor() -> ServiceDescriptor {
    ServiceDescriptor {
        id: SERVICE_ID.to_string(),
        hook: "patient-view".to_string(),
        title: "Vital Signs Alert".to_string(),
        description: "Flags the most recent vital signs that fall outside reference or panic ranges".to_string(),
        prefetch: Some(HashMap::from([(
            "vitalSigns".to_string(),
            "Observation?patient={{context.patientId}}&category=vital-signs&_sort=date".to_string(),
        )])),
        usage_requirements: None,
    }
}

fn range_for(observation: &Value) -> Option<&'static VitalRange> {
    let concept = observation.get("code")?;
    let codes = prefetch::codings(concept);
    if let Some(range) = RANGES.iter().find(|range| {
        codes
            .iter()
            .any(|(system, code, _)| system.to_lowercase().contains("loinc") && range.loinc.contains(code))
    }) {
        return Some(range);
    }

    let text = prefetch::concept_text(concept)?;
    RANGES.iter().find(|range| contains_keyword(text, range.keywords))
}

fn value_of(observation: &Value) -> Option<f64> {
    prefetch::get_path(observation, "valueQuantity.value").and_then(Value::as_f64)
}

pub fn evaluate(request: &CdsRequest) -> CdsResponse {
    let observations = request
        .prefetch_any(&["vitalSigns", "observations"])
        .map(prefetch::resources)
        .unwrap_or_default();

    // Observations arrive date-sorted; the last match per vital wins
    let mut latest: Vec<(&'static VitalRange, f64)> = Vec::new();
    for observation in observations {
        let (range, value) = match (range_for(observation), value_of(observation)) {
            (Some(range), Some(value)) => (range, value),
            _ => continue,
        };
        if let Some(entry) = latest.iter_mut().find(|(r, _)| std::ptr::eq(*r, range)) {
            entry.1 = value;
        } else {
            latest.push((range, value));
        }
    }

    let mut cards = Vec::new();
    for (range, value) in latest {
        let indicator = if value <= range.panic_low || value >= range.panic_high {
            Indicator::Critical
        } else if value < range.low || value > range.high {
            Indicator::Warning
        } else {
            continue;
        };

        let label = match indicator {
            Indicator::Critical => "Critical",
            _ => "Abnormal",
        };
        let mut card = CdsCard::new(
            &format!(
                "{} {}: {} {} (reference {}-{} {})",
                label,
                range.name.to_lowercase(),
                value,
                range.unit,
                range.low,
                range.high,
                range.unit
            ),
            indicator,
            "Vital Signs Reference Ranges",
        );
        card.detail = Some(format!(
            "Most recent {} is {} {}; reference range {}-{} {}, panic bounds {}-{} {}.",
            range.name.to_lowercase(),
            value,
            range.unit,
            range.low,
            range.high,
            range.unit,
            range.panic_low,
            range.panic_high,
            range.unit
        ));
        card.override_reasons = Some(vec![
            override_reason("known-baseline", "Known baseline for this patient"),
            override_reason("measurement-error", "Suspected measurement error"),
            override_reason("already-addressed", "Already being addressed"),
        ]);
        cards.push(card);
    }

    CdsResponse::with_cards(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn observation(code: &str, display: &str, value: f64) -> Value {
        json!({
            "resourceType": "Observation",
            "code": {"coding": [{"system": "http://loinc.org", "code": code, "display": display}]},
            "valueQuantity": {"value": value}
        })
    }

    fn request(observations: Vec<Value>) -> CdsRequest {
        let mut prefetch = Map::new();
        prefetch.insert(
            "vitalSigns".to_string(),
            json!({"resourceType": "Bundle", "entry": observations.into_iter().map(|o| json!({"resource": o})).collect::<Vec<_>>()}),
        );

        CdsRequest {
            hook_instance: "test-instance".to_string(),
            hook: "patient-view".to_string(),
            fhir_server: None,
            fhir_authorization: None,
            context: Map::new(),
            prefetch: Some(prefetch),
        }
    }

    #[test]
    fn test_panic_value_is_critical() {
        let response = evaluate(&request(vec![observation("8867-4", "Heart rate", 142.0)]));
        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Critical);
        assert!(response.cards[0].summary.contains("Critical heart rate"));
    }

    #[test]
    fn test_abnormal_value_is_warning() {
        let response = evaluate(&request(vec![observation("8480-6", "Systolic BP", 155.0)]));
        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Warning);
    }

    #[test]
    fn test_normal_values_no_cards() {
        let response = evaluate(&request(vec![
            observation("8867-4", "Heart rate", 72.0),
            observation("8310-5", "Body temperature", 36.8),
        ]));
        assert!(response.cards.is_empty());
    }

    #[test]
    fn test_latest_observation_wins() {
        // An old panic value superseded by a normal one stays quiet
        let response = evaluate(&request(vec![
            observation("8867-4", "Heart rate", 140.0),
            observation("8867-4", "Heart rate", 78.0),
        ]));
        assert!(response.cards.is_empty());
    }

    #[test]
    fn test_keyword_fallback_without_loinc() {
        let obs = json!({
            "code": {"text": "Oxygen saturation"},
            "valueQuantity": {"value": 85.0}
        });
        let response = evaluate(&request(vec![obs]));
        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Critical);
    }
}
