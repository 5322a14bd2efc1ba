//! Immunization gap reminders on `patient-view`
//!
//! The patient's immunization history is checked against a CVX-keyed
//! schedule table. Gaps produce info cards; nothing here is urgent enough
//! for a warning.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Utc};
use serde_json::Value;

use crate::engine::CdsEngine;
use crate::prefetch;
use crate::types::{CdsCard, CdsRequest, CdsResponse, Indicator, ServiceDescriptor};

use super::{contains_keyword, override_reason};

pub const SERVICE_ID: &str = "immunization-gap";

struct VaccineRule {
    cvx: &'static [&'static str],
    name: &'static str,
    keywords: &'static [&'static str],
    /// Only applies at or above this age
    min_age: Option<u32>,
    /// Re-vaccination interval in days; `None` means once is enough
    interval_days: Option<i64>,
}

static SCHEDULE: &[VaccineRule] = &[
    VaccineRule {
        cvx: &["140", "141", "150", "158"],
        name: "Seasonal influenza vaccine",
        keywords: &["influenza", "flu"],
        min_age: None,
        interval_days: Some(365),
    },
    VaccineRule {
        cvx: &["115", "9"],
        name: "Tdap/Td booster",
        keywords: &["tdap", "tetanus"],
        min_age: Some(11),
        interval_days: Some(3650),
    },
    VaccineRule {
        cvx: &["208", "213", "229", "300"],
        name: "COVID-19 vaccine",
        keywords: &["covid"],
        min_age: None,
        interval_days: Some(365),
    },
    VaccineRule {
        cvx: &["33", "133", "152"],
        name: "Pneumococcal vaccine",
        keywords: &["pneumococcal", "pneumonia"],
        min_age: Some(65),
        interval_days: None,
    },
    VaccineRule {
        cvx: &["187", "121"],
        name: "Zoster vaccine",
        keywords: &["zoster", "shingles"],
        min_age: Some(50),
        interval_days: None,
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
        title: "Immunization Gap Reminders".to_string(),
        description: "Reminds about routine immunizations that are due or overdue per the adult schedule".to_string(),
        prefetch: Some(HashMap::from([
            (
                "patient".to_string(),
                "Patient/{{context.patientId}}".to_string(),
            ),
            (
                "immunizations".to_string(),
                "Immunization?patient={{context.patientId}}&_sort=date".to_string(),
            ),
        ])),
        usage_requirements: None,
    }
}

fn patient_age(request: &CdsRequest) -> Option<u32> {
    let birth_date = request
        .prefetch_value("patient")
        .and_then(|patient| prefetch::get_str(patient, "birthDate"))?;
    let birth = NaiveDate::parse_from_str(birth_date.get(..10)?, "%Y-%m-%d").ok()?;
    let today = Utc::now().date_naive();
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

fn rule_matches(rule: &VaccineRule, immunization: &Value) -> bool {
    let concept = match immunization.get("vaccineCode") {
        Some(concept) => concept,
        None => return false,
    };
    let by_code = prefetch::codings(concept).iter().any(|(system, code, _)| {
        system.to_lowercase().contains("cvx") && rule.cvx.contains(code)
    });
    by_code
        || prefetch::concept_text(concept)
            .map(|text| contains_keyword(text, rule.keywords))
            .unwrap_or(false)
}

fn administration_date(immunization: &Value) -> Option<NaiveDate> {
    let date = prefetch::get_str(immunization, "occurrenceDateTime")
        .or_else(|| prefetch::get_str(immunization, "date"))?;
    NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()
}

pub fn evaluate(request: &CdsRequest) -> CdsResponse {
    let immunizations = request
        .prefetch_any(&["immunizations"])
        .map(prefetch::resources)
        .unwrap_or_default();
    let age = patient_age(request);
    let today = Utc::now().date_naive();

    let mut cards = Vec::new();
    for rule in SCHEDULE {
        if let Some(min_age) = rule.min_age {
            match age {
                Some(age) if age >= min_age => {}
                // Age-gated rules stay quiet when age is unknown
                _ => continue,
            }
        }

        let last_given = immunizations
            .iter()
            .filter(|i| rule_matches(rule, i))
            .filter_map(|i| administration_date(i))
            .max();

        let summary = match (last_given, rule.interval_days) {
            (None, _) => format!("{} is due (no record on file)", rule.name),
            (Some(last), Some(interval)) if (today - last).num_days() > interval => {
                format!("{} is overdue (last given {})", rule.name, last)
            }
            _ => continue,
        };

        let mut card = CdsCard::new(&summary, Indicator::Info, "Immunization Schedule");
        card.detail = Some(format!(
            "Routine schedule entry for {}. Review the patient's immunization history before ordering.",
            rule.name.to_lowercase()
        ));
        card.override_reasons = Some(vec![
            override_reason("patient-declined", "Patient declined vaccination"),
            override_reason("administered-elsewhere", "Administered elsewhere"),
            override_reason("contraindicated", "Clinically contraindicated"),
        ]);
        cards.push(card);
    }

    CdsResponse::with_cards(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn request(birth_date: &str, immunizations: Value) -> CdsRequest {
        let mut prefetch = Map::new();
        prefetch.insert(
            "patient".to_string(),
            json!({"resourceType": "Patient", "birthDate": birth_date}),
        );
        prefetch.insert("immunizations".to_string(), immunizations);

        CdsRequest {
            hook_instance: "test-instance".to_string(),
            hook: "patient-view".to_string(),
            fhir_server: None,
            fhir_authorization: None,
            context: Map::new(),
            prefetch: Some(prefetch),
        }
    }

    fn immunization(cvx: &str, date: &str) -> Value {
        json!({
            "resourceType": "Immunization",
            "vaccineCode": {"coding": [{"system": "http://hl7.org/fhir/sid/cvx", "code": cvx}]},
            "occurrenceDateTime": date
        })
    }

    #[test]
    fn test_missing_vaccine_is_due() {
        let response = evaluate(&request("1950-06-01", json!([])));
        let summaries: Vec<&str> = response.cards.iter().map(|c| c.summary.as_str()).collect();

        assert!(summaries.iter().any(|s| s.contains("influenza")));
        assert!(summaries.iter().any(|s| s.contains("Pneumococcal")));
        assert!(summaries.iter().any(|s| s.contains("Zoster")));
        assert!(response.cards.iter().all(|c| c.indicator == Indicator::Info));
    }

    #[test]
    fn test_recent_vaccine_suppresses_reminder() {
        let recent = Utc::now().date_naive().to_string();
        let response = evaluate(&request(
            "1990-06-01",
            json!([immunization("140", &recent), immunization("208", &recent), immunization("115", &recent)]),
        ));
        assert!(response.cards.is_empty());
    }

    #[test]
    fn test_stale_influenza_is_overdue() {
        let response = evaluate(&request(
            "1990-06-01",
            json!([immunization("140", "2020-10-01"), immunization("208", "2020-11-01"), immunization("115", "2020-11-01")]),
        ));

        assert!(response
            .cards
            .iter()
            .any(|c| c.summary.contains("influenza") && c.summary.contains("overdue")));
    }

    #[test]
    fn test_age_gated_rules_skip_young_patients() {
        let recent = Utc::now().date_naive().to_string();
        let response = evaluate(&request(
            "2000-06-01",
            json!([immunization("140", &recent), immunization("208", &recent), immunization("115", &recent)]),
        ));
        // Pneumococcal (65+) and zoster (50+) never fire for a 20-something
        assert!(response.cards.is_empty());
    }

    #[test]
    fn test_keyword_match_without_cvx() {
        let recent = Utc::now().date_naive().to_string();
        let response = evaluate(&request(
            "1990-06-01",
            json!([
                {"vaccineCode": {"text": "Influenza, seasonal"}, "occurrenceDateTime": recent},
                immunization("208", &recent),
                immunization("115", &recent)
            ]),
        ));
        assert!(response.cards.is_empty());
    }
}
