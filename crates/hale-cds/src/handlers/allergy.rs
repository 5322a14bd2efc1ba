//! Medication-allergy checking on `medication-prescribe`
//!
//! Draft medications are compared against the patient's documented
//! allergies. A direct or same-class match is critical; a known
//! cross-reactive class pair is a warning.

use std::collections::HashMap;

use crate::engine::CdsEngine;
use crate::types::{
    CdsCard, CdsRequest, CdsResponse, Indicator, ServiceDescriptor, Suggestion, SuggestionAction,
};

use super::{coded_entries, contains_keyword, matches_class, override_reason, CodedEntry};

pub const SERVICE_ID: &str = "medication-allergy-check";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllergenClass {
    Penicillins,
    Cephalosporins,
    Sulfonamides,
    Nsaids,
    Opioids,
    Macrolides,
}

struct ClassDef {
    class: AllergenClass,
    rxnorm: &'static [&'static str],
    keywords: &'static [&'static str],
}

static CLASSES: &[ClassDef] = &[
    ClassDef {
        class: AllergenClass::Penicillins,
        rxnorm: &["7980", "723", "733"],
        keywords: &["penicillin", "amoxicillin", "ampicillin", "piperacillin", "dicloxacillin"],
    },
    ClassDef {
        class: AllergenClass::Cephalosporins,
        rxnorm: &["2231", "2191", "25037"],
        keywords: &["cephalexin", "cefazolin", "ceftriaxone", "cefuroxime", "cefdinir", "cephalosporin"],
    },
    ClassDef {
        class: AllergenClass::Sulfonamides,
        rxnorm: &["10180", "10831"],
        keywords: &["sulfamethoxazole", "sulfasalazine", "sulfadiazine", "sulfa"],
    },
    ClassDef {
        class: AllergenClass::Nsaids,
        rxnorm: &["5640", "7258", "1191"],
        keywords: &["ibuprofen", "naproxen", "aspirin", "ketorolac", "nsaid"],
    },
    ClassDef {
        class: AllergenClass::Opioids,
        rxnorm: &["7804", "5489", "7052"],
        keywords: &["codeine", "morphine", "oxycodone", "hydrocodone", "opioid"],
    },
    ClassDef {
        class: AllergenClass::Macrolides,
        rxnorm: &["21212", "18631", "4053"],
        keywords: &["erythromycin", "azithromycin", "clarithromycin", "macrolide"],
    },
];

/// Cross-reactive class pairs flagged at warning severity
static CROSS_REACTIVE: &[(AllergenClass, AllergenClass)] =
    &[(AllergenClass::Penicillins, AllergenClass::Cephalosporins)];

pub fn register(engine: &CdsEngine) {
    engine.register(descriptor(), |request| async move {
        Ok(evaluate(&request))
    });
}

pub fn descriptor() -> ServiceDescriptor {
    ServiceDescriptor {
        id: SERVICE_ID.to_string(),
        hook: "medication-prescribe".to_string(),
        title: "Medication Allergy Check".to_string(),
        description: "Checks draft prescriptions against documented allergies and cross-reactive drug classes".to_string(),
        prefetch: Some(HashMap::from([(
            "allergies".to_string(),
            "AllergyIntolerance?patient={{context.patientId}}".to_string(),
        )])),
        usage_requirements: Some(
            "Draft prescriptions in context.medications; allergies prefetched".to_string(),
        ),
    }
}

fn classify(entry: &CodedEntry) -> Vec<AllergenClass> {
    CLASSES
        .iter()
        .filter(|def| matches_class(entry, "rxnorm", def.rxnorm, def.keywords))
        .map(|def| def.class)
        .collect()
}

/// The first word of an allergen display, for direct-name matching
fn allergen_stem(display: &str) -> Option<String> {
    let stem = display
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if stem.len() < 4 { None } else { Some(stem) }
}

pub fn evaluate(request: &CdsRequest) -> CdsResponse {
    let drafts: Vec<CodedEntry> = ["medications", "draftOrders", "draftMedicationRequests"]
        .iter()
        .find_map(|key| request.context_value(key))
        .map(coded_entries)
        .unwrap_or_default();
    let allergies: Vec<CodedEntry> = request
        .prefetch_any(&["allergies", "allergyIntolerance"])
        .map(coded_entries)
        .unwrap_or_default();

    let mut cards = Vec::new();
    for draft in &drafts {
        let draft_classes = classify(draft);
        for allergy in &allergies {
            let allergy_classes = classify(allergy);

            let direct = allergen_stem(&allergy.display)
                .map(|stem| contains_keyword(&draft.display, &[stem.as_str()]))
                .unwrap_or(false);
            let same_class = draft_classes.iter().any(|c| allergy_classes.contains(c));
            let cross_class = CROSS_REACTIVE.iter().any(|(a, b)| {
                (draft_classes.contains(a) && allergy_classes.contains(b))
                    || (draft_classes.contains(b) && allergy_classes.contains(a))
            });

            if direct || same_class {
                cards.push(allergy_card(draft, allergy, Indicator::Critical, false));
            } else if cross_class {
                cards.push(allergy_card(draft, allergy, Indicator::Warning, true));
            }
        }
    }

    CdsResponse::with_cards(cards)
}

fn allergy_card(
    draft: &CodedEntry,
    allergy: &CodedEntry,
    indicator: Indicator,
    cross_reactive: bool,
) -> CdsCard {
    let summary = if cross_reactive {
        format!(
            "Possible cross-reactivity: {} with documented {} allergy",
            draft.display, allergy.display
        )
    } else {
        format!(
            "Allergy alert: {} conflicts with documented {} allergy",
            draft.display, allergy.display
        )
    };

    let mut card = CdsCard::new(&summary, indicator, "Allergy Knowledge Base");
    card.detail = Some(if cross_reactive {
        "The draft medication belongs to a class with known cross-reactivity to a documented allergen. Verify tolerance before prescribing.".to_string()
    } else {
        "The draft medication matches a documented allergy for this patient.".to_string()
    });
    card.suggestions = Some(vec![Suggestion {
        label: format!("Cancel {}", draft.display),
        uuid: String::new(),
        is_recommended: Some(!cross_reactive),
        actions: Some(vec![SuggestionAction {
            action_type: "delete".to_string(),
            description: format!("Remove the draft prescription for {}", draft.display),
            resource: None,
            resource_id: None,
        }]),
    }]);
    card.override_reasons = Some(vec![
        override_reason("allergy-inaccurate", "Documented allergy is inaccurate"),
        override_reason("tolerated-previously", "Patient tolerated this medication previously"),
        override_reason("benefit-outweighs-risk", "Benefit outweighs risk"),
    ]);
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn request(drafts: serde_json::Value, allergies: serde_json::Value) -> CdsRequest {
        let mut context = Map::new();
        context.insert("medications".to_string(), drafts);
        let mut prefetch = Map::new();
        prefetch.insert("allergies".to_string(), allergies);

        CdsRequest {
            hook_instance: "test-instance".to_string(),
            hook: "medication-prescribe".to_string(),
            fhir_server: None,
            fhir_authorization: None,
            context,
            prefetch: Some(prefetch),
        }
    }

    #[test]
    fn test_direct_allergy_match() {
        let response = evaluate(&request(
            json!([{"text": "Amoxicillin 500mg capsule"}]),
            json!({"resourceType": "Bundle", "entry": [{"resource": {
                "resourceType": "AllergyIntolerance",
                "code": {"text": "Amoxicillin"}
            }}]}),
        ));

        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Critical);
        assert!(response.cards[0].summary.contains("Allergy alert"));
    }

    #[test]
    fn test_same_class_match() {
        let response = evaluate(&request(
            json!([{"text": "Piperacillin-tazobactam IV"}]),
            json!([{"code": {"text": "Penicillin"}}]),
        ));

        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Critical);
    }

    #[test]
    fn test_cross_reactive_is_warning() {
        let response = evaluate(&request(
            json!([{"text": "Cephalexin 500mg"}]),
            json!([{"code": {"text": "Penicillin"}}]),
        ));

        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Warning);
        assert!(response.cards[0].summary.contains("cross-reactivity"));
    }

    #[test]
    fn test_unrelated_medication_passes() {
        let response = evaluate(&request(
            json!([{"text": "Metformin 500mg"}]),
            json!([{"code": {"text": "Penicillin"}}]),
        ));
        assert!(response.cards.is_empty());
    }

    #[test]
    fn test_short_allergen_stem_ignored() {
        // A vague two-letter allergen entry must not match everything
        let response = evaluate(&request(
            json!([{"text": "Metformin 500mg"}]),
            json!([{"code": {"text": "me"}}]),
        ));
        assert!(response.cards.is_empty());
    }
}
