//! Drug-drug interaction checking on `order-select`
//!
//! Proposed orders are compared against the patient's active medications.
//! Both sides are classified by RxNorm code, then by keyword, and class
//! pairs are looked up in a curated interaction table.

use std::collections::HashMap;

use crate::engine::CdsEngine;
use crate::types::{
    CdsCard, CdsRequest, CdsResponse, Indicator, ServiceDescriptor, Suggestion, SuggestionAction,
};

use super::{coded_entries, matches_class, override_reason, CodedEntry};

pub const SERVICE_ID: &str = "drug-interaction-check";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrugClass {
    Anticoagulant,
    Nsaid,
    Ssri,
    Maoi,
    Opioid,
    Benzodiazepine,
    AceInhibitor,
    PotassiumSparingDiuretic,
    Statin,
    MacrolideAntibiotic,
}

struct ClassDef {
    class: DrugClass,
    rxnorm: &'static [&'static str],
    keywords: &'static [&'static str],
}

static CLASSES: &[ClassDef] = &[
    ClassDef {
        class: DrugClass::Anticoagulant,
        rxnorm: &["11289", "1364430", "1114195", "67108", "1037042"],
        keywords: &["warfarin", "apixaban", "rivaroxaban", "enoxaparin", "heparin", "dabigatran"],
    },
    ClassDef {
        class: DrugClass::Nsaid,
        rxnorm: &["5640", "7258", "1191", "3355", "41493"],
        keywords: &["ibuprofen", "naproxen", "aspirin", "diclofenac", "ketorolac", "meloxicam", "indomethacin"],
    },
    ClassDef {
        class: DrugClass::Ssri,
        rxnorm: &["36437", "4493", "32937", "2556", "321988"],
        keywords: &["sertraline", "fluoxetine", "paroxetine", "citalopram", "escitalopram"],
    },
    ClassDef {
        class: DrugClass::Maoi,
        rxnorm: &["8123", "9639", "10734"],
        keywords: &["phenelzine", "selegiline", "tranylcypromine", "isocarboxazid"],
    },
    ClassDef {
        class: DrugClass::Opioid,
        rxnorm: &["7804", "5489", "4337", "6813"],
        keywords: &["oxycodone", "hydrocodone", "fentanyl", "morphine", "tramadol", "methadone"],
    },
    ClassDef {
        class: DrugClass::Benzodiazepine,
        rxnorm: &["596", "3322", "6470", "2598"],
        keywords: &["alprazolam", "diazepam", "lorazepam", "clonazepam", "midazolam"],
    },
    ClassDef {
        class: DrugClass::AceInhibitor,
        rxnorm: &["29046", "18867", "3827"],
        keywords: &["lisinopril", "benazepril", "enalapril", "ramipril", "captopril"],
    },
    ClassDef {
        class: DrugClass::PotassiumSparingDiuretic,
        rxnorm: &["9997", "10763", "323"],
        keywords: &["spironolactone", "triamterene", "amiloride", "eplerenone"],
    },
    ClassDef {
        class: DrugClass::Statin,
        rxnorm: &["36567", "83367", "301542"],
        keywords: &["simvastatin", "atorvastatin", "rosuvastatin", "lovastatin", "pravastatin"],
    },
    ClassDef {
        class: DrugClass::MacrolideAntibiotic,
        rxnorm: &["21212", "18631", "4053"],
        keywords: &["clarithromycin", "azithromycin", "erythromycin"],
    },
];

struct InteractionRule {
    first: DrugClass,
    second: DrugClass,
    indicator: Indicator,
    hazard: &'static str,
    detail: &'static str,
}

static INTERACTIONS: &[InteractionRule] = &[
    InteractionRule {
        first: DrugClass::Nsaid,
        second: DrugClass::Anticoagulant,
        indicator: Indicator::Critical,
        hazard: "Major bleeding risk",
        detail: "NSAIDs inhibit platelet function and can displace warfarin from protein binding, markedly increasing bleeding risk. Consider acetaminophen for analgesia.",
    },
    InteractionRule {
        first: DrugClass::Ssri,
        second: DrugClass::Maoi,
        indicator: Indicator::Critical,
        hazard: "Serotonin syndrome risk",
        detail: "Combining serotonergic antidepressants with MAO inhibitors can precipitate serotonin syndrome. A washout period is required between agents.",
    },
    InteractionRule {
        first: DrugClass::Opioid,
        second: DrugClass::Benzodiazepine,
        indicator: Indicator::Critical,
        hazard: "Respiratory depression risk",
        detail: "Concurrent opioid and benzodiazepine use carries a boxed warning for profound sedation, respiratory depression, and death.",
    },
    InteractionRule {
        first: DrugClass::AceInhibitor,
        second: DrugClass::PotassiumSparingDiuretic,
        indicator: Indicator::Warning,
        hazard: "Hyperkalemia risk",
        detail: "ACE inhibitors with potassium-sparing diuretics can raise serum potassium. Monitor potassium and renal function.",
    },
    InteractionRule {
        first: DrugClass::Statin,
        second: DrugClass::MacrolideAntibiotic,
        indicator: Indicator::Warning,
        hazard: "Myopathy risk",
        detail: "Macrolides inhibit statin metabolism, raising the risk of myopathy and rhabdomyolysis. Consider suspending the statin during the antibiotic course.",
    },
];

/// Register the service on an engine
pub fn register(engine: &CdsEngine) {
    engine.register(descriptor(), |request| async move {
        Ok(evaluate(&request))
    });
}

/// The discovery descriptor
pub fn descriptor() -> ServiceDescriptor {
    ServiceDescriptor {
        id: SERVICE_ID.to_string(),
        hook: "order-select".to_string(),
        title: "Drug-Drug Interaction Check".to_string(),
        description: "Checks proposed medication orders against the patient's active medications for known interactions".to_string(),
        prefetch: Some(HashMap::from([(
            "activeMedications".to_string(),
            "MedicationRequest?patient={{context.patientId}}&status=active".to_string(),
        )])),
        usage_requirements: Some(
            "Proposed orders in context.draftOrders; active medications prefetched".to_string(),
        ),
    }
}

fn classify(entry: &CodedEntry) -> Vec<DrugClass> {
    CLASSES
        .iter()
        .filter(|def| matches_class(entry, "rxnorm", def.rxnorm, def.keywords))
        .map(|def| def.class)
        .collect()
}

/// Evaluate a request into interaction cards
pub fn evaluate(request: &CdsRequest) -> CdsResponse {
    let proposed: Vec<CodedEntry> = ["draftOrders", "selections", "medications"]
        .iter()
        .find_map(|key| request.context_value(key))
        .map(coded_entries)
        .unwrap_or_default();
    let active: Vec<CodedEntry> = request
        .prefetch_any(&["activeMedications", "medications"])
        .map(coded_entries)
        .unwrap_or_default();

    let mut cards = Vec::new();
    for proposal in &proposed {
        let proposal_classes = classify(proposal);
        for current in &active {
            let current_classes = classify(current);
            let hit = INTERACTIONS.iter().find(|rule| {
                (proposal_classes.contains(&rule.first) && current_classes.contains(&rule.second))
                    || (proposal_classes.contains(&rule.second)
                        && current_classes.contains(&rule.first))
            });
            if let Some(rule) = hit {
                cards.push(interaction_card(rule, proposal, current));
            }
        }
    }

    CdsResponse::with_cards(cards)
}

fn interaction_card(rule: &InteractionRule, proposal: &CodedEntry, current: &CodedEntry) -> CdsCard {
    let mut card = CdsCard::new(
        &format!("{}: {} with {}", rule.hazard, proposal.display, current.display),
        rule.indicator,
        "Drug Interaction Knowledge Base",
    );
    card.detail = Some(rule.detail.to_string());
    card.suggestions = Some(vec![Suggestion {
        label: format!("Cancel {}", proposal.display),
        uuid: String::new(),
        is_recommended: Some(true),
        actions: Some(vec![SuggestionAction {
            action_type: "delete".to_string(),
            description: format!("Remove the draft order for {}", proposal.display),
            resource: None,
            resource_id: None,
        }]),
    }]);
    card.override_reasons = Some(vec![
        override_reason("benefit-outweighs-risk", "Benefit outweighs risk"),
        override_reason("will-monitor", "Will monitor closely"),
        override_reason("tolerated-previously", "Patient tolerated combination previously"),
    ]);
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn request(proposed: serde_json::Value, active: serde_json::Value) -> CdsRequest {
        let mut context = Map::new();
        context.insert("draftOrders".to_string(), proposed);
        let mut prefetch = Map::new();
        prefetch.insert("activeMedications".to_string(), active);

        CdsRequest {
            hook_instance: "test-instance".to_string(),
            hook: "order-select".to_string(),
            fhir_server: None,
            fhir_authorization: None,
            context,
            prefetch: Some(prefetch),
        }
    }

    #[test]
    fn test_warfarin_nsaid_is_critical() {
        let response = evaluate(&request(
            json!([{"text": "Ibuprofen 400mg"}]),
            json!([{"text": "Warfarin 5mg"}]),
        ));

        assert_eq!(response.cards.len(), 1);
        let card = &response.cards[0];
        assert_eq!(card.indicator, Indicator::Critical);
        let summary = card.summary.to_lowercase();
        assert!(summary.contains("warfarin"));
        assert!(summary.contains("bleeding"));

        let suggestions = card.suggestions.as_ref().unwrap();
        assert!(suggestions[0].label.starts_with("Cancel"));
        assert!(!card.override_reasons.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_code_match_without_keywords() {
        // Display names carry no drug name; only the RxNorm codes match
        let response = evaluate(&request(
            json!([{"medicationCodeableConcept": {
                "text": "Brand A 400mg tab",
                "coding": [{"system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": "5640"}]
            }}]),
            json!([{"medicationCodeableConcept": {
                "text": "Brand B 5mg tab",
                "coding": [{"system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": "11289"}]
            }}]),
        ));

        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Critical);
    }

    #[test]
    fn test_warning_tier_interaction() {
        let response = evaluate(&request(
            json!([{"text": "Spironolactone 25mg"}]),
            json!([{"text": "Lisinopril 10mg"}]),
        ));

        assert_eq!(response.cards.len(), 1);
        assert_eq!(response.cards[0].indicator, Indicator::Warning);
        assert!(response.cards[0].summary.contains("Hyperkalemia"));
    }

    #[test]
    fn test_no_interaction_no_cards() {
        let response = evaluate(&request(
            json!([{"text": "Amoxicillin 500mg"}]),
            json!([{"text": "Warfarin 5mg"}]),
        ));
        assert!(response.cards.is_empty());
    }

    #[test]
    fn test_empty_bags() {
        let response = evaluate(&CdsRequest::for_hook("order-select"));
        assert!(response.cards.is_empty());
    }

    #[test]
    fn test_one_card_per_pair() {
        // Aspirin is an NSAID; pairing against two anticoagulants gives
        // two cards, one per active medication
        let response = evaluate(&request(
            json!([{"text": "Aspirin 81mg"}]),
            json!([{"text": "Warfarin 5mg"}, {"text": "Apixaban 5mg"}]),
        ));
        assert_eq!(response.cards.len(), 2);
    }
}
