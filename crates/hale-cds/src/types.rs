//! CDS Hooks wire types
//!
//! JSON shapes follow the HL7 CDS Hooks specification: camelCase keys,
//! optional members omitted when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Card urgency, reflecting clinical severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Info,
    Warning,
    Critical,
}

/// A coded concept (override reasons, etc.)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    pub code: String,
    pub system: String,
    pub display: String,
}

impl Coding {
    pub fn new(code: &str, system: &str, display: &str) -> Self {
        Self {
            code: code.to_string(),
            system: system.to_string(),
            display: display.to_string(),
        }
    }
}

/// Who produced a card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSource {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl CardSource {
    pub fn labeled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            url: None,
            icon: None,
        }
    }
}

/// A structured action inside a suggestion or a system action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionAction {
    /// create | update | delete
    #[serde(rename = "type")]
    pub action_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// A suggested change the clinician can apply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_recommended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<SuggestionAction>>,
}

/// An external reference attached to a card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardLink {
    pub label: String,
    pub url: String,
    /// absolute | smart
    #[serde(rename = "type")]
    pub link_type: String,
}

/// A decision-support card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdsCard {
    /// Assigned by the engine when the handler leaves it empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub indicator: Indicator,
    pub source: CardSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_behavior: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_reasons: Option<Vec<Coding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<CardLink>>,
}

impl CdsCard {
    /// A card with only the required members populated
    pub fn new(summary: &str, indicator: Indicator, source_label: &str) -> Self {
        Self {
            uuid: String::new(),
            summary: summary.to_string(),
            detail: None,
            indicator,
            source: CardSource::labeled(source_label),
            suggestions: None,
            selection_behavior: None,
            override_reasons: None,
            links: None,
        }
    }
}

/// A CDS Hooks invocation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdsRequest {
    pub hook_instance: String,
    pub hook: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_authorization: Option<Value>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<Map<String, Value>>,
}

impl CdsRequest {
    /// A minimal request for the given hook
    pub fn for_hook(hook: &str) -> Self {
        Self {
            hook_instance: uuid::Uuid::new_v4().to_string(),
            hook: hook.to_string(),
            fhir_server: None,
            fhir_authorization: None,
            context: Map::new(),
            prefetch: None,
        }
    }

    /// A context entry by key
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    /// A prefetch entry by key
    pub fn prefetch_value(&self, key: &str) -> Option<&Value> {
        self.prefetch.as_ref().and_then(|p| p.get(key))
    }

    /// The first present entry among several prefetch keys
    pub fn prefetch_any(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|key| self.prefetch_value(key))
    }
}

/// A CDS Hooks invocation response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdsResponse {
    pub cards: Vec<CdsCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_actions: Option<Vec<SuggestionAction>>,
}

impl CdsResponse {
    pub fn with_cards(cards: Vec<CdsCard>) -> Self {
        Self {
            cards,
            system_actions: None,
        }
    }
}

/// What a service advertises in the discovery document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub id: String,
    pub hook: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_requirements: Option<String>,
}

/// The `GET /cds-services` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub services: Vec<ServiceDescriptor>,
}

/// A clinician's structured dismissal of a card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    pub card_uuid: String,
    pub user_id: String,
    pub patient_id: String,
    pub hook_instance: String,
    pub reason_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_text: Option<String>,
    pub card_summary: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_card_serializes_camel_case() {
        let mut card = CdsCard::new("Bleeding risk", Indicator::Critical, "Interactions");
        card.override_reasons = Some(vec![Coding::new(
            "benefit-outweighs-risk",
            "https://tribal-ehr.org/cds/override-reasons",
            "Benefit outweighs risk",
        )]);
        card.selection_behavior = Some("at-most-one".to_string());

        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["indicator"], "critical");
        assert_eq!(value["source"]["label"], "Interactions");
        assert_eq!(value["selectionBehavior"], "at-most-one");
        assert_eq!(value["overrideReasons"][0]["code"], "benefit-outweighs-risk");
        // Empty uuid and absent optionals are omitted
        assert!(value.get("uuid").is_none());
        assert!(value.get("detail").is_none());
        assert!(value.get("suggestions").is_none());
    }

    #[test]
    fn test_request_deserializes() {
        let request: CdsRequest = serde_json::from_value(json!({
            "hookInstance": "d1577c69-dfbe-44ad-ba6d-3e05e953b2ea",
            "hook": "order-select",
            "fhirServer": "https://fhir.example.org/r4",
            "context": {
                "patientId": "123",
                "draftOrders": [{"text": "Ibuprofen 400mg"}]
            },
            "prefetch": {
                "activeMedications": [{"text": "Warfarin 5mg"}]
            }
        }))
        .unwrap();

        assert_eq!(request.hook, "order-select");
        assert_eq!(
            request.context_value("patientId"),
            Some(&json!("123"))
        );
        assert!(request.prefetch_value("activeMedications").is_some());
        assert!(request.prefetch_value("allergies").is_none());
        assert!(request.prefetch_any(&["allergies", "activeMedications"]).is_some());
    }

    #[test]
    fn test_response_roundtrip() {
        let response = CdsResponse::with_cards(vec![CdsCard::new(
            "Reminder",
            Indicator::Info,
            "Preventive Care",
        )]);

        let text = serde_json::to_string(&response).unwrap();
        assert!(!text.contains("systemActions"));
        let parsed: CdsResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.cards.len(), 1);
        assert_eq!(parsed.cards[0].indicator, Indicator::Info);
    }

    #[test]
    fn test_suggestion_action_type_key() {
        let action = SuggestionAction {
            action_type: "delete".to_string(),
            description: "Remove the proposed order".to_string(),
            resource: None,
            resource_id: Some("MedicationRequest/42".to_string()),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "delete");
        assert_eq!(value["resourceId"], "MedicationRequest/42");
    }
}
