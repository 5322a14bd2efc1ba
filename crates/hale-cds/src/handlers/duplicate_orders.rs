//! Duplicate-order checking on `order-sign`
//!
//! Orders about to be signed are compared against the patient's recent
//! active orders. A shared code (LOINC/CPT exact match) or an identical
//! normalized display is flagged as a likely duplicate.

use std::collections::HashMap;

use crate::engine::CdsEngine;
use crate::types::{
    CdsCard, CdsRequest, CdsResponse, Indicator, ServiceDescriptor, Suggestion, SuggestionAction,
};

use super::{coded_entries, CodedEntry, override_reason};

pub const SERVICE_ID: &str = "duplicate-order-check";

pub fn register(engine: &CdsEngine) {
    engine.register(descriptor(), |request| async move {
        Ok(evaluate(&request))
    });
}

pub fn descriptor() -> ServiceDescriptor {
    ServiceDescriptor {
        id: SERVICE_ID.to_string(),
        hook: "order-sign".to_string(),
        title: "Duplicate Order Check".to_string(),
        description: "Flags draft orders that duplicate recent active orders by code or description".to_string(),
        prefetch: Some(HashMap::from([(
            "recentOrders".to_string(),
            "ServiceRequest?patient={{context.patientId}}&status=active".to_string(),
        )])),
        usage_requirements: Some("Orders being signed in context.draftOrders".to_string()),
    }
}

fn normalized(display: &str) -> String {
    display.trim().to_lowercase()
}

fn is_duplicate(draft: &CodedEntry, recent: &CodedEntry) -> bool {
    let shared_code = draft.codes.iter().any(|(draft_system, draft_code)| {
        recent.codes.iter().any(|(recent_system, recent_code)| {
            draft_code == recent_code
                && coding_family(draft_system) == coding_family(recent_system)
        })
    });
    if shared_code {
        return true;
    }

    !draft.display.is_empty() && normalized(&draft.display) == normalized(&recent.display)
}

fn coding_family(system: &str) -> &'static str {
    let lowered = system.to_lowercase();
    if lowered.contains("loinc") {
        "loinc"
    } else if lowered.contains("cpt") {
        "cpt"
    } else if lowered.contains("rxnorm") {
        "rxnorm"
    } else {
        "other"
    }
}

pub fn evaluate(request: &CdsRequest) -> CdsResponse {
    let drafts: Vec<CodedEntry> = request
        .context_value("draftOrders")
        .map(coded_entries)
        .unwrap_or_default();
    let recent: Vec<CodedEntry> = request
        .prefetch_any(&["recentOrders", "activeOrders"])
        .map(coded_entries)
        .unwrap_or_default();

    let mut cards = Vec::new();
    for draft in &drafts {
        if let Some(existing) = recent.iter().find(|r| is_duplicate(draft, r)) {
            let mut card = CdsCard::new(
                &format!(
                    "Possible duplicate order: {} matches an active order",
                    draft.display
                ),
                Indicator::Warning,
                "Duplicate Order Check",
            );
            card.detail = Some(format!(
                "An active order for {} already exists. Signing this draft would create a duplicate.",
                existing.display
            ));
            card.suggestions = Some(vec![Suggestion {
                label: "Remove duplicate order".to_string(),
                uuid: String::new(),
                is_recommended: Some(true),
                actions: Some(vec![SuggestionAction {
                    action_type: "delete".to_string(),
                    description: format!("Remove the draft order for {}", draft.display),
                    resource: None,
                    resource_id: None,
                }]),
            }]);
            card.override_reasons = Some(vec![
                override_reason("repeat-clinically-indicated", "Repeat is clinically indicated"),
                override_reason("prior-result-unavailable", "Prior result unavailable"),
            ]);
            cards.push(card);
        }
    }

    CdsResponse::with_cards(cards)
}
