//! Override tracking
//!
//! Clinicians may dismiss a card with a structured justification. Records
//! are append-only; durable storage belongs to the surrounding system.

use std::sync::Mutex;

use tracing::info;

use crate::types::OverrideRecord;

/// Append-only log of card overrides
#[derive(Default)]
pub struct OverrideLog {
    records: Mutex<Vec<OverrideRecord>>,
}

impl OverrideLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an override record
    pub fn record(&self, record: OverrideRecord) {
        info!(
            card = %record.card_uuid,
            patient = %record.patient_id,
            reason = %record.reason_code,
            "card override recorded"
        );
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    /// All overrides for a patient, oldest first
    pub fn for_patient(&self, patient_id: &str) -> Vec<OverrideRecord> {
        self.records
            .lock()
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.patient_id == patient_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
