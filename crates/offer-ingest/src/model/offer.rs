use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Returnable-packaging marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefillableStatus {
    /// Refillable (returnable bottle).
    RF,
    /// Non-refillable.
    NRF,
}

/// Customs status of the goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomStatus {
    /// Duty suspended.
    T1,
    /// Duty paid / EU free circulation.
    T2,
}

impl fmt::Display for RefillableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefillableStatus::RF => write!(f, "RF"),
            RefillableStatus::NRF => write!(f, "NRF"),
        }
    }
}

impl fmt::Display for CustomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomStatus::T1 => write!(f, "T1"),
            CustomStatus::T2 => write!(f, "T2"),
        }
    }
}

/// Canonical offer record. `None` means "not found in the source" and
/// serializes as `null`; numeric fields never use 0 for that purpose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub uid: String,

    // identity
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub product_key: Option<String>,
    pub product_reference: Option<String>,
    pub ean_code: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub vintage: Option<String>,

    // packaging
    pub packaging: Option<String>,
    pub packaging_raw: Option<String>,
    pub bottle_or_can_type: Option<String>,
    pub unit_volume_ml: Option<u32>,
    pub units_per_case: Option<u32>,
    pub cases_per_pallet: Option<u32>,
    pub quantity_case: Option<u32>,
    pub refillable_status: Option<RefillableStatus>,
    pub gift_box: Option<bool>,
    pub label_language: Option<String>,
    pub alcohol_percent: Option<String>,

    // commercial terms
    pub currency: Option<String>,
    pub price_per_unit: Option<f64>,
    pub price_per_case: Option<f64>,
    pub price_per_unit_eur: Option<f64>,
    pub price_per_case_eur: Option<f64>,
    pub fx_rate: Option<f64>,
    pub fx_date: Option<String>,
    pub incoterm: Option<String>,
    pub location: Option<String>,
    pub moq_cases: Option<u32>,
    pub lead_time: Option<String>,
    pub valid_until: Option<String>,
    pub best_before_date: Option<String>,
    pub custom_status: Option<CustomStatus>,
    pub origin_country: Option<String>,

    // provenance
    pub source_channel: String,
    pub source_message_id: Option<String>,
    pub source_filename: Option<String>,
    pub supplier_name: Option<String>,
    pub supplier_email: Option<String>,
    pub supplier_reference: Option<String>,
    pub supplier_country: Option<String>,
    pub date_received: Option<DateTime<Utc>>,
    pub offer_date: Option<String>,
    pub processing_version: String,

    // quality
    pub confidence_score: f64,
    pub error_flags: BTreeSet<String>,
    pub needs_manual_review: bool,
}

impl Offer {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.error_flags.contains(flag)
    }

    /// Adds a flag and marks the offer for review.
    pub fn flag(&mut self, flag: impl Into<String>) {
        self.error_flags.insert(flag.into());
        self.needs_manual_review = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let offer = Offer {
            uid: "u-1".to_string(),
            product_name: Some("Jameson".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&offer).unwrap();

        assert_eq!(json["product_name"], "Jameson");
        assert!(json["unit_volume_ml"].is_null());
        assert!(json["price_per_case"].is_null());
        assert!(json["refillable_status"].is_null());
        assert_eq!(json["error_flags"], serde_json::json!([]));
    }

    #[test]
    fn test_enum_wire_format() {
        let offer = Offer {
            refillable_status: Some(RefillableStatus::NRF),
            custom_status: Some(CustomStatus::T2),
            ..Default::default()
        };
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["refillable_status"], "NRF");
        assert_eq!(json["custom_status"], "T2");
    }

    #[test]
    fn test_flag_sets_review() {
        let mut offer = Offer::default();
        assert!(!offer.needs_manual_review);
        offer.flag("fx_rate_unavailable");
        assert!(offer.has_flag("fx_rate_unavailable"));
        assert!(offer.needs_manual_review);
    }
}
