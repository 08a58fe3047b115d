//! Raw candidate → canonical [`Offer`].
//!
//! Normalization is total: any candidate, including an empty one, yields a
//! well-formed offer. Unreadable input never becomes a value; it becomes
//! `None` plus an `invalid_<field>` flag that lowers the confidence score.

pub mod fields;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::model::{IngestRequest, Offer, RawCandidate};
use fields::Parsed;

/// Fields whose presence drives the fallback confidence score.
const KEY_FIELD_COUNT: f64 = 8.0;
const FLAG_PENALTY: f64 = 0.1;

/// Per-candidate facts the normalizer cannot read from the candidate itself.
#[derive(Debug, Clone)]
pub struct NormalizeContext<'a> {
    pub job_id: &'a str,
    /// Position of the candidate in the job's ordered candidate list.
    pub index: usize,
    pub request: &'a IngestRequest,
    /// Attachment filename for attachment candidates.
    pub source_filename: Option<&'a str>,
    pub received_at: DateTime<Utc>,
}

/// Deterministic per-record id: UUID v5 of the candidate index inside a
/// namespace derived from the job id.
pub fn offer_uid(job_id: &str, index: usize) -> String {
    let namespace = Uuid::new_v5(&Uuid::NAMESPACE_OID, job_id.as_bytes());
    Uuid::new_v5(&namespace, index.to_string().as_bytes()).to_string()
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    processing_version: String,
    review_threshold: f64,
}

impl Normalizer {
    pub fn new(processing_version: impl Into<String>, review_threshold: f64) -> Self {
        Self {
            processing_version: processing_version.into(),
            review_threshold,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.processing_version.clone(), settings.review_threshold)
    }

    pub fn review_threshold(&self) -> f64 {
        self.review_threshold
    }

    pub fn normalize(&self, raw: &RawCandidate, ctx: &NormalizeContext<'_>) -> Offer {
        let mut flags = Vec::new();

        let units_per_case = checked(
            &mut flags,
            "units_per_case",
            fields::count(raw.units_per_case.as_ref()),
        );
        let unit_volume_ml = checked(
            &mut flags,
            "unit_volume_ml",
            fields::volume_ml(raw.unit_volume_ml.as_ref()),
        );
        let cases_per_pallet = checked(
            &mut flags,
            "cases_per_pallet",
            fields::count(raw.cases_per_pallet.as_ref()),
        );
        let quantity_case = checked(
            &mut flags,
            "quantity_case",
            fields::count(raw.quantity_case.as_ref()),
        );
        let moq_cases = checked(
            &mut flags,
            "moq_cases",
            fields::count(raw.moq_cases.as_ref()),
        );
        let price_per_unit = checked(
            &mut flags,
            "price_per_unit",
            fields::price(raw.price_per_unit.as_ref()),
        );
        let price_per_case = checked(
            &mut flags,
            "price_per_case",
            fields::price(raw.price_per_case.as_ref()),
        );

        let mut offer = Offer {
            uid: offer_uid(ctx.job_id, ctx.index),
            source_channel: ctx.request.source_channel.clone(),
            source_message_id: ctx.request.source_message_id.clone(),
            source_filename: ctx
                .source_filename
                .map(str::to_string)
                .or_else(|| ctx.request.source_filename.clone()),
            date_received: Some(ctx.received_at),
            processing_version: self.processing_version.clone(),
            units_per_case,
            unit_volume_ml,
            cases_per_pallet,
            quantity_case,
            moq_cases,
            ..Default::default()
        };

        offer.product_name = fields::text(raw.product_name.as_ref());
        offer.brand = fields::text(raw.brand.as_ref());
        offer.product_reference = fields::text(raw.product_reference.as_ref());
        offer.ean_code = fields::text(raw.ean_code.as_ref());
        offer.category = fields::text(raw.category.as_ref());
        offer.sub_category = fields::text(raw.sub_category.as_ref());
        offer.vintage = fields::text(raw.vintage.as_ref());
        offer.packaging = fields::text(raw.packaging.as_ref());
        offer.packaging_raw = fields::text(raw.packaging_raw.as_ref());
        offer.bottle_or_can_type = fields::text(raw.bottle_or_can_type.as_ref());
        offer.label_language = fields::text(raw.label_language.as_ref());
        offer.incoterm = fields::text(raw.incoterm.as_ref()).map(|s| s.to_uppercase());
        offer.location = fields::text(raw.location.as_ref());
        offer.lead_time = fields::text(raw.lead_time.as_ref());
        offer.valid_until = fields::text(raw.valid_until.as_ref());
        offer.best_before_date = fields::text(raw.best_before_date.as_ref());
        offer.origin_country = fields::text(raw.origin_country.as_ref());
        offer.offer_date = fields::text(raw.offer_date.as_ref());

        offer.supplier_name = fields::text(raw.supplier_name.as_ref())
            .or_else(|| non_blank(&ctx.request.supplier_name));
        offer.supplier_email = fields::text(raw.supplier_email.as_ref())
            .or_else(|| non_blank(&ctx.request.supplier_email));
        offer.supplier_reference = fields::text(raw.supplier_reference.as_ref());
        offer.supplier_country = fields::text(raw.supplier_country.as_ref());

        offer.alcohol_percent = checked(
            &mut flags,
            "alcohol_percent",
            fields::alcohol_percent(raw.alcohol_percent.as_ref()),
        );
        offer.refillable_status = checked(
            &mut flags,
            "refillable_status",
            fields::refillable_status(raw.refillable_status.as_ref()),
        );
        offer.custom_status =
            checked(&mut flags, "custom_status", fields::custom_status(raw.custom_status.as_ref()));
        offer.gift_box = checked(&mut flags, "gift_box", fields::gift_box(raw.gift_box.as_ref()));

        self.backfill_packaging(&mut offer, raw);

        let currency_hint = price_per_case
            .as_ref()
            .and_then(|p| p.currency_hint.clone())
            .or_else(|| price_per_unit.as_ref().and_then(|p| p.currency_hint.clone()));
        offer.price_per_unit = price_per_unit.map(|p| p.amount);
        offer.price_per_case = price_per_case.map(|p| p.amount);

        match fields::currency(raw.currency.as_ref()) {
            Parsed::Value(code) => offer.currency = Some(code),
            Parsed::Invalid => match currency_hint {
                Some(code) => offer.currency = Some(code),
                None => flags.push("unknown_currency".to_string()),
            },
            Parsed::Absent => offer.currency = currency_hint,
        }

        let supplied_key = fields::text(raw.product_key.as_ref());
        offer.product_key = supplied_key
            .as_deref()
            .and_then(fields::product_key)
            .or_else(|| offer.product_name.as_deref().and_then(fields::product_key));

        offer.error_flags.extend(flags);
        let base = fields::confidence(raw.confidence_score.as_ref())
            .unwrap_or_else(|| key_field_coverage(&offer));
        offer.confidence_score = self.score(base, offer.error_flags.len());
        offer.needs_manual_review =
            offer.confidence_score < self.review_threshold || !offer.error_flags.is_empty();

        offer
    }

    /// Fills units per case and unit volume from `packaging_raw` (or the
    /// product name) when the dedicated fields are absent.
    fn backfill_packaging(&self, offer: &mut Offer, raw: &RawCandidate) {
        if offer.units_per_case.is_some() && offer.unit_volume_ml.is_some() {
            return;
        }

        let pattern = offer
            .packaging_raw
            .as_deref()
            .and_then(fields::packaging_pattern)
            .or_else(|| {
                fields::text(raw.packaging.as_ref())
                    .as_deref()
                    .and_then(fields::packaging_pattern)
            })
            .or_else(|| offer.product_name.as_deref().and_then(fields::packaging_pattern));

        if let Some((units, volume)) = pattern {
            if offer.units_per_case.is_none() {
                offer.units_per_case = Some(units);
            }
            if offer.unit_volume_ml.is_none() {
                offer.unit_volume_ml = volume;
            }
        }
    }

    pub fn score(&self, base: f64, flag_count: usize) -> f64 {
        penalised_score(base, flag_count)
    }
}

/// Applies the per-flag penalty, clamps to `[0, 1]` and rounds to 2dp.
pub fn penalised_score(base: f64, flag_count: usize) -> f64 {
    let penalised = base - FLAG_PENALTY * flag_count as f64;
    (penalised.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Unwraps a parsed field, recording `invalid_<name>` for unreadable input.
fn checked<T>(flags: &mut Vec<String>, name: &str, parsed: Parsed<T>) -> Option<T> {
    if parsed.is_invalid() {
        flags.push(format!("invalid_{}", name));
    }
    parsed.value()
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Share of the key commercial fields that ended up populated.
fn key_field_coverage(offer: &Offer) -> f64 {
    let present = [
        offer.product_name.is_some(),
        offer.brand.is_some(),
        offer.unit_volume_ml.is_some(),
        offer.units_per_case.is_some(),
        offer.alcohol_percent.is_some(),
        offer.price_per_unit.is_some() || offer.price_per_case.is_some(),
        offer.currency.is_some(),
        offer.incoterm.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();

    present as f64 / KEY_FIELD_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawValue, RefillableStatus};
    use chrono::TimeZone;

    fn request() -> IngestRequest {
        IngestRequest {
            source_channel: "email".to_string(),
            source_message_id: Some("<m-1@supplier>".to_string()),
            source_filename: Some("body.txt".to_string()),
            supplier_email: Some("sales@supplier.nl".to_string()),
            supplier_name: Some("Supplier BV".to_string()),
            text_body: Some("offer".to_string()),
            attachments: vec![],
        }
    }

    fn ctx(req: &IngestRequest) -> NormalizeContext<'_> {
        NormalizeContext {
            job_id: "job-1",
            index: 0,
            request: req,
            source_filename: None,
            received_at: Utc.with_ymd_and_hms(2025, 12, 19, 9, 30, 0).unwrap(),
        }
    }

    fn normalizer() -> Normalizer {
        Normalizer::new("1.0.0", 0.6)
    }

    fn t(s: &str) -> Option<RawValue> {
        Some(RawValue::text(s))
    }

    fn n(v: f64) -> Option<RawValue> {
        Some(RawValue::number(v))
    }

    // ── Totality ──

    #[test]
    fn test_empty_candidate_is_well_formed() {
        let req = request();
        let offer = normalizer().normalize(&RawCandidate::default(), &ctx(&req));

        assert_eq!(offer.product_name, None);
        assert_eq!(offer.product_key, None);
        assert_eq!(offer.unit_volume_ml, None);
        assert_eq!(offer.price_per_case, None);
        assert_eq!(offer.currency, None);
        assert!(offer.error_flags.is_empty());
        assert_eq!(offer.confidence_score, 0.0);
        assert!(offer.needs_manual_review);
        assert_eq!(offer.supplier_email.as_deref(), Some("sales@supplier.nl"));
        assert_eq!(offer.processing_version, "1.0.0");
    }

    // ── Sentinel policy ──

    #[test]
    fn test_numeric_sentinels_never_become_zero() {
        let req = request();
        for sentinel in [n(0.0), t("0"), t(""), None] {
            let raw = RawCandidate {
                product_name: t("Aperol"),
                unit_volume_ml: sentinel.clone(),
                units_per_case: sentinel.clone(),
                cases_per_pallet: sentinel.clone(),
                quantity_case: sentinel.clone(),
                moq_cases: sentinel.clone(),
                price_per_unit: sentinel.clone(),
                price_per_case: sentinel.clone(),
                ..Default::default()
            };
            let offer = normalizer().normalize(&raw, &ctx(&req));

            assert_eq!(offer.unit_volume_ml, None);
            assert_eq!(offer.units_per_case, None);
            assert_eq!(offer.cases_per_pallet, None);
            assert_eq!(offer.quantity_case, None);
            assert_eq!(offer.moq_cases, None);
            assert_eq!(offer.price_per_unit, None);
            assert_eq!(offer.price_per_case, None);
            assert!(offer.error_flags.is_empty(), "sentinel {:?}", sentinel);
        }
    }

    #[test]
    fn test_unreadable_numbers_are_flagged() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Aperol"),
            units_per_case: t("several"),
            price_per_case: t("on request"),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));

        assert_eq!(offer.units_per_case, None);
        assert_eq!(offer.price_per_case, None);
        assert!(offer.has_flag("invalid_units_per_case"));
        assert!(offer.has_flag("invalid_price_per_case"));
        assert!(offer.needs_manual_review);
    }

    #[test]
    fn test_two_valued_enums_never_default() {
        let req = request();
        let offer = normalizer().normalize(
            &RawCandidate {
                product_name: t("Heineken"),
                refillable_status: t(""),
                ..Default::default()
            },
            &ctx(&req),
        );
        assert_eq!(offer.refillable_status, None);
        assert_eq!(offer.custom_status, None);
        assert_eq!(offer.gift_box, None);

        let offer = normalizer().normalize(
            &RawCandidate {
                product_name: t("Heineken"),
                refillable_status: t("NRF"),
                ..Default::default()
            },
            &ctx(&req),
        );
        assert_eq!(offer.refillable_status, Some(RefillableStatus::NRF));
    }

    // ── Derived fields ──

    #[test]
    fn test_text_only_offer_line() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Baileys Original"),
            brand: t("Baileys"),
            packaging_raw: t("12x1000ml"),
            alcohol_percent: t("17%"),
            incoterm: t("exw"),
            location: t("Loendersloot"),
            price_per_case: t("98,5€"),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));

        assert_eq!(offer.units_per_case, Some(12));
        assert_eq!(offer.unit_volume_ml, Some(1000));
        assert_eq!(offer.alcohol_percent.as_deref(), Some("17%"));
        assert_eq!(offer.incoterm.as_deref(), Some("EXW"));
        assert_eq!(offer.price_per_case, Some(98.5));
        assert_eq!(offer.currency.as_deref(), Some("EUR"));
        assert_eq!(offer.product_key.as_deref(), Some("BAILEYS_ORIGINAL"));
        assert_eq!(offer.confidence_score, 1.0);
        assert!(!offer.needs_manual_review);
    }

    #[test]
    fn test_explicit_fields_beat_packaging_backfill() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Jameson"),
            packaging_raw: t("12x1000ml"),
            unit_volume_ml: t("70cl"),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));
        assert_eq!(offer.unit_volume_ml, Some(700));
        assert_eq!(offer.units_per_case, Some(12));
    }

    #[test]
    fn test_supplied_product_key_is_canonicalised() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Something Else"),
            product_key: t("freixenet_carta nevada"),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));
        assert_eq!(offer.product_key.as_deref(), Some("FREIXENET_CARTA_NEVADA"));
    }

    #[test]
    fn test_currency_field_wins_over_price_symbol() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Jameson"),
            currency: t("GBP"),
            price_per_unit: t("€12"),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));
        assert_eq!(offer.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_unknown_currency_flagged() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Jameson"),
            currency: t("shells"),
            price_per_unit: n(12.0),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));
        assert_eq!(offer.currency, None);
        assert!(offer.has_flag("unknown_currency"));
    }

    // ── Provenance ──

    #[test]
    fn test_candidate_supplier_beats_request() {
        let req = request();
        let raw = RawCandidate {
            supplier_name: t("Distillery Direct"),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));
        assert_eq!(offer.supplier_name.as_deref(), Some("Distillery Direct"));
        assert_eq!(offer.supplier_email.as_deref(), Some("sales@supplier.nl"));
    }

    #[test]
    fn test_attachment_filename_beats_request_filename() {
        let req = request();
        let mut context = ctx(&req);
        assert_eq!(
            normalizer().normalize(&RawCandidate::default(), &context).source_filename.as_deref(),
            Some("body.txt")
        );
        context.source_filename = Some("pricelist.xlsx");
        assert_eq!(
            normalizer().normalize(&RawCandidate::default(), &context).source_filename.as_deref(),
            Some("pricelist.xlsx")
        );
    }

    #[test]
    fn test_uid_is_deterministic_and_distinct() {
        assert_eq!(offer_uid("job-1", 0), offer_uid("job-1", 0));
        assert_ne!(offer_uid("job-1", 0), offer_uid("job-1", 1));
        assert_ne!(offer_uid("job-1", 0), offer_uid("job-2", 0));
    }

    // ── Confidence ──

    #[test]
    fn test_oracle_confidence_with_penalty() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Jameson"),
            confidence_score: n(0.85),
            gift_box: t("perhaps"),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));
        assert_eq!(offer.confidence_score, 0.75);
        assert!(offer.needs_manual_review);
    }

    #[test]
    fn test_score_clamps_and_rounds() {
        let n = normalizer();
        assert_eq!(n.score(0.2, 5), 0.0);
        assert_eq!(n.score(1.4, 0), 1.0);
        assert_eq!(n.score(0.876, 0), 0.88);
    }

    #[test]
    fn test_low_coverage_needs_review() {
        let req = request();
        let raw = RawCandidate {
            product_name: t("Jameson"),
            price_per_unit: n(12.0),
            ..Default::default()
        };
        let offer = normalizer().normalize(&raw, &ctx(&req));
        assert_eq!(offer.confidence_score, 0.25);
        assert!(offer.error_flags.is_empty());
        assert!(offer.needs_manual_review);
    }
}
