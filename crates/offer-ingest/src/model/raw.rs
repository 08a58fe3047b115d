//! Loosely-typed candidate records as returned by the extraction oracle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One scalar as the oracle produced it. Nulls never reach this type; they
/// deserialize to `None` on the enclosing `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Other(Value),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into())
    }

    pub fn number(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(RawValue::Number)
            .unwrap_or(RawValue::Other(Value::Null))
    }

    /// Textual form, trimmed. Empty strings and compound values yield `None`.
    pub fn as_text(&self) -> Option<String> {
        let s = match self {
            RawValue::Bool(b) => b.to_string(),
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Other(_) => return None,
        };
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

/// Key spellings the oracle commonly uses, mapped to the canonical field.
const ALIASES: &[(&str, &str)] = &[
    ("name", "product_name"),
    ("product", "product_name"),
    ("description", "product_name"),
    ("abv", "alcohol_percent"),
    ("alcohol", "alcohol_percent"),
    ("alc", "alcohol_percent"),
    ("volume", "unit_volume_ml"),
    ("volume_ml", "unit_volume_ml"),
    ("unit_volume", "unit_volume_ml"),
    ("bottle_size", "unit_volume_ml"),
    ("units", "units_per_case"),
    ("case_size", "units_per_case"),
    ("bottles_per_case", "units_per_case"),
    ("pack_size", "units_per_case"),
    ("quantity", "quantity_case"),
    ("cases", "quantity_case"),
    ("moq", "moq_cases"),
    ("ean", "ean_code"),
    ("barcode", "ean_code"),
    ("sku", "product_reference"),
    ("reference", "product_reference"),
    ("unit_price", "price_per_unit"),
    ("bottle_price", "price_per_unit"),
    ("case_price", "price_per_case"),
    ("rf_nrf", "refillable_status"),
    ("refillable", "refillable_status"),
    ("customs_status", "custom_status"),
    ("giftbox", "gift_box"),
    ("gbx", "gift_box"),
    ("origin", "origin_country"),
    ("country_of_origin", "origin_country"),
    ("confidence", "confidence_score"),
];

/// A partial offer: every field is an optional raw slot. Built per source by
/// the extraction layer and consumed by the normalizer within one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCandidate {
    pub product_name: Option<RawValue>,
    pub brand: Option<RawValue>,
    pub product_key: Option<RawValue>,
    pub product_reference: Option<RawValue>,
    pub ean_code: Option<RawValue>,
    pub category: Option<RawValue>,
    pub sub_category: Option<RawValue>,
    pub vintage: Option<RawValue>,

    pub packaging: Option<RawValue>,
    pub packaging_raw: Option<RawValue>,
    pub bottle_or_can_type: Option<RawValue>,
    pub unit_volume_ml: Option<RawValue>,
    pub units_per_case: Option<RawValue>,
    pub cases_per_pallet: Option<RawValue>,
    pub quantity_case: Option<RawValue>,
    pub refillable_status: Option<RawValue>,
    pub gift_box: Option<RawValue>,
    pub label_language: Option<RawValue>,
    pub alcohol_percent: Option<RawValue>,

    pub currency: Option<RawValue>,
    pub price_per_unit: Option<RawValue>,
    pub price_per_case: Option<RawValue>,
    pub incoterm: Option<RawValue>,
    pub location: Option<RawValue>,
    pub moq_cases: Option<RawValue>,
    pub lead_time: Option<RawValue>,
    pub valid_until: Option<RawValue>,
    pub best_before_date: Option<RawValue>,
    pub custom_status: Option<RawValue>,
    pub origin_country: Option<RawValue>,

    pub supplier_name: Option<RawValue>,
    pub supplier_email: Option<RawValue>,
    pub supplier_reference: Option<RawValue>,
    pub supplier_country: Option<RawValue>,
    pub offer_date: Option<RawValue>,

    pub confidence_score: Option<RawValue>,
}

macro_rules! for_each_raw_field {
    ($mac:ident) => {
        $mac!(
            product_name, brand, product_key, product_reference, ean_code, category,
            sub_category, vintage, packaging, packaging_raw, bottle_or_can_type,
            unit_volume_ml, units_per_case, cases_per_pallet, quantity_case,
            refillable_status, gift_box, label_language, alcohol_percent, currency,
            price_per_unit, price_per_case, incoterm, location, moq_cases, lead_time,
            valid_until, best_before_date, custom_status, origin_country, supplier_name,
            supplier_email, supplier_reference, supplier_country, offer_date,
            confidence_score
        )
    };
}

macro_rules! field_names {
    ($($field:ident),*) => {
        &[$(stringify!($field)),*]
    };
}

impl RawCandidate {
    /// Canonical field names, in declaration order.
    pub const FIELD_NAMES: &'static [&'static str] = for_each_raw_field!(field_names);

    /// Builds a candidate from one JSON object. Keys are matched
    /// case-insensitively, known aliases are folded onto their canonical
    /// field (the canonical spelling wins), unknown keys are ignored.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let Value::Object(map) = value else {
            return Err(serde::de::Error::custom(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        };

        let mut canonical = Map::with_capacity(map.len());
        let mut aliased = Vec::new();
        for (key, value) in map {
            let key = key.trim().to_lowercase().replace([' ', '-'], "_");
            match ALIASES.iter().find(|(alias, _)| *alias == key) {
                Some((_, target)) => aliased.push((*target, value)),
                None => {
                    canonical.insert(key, value);
                }
            }
        }
        for (target, value) in aliased {
            let slot_empty = canonical.get(target).is_none_or(Value::is_null);
            if slot_empty {
                canonical.insert(target.to_string(), value);
            }
        }

        serde_json::from_value(Value::Object(canonical))
    }

    /// Copies every field of `context` into slots that are still empty here.
    /// Values already present in `self` are kept.
    pub fn fill_from(&mut self, context: &RawCandidate) {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(
                    if self.$field.is_none() {
                        self.$field = context.$field.clone();
                    }
                )*
            };
        }
        for_each_raw_field!(fill);
    }

    /// The offer-level terms of this candidate: commercial conditions and
    /// supplier details that apply to every product of one offer. Product
    /// identity, packaging and prices are left out.
    pub fn offer_context(&self) -> RawCandidate {
        RawCandidate {
            currency: self.currency.clone(),
            incoterm: self.incoterm.clone(),
            location: self.location.clone(),
            lead_time: self.lead_time.clone(),
            valid_until: self.valid_until.clone(),
            custom_status: self.custom_status.clone(),
            supplier_name: self.supplier_name.clone(),
            supplier_email: self.supplier_email.clone(),
            supplier_reference: self.supplier_reference.clone(),
            supplier_country: self.supplier_country.clone(),
            offer_date: self.offer_date.clone(),
            ..Default::default()
        }
    }

    /// Number of populated slots.
    pub fn field_count(&self) -> usize {
        let mut count = 0;
        macro_rules! tally {
            ($($field:ident),*) => {
                $(
                    if self.$field.is_some() {
                        count += 1;
                    }
                )*
            };
        }
        for_each_raw_field!(tally);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
