//! Validation and within-job deduplication of normalized offers.

use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use crate::model::Offer;

static RE_FILLER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(row|line|item|product)\s*#?\s*\d+$").unwrap());

/// Names extraction emits when it has nothing real, compared lowercase.
const PLACEHOLDER_NAMES: &[&str] = &[
    "unknown",
    "n/a",
    "na",
    "none",
    "null",
    "-",
    "tbd",
    "product",
    "product name",
    "item",
    "total",
    "subtotal",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingName,
    PlaceholderName,
    NoProductKey,
    NoPrice,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectReason::MissingName => "missing product name",
            RejectReason::PlaceholderName => "placeholder product name",
            RejectReason::NoProductKey => "product name yields no key",
            RejectReason::NoPrice => "no unit or case price",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Accepted,
    Rejected(RejectReason),
    Duplicate { product_key: String },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted)
    }
}

pub fn is_placeholder_name(name: &str) -> bool {
    let trimmed = name.trim();
    PLACEHOLDER_NAMES.contains(&trimmed.to_lowercase().as_str()) || RE_FILLER_NAME.is_match(trimmed)
}

fn positive(price: Option<f64>) -> bool {
    price.is_some_and(|p| p > 0.0)
}

/// Validation predicate, independent of what the gate has already seen.
pub fn validate(offer: &Offer) -> Result<&str, RejectReason> {
    let name = offer
        .product_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or(RejectReason::MissingName)?;

    if is_placeholder_name(name) {
        return Err(RejectReason::PlaceholderName);
    }

    if !positive(offer.price_per_unit) && !positive(offer.price_per_case) {
        return Err(RejectReason::NoPrice);
    }

    offer
        .product_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(RejectReason::NoProductKey)
}

/// Per-job gate. Offers must be presented in candidate order; the first
/// offer with a given product key wins.
#[derive(Debug, Default)]
pub struct ValidationGate {
    seen: HashSet<String>,
    accepted: usize,
    rejected: usize,
    duplicates: usize,
}

impl ValidationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, offer: &Offer) -> GateDecision {
        let key = match validate(offer) {
            Ok(key) => key,
            Err(reason) => {
                self.rejected += 1;
                return GateDecision::Rejected(reason);
            }
        };

        if !self.seen.insert(key.to_string()) {
            self.duplicates += 1;
            return GateDecision::Duplicate {
                product_key: key.to_string(),
            };
        }

        self.accepted += 1;
        GateDecision::Accepted
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
