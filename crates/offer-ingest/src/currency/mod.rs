//! EUR conversion of offer prices.
//!
//! One [`CurrencyNormalizer`] lives for one pipeline run, so each distinct
//! currency is looked up at most once per job.

pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RateError;
use crate::model::Offer;
use crate::normalize::penalised_score;

pub use http::HttpRateOracle;

pub const BASE_CURRENCY: &str = "EUR";
pub const FX_UNAVAILABLE_FLAG: &str = "fx_rate_unavailable";

/// Source of conversion rates, expressed as EUR per one unit of `code`.
#[async_trait]
pub trait RateOracle: Send + Sync {
    async fn rate_to_eur(&self, code: &str) -> Result<f64, RateError>;

    fn name(&self) -> &'static str;
}

/// Fixed rate table, typically from config.
#[derive(Debug, Clone, Default)]
pub struct StaticRateOracle {
    rates: BTreeMap<String, f64>,
}

impl StaticRateOracle {
    pub fn new(rates: BTreeMap<String, f64>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();
        Self { rates }
    }
}

#[async_trait]
impl RateOracle for StaticRateOracle {
    async fn rate_to_eur(&self, code: &str) -> Result<f64, RateError> {
        let rate = self
            .rates
            .get(&code.to_uppercase())
            .copied()
            .ok_or_else(|| RateError::Missing(code.to_string()))?;
        validate_rate(code, rate)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub(crate) fn validate_rate(code: &str, rate: f64) -> Result<f64, RateError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(RateError::Invalid {
            code: code.to_string(),
            rate,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fills `price_*_eur`, `fx_rate` and `fx_date` for offers of one job run.
pub struct CurrencyNormalizer {
    oracle: Arc<dyn RateOracle>,
    fx_date: NaiveDate,
    /// `None` records a failed lookup so it is not retried within the run.
    cache: HashMap<String, Option<f64>>,
    lookups: usize,
}

impl CurrencyNormalizer {
    pub fn new(oracle: Arc<dyn RateOracle>, fx_date: NaiveDate) -> Self {
        Self {
            oracle,
            fx_date,
            cache: HashMap::new(),
            lookups: 0,
        }
    }

    /// Number of oracle calls made so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    async fn rate_for(&mut self, code: &str) -> Option<f64> {
        if let Some(cached) = self.cache.get(code) {
            return *cached;
        }

        self.lookups += 1;
        let rate = match self.oracle.rate_to_eur(code).await {
            Ok(rate) => {
                debug!(currency = code, rate, oracle = self.oracle.name(), "Resolved EUR rate");
                Some(rate)
            }
            Err(e) => {
                warn!(currency = code, oracle = self.oracle.name(), error = %e, "EUR rate unavailable, using 1.0");
                None
            }
        };
        self.cache.insert(code.to_string(), rate);
        rate
    }

    /// Returns the offer with EUR prices filled in.
    ///
    /// EUR and unknown currency are identity conversions. Absent prices stay
    /// absent. A failed lookup converts at 1.0 and flags the offer.
    pub async fn to_eur(&mut self, mut offer: Offer) -> Offer {
        let code = match offer.currency.as_deref() {
            None => {
                offer.price_per_unit_eur = offer.price_per_unit;
                offer.price_per_case_eur = offer.price_per_case;
                offer.fx_rate = None;
                offer.fx_date = None;
                return offer;
            }
            Some(code) if code == BASE_CURRENCY => {
                offer.price_per_unit_eur = offer.price_per_unit;
                offer.price_per_case_eur = offer.price_per_case;
                offer.fx_rate = Some(1.0);
                offer.fx_date = Some(self.fx_date.to_string());
                return offer;
            }
            Some(code) => code.to_string(),
        };

        if offer.price_per_unit.is_none() && offer.price_per_case.is_none() {
            return offer;
        }

        let rate = match self.rate_for(&code).await {
            Some(rate) => rate,
            None => {
                if !offer.has_flag(FX_UNAVAILABLE_FLAG) {
                    offer.flag(FX_UNAVAILABLE_FLAG);
                    offer.confidence_score = penalised_score(offer.confidence_score, 1);
                }
                1.0
            }
        };

        offer.price_per_unit_eur = offer.price_per_unit.map(|p| round2(p * rate));
        offer.price_per_case_eur = offer.price_per_case.map(|p| round2(p * rate));
        offer.fx_rate = Some(rate);
        offer.fx_date = Some(self.fx_date.to_string());
        offer
    }
}
