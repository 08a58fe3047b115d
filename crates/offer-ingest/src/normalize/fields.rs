//! Field-level parsers used by the normalizer.
//!
//! Every parser distinguishes three outcomes: nothing usable was supplied
//! ([`Parsed::Absent`]), a well-typed value, or non-blank input that could
//! not be read ([`Parsed::Invalid`]). Zero-like input for counts, volumes
//! and prices is absent, never `0`.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{CustomStatus, RawValue, RefillableStatus};

/// Space-grouped numbers (`1 234,50`) first, then runs of digits, dots and
/// commas.
static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:[ \x{00A0}\x{202F}]\d{3}\b)+(?:[.,]\d+)?|\d(?:[\d.,]*\d)?").unwrap()
});
static RE_VOLUME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(ml|cl|ltr|lt|litres?|liters?|l)\b").unwrap()
});
static RE_PACKAGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*[x×*/]\s*(\d+(?:[.,]\d+)?)\s*(ml|cl|ltr|lt|litres?|liters?|l)?\b")
        .unwrap()
});
static RE_CURRENCY_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(euros?|[a-z]{3})\b").unwrap());

/// Blank-equivalent spellings, compared lowercase.
const BLANK_TEXT: &[&str] = &["", "-", "--", "n/a", "na", "null", "none", "nil", "?"];

/// Dollar marks that name a currency other than USD, checked before a bare `$`.
const PREFIXED_DOLLARS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("CA$", "CAD"),
    ("AU$", "AUD"),
    ("NZ$", "NZD"),
    ("HK$", "HKD"),
    ("SG$", "SGD"),
    ("C$", "CAD"),
    ("A$", "AUD"),
    ("S$", "SGD"),
];

/// Three-letter codes recognised inside price strings.
const KNOWN_CODES: &[&str] = &[
    "EUR", "USD", "GBP", "CHF", "SEK", "NOK", "DKK", "PLN", "CZK", "HUF", "RON", "BGN", "JPY",
    "CNY", "HKD", "SGD", "AUD", "NZD", "CAD", "ZAR", "AED", "TRY", "MXN", "BRL", "INR", "ILS",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Absent,
    Value(T),
    Invalid,
}

impl<T> Parsed<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Parsed::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Parsed::Invalid)
    }
}

fn is_blank(text: &str) -> bool {
    BLANK_TEXT.contains(&text.trim().to_lowercase().as_str())
}

/// Free-text field: trimmed, blank spellings dropped.
pub fn text(raw: Option<&RawValue>) -> Option<String> {
    let s = raw?.as_text()?;
    if is_blank(&s) {
        None
    } else {
        Some(s)
    }
}

/// Reads a decimal written with either `,` or `.` as separator.
///
/// With both present the rightmost one is the decimal mark. A lone comma
/// followed by exactly three digits is a thousands separator (`1,500`);
/// otherwise it is a decimal comma (`98,5`). A lone dot is always decimal.
/// Spaces, NBSP and narrow NBSP are thousands separators.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let s: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{00A0}' | '\u{202F}'))
        .collect();
    let s = s.as_str();
    if s.is_empty() {
        return None;
    }

    let dots = s.matches('.').count();
    let commas = s.matches(',').count();
    let normalized = match (dots, commas) {
        (0, 0) | (1, 0) => s.to_string(),
        (_, 0) => s.replace('.', ""),
        (0, 1) => {
            let (int, frac) = s.split_once(',')?;
            if frac.len() == 3 && !int.is_empty() && int != "0" {
                format!("{}{}", int, frac)
            } else {
                format!("{}.{}", int, frac)
            }
        }
        (0, _) => s.replace(',', ""),
        _ => {
            if s.rfind(',') > s.rfind('.') {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn first_number(s: &str) -> Option<f64> {
    RE_NUMBER.find(s).and_then(|m| parse_decimal(m.as_str()))
}

fn number_of(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Whole counts: units per case, cases per pallet, quantity, MOQ.
pub fn count(raw: Option<&RawValue>) -> Parsed<u32> {
    let Some(raw) = raw else {
        return Parsed::Absent;
    };

    let value = match raw {
        RawValue::Number(_) => number_of(raw),
        RawValue::Text(s) if is_blank(s) => return Parsed::Absent,
        RawValue::Text(s) => first_number(s),
        RawValue::Bool(_) | RawValue::Other(_) => None,
    };

    match value {
        Some(v) if v == 0.0 => Parsed::Absent,
        Some(v) if v > 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Parsed::Value(v as u32),
        _ => Parsed::Invalid,
    }
}

fn volume_factor(unit: &str) -> f64 {
    match unit.to_lowercase().as_str() {
        "ml" => 1.0,
        "cl" => 10.0,
        _ => 1000.0,
    }
}

/// Bare numbers below 10 are litres, anything else is millilitres.
fn bare_volume_ml(v: f64) -> f64 {
    if v < 10.0 {
        v * 1000.0
    } else {
        v
    }
}

fn whole_ml(ml: f64) -> Parsed<u32> {
    let rounded = ml.round();
    if rounded <= 0.0 {
        Parsed::Absent
    } else if rounded > u32::MAX as f64 {
        Parsed::Invalid
    } else {
        Parsed::Value(rounded as u32)
    }
}

/// Unit volume in whole millilitres from ml/cl/l notation.
pub fn volume_ml(raw: Option<&RawValue>) -> Parsed<u32> {
    let Some(raw) = raw else {
        return Parsed::Absent;
    };

    match raw {
        RawValue::Number(_) => match number_of(raw) {
            Some(v) if v == 0.0 => Parsed::Absent,
            Some(v) if v > 0.0 => whole_ml(bare_volume_ml(v)),
            _ => Parsed::Invalid,
        },
        RawValue::Text(s) if is_blank(s) => Parsed::Absent,
        RawValue::Text(s) => {
            if let Some(caps) = RE_VOLUME.captures(s) {
                return match parse_decimal(&caps[1]) {
                    Some(v) => whole_ml(v * volume_factor(&caps[2])),
                    None => Parsed::Invalid,
                };
            }
            match parse_decimal(s) {
                Some(v) if v == 0.0 => Parsed::Absent,
                Some(v) if v > 0.0 => whole_ml(bare_volume_ml(v)),
                _ => Parsed::Invalid,
            }
        }
        RawValue::Bool(_) | RawValue::Other(_) => Parsed::Invalid,
    }
}

/// A price and, when the string names one, its currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub amount: f64,
    pub currency_hint: Option<String>,
}

/// Prices with decimal commas, thousands separators and currency marks.
pub fn price(raw: Option<&RawValue>) -> Parsed<Price> {
    let Some(raw) = raw else {
        return Parsed::Absent;
    };

    let (amount, hint) = match raw {
        RawValue::Number(_) => (number_of(raw), None),
        RawValue::Text(s) if is_blank(s) => return Parsed::Absent,
        RawValue::Text(s) => (first_number(s), currency_hint(s)),
        RawValue::Bool(_) | RawValue::Other(_) => (None, None),
    };

    match amount {
        Some(v) if v == 0.0 => Parsed::Absent,
        Some(v) if v > 0.0 => Parsed::Value(Price {
            amount: v,
            currency_hint: hint,
        }),
        _ => Parsed::Invalid,
    }
}

/// Currency named by a symbol or a known ISO code inside free text.
pub fn currency_hint(s: &str) -> Option<String> {
    if s.contains('€') {
        return Some("EUR".to_string());
    }
    if s.contains('£') {
        return Some("GBP".to_string());
    }
    if s.contains('$') {
        let upper = s.to_uppercase();
        if let Some((_, code)) = PREFIXED_DOLLARS
            .iter()
            .find(|(mark, _)| upper.contains(mark))
        {
            return Some(code.to_string());
        }
    }
    let named = RE_CURRENCY_WORD.captures_iter(s).find_map(|caps| {
        let word = caps[1].to_uppercase();
        if word.starts_with("EURO") {
            Some("EUR".to_string())
        } else if KNOWN_CODES.contains(&word.as_str()) {
            Some(word)
        } else {
            None
        }
    });
    named.or_else(|| s.contains('$').then(|| "USD".to_string()))
}

/// Canonical ISO code. Symbols and common spellings are mapped; any other
/// three-letter alphabetic code is accepted uppercased.
pub fn currency(raw: Option<&RawValue>) -> Parsed<String> {
    let Some(s) = text(raw) else {
        return Parsed::Absent;
    };

    let upper = s.to_uppercase();
    let code = match upper.as_str() {
        "EUR" | "EURO" | "EUROS" | "€" | "EUR €" | "€ EUR" => "EUR",
        "USD" | "$" | "US$" | "US DOLLAR" | "US DOLLARS" | "DOLLAR" | "DOLLARS" => "USD",
        "GBP" | "£" | "POUND" | "POUNDS" | "GBP £" => "GBP",
        "CA$" | "C$" => "CAD",
        "AU$" | "A$" => "AUD",
        "NZ$" => "NZD",
        "HK$" => "HKD",
        "SG$" | "S$" => "SGD",
        other if other.len() == 3 && other.chars().all(|c| c.is_ascii_alphabetic()) => other,
        _ => return Parsed::Invalid,
    };
    Parsed::Value(code.to_string())
}

/// Formats an ABV as a percentage string, magnitude as given.
pub fn format_percent(value: f64) -> String {
    format!("{}%", value)
}

/// `43` → `"43%"`, `"40,0 %"` → `"40%"`. Zero is a legitimate ABV.
pub fn alcohol_percent(raw: Option<&RawValue>) -> Parsed<String> {
    let Some(raw) = raw else {
        return Parsed::Absent;
    };

    let value = match raw {
        RawValue::Number(_) => number_of(raw),
        RawValue::Text(s) if is_blank(s) => return Parsed::Absent,
        RawValue::Text(s) => first_number(s),
        RawValue::Bool(_) | RawValue::Other(_) => None,
    };

    match value {
        Some(v) if (0.0..=100.0).contains(&v) => Parsed::Value(format_percent(v)),
        _ => Parsed::Invalid,
    }
}

fn squashed_upper(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn refillable_status(raw: Option<&RawValue>) -> Parsed<RefillableStatus> {
    match raw {
        None => Parsed::Absent,
        Some(RawValue::Bool(true)) => Parsed::Value(RefillableStatus::RF),
        Some(RawValue::Bool(false)) => Parsed::Value(RefillableStatus::NRF),
        Some(value) => {
            let Some(s) = text(Some(value)) else {
                return Parsed::Absent;
            };
            match squashed_upper(&s).as_str() {
                "RF" | "REFILLABLE" | "RETURNABLE" => Parsed::Value(RefillableStatus::RF),
                "NRF" | "NONREFILLABLE" | "NONRETURNABLE" | "ONEWAY" => {
                    Parsed::Value(RefillableStatus::NRF)
                }
                _ => Parsed::Invalid,
            }
        }
    }
}

pub fn custom_status(raw: Option<&RawValue>) -> Parsed<CustomStatus> {
    let Some(s) = text(raw) else {
        return Parsed::Absent;
    };
    match squashed_upper(&s).as_str() {
        "T1" | "DUTYSUSPENDED" | "INBOND" | "UNDERBOND" => Parsed::Value(CustomStatus::T1),
        "T2" | "DUTYPAID" => Parsed::Value(CustomStatus::T2),
        _ => Parsed::Invalid,
    }
}

pub fn gift_box(raw: Option<&RawValue>) -> Parsed<bool> {
    match raw {
        None => Parsed::Absent,
        Some(RawValue::Bool(b)) => Parsed::Value(*b),
        Some(value @ RawValue::Number(_)) => match number_of(value) {
            Some(v) if v == 1.0 => Parsed::Value(true),
            Some(v) if v == 0.0 => Parsed::Value(false),
            _ => Parsed::Invalid,
        },
        Some(value) => {
            let Some(s) = text(Some(value)) else {
                return Parsed::Absent;
            };
            match squashed_upper(&s).as_str() {
                "YES" | "Y" | "TRUE" | "GBX" | "GB" | "GIFTBOX" | "WITHGIFTBOX" | "WGB" => {
                    Parsed::Value(true)
                }
                "NO" | "N" | "FALSE" | "NOGBX" | "NOGB" | "NOGIFTBOX" | "WITHOUTGIFTBOX" => {
                    Parsed::Value(false)
                }
                _ => Parsed::Invalid,
            }
        }
    }
}

/// Confidence as a fraction in `[0, 1]`; values in `(1, 100]` are percentages.
pub fn confidence(raw: Option<&RawValue>) -> Option<f64> {
    let raw = raw?;
    let v = match raw {
        RawValue::Number(_) => number_of(raw)?,
        RawValue::Text(s) => first_number(s)?,
        _ => return None,
    };
    if (0.0..=1.0).contains(&v) {
        Some(v)
    } else if v > 1.0 && v <= 100.0 {
        Some(v / 100.0)
    } else {
        None
    }
}

/// Deduplication key derived from a product name.
///
/// Uppercased; `.` removed; whitespace, `/`, `&`, `-` and `,` split words;
/// remaining non-alphanumerics dropped; words joined with `_`.
pub fn product_key(name: &str) -> Option<String> {
    let words: Vec<String> = name
        .split(|c: char| c.is_whitespace() || matches!(c, '/' | '&' | '-' | ',' | '_'))
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_uppercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join("_"))
    }
}

/// Units per case and unit volume read from strings like `12x1000ml`,
/// `6 x 70cl` or `24/33cl`.
pub fn packaging_pattern(s: &str) -> Option<(u32, Option<u32>)> {
    let caps = RE_PACKAGING.captures(s)?;
    let units: u32 = caps[1].parse().ok().filter(|u| *u > 0)?;
    let amount = parse_decimal(&caps[2])?;
    let ml = match caps.get(3) {
        Some(unit) => amount * volume_factor(unit.as_str()),
        None => bare_volume_ml(amount),
    };
    Some((units, whole_ml(ml).value()))
}
