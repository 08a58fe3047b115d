//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Offers arrive from third-party mailboxes, so traces must not carry
//! supplier addresses, message bodies or download tokens verbatim.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default cap for text echoed into log lines.
pub const LOG_PREVIEW_CHARS: usize = 80;

/// Masks the local part of an email address.
///
/// - `sales@supplier.nl` → `s****@supplier.nl`
/// - `not-an-address` → `<redacted>`
pub fn redact_email(address: &str) -> String {
    match address.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}****@{}", first, domain)
        }
        _ => "<redacted>".to_string(),
    }
}

/// Strips query strings from a URL; attachment links often carry tokens there.
pub fn redact_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?****", base),
        None => url.to_string(),
    }
}

/// Returns at most `max_chars` characters of `text` on a single line.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let flat = flat.trim();

    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }

    let head: String = flat.chars().take(max_chars).collect();
    format!("{}… ({} chars)", head, flat.chars().count())
}

/// Short deterministic hash of a message id for correlating log lines.
pub fn hash_message_id(message_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    message_id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
