//! Free-text incident duration parsing
//!
//! Staff enter outage durations as strings like "1h 15m", "45m" or "4h".
//! The format is lossy by construction, so parsing is best-effort and never
//! fails: any token that does not parse contributes 0 minutes. Callers must
//! treat a 0 result for an unparseable string (e.g. "Ongoing") as "unknown
//! duration", not as "zero downtime".
//!
//! ## Parsing rule
//!
//! Numeric tokens are extracted in order by splitting on the unit letters
//! and whitespace. Two tokens mean hours then minutes; a single token is
//! interpreted as hours if the string contains an 'h', as minutes if it
//! contains an 'm', and discarded otherwise.

use std::sync::LazyLock;

use regex::Regex;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[hm\s]+").expect("literal pattern"));

/// Parse a free-text duration string into total minutes.
///
/// Empty or malformed input yields 0; absurdly large values saturate at
/// `u32::MAX` minutes.
pub fn parse_duration_minutes(duration: &str) -> u32 {
    let tokens: Vec<&str> = SEPARATORS
        .split(duration)
        .filter(|part| !part.is_empty())
        .collect();

    let mut hours: u32 = 0;
    let mut minutes: u32 = 0;

    if tokens.len() >= 2 {
        hours = tokens[0].parse().unwrap_or(0);
        minutes = tokens[1].parse().unwrap_or(0);
    } else if let Some(token) = tokens.first() {
        if duration.contains('h') {
            hours = token.parse().unwrap_or(0);
        } else if duration.contains('m') {
            minutes = token.parse().unwrap_or(0);
        }
    }

    hours.saturating_mul(60).saturating_add(minutes)
}

/// Format a minute count back into the canonical "Xh Ym" form.
pub fn format_duration_minutes(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Derive a duration string from an incident's start and end times.
///
/// Used when an incident is edited and both endpoints are known; a negative
/// span (end before start) collapses to "0h 0m".
pub fn duration_between(
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> String {
    let minutes = (end - start).num_minutes().max(0) as u32;
    format_duration_minutes(minutes)
}
