//! Dashboard variable resolution for copied queries.
//!
//! Variables come from the page URL: every `var-NAME=value` parameter, plus
//! `__interval` and `__rate_interval` derived from the `from`/`to` range.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pagemod_core::Location;
use regex::{Captures, Regex};
use tracing::warn;

pub const DEFAULT_INTERVAL: &str = "1m";

static RELATIVE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^now-(\d+)([smhdwMy])").expect("relative time regex"));
static BRACED_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}").expect("braced variable regex"));
static BARE_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([a-zA-Z_][a-zA-Z0-9_]*)").expect("bare variable regex"));
static ODD_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{00a0}\u{2000}-\u{200b}\u{202f}\u{205f}\u{3000}]").expect("space regex"));
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space run regex"));

/// Variables available to a query on this page.
pub fn extract_variables(location: &Location, now: DateTime<Utc>) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = location
        .query_pairs()
        .into_iter()
        .filter_map(|(key, value)| key.strip_prefix("var-").map(|name| (name.to_string(), value)))
        .collect();

    let interval = match (location.query_param("from"), location.query_param("to")) {
        (Some(from), Some(to)) => {
            let from = parse_time(&from, now);
            let to = parse_time(&to, now);
            interval_for_range((to - from).abs())
        }
        _ => {
            warn!(href = location.href(), "no from/to range in URL, using default interval");
            DEFAULT_INTERVAL
        }
    };
    vars.insert("__interval".to_string(), interval.to_string());
    vars.insert("__rate_interval".to_string(), interval.to_string());
    vars
}

/// Step for a time range: under a day 1m, under two days 10m, else 1h.
pub fn interval_for_range(range: Duration) -> &'static str {
    if range < Duration::hours(24) {
        "1m"
    } else if range < Duration::hours(48) {
        "10m"
    } else {
        "1h"
    }
}

/// Parse a Grafana time expression. Unparsable input is logged and read as `now`.
pub fn parse_time(input: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    try_parse_time(input, now).unwrap_or_else(|| {
        warn!(input, "unrecognized time expression, using now");
        now
    })
}

/// `now`, `now-<n><unit>` (s, m, h, d, w, M, y), epoch milliseconds or RFC 3339.
///
/// Units follow Grafana's time picker: `m` is minutes, `M` is a 30-day month
/// and `y` a 365-day year.
pub fn try_parse_time(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input == "now" {
        return Some(now);
    }
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = input.parse().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    let caps = RELATIVE_TIME.captures(input)?;
    let amount: i64 = caps[1].parse().ok()?;
    let offset = match &caps[2] {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        "M" => amount.checked_mul(30).and_then(Duration::try_days),
        "y" => amount.checked_mul(365).and_then(Duration::try_days),
        _ => None,
    }?;
    now.checked_sub_signed(offset)
}

/// Collapse whitespace runs, including non-breaking and zero-width spaces,
/// into single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    let spaced = ODD_SPACES.replace_all(text, " ");
    SPACE_RUNS.replace_all(&spaced, " ").trim().to_string()
}

/// Substitute `${name}` / `${ name }` and `$name` references. Unknown names
/// are left as written.
pub fn substitute(query: &str, vars: &HashMap<String, String>) -> String {
    let normalized = normalize_whitespace(query);
    let replace = |caps: &Captures<'_>| match vars.get(&caps[1]) {
        Some(value) => normalize_whitespace(value),
        None => caps[0].to_string(),
    };
    let braced = BRACED_VARIABLE.replace_all(&normalized, replace);
    BARE_VARIABLE.replace_all(&braced, replace).into_owned()
}
