//! Compiled regex patterns for parsing user-entered durations.
//!
//! Compiled once on first use and reused by [`crate::format`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Plain minutes, e.g. `45`.
pub static RE_PLAIN_MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Clock form as displayed: `MM:SS` or `H:MM:SS`.
pub static RE_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})$").unwrap());

/// Unit form, e.g. `1h 5m`, `90s`, `2h30m`.
pub static RE_UNITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+)\s*h)?\s*(?:(\d+)\s*m(?:in)?)?\s*(?:(\d+)\s*s)?$").unwrap()
});
