use chrono_tz::Tz;

use super::signup::UNKNOWN;

/// Coarse geographic context for a client address. Either built from a
/// successful lookup (individual fields may still be missing) or entirely
/// unknown; never half of each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub country: String,
    pub country_code: Option<String>,
    pub city: String,
    /// IANA name, e.g. `Asia/Tashkent`
    pub timezone: String,
}

impl Location {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            country_code: None,
            city: UNKNOWN.to_string(),
            timezone: "UTC".to_string(),
        }
    }

    /// Emoji flag built from the two-letter country code (regional indicator
    /// symbols), or an empty string if there is no usable code.
    pub fn flag(&self) -> String {
        let Some(code) = self.country_code.as_deref() else {
            return String::new();
        };
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return String::new();
        }
        code.to_ascii_uppercase()
            .chars()
            .filter_map(|c| char::from_u32(0x1F1E6 + (c as u32 - 'A' as u32)))
            .collect()
    }

    /// The timezone, if `chrono-tz` recognises it; the name is shown as-is in
    /// the message either way, but times are rendered in UTC otherwise
    pub fn tz(&self) -> Option<Tz> { self.timezone.parse().ok() }
}
