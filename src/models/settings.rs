use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};

/// Per-user display preferences stored alongside the data
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub language: String,
    pub currency: String,
    /// IANA time zone name used for day and week boundaries
    pub timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: String::from("en"),
            currency: String::from("USD"),
            timezone: String::from("UTC"),
        }
    }
}

impl Settings {
    /// Falls back to the system zone when the stored name no longer resolves
    pub fn time_zone(&self) -> TimeZone {
        TimeZone::get(&self.timezone).unwrap_or_else(|e| {
            tracing::warn!(timezone = %self.timezone, error = %e, "unknown time zone, using system zone");
            TimeZone::system()
        })
    }
}
