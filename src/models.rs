use jiff::civil::Date;
use thiserror::Error;

pub mod expense;
pub mod project;
pub mod settings;
pub mod store;
pub mod task;
pub mod time_entry;

/// A date field that could not be read as `YYYY-MM-DD`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field} '{value}': expected a YYYY-MM-DD date")]
pub struct InvalidDate {
    pub field: &'static str,
    pub value: String,
}

/// Dates are kept as strings in the store so a malformed value imported from
/// elsewhere never prevents the rest of the store from loading.
pub fn parse_date(field: &'static str, value: &str) -> Result<Date, InvalidDate> {
    value.trim().parse::<Date>().map_err(|_| InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Whole calendar days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: Date, to: Date) -> i64 {
    match from.until(to) {
        Ok(span) => i64::from(span.get_days()),
        Err(_) => 0,
    }
}

/// `date` shifted by `days`, or `None` when it falls outside the supported range
pub fn add_days(date: Date, days: i64) -> Option<Date> {
    let span = jiff::Span::new().try_days(days).ok()?;
    date.checked_add(span).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_parse_date_accepts_iso_dates() {
        assert_eq!(parse_date("dueDate", "2025-03-01").unwrap(), date(2025, 3, 1));
        assert_eq!(parse_date("dueDate", " 2025-03-01 ").unwrap(), date(2025, 3, 1));
    }

    #[test]
    fn test_parse_date_reports_field_and_value() {
        let err = parse_date("endDate", "soon").unwrap_err();
        assert_eq!(err.field, "endDate");
        assert_eq!(err.value, "soon");
    }

    #[test]
    fn test_days_between_is_signed() {
        assert_eq!(days_between(date(2025, 1, 1), date(2025, 1, 31)), 30);
        assert_eq!(days_between(date(2025, 1, 31), date(2025, 1, 1)), -30);
        assert_eq!(days_between(date(2024, 2, 28), date(2024, 3, 1)), 2);
    }

    #[test]
    fn test_add_days() {
        assert_eq!(add_days(date(2025, 12, 30), 3), Some(date(2026, 1, 2)));
        assert_eq!(add_days(date(2025, 1, 1), i64::MAX), None);
    }
}
