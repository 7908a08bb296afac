use jiff::civil::Date;
use thiserror::Error;

use crate::models::parse_date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

/// Ordered list of rule violations. Only the first one is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.first().map(|e| e.message.as_str()).unwrap_or("Validation failed"))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }
}

#[derive(Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field,
            message: message.into(),
        });
    }

    pub fn required(&mut self, field: &'static str, label: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, format!("{label} is required"));
            return false;
        }
        true
    }

    pub fn max_length(&mut self, field: &'static str, label: &str, value: &str, max: usize) -> bool {
        if value.chars().count() > max {
            self.add(field, format!("{label} must be at most {max} characters"));
            return false;
        }
        true
    }

    pub fn min_value(&mut self, field: &'static str, label: &str, value: f64, min: f64) -> bool {
        if !value.is_finite() || value < min {
            self.add(field, format!("{label} must be at least {min}"));
            return false;
        }
        true
    }

    pub fn greater_than(&mut self, field: &'static str, label: &str, value: f64, bound: f64) -> bool {
        if !value.is_finite() || value <= bound {
            self.add(field, format!("{label} must be greater than {bound}"));
            return false;
        }
        true
    }

    /// Required date field; returns the parsed date when it is present and well formed
    pub fn date(&mut self, field: &'static str, label: &str, value: &str) -> Option<Date> {
        if !self.required(field, label, value) {
            return None;
        }
        match parse_date(field, value) {
            Ok(date) => Some(date),
            Err(e) => {
                self.add(field, e.to_string());
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}
