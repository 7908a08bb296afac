use jiff::tz::TimeZone;
use thiserror::Error;

use crate::{
    events::{Event, EventBus},
    models::{settings::Settings, store::Store},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum UpdateSettingsError {
    #[error("Unknown time zone '{0}'")]
    UnknownTimeZone(String),

    #[error("Currency must be a three-letter code, got '{0}'")]
    InvalidCurrency(String),

    #[error("Language must not be empty")]
    EmptyLanguage,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Default)]
pub struct UpdateSettingsParameters {
    pub language: Option<String>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
}

pub fn update_settings(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: UpdateSettingsParameters,
) -> Result<Settings, UpdateSettingsError> {
    let mut settings = store.settings.clone();

    if let Some(language) = parameters.language {
        let language = language.trim();
        if language.is_empty() {
            return Err(UpdateSettingsError::EmptyLanguage);
        }
        settings.language = language.to_string();
    }
    if let Some(currency) = parameters.currency {
        let currency = currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(UpdateSettingsError::InvalidCurrency(currency));
        }
        settings.currency = currency;
    }
    if let Some(timezone) = parameters.timezone {
        let timezone = timezone.trim();
        if TimeZone::get(timezone).is_err() {
            return Err(UpdateSettingsError::UnknownTimeZone(timezone.to_string()));
        }
        settings.timezone = timezone.to_string();
    }

    store.settings = settings.clone();
    storage.save(store)?;

    events.publish(Event::SettingsUpdated);

    Ok(settings)
}
