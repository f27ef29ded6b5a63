//! User preference updates
//!
//! Each preference field maps to one fixed statement; the field name never
//! reaches the SQL text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    events::RelevanceFilter,
    models::{EmailFrequency, Gender},
};

/// Preference fields a user may change on their own profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceField {
    EmailFrequency,
    EmailEventType,
    Gender,
}

/// A validated preference change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceUpdate {
    EmailFrequency(EmailFrequency),
    EmailEventType(RelevanceFilter),
    /// `None` clears the stored gender
    Gender(Option<Gender>),
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid value for {field:?}: {reason}")]
pub struct PreferenceError {
    pub field: PreferenceField,
    pub reason: String,
}

impl PreferenceUpdate {
    /// Validate a raw value for a field
    pub fn parse(field: PreferenceField, value: &str) -> Result<Self, PreferenceError> {
        let invalid = |reason: String| PreferenceError { field, reason };
        match field {
            PreferenceField::EmailFrequency => value
                .parse()
                .map(PreferenceUpdate::EmailFrequency)
                .map_err(invalid),
            PreferenceField::EmailEventType => value
                .parse()
                .map(PreferenceUpdate::EmailEventType)
                .map_err(invalid),
            PreferenceField::Gender => match value.trim() {
                "" => Ok(PreferenceUpdate::Gender(None)),
                code => code
                    .parse()
                    .map(|g| PreferenceUpdate::Gender(Some(g)))
                    .map_err(invalid),
            },
        }
    }

    pub fn field(&self) -> PreferenceField {
        match self {
            PreferenceUpdate::EmailFrequency(_) => PreferenceField::EmailFrequency,
            PreferenceUpdate::EmailEventType(_) => PreferenceField::EmailEventType,
            PreferenceUpdate::Gender(_) => PreferenceField::Gender,
        }
    }

    /// Statement that applies this update; binds `$1` value, `$2` email,
    /// `$3` school id
    pub fn statement(&self) -> &'static str {
        match self.field() {
            PreferenceField::EmailFrequency => {
                "UPDATE users SET email_frequency = $1 WHERE email = $2 AND school_id = $3"
            }
            PreferenceField::EmailEventType => {
                "UPDATE users SET email_event_type = $1 WHERE email = $2 AND school_id = $3"
            }
            PreferenceField::Gender => {
                "UPDATE users SET gender = $1 WHERE email = $2 AND school_id = $3"
            }
        }
    }

    /// Value bound as `$1`
    pub fn bind_value(&self) -> Option<&'static str> {
        match self {
            PreferenceUpdate::EmailFrequency(frequency) => Some(frequency.as_str()),
            PreferenceUpdate::EmailEventType(filter) => Some(filter.as_str()),
            PreferenceUpdate::Gender(gender) => gender.map(Gender::code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_field() {
        assert_eq!(
            PreferenceUpdate::parse(PreferenceField::EmailFrequency, "Weekly").unwrap(),
            PreferenceUpdate::EmailFrequency(EmailFrequency::Weekly)
        );
        assert_eq!(
            PreferenceUpdate::parse(PreferenceField::EmailEventType, "Hosted by Subscribed Clubs")
                .unwrap(),
            PreferenceUpdate::EmailEventType(RelevanceFilter::SubscribedClubs)
        );
        assert_eq!(
            PreferenceUpdate::parse(PreferenceField::Gender, "").unwrap(),
            PreferenceUpdate::Gender(None)
        );
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        let err = PreferenceUpdate::parse(PreferenceField::EmailFrequency, "hourly").unwrap_err();
        assert_eq!(err.field, PreferenceField::EmailFrequency);
        assert!(PreferenceUpdate::parse(PreferenceField::Gender, "X").is_err());
    }

    #[test]
    fn test_statement_is_fixed_per_field() {
        let update = PreferenceUpdate::Gender(Some(Gender::Female));
        assert!(update.statement().starts_with("UPDATE users SET gender = $1"));
        assert_eq!(update.bind_value(), Some("F"));
        assert_eq!(PreferenceUpdate::Gender(None).bind_value(), None);
    }
}
