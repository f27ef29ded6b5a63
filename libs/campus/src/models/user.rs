//! User model, the authenticated user context and the request viewer

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::events::RelevanceFilter;

/// Gender as stored on users and as an event restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    /// Single-letter code used in storage
    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" | "m" => Ok(Gender::Male),
            "F" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender code '{other}'")),
        }
    }
}

/// How often a user receives the event digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailFrequency {
    Never,
    Daily,
    Weekly,
}

impl EmailFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            EmailFrequency::Never => "Never",
            EmailFrequency::Daily => "Daily",
            EmailFrequency::Weekly => "Weekly",
        }
    }
}

impl fmt::Display for EmailFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(EmailFrequency::Never),
            "daily" => Ok(EmailFrequency::Daily),
            "weekly" => Ok(EmailFrequency::Weekly),
            other => Err(format!("unknown email frequency '{other}'")),
        }
    }
}

/// User entity (the subset the core needs)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub email: String,
    pub school_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_banned: bool,
    pub is_faculty: bool,
    pub can_delete_faculty: bool,
    pub email_verified: bool,
    pub email_frequency: EmailFrequency,
    pub email_event_type: RelevanceFilter,
    pub gender: Option<Gender>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// What a validated session knows about the requesting user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    pub email: String,
    pub name: String,
    pub school_id: i64,
    pub gender: Option<Gender>,
    pub email_verified: bool,
    pub is_faculty: bool,
    pub can_delete_faculty: bool,
    pub club_admin_ids: Vec<i64>,
    pub tags: Vec<String>,
}

impl UserContext {
    /// Assemble a context from a user row and its relationship sets
    pub fn from_user(user: &User, club_admin_ids: Vec<i64>, tags: Vec<String>) -> Self {
        Self {
            email: user.email.clone(),
            name: user.full_name(),
            school_id: user.school_id,
            gender: user.gender,
            email_verified: user.email_verified,
            is_faculty: user.is_faculty,
            can_delete_faculty: user.can_delete_faculty,
            club_admin_ids,
            tags,
        }
    }
}

/// The requester of an operation: either a validated user or nobody
#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Authenticated(UserContext),
    Anonymous,
}

impl Viewer {
    pub fn user(&self) -> Option<&UserContext> {
        match self {
            Viewer::Authenticated(user) => Some(user),
            Viewer::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::Authenticated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_codes() {
        assert_eq!("M".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("f".parse::<Gender>().unwrap(), Gender::Female);
        assert!("X".parse::<Gender>().is_err());
        assert_eq!(Gender::Female.code(), "F");
        assert_eq!(serde_json::to_string(&Gender::Male).unwrap(), "\"M\"");
    }

    #[test]
    fn test_email_frequency_parse() {
        assert_eq!(
            "weekly".parse::<EmailFrequency>().unwrap(),
            EmailFrequency::Weekly
        );
        assert_eq!("Never".parse::<EmailFrequency>().unwrap(), EmailFrequency::Never);
        assert!("hourly".parse::<EmailFrequency>().is_err());
    }
}
