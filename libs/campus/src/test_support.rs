//! Fixtures shared by tests across the workspace

use crate::{
    events::RelevanceFilter,
    models::{EmailFrequency, User, UserContext},
};

/// An active, verified student with no preferences set
pub fn user(email: &str, school_id: i64) -> User {
    User {
        email: email.to_string(),
        school_id,
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        is_active: true,
        is_banned: false,
        is_faculty: false,
        can_delete_faculty: false,
        email_verified: true,
        email_frequency: EmailFrequency::Never,
        email_event_type: RelevanceFilter::Suggested,
        gender: None,
    }
}

pub fn faculty(email: &str, school_id: i64) -> User {
    User {
        is_faculty: true,
        ..user(email, school_id)
    }
}

pub fn context(user: &User) -> UserContext {
    UserContext::from_user(user, Vec::new(), Vec::new())
}
