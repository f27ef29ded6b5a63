//! Access control decisions

use crate::models::{UserContext, Viewer};

/// Something a request may require of its viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<'a> {
    IsFaculty,
    /// Faculty who may also remove other faculty
    CanDeleteFaculty,
    /// Admin of the club; faculty administer every club
    IsClubAdmin(i64),
    /// The viewer is the user with this email
    IsSelf(&'a str),
}

/// Decide whether the viewer holds the capability. Anonymous viewers hold
/// none.
pub fn authorize(viewer: &Viewer, required: Capability<'_>) -> bool {
    viewer
        .user()
        .is_some_and(|user| user_has(user, required))
}

fn user_has(user: &UserContext, required: Capability<'_>) -> bool {
    match required {
        Capability::IsFaculty => user.is_faculty,
        Capability::CanDeleteFaculty => user.is_faculty && user.can_delete_faculty,
        Capability::IsClubAdmin(club_id) => {
            user.is_faculty || user.club_admin_ids.contains(&club_id)
        }
        Capability::IsSelf(email) => user.email.eq_ignore_ascii_case(email),
    }
}
