//! Domain models

pub mod event;
pub mod session;
pub mod user;

pub use event::{EventView, HostClub, RsvpState, SubscriptionState};
pub use session::Session;
pub use user::{EmailFrequency, Gender, User, UserContext, Viewer};
