//! Domain core for the campus clubs backend
//!
//! This crate holds everything the route handlers and the digest scheduler
//! share: the domain models, the store traits with their PostgreSQL and
//! in-memory implementations, session validation, the access guard, the
//! event visibility engine and the mail collaborator.

pub mod error;
pub mod events;
pub mod guard;
pub mod mail;
pub mod models;
pub mod preferences;
pub mod reports;
pub mod session;
pub mod settings;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod test_support;

pub use error::{StoreError, StoreResult};
pub use events::{EventQuery, EventQueryError, RelevanceFilter, list_events};
pub use guard::{Capability, authorize};
pub use models::{EventView, User, UserContext, Viewer};
pub use session::{SessionContext, SessionValidator};
pub use store::{EventStore, MembershipStore, ReportStore, SessionStore, Store, UserStore};
