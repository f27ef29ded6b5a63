//! Session handling: the request-scoped context, token generation and the
//! validator that turns a context into a [`Viewer`](crate::models::Viewer).

mod context;
pub mod cookie;
mod token;
mod validator;

pub use context::SessionContext;
pub use token::{generate_token, hash_token};
pub use validator::{DEFAULT_IDLE_TIMEOUT_MINUTES, Outcome, SessionValidator};
