//! Repositories for account data the core store does not cover

mod user;

pub use user::{NewAccount, UserRepository};
