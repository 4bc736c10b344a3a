//! Orchestration services.

mod connection;

pub use connection::{AuthorizationRedirect, CallbackOutcome, ConnectionService};
