//! Tether API service.
//!
//! Serves the agent-facing endpoints: pairing with a pairing key, heartbeats
//! and active-policy retrieval.
//!
//! # Enrollment
//!
//! See [`enrollment`] for the checks a pairing request goes through.
//!
//! # Authentication
//!
//! Enrolled agents authenticate with the credential issued at pairing time.
//! See [`auth`].

pub mod auth;
pub mod config;
pub mod context;
pub mod enrollment;
pub mod server;

pub(crate) mod error;
pub(crate) mod handlers;

pub use error::ApiError;
