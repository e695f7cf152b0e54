//! Output views for the various functions within Tether.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod agent;
pub use agent::*;

/// An error response for an API endpoint. This is used to return errors to the
/// client in a consistent format.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// An error code that can be used to identify the type of error that
    /// occurred, e.g. `BadRequest` or `Forbidden`.
    pub code: Option<String>,

    /// A human-readable message describing the error that occurred.
    pub message: String,
}
