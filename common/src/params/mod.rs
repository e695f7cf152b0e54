//! Input parameters for the various functions within Tether.

mod agent;
pub use agent::*;
