//! Wire types shared by the Tether API server, the admin CLI and tests.

pub mod params;
pub mod views;
