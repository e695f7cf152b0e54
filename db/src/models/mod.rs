pub mod agent;
pub mod pairing_key;

pub use agent::*;
pub use pairing_key::*;
