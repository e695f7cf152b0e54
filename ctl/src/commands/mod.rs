use chrono::{DateTime, SecondsFormat, Utc};

mod agent;
mod pairing_key;
mod setup;

pub use agent::*;
pub use pairing_key::*;
pub use setup::*;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
