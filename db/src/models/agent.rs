use std::fmt;

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

/// Length of a generated agent credential.
pub const CREDENTIAL_LENGTH: usize = 64;

#[derive(Clone, PartialEq, Eq)]
pub struct DbAgent {
    pub id: Uuid,

    /// Agent name, unique across all agents (typically the workload hostname)
    pub name: String,

    /// Href of the policy-controller workload this agent represents
    pub workload_ref: String,

    /// Secret the agent presents on every call after pairing
    pub credential: String,

    /// Last time the agent sent a heartbeat (creation time until then)
    pub last_heartbeat: DateTime<Utc>,

    /// When this agent was created
    pub created_at: DateTime<Utc>,
}

impl DbAgent {
    /// Build a new agent record with a fresh id and credential.
    pub fn new(name: &str, workload_ref: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            workload_ref: workload_ref.to_string(),
            credential: generate_credential(),
            last_heartbeat: now,
            created_at: now,
        }
    }
}

// Keeps the credential out of logs and panics.
impl fmt::Debug for DbAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbAgent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("workload_ref", &self.workload_ref)
            .field("credential", &"<redacted>")
            .field("last_heartbeat", &self.last_heartbeat)
            .field("created_at", &self.created_at)
            .finish()
    }
}

pub fn generate_credential() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(CREDENTIAL_LENGTH)
        .map(char::from)
        .collect()
}
