use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for pairing a new agent with a pairing key.
///
/// Both fields are optional at the wire level so that a missing field can be
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct PairAgentRequest {
    /// Name of the agent. Must match exactly one unmanaged workload in the
    /// policy controller by name or hostname.
    pub agent_name: Option<String>,
    /// The pairing key issued by an administrator.
    pub pairing_key: Option<String>,
}

/// Request body for every call an enrolled agent makes.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct AgentCredentialRequest {
    /// The credential returned when the agent was paired.
    #[serde(alias = "authentication_key")]
    pub credential: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_accepts_legacy_field_name() {
        let req: AgentCredentialRequest =
            serde_json::from_str(r#"{"authentication_key": "abc"}"#).unwrap();
        assert_eq!(req.credential.as_deref(), Some("abc"));
    }

    #[test]
    fn pair_request_tolerates_missing_fields() {
        let req: PairAgentRequest = serde_json::from_str(r#"{"agent_name": "web01"}"#).unwrap();
        assert_eq!(req.agent_name.as_deref(), Some("web01"));
        assert!(req.pairing_key.is_none());
    }
}
