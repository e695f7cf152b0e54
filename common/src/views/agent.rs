use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for a successful agent pairing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PairAgentResponse {
    /// Agent UUID
    pub agent_id: String,
    /// Secret credential for subsequent calls. Only returned here, store it
    /// securely!
    pub credential: String,
}

/// Response body for a successful heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HeartbeatResponse {
    pub action: String,
    pub status: String,
}

impl HeartbeatResponse {
    pub fn success() -> Self {
        Self {
            action: "agent_heartbeat".into(),
            status: "success".into(),
        }
    }
}
