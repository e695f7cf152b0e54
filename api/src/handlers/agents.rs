use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tether_common::{
    params::{AgentCredentialRequest, PairAgentRequest},
    views::{ApiErrorResponse, HeartbeatResponse, PairAgentResponse},
};
use tether_db::storage::AgentStore;
use tether_pce::PolicyController;
use tracing::instrument;

use crate::{
    auth::AuthenticatedAgent, context::ApiContext, enrollment, error::ApiError,
};

/// POST /agent/pair
///
/// Exchange a pairing key for an agent id and credential.
#[utoipa::path(
    post,
    path = "/agent/pair",
    tags = ["agents"],
    request_body = PairAgentRequest,
    responses(
        (status = 200, description = "Agent paired", body = PairAgentResponse),
        (status = 400, description = "Missing field, or pairing key or workload rejected", body = ApiErrorResponse),
        (status = 409, description = "Agent name already exists", body = ApiErrorResponse),
        (status = 502, description = "Policy controller failed", body = ApiErrorResponse),
        (status = 503, description = "Policy controller timed out", body = ApiErrorResponse),
    )
)]
#[instrument(skip_all)]
pub async fn pair_agent(
    State(ctx): State<ApiContext>,
    payload: Result<Json<PairAgentRequest>, JsonRejection>,
) -> Result<Json<PairAgentResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let agent = enrollment::enroll(&ctx, request).await?;

    Ok(Json(PairAgentResponse {
        agent_id: agent.id.to_string(),
        credential: agent.credential,
    }))
}

/// POST /agent/{id}/heartbeat
#[utoipa::path(
    post,
    path = "/agent/{id}/heartbeat",
    tags = ["agents"],
    params(("id" = String, Path, description = "Agent id")),
    request_body = AgentCredentialRequest,
    responses(
        (status = 200, description = "Heartbeat recorded", body = HeartbeatResponse),
        (status = 403, description = "Missing or invalid credential", body = ApiErrorResponse),
        (status = 404, description = "Unknown agent", body = ApiErrorResponse),
    )
)]
#[instrument(skip_all)]
pub async fn agent_heartbeat(
    State(ctx): State<ApiContext>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    ctx.db.heartbeat(agent.id).await?;
    Ok(Json(HeartbeatResponse::success()))
}

/// POST /agent/{id}/active_policies
///
/// Relay the active policies of the agent's workload from the policy
/// controller, unmodified.
#[utoipa::path(
    post,
    path = "/agent/{id}/active_policies",
    tags = ["agents"],
    params(("id" = String, Path, description = "Agent id")),
    request_body = AgentCredentialRequest,
    responses(
        (status = 200, description = "Active policies of the agent's workload", body = serde_json::Value),
        (status = 403, description = "Missing or invalid credential", body = ApiErrorResponse),
        (status = 404, description = "Unknown agent", body = ApiErrorResponse),
        (status = 502, description = "Policy controller failed", body = ApiErrorResponse),
        (status = 503, description = "Policy controller timed out", body = ApiErrorResponse),
    )
)]
#[instrument(skip_all)]
pub async fn agent_active_policies(
    State(ctx): State<ApiContext>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
) -> Result<Json<serde_json::Value>, ApiError> {
    let policies = ctx.controller.get_active_policies(&agent.workload_ref).await?;
    Ok(Json(policies))
}
