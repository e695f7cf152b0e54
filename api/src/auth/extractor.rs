use std::future::Future;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
};
use tether_common::params::AgentCredentialRequest;
use tether_db::models::DbAgent;

use crate::{
    auth::{AuthError, authenticate_agent},
    context::ApiContext,
    error::ApiError,
};

/// Extractor for routes shaped like `/agent/{id}/...` that REQUIRE the
/// calling agent to be authenticated.
///
/// Consumes the request body, so it must be the last extractor of a handler.
/// An unknown agent is rejected with 404, a missing, unreadable or wrong
/// credential with 403.
///
/// ```rust,ignore
/// pub async fn agent_heartbeat(
///     State(ctx): State<ApiContext>,
///     AuthenticatedAgent(agent): AuthenticatedAgent,
/// ) -> Result<Json<HeartbeatResponse>, ApiError> {
///     // ...
/// }
/// ```
pub struct AuthenticatedAgent(pub DbAgent);

impl FromRequest<ApiContext> for AuthenticatedAgent {
    type Rejection = ApiError;

    fn from_request(
        req: Request,
        state: &ApiContext,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let ctx = state.clone();
        async move {
            let (mut parts, body) = req.into_parts();

            let Path(agent_id) = Path::<String>::from_request_parts(&mut parts, &ctx)
                .await
                .map_err(|_| AuthError::UnknownAgent)?;

            let body = Bytes::from_request(Request::from_parts(parts, body), &ctx)
                .await
                .map_err(|_| AuthError::MissingCredential)?;

            // An unreadable body counts as a missing credential.
            let credential = serde_json::from_slice::<AgentCredentialRequest>(&body)
                .ok()
                .and_then(|req| req.credential);

            let agent = authenticate_agent(&*ctx.db, &agent_id, credential.as_deref()).await?;
            Ok(AuthenticatedAgent(agent))
        }
    }
}
