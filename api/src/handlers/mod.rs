use axum::extract::State;
use tether_db::storage::Storage;

use crate::{context::ApiContext, error::ApiError};

pub mod agents;

#[utoipa::path(
    get,
    path = "/health",
    tags = ["health"],
    responses((status = 200, description = "Service and database are reachable", body = String))
)]
pub async fn health_check(State(ctx): State<ApiContext>) -> Result<&'static str, ApiError> {
    ctx.db.ping().await?;
    Ok("Healthy")
}
