//! Agent enrollment: trading a pairing key for an agent identity.
//!
//! Every check runs before anything is written. The only durable write is
//! the final [`EnrollmentStore::redeem_and_register`] call, which re-checks
//! the key inside its own transaction, so a key raced to exhaustion or expiry
//! by another enrollment still fails cleanly here.

use chrono::Utc;
use tether_common::params::PairAgentRequest;
use tether_db::{
    models::{DbAgent, KeyRejection},
    storage::{AgentStore, EnrollmentStore, PairingKeyStore, StoreError},
};
use tether_pce::{PceError, PolicyController, Workload};
use thiserror::Error;
use tracing::{Span, debug, info, instrument};

use crate::context::ApiContext;

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("Agent name not provided")]
    MissingName,

    #[error("Pairing key not provided")]
    MissingKey,

    #[error("Agent name already exists")]
    NameTaken,

    #[error("Pairing key does not exist")]
    UnknownKey,

    #[error("Pairing key has expired")]
    KeyExpired,

    #[error("Pairing key has no uses left")]
    KeyExhausted,

    #[error("Agent name not found in the policy controller or already managed")]
    WorkloadNotFound,

    #[error("Agent name is ambiguous in the policy controller")]
    AmbiguousWorkload,

    #[error("Target switch does not exist")]
    SwitchNotFound,

    #[error("Workload is already bound to the target switch")]
    AlreadyBound,

    #[error(transparent)]
    Controller(#[from] PceError),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<KeyRejection> for EnrollmentError {
    fn from(value: KeyRejection) -> Self {
        match value {
            KeyRejection::Expired => Self::KeyExpired,
            KeyRejection::Exhausted => Self::KeyExhausted,
        }
    }
}

impl From<StoreError> for EnrollmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NameTaken(_) => Self::NameTaken,
            StoreError::KeyExpired => Self::KeyExpired,
            StoreError::KeyExhausted => Self::KeyExhausted,
            // only reachable when the key vanished mid-enrollment
            StoreError::NotFound => Self::UnknownKey,
            other => Self::Storage(other),
        }
    }
}

/// Present and not blank. The value itself is kept as sent.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Enroll a new agent and return it, credential included.
#[instrument(skip_all, fields(agent_name = tracing::field::Empty))]
pub async fn enroll(
    ctx: &ApiContext,
    request: PairAgentRequest,
) -> Result<DbAgent, EnrollmentError> {
    let agent_name = required(request.agent_name).ok_or(EnrollmentError::MissingName)?;
    let pairing_key = required(request.pairing_key).ok_or(EnrollmentError::MissingKey)?;
    Span::current().record("agent_name", agent_name.as_str());

    if AgentStore::name_exists(&*ctx.db, &agent_name).await? {
        return Err(EnrollmentError::NameTaken);
    }

    let key = PairingKeyStore::get(&*ctx.db, &pairing_key)
        .await?
        .ok_or(EnrollmentError::UnknownKey)?;
    key.check_redeemable(Utc::now())?;

    let workload = resolve_workload(ctx.controller.as_ref(), &agent_name).await?;
    debug!(workload = %workload.href, "Workload resolved");

    if let Some(switch_ref) = &key.target_switch_ref {
        bind_to_switch(ctx.controller.as_ref(), &workload.href, switch_ref).await?;
    }

    let agent = ctx
        .db
        .redeem_and_register(&key.key, &agent_name, &workload.href)
        .await?;

    info!(agent_id = %agent.id, workload = %agent.workload_ref, "Agent enrolled");
    Ok(agent)
}

async fn resolve_workload(
    controller: &dyn PolicyController,
    agent_name: &str,
) -> Result<Workload, EnrollmentError> {
    let mut workloads = controller.find_unmanaged_workloads_by_name(agent_name).await?;

    match workloads.len() {
        0 => Err(EnrollmentError::WorkloadNotFound),
        1 => Ok(workloads.remove(0)),
        _ => Err(EnrollmentError::AmbiguousWorkload),
    }
}

async fn bind_to_switch(
    controller: &dyn PolicyController,
    workload_href: &str,
    switch_ref: &str,
) -> Result<(), EnrollmentError> {
    let switch = controller
        .find_switch(switch_ref)
        .await?
        .ok_or(EnrollmentError::SwitchNotFound)?;

    if controller
        .is_workload_bound_to_switch(workload_href, &switch.href)
        .await?
    {
        return Err(EnrollmentError::AlreadyBound);
    }

    controller
        .bind_workload_to_switch(workload_href, &switch.href)
        .await?;
    debug!(switch = %switch.href, "Workload bound to target switch");

    Ok(())
}
