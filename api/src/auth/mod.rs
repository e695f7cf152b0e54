//! Authentication for calls made by enrolled agents.
//!
//! Agents identify themselves by the id in the request path and prove it
//! with the credential they received at pairing time, sent in the JSON body.
//! Handlers normally use the [`AuthenticatedAgent`] extractor; the
//! underlying check is [`authenticate_agent`].

use subtle::ConstantTimeEq;
use tether_db::{
    models::DbAgent,
    storage::{AgentStore, StoreError},
};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

mod extractor;

pub use extractor::AuthenticatedAgent;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Agent not found")]
    UnknownAgent,

    #[error("Agent credential not provided")]
    MissingCredential,

    #[error("Invalid agent credential")]
    InvalidCredential,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Resolve `agent_id` and check `credential` against the stored one.
///
/// A malformed id is reported the same way as an unknown one.
#[instrument(skip(store, credential))]
pub async fn authenticate_agent<S>(
    store: &S,
    agent_id: &str,
    credential: Option<&str>,
) -> Result<DbAgent, AuthError>
where
    S: AgentStore + ?Sized,
{
    let id = Uuid::parse_str(agent_id).map_err(|_| AuthError::UnknownAgent)?;

    let agent = AgentStore::get(store, id)
        .await?
        .ok_or(AuthError::UnknownAgent)?;

    let credential = credential.ok_or(AuthError::MissingCredential)?;

    if !bool::from(credential.as_bytes().ct_eq(agent.credential.as_bytes())) {
        debug!("Credential mismatch");
        return Err(AuthError::InvalidCredential);
    }

    Ok(agent)
}

#[cfg(test)]
mod tests {
    use tether_db::SqliteStorage;

    use super::*;

    async fn store_with_agent() -> (SqliteStorage, DbAgent) {
        let db = SqliteStorage::in_memory().await.unwrap();
        let agent = AgentStore::create(&db, "web01", "/orgs/1/workloads/a")
            .await
            .unwrap();
        (db, agent)
    }

    #[tokio::test]
    async fn test_valid_credential() {
        let (db, agent) = store_with_agent().await;

        let authed = authenticate_agent(
            &db,
            &agent.id.to_string(),
            Some(agent.credential.as_str()),
        )
        .await
        .unwrap();
        assert_eq!(authed.id, agent.id);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let (db, agent) = store_with_agent().await;

        let err = authenticate_agent(
            &db,
            &Uuid::new_v4().to_string(),
            Some(agent.credential.as_str()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::UnknownAgent));

        let err = authenticate_agent(&db, "not-a-uuid", Some(agent.credential.as_str()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownAgent));
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let (db, agent) = store_with_agent().await;

        let err = authenticate_agent(&db, &agent.id.to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }

    #[tokio::test]
    async fn test_wrong_credential() {
        let (db, agent) = store_with_agent().await;

        let mut wrong = agent.credential.clone();
        wrong.pop();
        wrong.push('!');

        for candidate in [wrong.as_str(), "", &agent.credential[..10]] {
            let err = authenticate_agent(&db, &agent.id.to_string(), Some(candidate))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredential));
        }
    }
}
