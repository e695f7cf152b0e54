use std::path::PathBuf;

use async_trait::async_trait;
use chrono::TimeDelta;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DbAgent, DbPairingKey, KeyRejection, RemainingUses};

pub mod sqlite;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("An agent named {0:?} already exists")]
    NameTaken(String),

    #[error("Pairing key has expired")]
    KeyExpired,

    #[error("Pairing key has no uses left")]
    KeyExhausted,

    #[error("Could not generate a unique identifier after {0} attempts")]
    IdentifierCollision(usize),

    #[error("Database {} has not been initialized", .0.display())]
    NotInitialized(PathBuf),

    #[error("Database {} already exists", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Query Error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl From<KeyRejection> for StoreError {
    fn from(value: KeyRejection) -> Self {
        match value {
            KeyRejection::Expired => Self::KeyExpired,
            KeyRejection::Exhausted => Self::KeyExhausted,
        }
    }
}

#[async_trait]
pub trait Storage: PairingKeyStore + AgentStore + EnrollmentStore + Send + Sync + 'static {
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct CreatePairingKeyParams {
    /// How long the key stays valid from now. `None` means forever.
    pub valid_for: Option<TimeDelta>,
    pub remaining_uses: RemainingUses,
    pub target_switch_ref: Option<String>,
}

#[async_trait]
pub trait PairingKeyStore: Send + Sync {
    /// Issue a new key. Fails with [`StoreError::InvalidArgument`] for a
    /// finite key with zero uses or a negative validity period.
    async fn create(&self, params: CreatePairingKeyParams) -> Result<DbPairingKey, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<DbPairingKey>, StoreError>;

    /// All keys, oldest first.
    async fn list(&self) -> Result<Vec<DbPairingKey>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Consume one use of a key in a single statement. Unlimited keys are left
    /// untouched. A finite key already at zero yields
    /// [`StoreError::KeyExhausted`].
    async fn decrement_use(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Register an agent. Name uniqueness is enforced by the database, so two
    /// racing calls with the same name cannot both succeed.
    async fn create(&self, name: &str, workload_ref: &str) -> Result<DbAgent, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<DbAgent>, StoreError>;

    async fn name_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// All agents, oldest first.
    async fn list(&self) -> Result<Vec<DbAgent>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Returns the number of agents removed.
    async fn delete_all(&self) -> Result<u64, StoreError>;

    async fn heartbeat(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Create an agent and charge one use of `key` as one transaction.
    ///
    /// The key is re-validated inside the transaction, so a key that expired,
    /// ran out of uses or was deleted since the caller last looked at it makes
    /// the whole call fail with nothing written:
    ///
    /// - [`StoreError::NotFound`] if the key no longer exists
    /// - [`StoreError::KeyExpired`] / [`StoreError::KeyExhausted`]
    /// - [`StoreError::NameTaken`] if the name was registered meanwhile
    async fn redeem_and_register(
        &self,
        key: &str,
        name: &str,
        workload_ref: &str,
    ) -> Result<DbAgent, StoreError>;
}
