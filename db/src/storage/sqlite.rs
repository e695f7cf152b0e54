use std::{path::Path, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use sqlx::{
    Row, SqliteConnection, SqlitePool,
    migrate::Migrator,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
    },
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    models::{DbAgent, DbPairingKey, RemainingUses, generate_pairing_key},
    storage::{
        AgentStore, CreatePairingKeyParams, EnrollmentStore, PairingKeyStore, Storage, StoreError,
    },
};

static MIGRATOR: Migrator = sqlx::migrate!();

/// Attempts at generating a fresh random identifier before giving up.
const MAX_ID_ATTEMPTS: usize = 5;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PAIRING_KEY_COLUMNS: &str = "key, target_switch_ref, valid_until, remaining_uses, created_at";
const AGENT_COLUMNS: &str = "id, name, workload_ref, credential, last_heartbeat, created_at";

#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Initialize a brand new database file.
    ///
    /// Fails with [`StoreError::AlreadyInitialized`] if the file exists, so an
    /// explicit setup never silently reuses an old database.
    pub async fn create(path: impl AsRef<Path>, max_connections: u32) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StoreError::AlreadyInitialized(path.to_path_buf()));
        }

        info!(path = %path.display(), "Creating database");
        Self::connect(path, true, max_connections).await
    }

    /// Open an existing database file, applying any pending migrations.
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::NotInitialized(path.to_path_buf()));
        }

        debug!(path = %path.display(), "Opening database");
        Self::connect(path, false, max_connections).await
    }

    pub async fn open_or_create(
        path: impl AsRef<Path>,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path, max_connections).await
        } else {
            Self::create(path, max_connections).await
        }
    }

    /// An ephemeral database that lives as long as this storage does.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Every connection to :memory: is its own database, so pin exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn connect(
        path: &Path,
        create_if_missing: bool,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }
}

/// Stored timestamps have second resolution; truncating up front keeps the
/// value handed back by `create` equal to what `get` later reads.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {secs}")))
}

fn is_unique_violation(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            (db_err.is_unique_violation() || message.starts_with("UNIQUE constraint failed"))
                && message.contains(column)
        }
        _ => false,
    }
}

fn pairing_key_from_row(row: &SqliteRow) -> Result<DbPairingKey, StoreError> {
    Ok(DbPairingKey {
        key: row.try_get("key")?,
        target_switch_ref: row.try_get("target_switch_ref")?,
        valid_until: row
            .try_get::<Option<i64>, _>("valid_until")?
            .map(timestamp)
            .transpose()?,
        remaining_uses: RemainingUses::from_column(row.try_get("remaining_uses")?),
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}

fn agent_from_row(row: &SqliteRow) -> Result<DbAgent, StoreError> {
    let id: String = row.try_get("id")?;

    Ok(DbAgent {
        id: Uuid::parse_str(&id)
            .map_err(|e| StoreError::Corrupt(format!("invalid agent id {id:?}: {e}")))?,
        name: row.try_get("name")?,
        workload_ref: row.try_get("workload_ref")?,
        credential: row.try_get("credential")?,
        last_heartbeat: timestamp(row.try_get("last_heartbeat")?)?,
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}

async fn fetch_pairing_key(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<DbPairingKey>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {PAIRING_KEY_COLUMNS} FROM pairing_keys WHERE key = ?1"
    ))
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(pairing_key_from_row).transpose()
}

/// Insert a new agent, regenerating its id on the (unlikely) event of a
/// primary key collision.
async fn insert_agent(
    conn: &mut SqliteConnection,
    name: &str,
    workload_ref: &str,
    now: DateTime<Utc>,
) -> Result<DbAgent, StoreError> {
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let agent = DbAgent::new(name, workload_ref, now);

        let result = sqlx::query(&format!(
            "INSERT INTO agents ({AGENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ))
        .bind(agent.id.to_string())
        .bind(&agent.name)
        .bind(&agent.workload_ref)
        .bind(&agent.credential)
        .bind(agent.last_heartbeat.timestamp())
        .bind(agent.created_at.timestamp())
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => return Ok(agent),
            Err(e) if is_unique_violation(&e, "agents.name") => {
                return Err(StoreError::NameTaken(name.to_string()));
            }
            Err(e) if is_unique_violation(&e, "agents.id") => {
                warn!(attempt, "Agent id collision, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StoreError::IdentifierCollision(MAX_ID_ATTEMPTS))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PairingKeyStore for SqliteStorage {
    #[instrument(skip(self))]
    async fn create(&self, params: CreatePairingKeyParams) -> Result<DbPairingKey, StoreError> {
        if params.remaining_uses.is_exhausted() {
            return Err(StoreError::InvalidArgument(
                "remaining uses cannot be 0".into(),
            ));
        }

        let created_at = now();
        let valid_until = match params.valid_for {
            Some(valid_for) if valid_for < TimeDelta::zero() => {
                return Err(StoreError::InvalidArgument(
                    "validity period cannot be negative".into(),
                ));
            }
            Some(valid_for) => Some(created_at.checked_add_signed(valid_for).ok_or_else(|| {
                StoreError::InvalidArgument("validity period is too large".into())
            })?),
            None => None,
        };

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let key = DbPairingKey {
                key: generate_pairing_key(),
                target_switch_ref: params.target_switch_ref.clone(),
                valid_until,
                remaining_uses: params.remaining_uses,
                created_at,
            };

            let result = sqlx::query(&format!(
                "INSERT INTO pairing_keys ({PAIRING_KEY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"
            ))
            .bind(&key.key)
            .bind(key.target_switch_ref.as_deref())
            .bind(key.valid_until.map(|t| t.timestamp()))
            .bind(key.remaining_uses.to_column())
            .bind(key.created_at.timestamp())
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => {
                    info!(
                        remaining_uses = %key.remaining_uses,
                        valid_until = ?key.valid_until,
                        target_switch_ref = ?key.target_switch_ref,
                        "Pairing key created"
                    );
                    return Ok(key);
                }
                Err(e) if is_unique_violation(&e, "pairing_keys.key") => {
                    warn!(attempt, "Pairing key collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::IdentifierCollision(MAX_ID_ATTEMPTS))
    }

    #[instrument(skip_all)]
    async fn get(&self, key: &str) -> Result<Option<DbPairingKey>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_pairing_key(&mut conn, key).await
    }

    async fn list(&self) -> Result<Vec<DbPairingKey>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAIRING_KEY_COLUMNS} FROM pairing_keys ORDER BY created_at, key"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pairing_key_from_row).collect()
    }

    #[instrument(skip_all)]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM pairing_keys WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        info!("Pairing key deleted");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn decrement_use(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;

        // NULL - 1 stays NULL, so unlimited keys match but are not changed.
        let result = sqlx::query(
            "UPDATE pairing_keys SET remaining_uses = remaining_uses - 1
             WHERE key = ?1 AND (remaining_uses IS NULL OR remaining_uses > 0)",
        )
        .bind(key)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return match fetch_pairing_key(&mut conn, key).await? {
                None => Err(StoreError::NotFound),
                Some(_) => Err(StoreError::KeyExhausted),
            };
        }

        Ok(())
    }
}

#[async_trait]
impl AgentStore for SqliteStorage {
    #[instrument(skip(self))]
    async fn create(&self, name: &str, workload_ref: &str) -> Result<DbAgent, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let agent = insert_agent(&mut conn, name, workload_ref, now()).await?;

        info!(agent_id = %agent.id, "Agent created");
        Ok(agent)
    }

    async fn get(&self, id: Uuid) -> Result<Option<DbAgent>, StoreError> {
        let row = sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(agent_from_row).transpose()
    }

    async fn name_exists(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agents WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn list(&self) -> Result<Vec<DbAgent>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(agent_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        info!("Agent deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM agents").execute(&self.pool).await?;

        info!(count = result.rows_affected(), "All agents deleted");
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn heartbeat(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE agents SET last_heartbeat = ?1 WHERE id = ?2")
            .bind(now().timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for SqliteStorage {
    #[instrument(skip(self, key))]
    async fn redeem_and_register(
        &self,
        key: &str,
        name: &str,
        workload_ref: &str,
    ) -> Result<DbAgent, StoreError> {
        let now = now();

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        let agent = insert_agent(&mut tx, name, workload_ref, now).await?;

        let result = sqlx::query(
            "UPDATE pairing_keys SET remaining_uses = remaining_uses - 1
             WHERE key = ?1
               AND (remaining_uses IS NULL OR remaining_uses > 0)
               AND (valid_until IS NULL OR valid_until > ?2)",
        )
        .bind(key)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current = fetch_pairing_key(&mut tx, key).await?;
            debug!("Pairing key no longer redeemable, rolling back");

            return Err(match current {
                None => StoreError::NotFound,
                Some(current) => match current.check_redeemable(now) {
                    Err(rejection) => rejection.into(),
                    Ok(()) => StoreError::Corrupt(
                        "pairing key is redeemable but could not be charged".into(),
                    ),
                },
            });
        }

        tx.commit().await?;

        info!(agent_id = %agent.id, "Agent registered with pairing key");
        Ok(agent)
    }
}
