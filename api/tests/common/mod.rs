#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tether_api::context::ApiContext;
use tether_db::{
    SqliteStorage,
    models::{DbPairingKey, RemainingUses},
    storage::{CreatePairingKeyParams, PairingKeyStore},
};
use tempfile::TempDir;
use tether_pce::{
    NetworkDevice, PceError, PolicyController, Workload, types::NetworkDeviceConfig,
};

pub const SWITCH_HREF: &str = "/orgs/1/network_devices/9";

pub fn workload_href(name: &str) -> String {
    format!("/orgs/1/workloads/{name}")
}

#[derive(Default)]
struct FakeState {
    workloads: Vec<Workload>,
    switches: Vec<NetworkDevice>,
    bindings: Vec<(String, String)>,
    policies: HashMap<String, serde_json::Value>,
    timing_out: bool,
}

/// In-memory policy controller.
#[derive(Default)]
pub struct FakeController {
    state: Mutex<FakeState>,
}

impl FakeController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_workload(&self, name: &str, managed: bool) -> String {
        let href = workload_href(name);
        self.state.lock().unwrap().workloads.push(Workload {
            href: href.clone(),
            name: Some(name.to_string()),
            hostname: Some(format!("{name}.lan")),
            managed: Some(managed),
        });
        href
    }

    pub fn add_switch(&self, href: &str, name: &str) {
        self.state.lock().unwrap().switches.push(NetworkDevice {
            href: href.to_string(),
            supported_endpoint_type: Some("switch_port".into()),
            config: NetworkDeviceConfig {
                name: Some(name.to_string()),
            },
        });
    }

    pub fn add_binding(&self, workload_href: &str, switch_href: &str) {
        self.state
            .lock()
            .unwrap()
            .bindings
            .push((workload_href.to_string(), switch_href.to_string()));
    }

    pub fn set_policies(&self, workload_href: &str, policies: serde_json::Value) {
        self.state
            .lock()
            .unwrap()
            .policies
            .insert(workload_href.to_string(), policies);
    }

    pub fn time_out(&self) {
        self.state.lock().unwrap().timing_out = true;
    }

    pub fn bindings(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().bindings.clone()
    }

    fn check_reachable(&self) -> Result<(), PceError> {
        if self.state.lock().unwrap().timing_out {
            return Err(PceError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyController for FakeController {
    async fn find_unmanaged_workloads_by_name(
        &self,
        name: &str,
    ) -> Result<Vec<Workload>, PceError> {
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .workloads
            .iter()
            .filter(|w| w.is_unmanaged() && w.answers_to(name))
            .cloned()
            .collect())
    }

    async fn find_switch(&self, href_or_name: &str) -> Result<Option<NetworkDevice>, PceError> {
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .switches
            .iter()
            .find(|d| d.href == href_or_name || d.name() == Some(href_or_name))
            .cloned())
    }

    async fn is_workload_bound_to_switch(
        &self,
        workload_href: &str,
        switch_href: &str,
    ) -> Result<bool, PceError> {
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .bindings
            .iter()
            .any(|(w, s)| w == workload_href && s == switch_href))
    }

    async fn bind_workload_to_switch(
        &self,
        workload_href: &str,
        switch_href: &str,
    ) -> Result<(), PceError> {
        self.check_reachable()?;
        self.add_binding(workload_href, switch_href);
        Ok(())
    }

    async fn get_active_policies(
        &self,
        workload_href: &str,
    ) -> Result<serde_json::Value, PceError> {
        self.check_reachable()?;
        self.state
            .lock()
            .unwrap()
            .policies
            .get(workload_href)
            .cloned()
            .ok_or_else(|| PceError::Config(format!("no policies for {workload_href}")))
    }

    async fn product_version(&self) -> Result<String, PceError> {
        self.check_reachable()?;
        Ok("23.2.10".into())
    }
}

pub struct Harness {
    pub db: Arc<SqliteStorage>,
    pub controller: Arc<FakeController>,
    pub ctx: ApiContext,
    dir: Option<TempDir>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_storage(SqliteStorage::in_memory().await.unwrap())
    }

    /// Harness backed by a database file that tests can also reach directly.
    pub async fn on_disk() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteStorage::create(dir.path().join("tether.sqlite3"), 4)
            .await
            .unwrap();

        Self {
            dir: Some(dir),
            ..Self::with_storage(db)
        }
    }

    pub fn with_storage(db: SqliteStorage) -> Self {
        let db = Arc::new(db);
        let controller = FakeController::new();
        let ctx = ApiContext::new(db.clone(), controller.clone());

        Self {
            db,
            controller,
            ctx,
            dir: None,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.dir
            .as_ref()
            .expect("harness is not backed by a file")
            .path()
            .join("tether.sqlite3")
    }

    /// Overwrite an agent's stored heartbeat, in unix seconds.
    pub async fn set_last_heartbeat(&self, id: uuid::Uuid, at: i64) {
        let options = sqlx::sqlite::SqliteConnectOptions::new().filename(self.db_path());
        let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();

        let result = sqlx::query("UPDATE agents SET last_heartbeat = ?1 WHERE id = ?2")
            .bind(at)
            .bind(id.to_string())
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(result.rows_affected(), 1);
        pool.close().await;
    }

    pub async fn pairing_key(
        &self,
        remaining_uses: RemainingUses,
        target_switch_ref: Option<&str>,
    ) -> DbPairingKey {
        PairingKeyStore::create(
            &*self.db,
            CreatePairingKeyParams {
                valid_for: None,
                remaining_uses,
                target_switch_ref: target_switch_ref.map(str::to_string),
            },
        )
        .await
        .unwrap()
    }

    pub async fn remaining_uses(&self, key: &str) -> RemainingUses {
        PairingKeyStore::get(&*self.db, key)
            .await
            .unwrap()
            .unwrap()
            .remaining_uses
    }
}
