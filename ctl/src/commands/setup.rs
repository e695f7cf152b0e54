use std::{io::Write, path::Path};

use anyhow::Context;
use tether_db::{
    SqliteStorage,
    storage::{AgentStore, PairingKeyStore, Storage},
};
use tether_pce::{PceConfig, PolicyController};

pub async fn db_setup(path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    SqliteStorage::create(path, 1)
        .await
        .with_context(|| format!("failed to create database {}", path.display()))?;

    writeln!(out, "Database created at {}", path.display())?;
    Ok(())
}

pub async fn status(
    stg: &impl Storage,
    pce: &PceConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    stg.ping().await.context("database is not responding")?;

    let keys = PairingKeyStore::list(stg).await?;
    let agents = AgentStore::list(stg).await?;

    writeln!(out, "Database:          ok")?;
    writeln!(out, "Pairing keys:      {}", keys.len())?;
    writeln!(out, "Agents:            {}", agents.len())?;

    if !pce.is_configured() {
        writeln!(out, "Policy controller: not configured")?;
        return Ok(());
    }

    let controller = pce.client()?;
    controller_status(&controller, out).await
}

pub(crate) async fn controller_status(
    controller: &dyn PolicyController,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let version = controller
        .product_version()
        .await
        .context("policy controller is unreachable")?;

    writeln!(out, "Policy controller: ok (version {version})")?;
    Ok(())
}
