use std::io::Write;

use anyhow::Context;
use clap::Parser;
use tether_db::storage::AgentStore;
use uuid::Uuid;

use super::timestamp;

#[derive(Clone, Parser)]
pub struct ListAgentsArgs {
    /// Print each agent's credential instead of masking it
    #[clap(long, default_value_t = false)]
    pub show_credentials: bool,
}

pub async fn list_agents(
    stg: &impl AgentStore,
    ListAgentsArgs { show_credentials }: ListAgentsArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let agents = AgentStore::list(stg).await?;

    if agents.is_empty() {
        writeln!(out, "No agents")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<36}  {:<24}  {:<20}  {:<20}  {:<40}  CREDENTIAL",
        "ID", "NAME", "LAST HEARTBEAT", "CREATED", "WORKLOAD"
    )?;
    for agent in agents {
        let credential = if show_credentials {
            agent.credential.as_str()
        } else {
            "********"
        };

        writeln!(
            out,
            "{:<36}  {:<24}  {:<20}  {:<20}  {:<40}  {}",
            agent.id,
            agent.name,
            timestamp(agent.last_heartbeat),
            timestamp(agent.created_at),
            agent.workload_ref,
            credential,
        )?;
    }

    Ok(())
}

pub async fn delete_agent(
    stg: &impl AgentStore,
    id: Uuid,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    AgentStore::delete(stg, id)
        .await
        .with_context(|| format!("failed to delete agent {id}"))?;

    writeln!(out, "Deleted agent {id}")?;
    Ok(())
}

pub async fn delete_all_agents(stg: &impl AgentStore, out: &mut impl Write) -> anyhow::Result<()> {
    let count = AgentStore::delete_all(stg).await?;

    writeln!(out, "Deleted {count} agent(s)")?;
    Ok(())
}
