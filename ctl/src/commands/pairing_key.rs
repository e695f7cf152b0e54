use std::{fmt, io::Write, str::FromStr};

use anyhow::{Context, bail};
use chrono::TimeDelta;
use clap::Parser;
use tether_db::{
    models::RemainingUses,
    storage::{CreatePairingKeyParams, PairingKeyStore},
};
use tether_pce::PolicyController;

use super::timestamp;

/// How long a new pairing key stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationDelay {
    Never,
    After(TimeDelta),
}

impl FromStr for ExpirationDelay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::Never);
        }

        let secs: u32 = s
            .parse()
            .map_err(|_| format!("expected a number of seconds or \"unlimited\", got {s:?}"))?;
        Ok(Self::After(TimeDelta::seconds(i64::from(secs))))
    }
}

impl fmt::Display for ExpirationDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "unlimited"),
            Self::After(delay) => write!(f, "{}s", delay.num_seconds()),
        }
    }
}

#[derive(Clone, Parser)]
pub struct CreatePairingKeyArgs {
    /// Number of enrollments the key allows, or "unlimited"
    #[clap(short, long)]
    pub remaining_uses: RemainingUses,

    /// Seconds until the key expires, or "unlimited"
    #[clap(short, long)]
    pub expiration_delay: ExpirationDelay,

    /// Switch that paired workloads get bound to, by href or by name
    #[clap(short, long)]
    pub target_switch: Option<String>,
}

pub async fn list_pairing_keys(
    stg: &impl PairingKeyStore,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let keys = PairingKeyStore::list(stg).await?;

    if keys.is_empty() {
        writeln!(out, "No pairing keys")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<32}  {:>9}  {:<20}  {:<20}  TARGET SWITCH",
        "KEY", "USES", "VALID UNTIL", "CREATED"
    )?;
    for key in keys {
        writeln!(
            out,
            "{:<32}  {:>9}  {:<20}  {:<20}  {}",
            key.key,
            key.remaining_uses.to_string(),
            key.valid_until.map(timestamp).unwrap_or_else(|| "never".into()),
            timestamp(key.created_at),
            key.target_switch_ref.as_deref().unwrap_or("-"),
        )?;
    }

    Ok(())
}

pub async fn create_pairing_key(
    stg: &impl PairingKeyStore,
    controller: Option<&dyn PolicyController>,
    CreatePairingKeyArgs {
        remaining_uses,
        expiration_delay,
        target_switch,
    }: CreatePairingKeyArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let target_switch_ref = match target_switch {
        Some(wanted) => {
            let Some(controller) = controller else {
                bail!("a policy controller is required to resolve --target-switch");
            };

            let switch = controller
                .find_switch(&wanted)
                .await
                .context("failed to look up the target switch")?;

            match switch {
                Some(switch) => Some(switch.href),
                None => bail!("Target switch {wanted:?} does not exist in the policy controller"),
            }
        }
        None => None,
    };

    let valid_for = match expiration_delay {
        ExpirationDelay::Never => None,
        ExpirationDelay::After(delay) => Some(delay),
    };

    let key = PairingKeyStore::create(
        stg,
        CreatePairingKeyParams {
            valid_for,
            remaining_uses,
            target_switch_ref,
        },
    )
    .await?;

    writeln!(out, "{}", key.key)?;
    Ok(())
}

pub async fn delete_pairing_key(
    stg: &impl PairingKeyStore,
    key: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    PairingKeyStore::delete(stg, key)
        .await
        .with_context(|| format!("failed to delete pairing key {key}"))?;

    writeln!(out, "Deleted pairing key {key}")?;
    Ok(())
}
