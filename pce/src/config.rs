use std::time::Duration;

use clap::Args;

use crate::{PceClient, PceError};

/// Connection settings for the policy controller.
///
/// Every field is optional on the command line so commands that never talk to
/// the controller keep working without it. [`PceConfig::settings`] is where a
/// missing value becomes an error.
#[derive(Clone, Debug, Args)]
pub struct PceConfig {
    /// Base URL of the policy controller, e.g. `https://pce.example.com:8443`
    #[clap(long, env = "TETHER_PCE_URL")]
    pub pce_url: Option<String>,

    #[clap(long, env = "TETHER_PCE_ORG_ID", default_value_t = 1)]
    pub pce_org_id: u32,

    #[clap(long, env = "TETHER_PCE_API_USER")]
    pub pce_api_user: Option<String>,

    #[clap(long, env = "TETHER_PCE_API_SECRET", hide_env_values = true)]
    pub pce_api_secret: Option<String>,

    /// Per-request timeout, in seconds
    #[clap(long, env = "TETHER_PCE_TIMEOUT_SECS", default_value_t = 10)]
    pub pce_timeout_secs: u64,
}

impl PceConfig {
    pub fn is_configured(&self) -> bool {
        self.pce_url.is_some() || self.pce_api_user.is_some() || self.pce_api_secret.is_some()
    }

    pub fn settings(&self) -> Result<PceSettings, PceError> {
        fn required(value: &Option<String>, flag: &str, env: &str) -> Result<String, PceError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PceError::Config(format!("missing --{flag} ({env})")))
        }

        Ok(PceSettings {
            base_url: required(&self.pce_url, "pce-url", "TETHER_PCE_URL")?,
            org_id: self.pce_org_id,
            api_user: required(&self.pce_api_user, "pce-api-user", "TETHER_PCE_API_USER")?,
            api_secret: required(&self.pce_api_secret, "pce-api-secret", "TETHER_PCE_API_SECRET")?,
            timeout: Duration::from_secs(self.pce_timeout_secs),
        })
    }

    pub fn client(&self) -> Result<PceClient, PceError> {
        PceClient::new(self.settings()?)
    }
}

#[derive(Clone)]
pub struct PceSettings {
    pub base_url: String,
    pub org_id: u32,
    pub api_user: String,
    pub api_secret: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for PceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PceSettings")
            .field("base_url", &self.base_url)
            .field("org_id", &self.org_id)
            .field("api_user", &self.api_user)
            .field("api_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
