use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};
use tether_pce::PceConfig;

#[derive(Clone, Debug, Parser)]
#[clap(version, about = "Pairing and heartbeat API for tether agents")]
pub struct TetherApiConfig {
    #[clap(
        short,
        long,
        env = "TETHER_API_BIND_ADDR",
        default_value = "0.0.0.0:9111"
    )]
    pub bind_addr: SocketAddr,

    #[clap(
        long,
        env = "TETHER_DB_PATH",
        default_value = "/var/lib/tether/tether.sqlite3"
    )]
    pub db_path: PathBuf,

    /// Initialize the database on startup instead of requiring `tetherctl
    /// db-setup` to have been run first.
    #[clap(long, default_value_t = false)]
    pub create_database_if_not_exists: bool,

    #[clap(long, env = "TETHER_DB_MAX_CONNECTIONS", default_value_t = 4)]
    pub db_max_connections: u32,

    #[clap(long, default_value_t = false)]
    pub dump_openapi: bool,

    /// Emit logs as JSON lines instead of the human readable format.
    #[clap(long, env = "TETHER_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    #[clap(flatten)]
    pub pce: PceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TetherApiConfig::try_parse_from(["tether-api"]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9111".parse().unwrap());
        assert_eq!(config.db_max_connections, 4);
        assert!(!config.create_database_if_not_exists);
    }
}
