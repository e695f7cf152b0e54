//! Client for the policy controller (PCE) that owns workloads and network
//! devices.
//!
//! The enrollment flow only needs a handful of lookups, so they are exposed
//! through the [`PolicyController`] trait. [`PceClient`] implements it over
//! the PCE REST API; tests substitute their own implementation.

use async_trait::async_trait;

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::PceClient;
pub use config::{PceConfig, PceSettings};
pub use error::PceError;
pub use types::{NetworkDevice, Workload};

#[async_trait]
pub trait PolicyController: Send + Sync + 'static {
    /// Unmanaged workloads whose name or hostname is exactly `name`.
    async fn find_unmanaged_workloads_by_name(&self, name: &str)
    -> Result<Vec<Workload>, PceError>;

    /// Look up a switch by href (values starting with `/orgs/`) or by name.
    /// Devices that do not accept switch port endpoints are ignored.
    async fn find_switch(&self, href_or_name: &str) -> Result<Option<NetworkDevice>, PceError>;

    async fn is_workload_bound_to_switch(
        &self,
        workload_href: &str,
        switch_href: &str,
    ) -> Result<bool, PceError>;

    async fn bind_workload_to_switch(
        &self,
        workload_href: &str,
        switch_href: &str,
    ) -> Result<(), PceError>;

    /// Opaque policy document for a workload, passed through untouched.
    async fn get_active_policies(&self, workload_href: &str)
    -> Result<serde_json::Value, PceError>;

    async fn product_version(&self) -> Result<String, PceError>;
}
