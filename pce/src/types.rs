use serde::{Deserialize, Serialize};

pub const SWITCH_PORT_ENDPOINT_TYPE: &str = "switch_port";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub href: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    /// `true` when a VEN already manages this workload.
    #[serde(default)]
    pub managed: Option<bool>,
}

impl Workload {
    pub fn is_unmanaged(&self) -> bool {
        self.managed == Some(false)
    }

    pub fn answers_to(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name) || self.hostname.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDeviceConfig {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    pub href: String,

    #[serde(default)]
    pub supported_endpoint_type: Option<String>,

    #[serde(default)]
    pub config: NetworkDeviceConfig,
}

impl NetworkDevice {
    pub fn is_switch(&self) -> bool {
        self.supported_endpoint_type.as_deref() == Some(SWITCH_PORT_ENDPOINT_TYPE)
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HrefRef {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NetworkEndpoint {
    #[serde(default)]
    pub workloads: Vec<HrefRef>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewEndpointConfig<'a> {
    pub name: &'a str,
    pub endpoint_type: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WorkloadRef<'a> {
    pub href: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewNetworkEndpoint<'a> {
    pub config: NewEndpointConfig<'a>,
    pub workloads: Vec<WorkloadRef<'a>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProductVersion {
    pub version: String,
}
