use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::{
    PceError, PceSettings, PolicyController,
    types::{
        NetworkDevice, NetworkEndpoint, NewEndpointConfig, NewNetworkEndpoint, ProductVersion,
        SWITCH_PORT_ENDPOINT_TYPE, Workload, WorkloadRef,
    },
};

const API_PREFIX: &str = "/api/v2";

/// [`PolicyController`] backed by the PCE REST API.
#[derive(Debug, Clone)]
pub struct PceClient {
    http: Client,
    settings: PceSettings,
    api_base: String,
}

impl PceClient {
    pub fn new(settings: PceSettings) -> Result<Self, PceError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let api_base = format!("{}{API_PREFIX}", settings.base_url.trim_end_matches('/'));

        Ok(Self {
            http,
            settings,
            api_base,
        })
    }

    fn org_path(&self, path: &str) -> String {
        format!("/orgs/{}{path}", self.settings.org_id)
    }

    /// `href` is an absolute object path as returned by the API, such as
    /// `/orgs/1/workloads/<uuid>`.
    fn request(&self, method: Method, href: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{href}", self.api_base))
            .basic_auth(&self.settings.api_user, Some(&self.settings.api_secret))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, PceError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PceError::Status { status, body });
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PceError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PolicyController for PceClient {
    #[instrument(skip(self))]
    async fn find_unmanaged_workloads_by_name(
        &self,
        name: &str,
    ) -> Result<Vec<Workload>, PceError> {
        let request = self
            .request(Method::GET, &self.org_path("/workloads"))
            .query(&[("name", name)]);

        let workloads: Vec<Workload> = self.get_json(request).await?;
        debug!(candidates = workloads.len(), "Workloads returned for name filter");

        // The name filter is a partial match, so narrow down to exact hits.
        Ok(workloads
            .into_iter()
            .filter(|w| w.is_unmanaged() && w.answers_to(name))
            .collect())
    }

    #[instrument(skip(self))]
    async fn find_switch(&self, href_or_name: &str) -> Result<Option<NetworkDevice>, PceError> {
        let request = self.request(Method::GET, &self.org_path("/network_devices"));
        let devices: Vec<NetworkDevice> = self.get_json(request).await?;

        let by_href = href_or_name.starts_with("/orgs/");

        Ok(devices.into_iter().filter(NetworkDevice::is_switch).find(|d| {
            if by_href {
                d.href == href_or_name
            } else {
                d.name() == Some(href_or_name)
            }
        }))
    }

    #[instrument(skip(self))]
    async fn is_workload_bound_to_switch(
        &self,
        workload_href: &str,
        switch_href: &str,
    ) -> Result<bool, PceError> {
        let request = self.request(Method::GET, &format!("{switch_href}/network_endpoints"));
        let endpoints: Vec<NetworkEndpoint> = self.get_json(request).await?;

        Ok(endpoints
            .iter()
            .flat_map(|e| e.workloads.iter())
            .any(|w| w.href == workload_href))
    }

    #[instrument(skip(self))]
    async fn bind_workload_to_switch(
        &self,
        workload_href: &str,
        switch_href: &str,
    ) -> Result<(), PceError> {
        let endpoint = NewNetworkEndpoint {
            config: NewEndpointConfig {
                name: workload_href,
                endpoint_type: SWITCH_PORT_ENDPOINT_TYPE,
            },
            workloads: vec![WorkloadRef {
                href: workload_href,
            }],
        };

        let request = self
            .request(Method::POST, &format!("{switch_href}/network_endpoints"))
            .json(&endpoint);
        self.send(request).await?;

        info!("Workload bound to switch");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_active_policies(
        &self,
        workload_href: &str,
    ) -> Result<serde_json::Value, PceError> {
        let request = self.request(Method::GET, &format!("{workload_href}/active_policies"));
        self.get_json(request).await
    }

    async fn product_version(&self) -> Result<String, PceError> {
        let request = self.request(Method::GET, "/product_version");
        let version: ProductVersion = self.get_json(request).await?;
        Ok(version.version)
    }
}
