use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::time::time_between;
use super::types::{Maintenance, MaintenanceResponse, Server, ServerListMinimal};
use super::{CollectorError, ServerCollector};
use crate::auth::SharedAuthData;

pub const SCP_BASE_URL: &str = "https://servercontrolpanel.de/scp-core";

/// Collector backed by the SCP REST API.
///
/// Holds the live credential handle, so every collection authenticates with
/// whatever access token the authenticator installed last.
pub struct ScpServerCollector {
    client: reqwest::Client,
    base_url: String,
    auth: SharedAuthData,
}

impl ScpServerCollector {
    pub fn new(auth: SharedAuthData) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: SCP_BASE_URL.to_string(),
            auth,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn get(&self, path: &str, authorization: &str) -> Result<reqwest::Response, CollectorError> {
        let endpoint = self.url(path);
        let resp = self
            .client
            .get(&endpoint)
            .header("Accept", "application/json")
            .header("Authorization", authorization)
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Err(CollectorError::UnexpectedStatus {
                endpoint,
                status: resp.status(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<T, CollectorError> {
        Ok(self.get(path, authorization).await?.json().await?)
    }

    pub async fn ping(&self, authorization: &str) -> Result<(), CollectorError> {
        self.get("/api/ping", authorization).await.map(|_| ())
    }

    pub async fn maintenance(&self, authorization: &str) -> Result<Vec<Maintenance>, CollectorError> {
        let payload: Option<MaintenanceResponse> =
            self.get_json("/api/v1/maintenance", authorization).await?;
        Ok(payload.map(MaintenanceResponse::into_vec).unwrap_or_default())
    }

    pub async fn list_servers(&self, authorization: &str) -> Result<Vec<ServerListMinimal>, CollectorError> {
        let servers: Option<Vec<ServerListMinimal>> =
            self.get_json("/api/v1/servers", authorization).await?;
        Ok(servers.unwrap_or_default())
    }

    pub async fn server(&self, id: i32, authorization: &str) -> Result<Server, CollectorError> {
        self.get_json(&format!("/api/v1/servers/{id}"), authorization)
            .await
            .map_err(|e| {
                debug!(server_id = id, error = %e, "error getting server");
                e
            })
    }
}

#[async_trait]
impl ServerCollector for ScpServerCollector {
    async fn collect_server_data(&self) -> Result<Vec<Server>, CollectorError> {
        let authorization = self.auth.snapshot().authorization_header();

        self.ping(&authorization).await?;
        debug!("scp api is reachable");

        // Maintenance lookup is best effort; a broken endpoint must not hide
        // server data.
        match self.maintenance(&authorization).await {
            Ok(windows) => {
                if let Some(window) = ongoing_maintenance(&windows) {
                    warn!(start_at = %window.start_at, finish_at = %window.finish_at, "maintenance is currently ongoing");
                    return Err(CollectorError::MaintenanceOngoing {
                        start_at: window.start_at,
                        finish_at: window.finish_at,
                    });
                }
            }
            Err(e) => debug!(error = %e, "could not read maintenance info"),
        }

        let listed = self.list_servers(&authorization).await?;
        if listed.is_empty() {
            warn!("no servers found");
            return Ok(Vec::new());
        }
        try_join_all(listed.iter().map(|entry| self.server(entry.id, &authorization))).await
    }
}

fn ongoing_maintenance(windows: &[Maintenance]) -> Option<&Maintenance> {
    let now = Utc::now();
    windows
        .iter()
        .find(|window| time_between(now, window.start_at, window.finish_at))
}
