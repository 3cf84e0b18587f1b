use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Settings;
use crate::error::{NetworkError, Result};

use super::payload::{SimulationEnvelope, SimulationResponse, SimulationResponseEnvelope};

/// The remote simulation engine.
#[async_trait]
pub trait SimulationBackend: Send + Sync {
    async fn simulate(&self, request: &SimulationEnvelope) -> std::result::Result<SimulationResponse, NetworkError>;
}

#[async_trait]
impl<B: SimulationBackend + ?Sized> SimulationBackend for std::sync::Arc<B> {
    async fn simulate(&self, request: &SimulationEnvelope) -> std::result::Result<SimulationResponse, NetworkError> {
        (**self).simulate(request).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Map,
    Simulation,
    Earthquake,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Map => "/api/map/",
            Self::Simulation => "/api/simulation/",
            Self::Earthquake => "/api/earthquake/",
        }
    }
}

/// JSON-over-HTTP client for the backend service.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NetworkError::from)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.api_base_url()?, settings.api.timeout())
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> std::result::Result<T, NetworkError> {
        let url = self.url(endpoint);
        debug!(%url, "POST");
        let resp = self.client.post(&url).json(body).send().await?;
        decode(resp).await
    }

    /// Magnitude lookup. The reply is passed through untouched.
    pub async fn earthquake_energy(&self, magnitude: &str) -> std::result::Result<serde_json::Value, NetworkError> {
        self.post_json(Endpoint::Earthquake, &serde_json::json!({ "magnitude": magnitude }))
            .await
    }

    /// Base settlement data for the map.
    pub async fn settlement_view(&self) -> std::result::Result<serde_json::Value, NetworkError> {
        let url = self.url(Endpoint::Map);
        debug!(%url, "GET settlement view");
        let resp = self
            .client
            .get(&url)
            .query(&[("map_type", "SETTLEMENT_VIEW")])
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> std::result::Result<T, NetworkError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(NetworkError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json().await?)
}

#[async_trait]
impl SimulationBackend for HttpBackend {
    async fn simulate(&self, request: &SimulationEnvelope) -> std::result::Result<SimulationResponse, NetworkError> {
        let envelope: SimulationResponseEnvelope = self.post_json(Endpoint::Simulation, request).await?;
        Ok(envelope.simulation_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_base_and_endpoint() {
        let b = HttpBackend::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(b.url(Endpoint::Simulation), "http://localhost:8000/api/simulation/");
        assert_eq!(b.url(Endpoint::Map), "http://localhost:8000/api/map/");
        assert_eq!(b.url(Endpoint::Earthquake), "http://localhost:8000/api/earthquake/");
    }

    #[test]
    fn backend_follows_settings_environment() {
        let b = HttpBackend::from_settings(&Settings::default()).unwrap();
        assert_eq!(b.url(Endpoint::Map), "http://localhost:8000/api/map/");
    }
}
