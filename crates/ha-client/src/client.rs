//! HTTP client for the Home Assistant REST API

use async_trait::async_trait;
use ha_core::{ServiceCall, State};
use ha_entity::{ActuatorError, RemoteActuator};
use reqwest::{header, Client, RequestBuilder, Response, Url};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, ClientResult};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one Home Assistant instance, authenticated with a long-lived token
#[derive(Clone)]
pub struct HaClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HaClient {
    /// Create a client; every request is cut off after `timeout`
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url,
                reason: "scheme must be http or https".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint for a service call: `/api/services/{domain}/{service}`
    pub fn service_url(&self, call: &ServiceCall) -> String {
        format!(
            "{}/api/services/{}/{}",
            self.base_url, call.domain, call.service
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    /// Call a service on the remote instance
    #[instrument(skip(self, call), fields(service = %call.service_id(), entity_id = %call.entity_id))]
    pub async fn call_service(&self, call: &ServiceCall) -> ClientResult<()> {
        let url = self.service_url(call);
        debug!(url = %url, "Calling service");

        let response = self
            .authorized(self.client.post(&url))
            .json(&call.payload())
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;

        Self::check_status(url, response).await?;
        Ok(())
    }

    /// Fetch the current state of every entity (`GET /api/states`)
    #[instrument(skip(self))]
    pub async fn states(&self) -> ClientResult<Vec<State>> {
        let url = format!("{}/api/states", self.base_url);

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;

        let response = Self::check_status(url.clone(), response).await?;
        let states: Vec<State> = response
            .json()
            .await
            .map_err(|source| ClientError::Decode { url, source })?;

        debug!(count = states.len(), "Fetched entity states");
        Ok(states)
    }

    async fn check_status(url: String, response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(url = %url, status = %status, "Request rejected");
        Err(ClientError::Status { url, status, body })
    }
}

#[async_trait]
impl RemoteActuator for HaClient {
    async fn invoke(&self, call: &ServiceCall) -> Result<(), ActuatorError> {
        self.call_service(call).await.map_err(ActuatorError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn client(base_url: &str) -> HaClient {
        HaClient::new(base_url, "token", DEFAULT_REQUEST_TIMEOUT).unwrap()
    }

    #[test]
    fn test_service_url() {
        let call = ServiceCall::new("switch", "turn_on", "switch.kitchen".parse().unwrap());

        assert_eq!(
            client("http://192.168.1.30:8123").service_url(&call),
            "http://192.168.1.30:8123/api/services/switch/turn_on"
        );
        assert_eq!(
            client("http://homeassistant.local:8123/").service_url(&call),
            "http://homeassistant.local:8123/api/services/switch/turn_on"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            HaClient::new("192.168.1.30:8123", "t", DEFAULT_REQUEST_TIMEOUT),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            HaClient::new("ftp://example.com", "t", DEFAULT_REQUEST_TIMEOUT),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_status_error_maps_to_actuator_status() {
        let err = ClientError::Status {
            url: "http://ha/api/services/switch/turn_on".to_string(),
            status: StatusCode::UNAUTHORIZED,
            body: "401: Unauthorized".to_string(),
        };

        assert_eq!(
            ActuatorError::from(err),
            ActuatorError::Status {
                status: 401,
                body: "401: Unauthorized".to_string(),
            }
        );
    }
}
