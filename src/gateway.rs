//! AssistNow service client
//!
//! This module talks to the two endpoints of the assistance service: the
//! one-time device registration that issues a session key, and the online
//! data endpoint that returns the binary assistance payload. Requests always
//! carry a bounded deadline; a run never hangs on a missing timeout.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::params::RequestParameters;
use crate::state::Credentials;

/// Device registration endpoint
const REGISTRATION_URL: &str = "https://api.thingstream.io/ztp/assistnow/credentials";

/// Online assistance data endpoint
const ONLINE_DATA_URL: &str = "https://online-live1.services.u-blox.com/GetOnlineData.ashx";

/// Deadline applied to every outbound request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while registering the device
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The registration request could not be sent or timed out
    #[error("Registration request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The service refused the registration
    #[error("Registration rejected by the service (status {0})")]
    Rejected(StatusCode),

    /// The success response did not contain a session key
    #[error("Malformed registration response: {0}")]
    MalformedResponse(String),
}

/// Errors raised while fetching assistance data
///
/// Transient failures (rate limiting, server errors, transport problems)
/// may succeed on a later invocation with the same input; permanent
/// failures signal a parameter or authentication problem and must not be
/// retried unchanged.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service is unavailable or rate-limiting; retry on a later run
    #[error("Service temporarily unavailable: {0}")]
    Transient(String),

    /// The service rejected the request; fix the input before retrying
    #[error("Request rejected by the service: {0}")]
    Permanent(String),
}

impl FetchError {
    /// True when a later invocation with identical input may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// The remote operations the orchestrator depends on
///
/// Implemented by [`AssistNowClient`] for the real service; tests substitute
/// their own implementation.
#[async_trait]
pub trait AssistService {
    /// Registers the device against an issued access token
    async fn register(
        &self,
        token: &str,
        device_id: Option<&str>,
    ) -> Result<Credentials, RegistrationError>;

    /// Fetches assistance data for the effective parameters
    async fn fetch(
        &self,
        credentials: &Credentials,
        params: &RequestParameters,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Registration request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
}

/// Registration success response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    /// The issued session key (the service also calls this a chipcode)
    #[serde(alias = "chipcode")]
    session_key: String,
}

/// Client for the AssistNow service endpoints
#[derive(Debug, Clone)]
pub struct AssistNowClient {
    client: Client,
    registration_url: String,
    data_url: String,
}

impl AssistNowClient {
    /// Creates a new client with the production endpoints and a bounded
    /// request deadline
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            registration_url: REGISTRATION_URL.to_string(),
            data_url: ONLINE_DATA_URL.to_string(),
        })
    }

    /// Overrides the registration endpoint
    #[allow(dead_code)]
    pub fn with_registration_url(mut self, url: impl Into<String>) -> Self {
        self.registration_url = url.into();
        self
    }

    /// Overrides the data endpoint
    #[allow(dead_code)]
    pub fn with_data_url(mut self, url: impl Into<String>) -> Self {
        self.data_url = url.into();
        self
    }
}

#[async_trait]
impl AssistService for AssistNowClient {
    async fn register(
        &self,
        token: &str,
        device_id: Option<&str>,
    ) -> Result<Credentials, RegistrationError> {
        info!(url = %self.registration_url, "Registering device");
        let body = RegisterRequest { token, device_id };
        let response = self
            .client
            .post(&self.registration_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistrationError::Rejected(status));
        }

        let text = response.text().await?;
        let parsed: RegisterResponse = serde_json::from_str(&text)
            .map_err(|e| RegistrationError::MalformedResponse(e.to_string()))?;

        Ok(Credentials {
            token: token.to_string(),
            device_id: device_id.map(str::to_string),
            session_key: Some(parsed.session_key),
        })
    }

    async fn fetch(
        &self,
        credentials: &Credentials,
        params: &RequestParameters,
    ) -> Result<Vec<u8>, FetchError> {
        let session_key = credentials
            .session_key
            .as_deref()
            .ok_or_else(|| FetchError::Permanent("device is not registered".to_string()))?;

        let mut query = vec![("sessionKey", session_key.to_string())];
        query.extend(params.query_pairs());

        info!(url = %self.data_url, "Fetching assistance data");
        let response = self
            .client
            .get(&self.data_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let payload = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        Ok(payload.to_vec())
    }
}

/// Classifies a non-success status into the retry taxonomy
///
/// Rate limiting, request timeouts and server-side errors are worth retrying
/// on a later invocation; everything else is a rejection of the request
/// itself.
fn classify_status(status: StatusCode) -> FetchError {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        FetchError::Transient(format!("status {}", status))
    } else {
        FetchError::Permanent(format!("status {}", status))
    }
}
