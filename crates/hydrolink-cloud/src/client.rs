//! REST client for the Orbit cloud API.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use hydrolink_core::config::endpoints;
use hydrolink_core::{Device, Program};

use crate::{CloudError, Result};

const HEADER_API_KEY: &str = "orbit-api-key";
const HEADER_APP_ID: &str = "orbit-app-id";

/// Login request body: `{"session":{"email":...,"password":...}}`.
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    session: Credentials<'a>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Body of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub orbit_api_key: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// An authenticated session: the token and the user it belongs to.
#[derive(Debug, Clone)]
pub struct CloudSession {
    pub token: String,
    pub user_id: String,
}

impl From<LoginResponse> for CloudSession {
    fn from(login: LoginResponse) -> Self {
        Self {
            token: login.orbit_api_key,
            user_id: login.user_id,
        }
    }
}

/// Client for the Orbit REST API.
pub struct CloudClient {
    http: reqwest::Client,
    login_url: String,
    devices_url: String,
    programs_url: String,
}

impl CloudClient {
    /// Client against the production endpoints.
    pub fn new() -> Self {
        Self::with_endpoints(endpoints::LOGIN, endpoints::DEVICES, endpoints::PROGRAMS)
    }

    /// Client against explicit endpoints (tests, proxies).
    pub fn with_endpoints(
        login_url: impl Into<String>,
        devices_url: impl Into<String>,
        programs_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            login_url: login_url.into(),
            devices_url: devices_url.into(),
            programs_url: programs_url.into(),
        }
    }

    /// Log in and obtain a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<CloudSession> {
        debug!("sending login request");
        let response = self
            .http
            .post(&self.login_url)
            .header(HEADER_API_KEY, "null")
            .header(HEADER_APP_ID, endpoints::APP_ID)
            .json(&LoginRequest {
                session: Credentials { email, password },
            })
            .send()
            .await?;
        let login: LoginResponse = Self::decode(response).await?;
        debug!(user_id = %login.user_id, "login succeeded");
        Ok(login.into())
    }

    /// Fetch the device inventory for the session's user.
    pub async fn devices(&self, session: &CloudSession) -> Result<Vec<Device>> {
        let url = format!("{}{}", self.devices_url, session.user_id);
        debug!(%url, "sending devices request");
        let response = self
            .http
            .get(&url)
            .header(HEADER_API_KEY, &session.token)
            .header(HEADER_APP_ID, endpoints::APP_ID)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetch the watering programs of a sprinkler timer.
    pub async fn programs(&self, session: &CloudSession, device_id: &str) -> Result<Vec<Program>> {
        let url = format!("{}{}", self.programs_url, device_id);
        debug!(%url, "sending programs request");
        let response = self
            .http
            .get(&url)
            .header(HEADER_API_KEY, &session.token)
            .header(HEADER_APP_ID, endpoints::APP_ID)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        match response.status() {
            status if status.is_success() => {
                let body = response.text().await?;
                trace!(body, "response body");
                Ok(serde_json::from_str(&body)?)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CloudError::Unauthorized),
            status => Err(CloudError::Api(status.as_u16())),
        }
    }
}

impl Default for CloudClient {
    fn default() -> Self {
        Self::new()
    }
}
