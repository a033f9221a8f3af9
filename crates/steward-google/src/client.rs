use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use steward_core::config::GoogleConfig;
use tracing::{debug, info, warn};

use crate::error::{GoogleError, Result};

/// Refresh this long before the provider's stated expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// OAuth2 client for the Google REST APIs.
///
/// Holds the long-lived refresh token from config and exchanges it for short
/// access tokens on demand. Access tokens are cached until shortly before
/// they expire.
pub struct GoogleClient {
    http: reqwest::Client,
    cfg: GoogleConfig,
    token: Mutex<Option<AccessToken>>,
}

impl GoogleClient {
    pub fn new(cfg: GoogleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            cfg,
            token: Mutex::new(None),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.cfg.is_configured()
    }

    /// A valid access token, refreshing it if needed.
    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.token.lock().expect("google token cache poisoned");
            if let Some(t) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
                return Ok(t.value.clone());
            }
        }

        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            self.cfg.client_id.as_deref(),
            self.cfg.client_secret.as_deref(),
            self.cfg.refresh_token.as_deref(),
        ) else {
            return Err(GoogleError::NotConfigured(
                "Google credentials are not configured".into(),
            ));
        };

        let resp = self
            .http
            .post(&self.cfg.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, "google token refresh rejected");
            return Err(GoogleError::Auth(error_message(&text, status)));
        }

        let token: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        info!("google access token refreshed");

        let mut cached = self.token.lock().expect("google token cache poisoned");
        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token.access_token)
    }

    /// GET `{api_base_url}/{path}` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.access_token().await?;
        debug!(path, "google GET");
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        decode(resp).await
    }

    /// POST a JSON body to `{api_base_url}/{path}` and decode the reply.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let token = self.access_token().await?;
        debug!(path, "google POST");
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    /// Lists one calendar. Missing credentials count as unhealthy.
    pub async fn health_check(&self) -> bool {
        if !self.is_configured() {
            debug!("google credentials not configured");
            return false;
        }
        let listed = self
            .get_json::<serde_json::Value>(
                "calendar/v3/users/me/calendarList",
                &[("maxResults", "1".to_string())],
            )
            .await;
        match listed {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "google health check failed");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.api_base_url.trim_end_matches('/'), path)
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status().as_u16();
    if !resp.status().is_success() {
        let text = resp.text().await.unwrap_or_default();
        warn!(status, "google API error");
        return Err(GoogleError::Api {
            status,
            message: error_message(&text, status),
        });
    }
    Ok(resp.json().await?)
}

/// Pull a readable message out of either Google error shape:
/// `{"error": {"message": ..}}` from the REST APIs or
/// `{"error": "..", "error_description": ..}` from the token endpoint.
fn error_message(body: &str, status: u16) -> String {
    let parsed: Option<ErrorEnvelope> = serde_json::from_str(body).ok();
    parsed
        .and_then(|e| match e.error {
            ErrorField::Detailed { message } => message,
            ErrorField::Code(code) => Some(e.error_description.unwrap_or(code)),
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorField,
    error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Detailed { message: Option<String> },
    Code(String),
}
