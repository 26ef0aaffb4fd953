use std::time::Duration;

use cardmatrix_core::{BatchOutcome, MatrixBackend, OverrideToggle, Plan, Resolution};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

const ADMIN_OPTIONS_PATH: &str = "/api/v1/admin/card-options";

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected request ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid server URL \"{url}\": {reason}")]
    InvalidServerUrl { url: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AdminMatrixBody {
    #[serde(flatten)]
    resolution: Resolution,
}

#[derive(Debug, Serialize)]
struct BatchToggleBody<'a> {
    action: &'static str,
    plan_id: i64,
    toggles: &'a [OverrideToggle],
}

/// HTTP client for the admin card-option routes of `cardmatrix-server`.
///
/// Non-2xx responses become [`ConsoleError::Api`] carrying the server's
/// error code. Nothing is retried: a failed save leaves the staged edits in
/// place for the caller to resubmit.
#[derive(Debug, Clone)]
pub struct MatrixClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MatrixClient {
    /// # Errors
    ///
    /// Returns [`ConsoleError::InvalidServerUrl`] for a URL that is not
    /// absolute http(s), or [`ConsoleError::Http`] if the client cannot be
    /// built.
    pub fn new(
        server_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ConsoleError> {
        let parsed = reqwest::Url::parse(server_url).map_err(|e| ConsoleError::InvalidServerUrl {
            url: server_url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConsoleError::InvalidServerUrl {
                url: server_url.to_owned(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("cardmatrix-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: server_url.trim_end_matches('/').to_owned(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, ConsoleError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => (envelope.error.code, envelope.error.message),
                Err(_) => ("http_error".to_owned(), body),
            };
            return Err(ConsoleError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        serde_json::from_str::<Envelope<T>>(&body)
            .map(|envelope| envelope.data)
            .map_err(|e| ConsoleError::Deserialize {
                context: context.to_owned(),
                source: e,
            })
    }

    /// Fetches the scoped matrix for a plan.
    ///
    /// # Errors
    ///
    /// See [`ConsoleError`].
    pub async fn fetch_matrix(
        &self,
        plan_id: i64,
        material_key: Option<&str>,
    ) -> Result<Resolution, ConsoleError> {
        let mut query = vec![("plan_id", plan_id.to_string())];
        if let Some(material) = material_key {
            query.push(("material_key", material.to_owned()));
        }
        let request = self.client.get(self.url(ADMIN_OPTIONS_PATH)).query(&query);
        let body: AdminMatrixBody = self
            .send(request, &format!("matrix for plan {plan_id}"))
            .await?;
        Ok(body.resolution)
    }

    /// # Errors
    ///
    /// See [`ConsoleError`].
    pub async fn batch_toggle(
        &self,
        plan_id: i64,
        toggles: &[OverrideToggle],
    ) -> Result<BatchOutcome, ConsoleError> {
        let body = BatchToggleBody {
            action: "batchToggle",
            plan_id,
            toggles,
        };
        let request = self.client.post(self.url(ADMIN_OPTIONS_PATH)).json(&body);
        self.send(request, &format!("batch toggle for plan {plan_id}"))
            .await
    }

    /// # Errors
    ///
    /// See [`ConsoleError`].
    pub async fn list_plans(&self) -> Result<Vec<Plan>, ConsoleError> {
        let request = self.client.get(self.url("/api/v1/admin/plans"));
        self.send(request, "plan list").await
    }
}

impl MatrixBackend for MatrixClient {
    type Error = ConsoleError;

    async fn resolve(
        &self,
        plan_id: i64,
        material_key: Option<&str>,
    ) -> Result<Resolution, ConsoleError> {
        self.fetch_matrix(plan_id, material_key).await
    }

    async fn batch_upsert(
        &self,
        plan_id: i64,
        toggles: &[OverrideToggle],
    ) -> Result<BatchOutcome, ConsoleError> {
        self.batch_toggle(plan_id, toggles).await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
