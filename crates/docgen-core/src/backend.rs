//! HTTP client for the documentation backend.
//!
//! The backend owns everything heavy (cloning, generation, Confluence writes,
//! OAuth code exchange). This client only speaks its small JSON contract.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::DocEncoding;

/// Ways a backend call can fail.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Connection, TLS or body-transfer failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("backend returned {status}{}", suffix(.message))]
    Backend {
        status: StatusCode,
        /// `error` or `message` field of the body
        message: Option<String>,
        /// `errors[].message` entries of the body
        details: Vec<String>,
    },
    /// Success response whose body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

fn suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl BackendError {
    /// Server-provided text, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Backend {
                message, details, ..
            } => message.as_deref().or(details.first().map(String::as_str)),
            _ => None,
        }
    }

    /// True when any message in the body equals `literal`.
    pub fn mentions(&self, literal: &str) -> bool {
        match self {
            Self::Backend {
                message, details, ..
            } => message.as_deref() == Some(literal) || details.iter().any(|d| d == literal),
            _ => false,
        }
    }
}

/// Body of `/api/get_access_token`.
#[derive(Debug, Deserialize)]
struct GithubTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Body of `/api/get_confluence_token`.
#[derive(Debug, Deserialize)]
struct ConfluenceTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    cloud_id: Option<String>,
}

/// Token and site id granted by Atlassian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfluenceGrant {
    pub access_token: String,
    pub cloud_id: Option<String>,
}

/// Body of a successful `/api/get_doc`.
#[derive(Debug, Clone, Deserialize)]
pub struct DocResponse {
    pub doc_content: String,
    #[serde(default)]
    pub commit_hash: Option<String>,
}

#[derive(Debug, Serialize)]
struct RepoBody<'a> {
    repo_url: &'a str,
}

/// Body of `/api/create_confluence`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateConfluenceRequest {
    pub repo_url: String,
    pub cloud_id: Option<String>,
    pub confluence_access_code: String,
    pub commit_hash: Option<String>,
}

/// Error body in any of the shapes the backend uses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchanges a GitHub authorization code.
    ///
    /// `Ok(None)` when the backend answered without an `access_token`.
    ///
    /// # Errors
    /// Returns [`BackendError`] on network failure or non-success status.
    pub async fn exchange_github_code(&self, code: &str) -> Result<Option<String>, BackendError> {
        let response = self
            .http
            .get(self.endpoint("/api/get_access_token"))
            .query(&[("code", code)])
            .send()
            .await?;
        let body: GithubTokenResponse = read_json(response).await?;
        Ok(body.access_token.filter(|t| !t.is_empty()))
    }

    /// Exchanges an Atlassian authorization code.
    ///
    /// `Ok(None)` when the backend answered without an `access_token`.
    ///
    /// # Errors
    /// Returns [`BackendError`] on network failure or non-success status.
    pub async fn exchange_confluence_code(
        &self,
        code: &str,
    ) -> Result<Option<ConfluenceGrant>, BackendError> {
        let response = self
            .http
            .get(self.endpoint("/api/get_confluence_token"))
            .query(&[("code", code)])
            .send()
            .await?;
        let body: ConfluenceTokenResponse = read_json(response).await?;
        Ok(body
            .access_token
            .filter(|t| !t.is_empty())
            .map(|access_token| ConfluenceGrant {
                access_token,
                cloud_id: body.cloud_id,
            }))
    }

    /// Fetches (or regenerates) the document for `owner/name`.
    ///
    /// # Errors
    /// Returns [`BackendError`] on network failure, non-success status or a
    /// body without `doc_content`.
    pub async fn get_doc(
        &self,
        repo_url: &str,
        github_token: Option<&str>,
    ) -> Result<DocResponse, BackendError> {
        let mut request = self
            .http
            .post(self.endpoint("/api/get_doc"))
            .json(&RepoBody { repo_url });
        if let Some(token) = github_token {
            request = request.bearer_auth(token);
        }
        read_json(request.send().await?).await
    }

    /// Creates the Confluence space/pages for a generated document.
    ///
    /// # Errors
    /// Returns [`BackendError`] on network failure or non-success status.
    pub async fn create_confluence(
        &self,
        body: &CreateConfluenceRequest,
    ) -> Result<(), BackendError> {
        let response = self
            .http
            .post(self.endpoint("/api/create_confluence"))
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }

    /// Registers the regeneration webhook on the GitHub repository.
    ///
    /// # Errors
    /// Returns [`BackendError`] on network failure or non-success status.
    pub async fn setup_webhook(&self, repo_url: &str, github_token: &str) -> Result<(), BackendError> {
        let response = self
            .http
            .post(self.endpoint("/setup-webhook"))
            .bearer_auth(github_token)
            .json(&RepoBody { repo_url })
            .send()
            .await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), BackendError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(response).await)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

async fn error_from_response(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

    let details = parsed
        .errors
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s.clone()),
            other => other
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
        })
        .collect();

    BackendError::Backend {
        status,
        message: parsed.error.or(parsed.message).filter(|m| !m.is_empty()),
        details,
    }
}

/// Turns `doc_content` into document text.
///
/// # Errors
/// Returns [`BackendError::Decode`] when base64 decoding fails or the bytes
/// are not UTF-8.
pub fn decode_doc_content(encoding: DocEncoding, raw: &str) -> Result<String, BackendError> {
    match encoding {
        DocEncoding::Plain => Ok(raw.to_string()),
        DocEncoding::Base64 => {
            // GitHub-style base64 wraps lines.
            let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| BackendError::Decode(format!("doc_content is not base64: {e}")))?;
            String::from_utf8(bytes)
                .map_err(|e| BackendError::Decode(format!("doc_content is not UTF-8: {e}")))
        }
    }
}
