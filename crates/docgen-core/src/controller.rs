//! Session & fetch controller.
//!
//! Owns the session, talks to the backend, and publishes every change through
//! a [`watch`] channel so views re-render from [`ControllerState`] instead of
//! reading storage themselves.
//!
//! ## State flow
//!
//! ```text
//! Idle ──submit──▶ InProgress ──response──▶ Success | Failure | Notice
//!   ▲                                                  │
//!   └────────────────── reset_status ──────────────────┘
//! ```
//!
//! Fetches are fenced by a monotonically increasing request id: a response
//! that arrives after a newer fetch was issued is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{self, BackendClient, BackendError, CreateConfluenceRequest};
use crate::config::Config;
use crate::oauth::{OAuthCallback, Provider};
use crate::session::{Session, SessionStore};
use crate::status::{self, OperationStatus};

/// Document text returned by the backend, possibly edited locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub content: String,
    /// Repository revision the document was generated from
    pub commit_hash: Option<String>,
}

/// Everything a view needs to render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub session: Session,
    pub status: OperationStatus,
    pub document: Option<GeneratedDocument>,
    /// Repository of the latest submission
    pub repo: Option<String>,
}

/// Result of processing an OAuth redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The redirect carried no authorization code.
    NoCode,
    /// A token for this provider was already stored; no exchange was made.
    AlreadyLinked(Provider),
    /// The code was exchanged and the token stored.
    Linked(Provider),
    /// The exchange failed or returned no token. Already logged.
    Failed(Provider),
}

/// Identifies one fetch submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Default)]
struct RequestSeq {
    latest: AtomicU64,
}

impl RequestSeq {
    fn next_id(&self) -> RequestId {
        RequestId(self.latest.fetch_add(1, Ordering::SeqCst).wrapping_add(1))
    }

    fn is_latest(&self, id: RequestId) -> bool {
        self.latest.load(Ordering::SeqCst) == id.0
    }
}

pub struct Controller {
    config: Config,
    store: SessionStore,
    backend: BackendClient,
    state: watch::Sender<ControllerState>,
    fetch_seq: RequestSeq,
}

impl Controller {
    /// Creates a controller from config, using the default session location.
    ///
    /// # Errors
    /// Returns an error if the stored session cannot be read.
    pub fn from_config(config: Config) -> Result<Self> {
        let backend = BackendClient::new(config.backend_url.clone());
        Self::new(config, SessionStore::default_location(), backend)
    }

    /// # Errors
    /// Returns an error if the stored session cannot be read.
    pub fn new(config: Config, store: SessionStore, backend: BackendClient) -> Result<Self> {
        let session = store.load()?;
        let (state, _) = watch::channel(ControllerState {
            session,
            ..ControllerState::default()
        });
        Ok(Self {
            config,
            store,
            backend,
            state,
            fetch_seq: RequestSeq::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    fn set_status(&self, status: OperationStatus) {
        self.state.send_modify(|s| s.status = status);
    }

    fn set_session(&self, session: Session) {
        self.state.send_modify(|s| s.session = session);
    }

    /// Processes an OAuth redirect.
    ///
    /// Exchanges the code only when the matching provider has no stored
    /// token, so replaying the same redirect is harmless. Exchange failures
    /// are logged and reported as [`InitOutcome::Failed`], never as errors.
    ///
    /// # Errors
    /// Returns an error only if the session file cannot be read or written.
    pub async fn initialize(&self, callback: &OAuthCallback) -> Result<InitOutcome> {
        let provider = callback.provider();
        let Some(code) = callback.code.as_deref() else {
            debug!("no authorization code in redirect");
            return Ok(InitOutcome::NoCode);
        };

        let mut session = self.store.load()?;
        let already_linked = match provider {
            Provider::GitHub => session.is_github_linked(),
            Provider::Confluence => session.is_confluence_linked(),
        };
        if already_linked {
            debug!(provider = provider.display_name(), "token already stored, skipping exchange");
            self.set_session(session);
            return Ok(InitOutcome::AlreadyLinked(provider));
        }

        info!(provider = provider.display_name(), "exchanging authorization code");
        let linked = match provider {
            Provider::GitHub => match self.backend.exchange_github_code(code).await {
                Ok(Some(token)) => {
                    session.github_token = Some(token);
                    true
                }
                Ok(None) => {
                    warn!("GitHub token exchange returned no access_token");
                    false
                }
                Err(err) => {
                    warn!(error = %err, "Failed to get access token");
                    false
                }
            },
            Provider::Confluence => match self.backend.exchange_confluence_code(code).await {
                Ok(Some(grant)) => {
                    session.confluence_token = Some(grant.access_token);
                    session.confluence_cloud_id = grant.cloud_id;
                    true
                }
                Ok(None) => {
                    warn!("Confluence token exchange returned no access_token");
                    false
                }
                Err(err) => {
                    warn!(error = %err, "Failed to get Confluence access token");
                    false
                }
            },
        };

        if !linked {
            return Ok(InitOutcome::Failed(provider));
        }

        self.store.save(&session)?;
        self.set_session(session);
        Ok(InitOutcome::Linked(provider))
    }

    /// Builds the GitHub consent URL and opens it in the browser.
    ///
    /// # Errors
    /// Returns an error if no GitHub client id is configured.
    pub fn login_with_github(&self) -> Result<String> {
        let url = crate::oauth::github_authorize_url(&self.config)?;
        crate::oauth::open_in_browser(&url);
        Ok(url)
    }

    /// Builds the Atlassian consent URL and opens it in the browser.
    ///
    /// # Errors
    /// Returns an error if no Confluence client id is configured.
    pub fn link_confluence_account(&self) -> Result<String> {
        let url = crate::oauth::confluence_authorize_url(&self.config)?;
        crate::oauth::open_in_browser(&url);
        Ok(url)
    }

    /// Clears every stored token. Safe to call when already logged out.
    ///
    /// Returns whether anything was stored.
    ///
    /// # Errors
    /// Returns an error if the session file exists but cannot be removed.
    pub fn logout(&self) -> Result<bool> {
        let had_tokens = self.store.clear()?;
        // A fetch still in flight must not land after logout.
        self.fetch_seq.next_id();
        self.state.send_modify(|s| {
            s.session = Session::default();
            s.status = OperationStatus::Idle;
        });
        info!("logged out");
        Ok(had_tokens)
    }

    /// Fetches (or regenerates) the document for `owner/name`.
    ///
    /// Clears the previous document as soon as the request is sent. Returns
    /// the status after the call. When a newer submission or a logout happened
    /// while this one was in flight, its response is dropped and the current
    /// status is returned unchanged.
    pub async fn fetch_document(&self, repo: &str) -> OperationStatus {
        // Every submission supersedes earlier fetches, rejected ones included.
        let id = self.fetch_seq.next_id();
        let repo = repo.trim();
        if repo.is_empty() {
            let status = OperationStatus::Failure(status::REPO_REQUIRED.to_string());
            self.set_status(status.clone());
            return status;
        }
        let Some(token) = self.session().github_token else {
            let status = OperationStatus::Failure(status::NOT_LOGGED_IN.to_string());
            self.set_status(status.clone());
            return status;
        };

        self.state.send_modify(|s| {
            s.status = OperationStatus::in_progress(status::GENERATING);
            s.repo = Some(repo.to_string());
            s.document = None;
        });
        info!(repo, request = id.0, "fetching document");

        let result = self.backend.get_doc(repo, Some(&token)).await.and_then(|doc| {
            let content = backend::decode_doc_content(self.config.doc_encoding, &doc.doc_content)?;
            Ok(GeneratedDocument {
                content,
                commit_hash: doc.commit_hash,
            })
        });

        if !self.fetch_seq.is_latest(id) {
            debug!(repo, request = id.0, "dropping response of superseded fetch");
            return self.state.borrow().status.clone();
        }

        let status = match result {
            Ok(document) => {
                self.state.send_modify(|s| s.document = Some(document));
                OperationStatus::success(status::FETCH_SUCCESS)
            }
            Err(err) => {
                warn!(repo, error = %err, "document fetch failed");
                OperationStatus::Failure(failure_text(&err, status::FETCH_FAILED))
            }
        };
        self.set_status(status.clone());
        status
    }

    /// Pushes the generated document to the linked Confluence site.
    ///
    /// `commit_hash` defaults to the one from the last successful fetch.
    pub async fn push_to_confluence(&self, repo: &str, commit_hash: Option<&str>) -> OperationStatus {
        let snapshot = self.snapshot();
        let Some(access_code) = snapshot.session.confluence_token else {
            let status = OperationStatus::Failure(status::CONFLUENCE_NOT_LINKED.to_string());
            self.set_status(status.clone());
            return status;
        };
        let commit_hash = commit_hash
            .map(ToString::to_string)
            .or_else(|| snapshot.document.and_then(|d| d.commit_hash));

        self.set_status(OperationStatus::in_progress(status::CREATING));
        info!(repo, commit = commit_hash.as_deref().unwrap_or("-"), "pushing to Confluence");

        let request = CreateConfluenceRequest {
            repo_url: repo.trim().to_string(),
            cloud_id: snapshot.session.confluence_cloud_id,
            confluence_access_code: access_code,
            commit_hash,
        };
        let status = match self.backend.create_confluence(&request).await {
            Ok(()) => OperationStatus::success(status::PUSH_SUCCESS),
            Err(err) => classify_hook_error(&err, status::PUSH_FAILED),
        };
        self.set_status(status.clone());
        status
    }

    /// Registers the regeneration webhook on the repository.
    pub async fn setup_webhook(&self, repo: &str) -> OperationStatus {
        let Some(token) = self.session().github_token else {
            let status = OperationStatus::Failure(status::NOT_LOGGED_IN.to_string());
            self.set_status(status.clone());
            return status;
        };

        self.set_status(OperationStatus::in_progress(status::CREATING));
        info!(repo, "setting up webhook");

        let status = match self.backend.setup_webhook(repo.trim(), &token).await {
            Ok(()) => OperationStatus::success(status::WEBHOOK_SUCCESS),
            Err(err) => classify_hook_error(&err, status::WEBHOOK_FAILED),
        };
        self.set_status(status.clone());
        status
    }

    /// Replaces the document text with a local edit.
    pub fn edit_document(&self, content: impl Into<String>) {
        let content = content.into();
        self.state.send_modify(|s| match &mut s.document {
            Some(doc) => doc.content = content,
            None => {
                s.document = Some(GeneratedDocument {
                    content,
                    commit_hash: None,
                });
            }
        });
    }

    /// Returns the status to `Idle`, e.g. after the user edits a field.
    pub fn reset_status(&self) {
        self.set_status(OperationStatus::Idle);
    }
}

/// Text shown for a failed call: the server's message, else `fallback`.
fn failure_text(err: &BackendError, fallback: &str) -> String {
    err.server_message().unwrap_or(fallback).to_string()
}

/// Maps the known "hook already exists" reply to a notice.
fn classify_hook_error(err: &BackendError, fallback: &str) -> OperationStatus {
    if err.mentions(status::HOOK_EXISTS_MESSAGE) {
        info!("webhook already present on repository");
        return OperationStatus::Notice(status::HOOK_EXISTS_NOTICE.to_string());
    }
    warn!(error = %err, "backend call failed");
    OperationStatus::Failure(failure_text(err, fallback))
}
