//! OAuth authorize URLs and redirect parsing for GitHub and Atlassian.
//!
//! Code-for-token exchange is done by the backend (see [`crate::backend`]);
//! this module only builds the consent URLs and reads the redirect.

use anyhow::Result;
use url::Url;

use crate::config::Config;

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const ATLASSIAN_AUTHORIZE_URL: &str = "https://auth.atlassian.com/authorize";
const ATLASSIAN_AUDIENCE: &str = "api.atlassian.com";

/// `state` value marking an Atlassian redirect.
pub const CONFLUENCE_STATE: &str = "confluence";

/// Scopes requested from Atlassian for creating and filling a space.
pub const CONFLUENCE_SCOPES: &[&str] = &[
    "offline_access",
    "write:space.permission:confluence",
    "read:space.permission:confluence",
    "read:space:confluence",
    "read:space-details:confluence",
    "write:space:confluence",
    "delete:space:confluence",
    "read:space.property:confluence",
    "write:space.property:confluence",
    "read:permission:confluence",
    "read:content:confluence",
    "write:content:confluence",
    "read:content-details:confluence",
    "delete:content:confluence",
    "read:page:confluence",
    "write:page:confluence",
    "delete:page:confluence",
    "read:attachment:confluence",
    "read:custom-content:confluence",
    "write:custom-content:confluence",
    "delete:custom-content:confluence",
    "read:template:confluence",
    "write:template:confluence",
    "read:user.property:confluence",
    "read:space.setting:confluence",
    "write:space.setting:confluence",
];

/// Which account a redirect belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    Confluence,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub",
            Provider::Confluence => "Confluence",
        }
    }
}

/// Parameters read once from an OAuth redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl OAuthCallback {
    /// Parses a redirect given as a full URL, a query string (with or without
    /// the leading `?`), or a bare authorization code.
    ///
    /// Empty values count as absent.
    pub fn parse(input: &str) -> Self {
        let value = input.trim();
        if value.is_empty() {
            return Self::default();
        }

        if let Ok(url) = Url::parse(value) {
            return Self::from_pairs(url.query_pairs());
        }

        let query = value.strip_prefix('?').unwrap_or(value);
        if query.contains('=') {
            return Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()));
        }

        Self {
            code: Some(query.to_string()),
            state: None,
        }
    }

    fn from_pairs<'a>(
        pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    ) -> Self {
        let mut callback = Self::default();
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" if callback.code.is_none() => callback.code = Some(value.into_owned()),
                "state" if callback.state.is_none() => callback.state = Some(value.into_owned()),
                _ => {}
            }
        }
        callback
    }

    /// Provider selected by `state`: the Confluence sentinel, otherwise GitHub.
    pub fn provider(&self) -> Provider {
        match self.state.as_deref() {
            Some(CONFLUENCE_STATE) => Provider::Confluence,
            _ => Provider::GitHub,
        }
    }
}

/// GitHub consent URL with the configured client id and scope.
///
/// # Errors
/// Returns an error if no GitHub client id is configured.
pub fn github_authorize_url(config: &Config) -> Result<String> {
    if config.github_client_id.trim().is_empty() {
        anyhow::bail!(
            "No GitHub client id configured. Set github_client_id in config or DOCGEN_GITHUB_CLIENT_ID"
        );
    }

    let mut url = Url::parse(GITHUB_AUTHORIZE_URL)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.github_client_id)
        .append_pair("scope", &config.github_scope);
    Ok(url.into())
}

/// Atlassian consent URL. Always forces the consent screen.
///
/// # Errors
/// Returns an error if no Confluence client id is configured.
pub fn confluence_authorize_url(config: &Config) -> Result<String> {
    if config.confluence_client_id.trim().is_empty() {
        anyhow::bail!(
            "No Confluence client id configured. Set confluence_client_id in config or DOCGEN_CONFLUENCE_CLIENT_ID"
        );
    }

    let scope = CONFLUENCE_SCOPES.join(" ");
    let mut url = Url::parse(ATLASSIAN_AUTHORIZE_URL)?;
    url.query_pairs_mut()
        .append_pair("audience", ATLASSIAN_AUDIENCE)
        .append_pair("client_id", &config.confluence_client_id)
        .append_pair("scope", &scope)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("state", CONFLUENCE_STATE)
        .append_pair("response_type", "code")
        .append_pair("prompt", "consent");
    Ok(url.into())
}

/// Opens a URL in the system browser.
///
/// Best effort: failures are logged, and nothing is opened when
/// `DOCGEN_NO_BROWSER` is set.
pub fn open_in_browser(url: &str) {
    if std::env::var_os("DOCGEN_NO_BROWSER").is_some() {
        tracing::debug!("DOCGEN_NO_BROWSER set, not opening browser");
        return;
    }
    if let Err(err) = open::that(url) {
        tracing::warn!(error = %err, "failed to open browser");
    }
}
