//! Operation status shown to the user after each action.

use std::fmt;

pub const GENERATING: &str = "Generating Content…";
pub const CREATING: &str = "Creating…";
pub const FETCH_SUCCESS: &str = "Fetch successful!";
pub const PUSH_SUCCESS: &str = "Push successful!";
pub const WEBHOOK_SUCCESS: &str = "Webhook created!";
pub const FETCH_FAILED: &str = "Failed to fetch document";
pub const PUSH_FAILED: &str = "Failed to push to Confluence";
pub const WEBHOOK_FAILED: &str = "Failed to set up webhook";
pub const REPO_REQUIRED: &str = "Enter a repository as owner/name";
pub const NOT_LOGGED_IN: &str = "Log in with GitHub first";
pub const CONFLUENCE_NOT_LINKED: &str = "Link your Confluence account first";

/// Literal the backend returns when GitHub already has our webhook.
pub const HOOK_EXISTS_MESSAGE: &str = "Hook already exists on this repository";
/// What the user sees instead of a failure in that case.
pub const HOOK_EXISTS_NOTICE: &str = "Webhook already exists on this repository";

/// Progress of the most recent user action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperationStatus {
    #[default]
    Idle,
    InProgress(String),
    Success(String),
    Failure(String),
    /// Informational outcome that is not an error.
    Notice(String),
}

impl OperationStatus {
    pub fn in_progress(label: &str) -> Self {
        Self::InProgress(label.to_string())
    }

    pub fn success(message: &str) -> Self {
        Self::Success(message.to_string())
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::InProgress(m) | Self::Success(m) | Self::Failure(m) | Self::Notice(m) => {
                Some(m)
            }
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or(""))
    }
}
