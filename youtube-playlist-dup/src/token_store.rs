//! On-disk persistence for the OAuth token.
//!
//! The token lives in a single JSON file (by default `~/.youtube_token.json`) using the same
//! layout as the provider's token JSON: `access_token`, `token_type`, `refresh_token` and
//! `expiry`. There is no in-memory cache; every call goes to disk.

use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::{BasicTokenResponse, BasicTokenType};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lifetime assumed for access tokens whose response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Access tokens are renewed this long before they actually expire.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// An OAuth access token together with what is needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    /// Usually `Bearer`.
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token stops being accepted.
    pub expiry: Timestamp,
}

impl StoredToken {
    /// Converts a fresh token endpoint response, anchoring `expires_in` at the current time.
    pub fn from_response(response: &BasicTokenResponse) -> Self {
        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let now = Timestamp::now();
        Self {
            access_token: response.access_token().secret().clone(),
            token_type: match response.token_type() {
                BasicTokenType::Extension(other) => other.clone(),
                BasicTokenType::Mac => "MAC".to_string(),
                _ => "Bearer".to_string(),
            },
            refresh_token: response.refresh_token().map(|rt| rt.secret().clone()),
            expiry: now.checked_add(lifetime).unwrap_or(Timestamp::MAX),
        }
    }

    /// True if the access token expires within `margin` from now (or already has).
    pub fn expires_within(&self, margin: Duration) -> bool {
        let Ok(margin) = SignedDuration::try_from(margin) else {
            return true;
        };
        match self.expiry.checked_sub(margin) {
            Ok(deadline) => Timestamp::now() >= deadline,
            Err(_) => true,
        }
    }

    /// A token can be used if it can be renewed, or if it stays valid for longer than
    /// [`REFRESH_MARGIN`].
    pub fn is_usable(&self) -> bool {
        self.refresh_token.is_some() || !self.expires_within(REFRESH_MARGIN)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("no cached token at {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cached token at {} is malformed", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write token to {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads and writes the cached token at a fixed path.
///
/// Single-process use only; nothing guards against two processes writing at once.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached token.
    ///
    /// An absent or unreadable file is [`TokenStoreError::NotFound`]; a file that exists but
    /// does not parse is [`TokenStoreError::Malformed`].
    pub fn load(&self) -> Result<StoredToken, TokenStoreError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| TokenStoreError::NotFound {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| TokenStoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the cached token.
    ///
    /// The new content is written to a sibling temporary file which is then renamed over the
    /// target, so a reader sees either the old token or the new one.
    pub fn save(&self, token: &StoredToken) -> Result<(), TokenStoreError> {
        let io_err = |source: std::io::Error| TokenStoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let content = serde_json::to_vec_pretty(token).map_err(|e| io_err(e.into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;

        // owner read/write only; the file holds a long-lived credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        tmp.write_all(&content).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::debug!(path = %self.path.display(), "saved OAuth token");
        Ok(())
    }
}
