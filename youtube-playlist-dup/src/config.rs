//! Runtime configuration, sourced from the environment (and an optional `.env` file).

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const CLIENT_ID_VAR: &str = "GOOGLE_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "GOOGLE_CLIENT_SECRET";
pub const TOKEN_FILE_VAR: &str = "YT_DUP_TOKEN_FILE";
pub const CONSENT_TIMEOUT_VAR: &str = "YT_DUP_CONSENT_TIMEOUT_SECS";

/// Name of the token cache file inside the user's home directory.
const TOKEN_FILE_NAME: &str = ".youtube_token.json";

/// The loopback address registered as redirect target with the OAuth client.
pub const CALLBACK_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::LOCALHOST),
    8080,
);
pub const CALLBACK_PATH: &str = "/oauth2callback";

const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set (e.g. in .env)")]
    MissingVar(&'static str),
    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("cannot determine the home directory for the token cache")]
    NoHomeDir,
    #[error("cannot load .env file")]
    Dotenv(#[source] dotenvy::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub token_file: PathBuf,
    pub callback_addr: SocketAddr,
    pub callback_path: String,
    /// How long to wait for the user to complete consent in the browser.
    pub consent_timeout: Duration,
}

impl Config {
    /// Loads `.env` (if any) and reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        check_dotenv(dotenvy::dotenv())?;
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };
        let client_id = required(CLIENT_ID_VAR)?;
        let client_secret = required(CLIENT_SECRET_VAR)?;

        let token_file = match lookup(TOKEN_FILE_VAR).filter(|v| !v.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(TOKEN_FILE_NAME),
        };

        let consent_timeout = match lookup(CONSENT_TIMEOUT_VAR) {
            None => DEFAULT_CONSENT_TIMEOUT,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidValue {
                        name: CONSENT_TIMEOUT_VAR,
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        name: CONSENT_TIMEOUT_VAR,
                        value: raw,
                        reason: "must be positive".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
        };

        Ok(Self {
            client_id,
            client_secret,
            token_file,
            callback_addr: CALLBACK_ADDR,
            callback_path: CALLBACK_PATH.to_string(),
            consent_timeout,
        })
    }
}

/// A missing `.env` is fine; one that exists but cannot be read or parsed is not.
fn check_dotenv(loaded: Result<PathBuf, dotenvy::Error>) -> Result<(), ConfigError> {
    match loaded {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env");
            Ok(())
        }
        Err(e) if e.not_found() => {
            tracing::trace!("no .env file");
            Ok(())
        }
        Err(e) => Err(ConfigError::Dotenv(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn reads_credentials_and_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (CLIENT_ID_VAR, "id.apps.googleusercontent.com"),
            (CLIENT_SECRET_VAR, " secret \n"),
            (TOKEN_FILE_VAR, "/tmp/yt/token.json"),
            (CONSENT_TIMEOUT_VAR, "42"),
        ]))
        .unwrap();

        assert_eq!(config.client_id, "id.apps.googleusercontent.com");
        assert_eq!(config.client_secret, "secret");
        assert_eq!(config.token_file, PathBuf::from("/tmp/yt/token.json"));
        assert_eq!(config.consent_timeout, Duration::from_secs(42));
        assert_eq!(config.callback_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.callback_path, "/oauth2callback");
    }

    #[test]
    fn missing_client_secret_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[(CLIENT_ID_VAR, "id")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(CLIENT_SECRET_VAR)));
    }

    #[test]
    fn blank_client_id_counts_as_missing() {
        let err = Config::from_lookup(lookup_from(&[
            (CLIENT_ID_VAR, "   "),
            (CLIENT_SECRET_VAR, "secret"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(CLIENT_ID_VAR)));
    }

    #[test]
    fn rejects_bad_consent_timeout() {
        for bad in ["soon", "0", "-5"] {
            let err = Config::from_lookup(lookup_from(&[
                (CLIENT_ID_VAR, "id"),
                (CLIENT_SECRET_VAR, "secret"),
                (TOKEN_FILE_VAR, "token.json"),
                (CONSENT_TIMEOUT_VAR, bad),
            ]))
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { name: CONSENT_TIMEOUT_VAR, .. }),
                "{bad} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn broken_dotenv_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "YT_DUP_BROKEN_DOTENV=\"never closed\n").unwrap();

        let loaded = dotenvy::from_path(&path).map(|()| path.clone());
        let err = check_dotenv(loaded).unwrap_err();
        assert!(matches!(err, ConfigError::Dotenv(_)), "got {err:?}");
    }

    #[test]
    fn absent_dotenv_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        let loaded = dotenvy::from_path(&path).map(|()| path.clone());
        assert!(check_dotenv(loaded).is_ok());
    }
}
