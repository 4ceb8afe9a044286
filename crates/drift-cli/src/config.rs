//! Environment-driven CLI configuration.
//!
//! The data directory, remote endpoint, and identity all come from the
//! environment (after `dotenvy` has loaded any `.env` file). Identity
//! resolution itself is an external flow; the CLI only consumes its result.

use std::env;
use std::path::PathBuf;

use drift_core::Identity;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub remote: Option<RemoteConfig>,
    pub identity: Option<Identity>,
}

impl CliConfig {
    pub fn from_env(data_dir_override: Option<PathBuf>) -> Self {
        let data_dir = data_dir_override
            .or_else(|| env::var_os("DRIFT_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        Self {
            data_dir,
            remote: remote_from_values(
                env::var("DRIFT_REMOTE_URL").ok(),
                env::var("DRIFT_REMOTE_KEY").ok(),
                env::var("DRIFT_ACCESS_TOKEN").ok(),
            ),
            identity: identity_from_values(
                env::var("DRIFT_USER_ID").ok(),
                env::var("DRIFT_USER_EMAIL").ok(),
            ),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drift")
}

fn remote_from_values(
    base_url: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
) -> Option<RemoteConfig> {
    let base_url = non_empty(base_url)?;
    let api_key = non_empty(api_key)?;
    Some(RemoteConfig {
        base_url,
        api_key,
        access_token: non_empty(access_token),
    })
}

fn identity_from_values(user_id: Option<String>, email: Option<String>) -> Option<Identity> {
    let mut identity = Identity::new(non_empty(user_id)?);
    if let Some(email) = non_empty(email) {
        identity = identity.with_email(email);
    }
    Some(identity)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
