//! Client configuration
//!
//! Loaded from an optional TOML file, then overlaid with the deployment
//! environment variables the platform's tooling exports.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::principal::Principal;
use crate::session::AuthMode;

/// Donation ledger id used when no override is configured
pub const DEFAULT_DONATION_CANISTER: &str = "u6s2n-gx777-77774-qaaba-cai";
/// NFT registry id used when no override is configured
pub const DEFAULT_NFT_CANISTER: &str = "uzt4z-lp777-77774-qaabq-cai";
/// Token ledger id used when no override is configured
pub const DEFAULT_TOKEN_CANISTER: &str = "cngnf-vqaaa-aaaar-qag4q-cai";

const LOCAL_HOST: &str = "http://127.0.0.1:4943";
const IC_HOST: &str = "https://mainnet.dfinity.network";

/// Which deployment the client talks to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Local development replica; ephemeral identities
    #[default]
    Local,
    /// Production network; delegated login through the identity provider
    Ic,
}

impl std::str::FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Network::Local),
            "ic" | "mainnet" => Ok(Network::Ic),
            other => anyhow::bail!("unknown network '{}', expected 'local' or 'ic'", other),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Deployment selector
    #[serde(default)]
    pub network: Network,

    /// Replica URL; defaults depend on `network`
    pub host: Option<String>,

    /// Donation ledger override
    pub donation_canister: Option<Principal>,

    /// NFT registry override
    pub nft_canister: Option<Principal>,

    /// Token ledger override
    pub token_canister: Option<Principal>,

    /// Identity provider used for delegated login
    #[serde(default = "default_identity_provider_url")]
    pub identity_provider_url: String,

    /// Where the encrypted session is kept; `None` selects the default path
    pub session_file: Option<PathBuf>,

    /// Token display decimals
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,

    /// Token display symbol
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,

    /// HTTP timeout per remote call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long to wait for the identity provider callback
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,

    /// Loopback port for the login callback; 0 picks a free port
    #[serde(default)]
    pub callback_port: u16,

    /// Requested delegation lifetime
    #[serde(default = "default_delegation_ttl")]
    pub delegation_ttl_secs: u64,
}

fn default_identity_provider_url() -> String {
    "https://identity.ic0.app".to_string()
}

fn default_token_decimals() -> u8 {
    crate::amount::DEFAULT_DECIMALS
}

fn default_token_symbol() -> String {
    "ckUSDT".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_login_timeout() -> u64 {
    300
}

fn default_delegation_ttl() -> u64 {
    8 * 60 * 60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            host: None,
            donation_canister: None,
            nft_canister: None,
            token_canister: None,
            identity_provider_url: default_identity_provider_url(),
            session_file: None,
            token_decimals: default_token_decimals(),
            token_symbol: default_token_symbol(),
            request_timeout_secs: default_request_timeout(),
            login_timeout_secs: default_login_timeout(),
            callback_port: 0,
            delegation_ttl_secs: default_delegation_ttl(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay deployment environment variables.
    ///
    /// Takes the variables as pairs so callers decide where they come from;
    /// `main` passes `std::env::vars()` once at startup.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "DFX_NETWORK" => self.network = value.parse()?,
                "DONATION_CLIENT_HOST" => self.host = Some(value.to_string()),
                "CANISTER_ID_DONATION_CANISTER" => {
                    self.donation_canister = Some(parse_canister(key.as_ref(), value)?)
                }
                "CANISTER_ID_NFT_CANISTER" => {
                    self.nft_canister = Some(parse_canister(key.as_ref(), value)?)
                }
                "CKUSDT_CANISTER_ID" => {
                    self.token_canister = Some(parse_canister(key.as_ref(), value)?)
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(host) = &self.host {
            url::Url::parse(host)
                .map_err(|e| anyhow::anyhow!("host '{}' is not a valid URL: {}", host, e))?;
        }
        url::Url::parse(&self.identity_provider_url).map_err(|e| {
            anyhow::anyhow!(
                "identity_provider_url '{}' is not a valid URL: {}",
                self.identity_provider_url,
                e
            )
        })?;

        if self.token_decimals > crate::amount::MAX_DECIMALS {
            anyhow::bail!(
                "token_decimals must be at most {}, got {}",
                crate::amount::MAX_DECIMALS,
                self.token_decimals
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if self.login_timeout_secs == 0 {
            anyhow::bail!("login_timeout_secs must be positive");
        }
        if self.delegation_ttl_secs == 0 {
            anyhow::bail!("delegation_ttl_secs must be positive");
        }
        Ok(())
    }

    /// Replica URL for the selected network
    pub fn host(&self) -> &str {
        match (&self.host, self.network) {
            (Some(host), _) => host,
            (None, Network::Local) => LOCAL_HOST,
            (None, Network::Ic) => IC_HOST,
        }
    }

    pub fn donation_canister(&self) -> Principal {
        self.donation_canister
            .unwrap_or_else(|| fallback(DEFAULT_DONATION_CANISTER))
    }

    pub fn nft_canister(&self) -> Principal {
        self.nft_canister
            .unwrap_or_else(|| fallback(DEFAULT_NFT_CANISTER))
    }

    pub fn token_canister(&self) -> Principal {
        self.token_canister
            .unwrap_or_else(|| fallback(DEFAULT_TOKEN_CANISTER))
    }

    /// How `connect` acquires an identity on this network
    pub fn auth_mode(&self) -> AuthMode {
        match self.network {
            Network::Local => AuthMode::Ephemeral,
            Network::Ic => AuthMode::Delegated,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn delegation_ttl(&self) -> Duration {
        Duration::from_secs(self.delegation_ttl_secs)
    }

    /// Session file path, defaulting to `~/.donation-client/session.json`
    pub fn session_path(&self) -> PathBuf {
        self.session_file.clone().unwrap_or_else(default_session_path)
    }
}

/// Default location of the session store
pub fn default_session_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".donation-client")
        .join("session.json")
}

fn parse_canister(key: &str, value: &str) -> anyhow::Result<Principal> {
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("{} is not a valid canister id: {}", key, e))
}

// The fallback ids are checked by the tests below.
fn fallback(text: &str) -> Principal {
    text.parse().unwrap_or_else(|_| Principal::management())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.network, Network::Local);
        assert_eq!(config.host(), "http://127.0.0.1:4943");
        assert_eq!(config.token_decimals, 6);
        assert_eq!(config.auth_mode(), AuthMode::Ephemeral);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fallback_canister_ids_parse() {
        for text in [
            DEFAULT_DONATION_CANISTER,
            DEFAULT_NFT_CANISTER,
            DEFAULT_TOKEN_CANISTER,
        ] {
            let principal: Principal = text.parse().unwrap();
            assert_eq!(principal.to_string(), text);
        }
        let config = ClientConfig::default();
        assert_eq!(config.donation_canister().to_string(), DEFAULT_DONATION_CANISTER);
        assert_eq!(config.nft_canister().to_string(), DEFAULT_NFT_CANISTER);
        assert_eq!(config.token_canister().to_string(), DEFAULT_TOKEN_CANISTER);
    }

    #[test]
    fn test_ic_network() {
        let config = ClientConfig {
            network: Network::Ic,
            ..Default::default()
        };
        assert_eq!(config.host(), "https://mainnet.dfinity.network");
        assert_eq!(config.auth_mode(), AuthMode::Delegated);
    }

    #[test]
    fn test_apply_env() {
        let mut config = ClientConfig::default();
        config
            .apply_env([
                ("DFX_NETWORK", "ic"),
                ("CANISTER_ID_NFT_CANISTER", "u6s2n-gx777-77774-qaaba-cai"),
                ("DONATION_CLIENT_HOST", "http://replica:8080"),
                ("CKUSDT_CANISTER_ID", ""),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.network, Network::Ic);
        assert_eq!(config.host(), "http://replica:8080");
        assert_eq!(
            config.nft_canister().to_string(),
            "u6s2n-gx777-77774-qaaba-cai"
        );
        assert_eq!(config.token_canister().to_string(), DEFAULT_TOKEN_CANISTER);
    }

    #[test]
    fn test_apply_env_rejects_bad_canister() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_env([("CANISTER_ID_DONATION_CANISTER", "not-a-principal")])
            .unwrap_err();
        assert!(err.to_string().contains("CANISTER_ID_DONATION_CANISTER"));
    }

    #[test]
    fn test_from_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            network = "ic"
            token_decimals = 8
            donation_canister = "uzt4z-lp777-77774-qaabq-cai"
            "#,
        )
        .unwrap();
        assert_eq!(config.network, Network::Ic);
        assert_eq!(config.token_decimals, 8);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.donation_canister().to_string(), DEFAULT_NFT_CANISTER);
    }

    #[test]
    fn test_validate_rejects_large_decimals() {
        let config = ClientConfig {
            token_decimals: 20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        let config = ClientConfig {
            host: Some("not a url".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
