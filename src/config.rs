use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

use crate::{DEFAULT_WS_URL, RECONNECT_DELAY};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment overrides, also read from `.env`.
pub const ENV_CLIENT_ID: &str = "VOLTA_CLIENT_ID";
pub const ENV_TOKEN: &str = "VOLTA_TOKEN";
pub const ENV_WS_URL: &str = "VOLTA_WS_URL";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Feed endpoint and the credentials appended to it.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub token: String,
}

fn default_url() -> String {
    DEFAULT_WS_URL.to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            client_id: String::new(),
            token: String::new(),
        }
    }
}

impl FeedConfig {
    /// Full channel URL with `clientId` and `token` query parameters.
    pub fn endpoint(&self) -> Result<Url> {
        if self.client_id.is_empty() {
            bail!("feed client id is not set (config [feed].client_id or {ENV_CLIENT_ID})");
        }
        if self.token.is_empty() {
            bail!("feed token is not set (config [feed].token or {ENV_TOKEN})");
        }
        let mut url =
            Url::parse(&self.url).with_context(|| format!("invalid feed url {}", self.url))?;
        url.query_pairs_mut()
            .append_pair("clientId", &self.client_id)
            .append_pair("token", &self.token);
        Ok(url)
    }
}

/// Runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// Delay before reconnecting after the channel closes on its own.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    RECONNECT_DELAY.as_millis() as u64
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl SettingsConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Override file values with `VOLTA_*` variables when set and non-empty.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(url) = get(ENV_WS_URL) {
            self.feed.url = url;
        }
        if let Some(client_id) = get(ENV_CLIENT_ID) {
            self.feed.client_id = client_id;
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.feed.token = token;
        }
    }
}
