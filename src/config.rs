//! Runtime configuration.
//!
//! Read from the YAML file named by `PROXYCHAIN_CONFIG` when set; `LISTEN`
//! overrides the listen address either way.
//!
//! ```yaml
//! listen_addr: 0.0.0.0:8080
//! request_timeout_secs: 20
//! request_modifiers:
//!   - kind: spoof-referrer-google
//!   - kind: set-header
//!     name: DNT
//!     value: "1"
//! ```

use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use crate::modifiers;
use crate::proxy::ModificationRef;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listen_addr: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// One of `trace`, `debug`, `info`, `warn`, `error`
    pub log_level: String,
    /// Path prefix that asks for a readable outline instead of the raw page
    pub outline_prefix: String,
    /// Applied, in order, to every proxied request
    pub request_modifiers: Vec<RequestModifierConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
            outline_prefix: "/outline/".to_string(),
            request_modifiers: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("PROXYCHAIN_CONFIG") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                Self::from_yaml(&text).with_context(|| format!("invalid config file {path}"))?
            }
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        if !cfg.outline_prefix.starts_with('/') || !cfg.outline_prefix.ends_with('/') {
            anyhow::bail!("outline_prefix must start and end with '/'");
        }
        Ok(cfg)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// A request modifier named in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RequestModifierConfig {
    SpoofReferrerGoogle,
    SpoofReferrerTwitter,
    SpoofReferrerBaidu,
    SetHeader { name: String, value: String },
    DeleteHeader { name: String },
}

impl RequestModifierConfig {
    /// Builds the modification for a request to `url`.
    pub fn build(&self, url: &str) -> ModificationRef {
        match self {
            RequestModifierConfig::SpoofReferrerGoogle => {
                modifiers::spoof_referrer_from_google_search(url)
            }
            RequestModifierConfig::SpoofReferrerTwitter => {
                modifiers::spoof_referrer_from_twitter_post(url)
            }
            RequestModifierConfig::SpoofReferrerBaidu => {
                modifiers::spoof_referrer_from_baidu_search(url)
            }
            RequestModifierConfig::SetHeader { name, value } => {
                modifiers::set_request_header(name.as_str(), value.as_str())
            }
            RequestModifierConfig::DeleteHeader { name } => {
                modifiers::delete_request_header(name.as_str())
            }
        }
    }
}
