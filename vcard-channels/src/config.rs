//! Runtime configuration
//!
//! Read from the JSON file named by `VCARD_CONFIG`, or `~/.vcard/config.json`
//! when that exists. Missing fields fall back to the defaults, which connect
//! to a local vpcd and install the two sample applets.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aid::{Aid, AidError};
use crate::applet::RegistryError;
use crate::applets;
use crate::card::atr;
use crate::channel::LogicalChannels;
use crate::runtime::{ChannelRuntime, Dispatcher};

/// Custom serde module for base64 encoding of byte vectors
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

pub const CONFIG_ENV: &str = "VCARD_CONFIG";
pub const HOST_ENV: &str = "VCARD_VPCD_HOST";
pub const PORT_ENV: &str = "VCARD_VPCD_PORT";

/// Port vpcd listens on for card connections
pub const DEFAULT_VPCD_PORT: u16 = 35963;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid applet AID: {0}")]
    InvalidAid(#[from] AidError),

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("cannot install applet: {0}")]
    Install(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Shareable,
    Exclusive,
}

/// One sample applet to install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppletSpec {
    /// AID in hex
    pub aid: String,
    pub kind: SelectionMode,
    pub package: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    pub implicit_select: bool,
    /// Empty means the built-in historical bytes
    #[serde(with = "base64_bytes")]
    pub atr_historical_bytes: Vec<u8>,
    pub applets: Vec<AppletSpec>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_VPCD_PORT,
            implicit_select: true,
            atr_historical_bytes: Vec::new(),
            applets: vec![
                AppletSpec {
                    aid: "D0000CAFE00001".to_string(),
                    kind: SelectionMode::Shareable,
                    package: "samples.multi".to_string(),
                },
                AppletSpec {
                    aid: "D0000CAFE00002".to_string(),
                    kind: SelectionMode::Exclusive,
                    package: "samples.single".to_string(),
                },
            ],
        }
    }
}

impl RuntimeConfig {
    /// `~/.vcard/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".vcard").join("config.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from the environment-selected file, then apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| Self::default_path().filter(|p| p.exists()));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply host/port overrides looked up through `var`
    pub fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = var(HOST_ENV) {
            self.host = host;
        }
        if let Some(port) = var(PORT_ENV) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }
        Ok(())
    }

    pub fn atr(&self) -> Vec<u8> {
        if self.atr_historical_bytes.is_empty() {
            atr::default_atr()
        } else {
            atr::build_atr(&self.atr_historical_bytes)
        }
    }

    /// Build a card with the configured applets installed, in file order
    pub fn build_runtime(&self) -> Result<ChannelRuntime, ConfigError> {
        let runtime = ChannelRuntime::new(Dispatcher::new(LogicalChannels::new()))
            .with_atr(self.atr())
            .with_implicit_select(self.implicit_select);

        for entry in &self.applets {
            let aid = Aid::from_hex(&entry.aid)?;
            let applet = applets::sample(aid.clone(), entry.kind == SelectionMode::Shareable);
            runtime.install(aid, entry.package.clone(), applet)?;
        }
        Ok(runtime)
    }
}
