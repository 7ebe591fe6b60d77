//! Daemon configuration
//!
//! Loaded from a TOML or JSON file (detected by extension), then overridden by
//! command-line flags and `ETCD_HOST` / `ETCD_PORT`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::{CliError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub restart: RestartConfig,
    #[serde(default, rename = "mirror")]
    pub mirrors: Vec<MirrorConfig>,
}

/// Where to reach etcd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    /// Full URL; wins over `host` and `port`
    pub endpoint: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2379,
            endpoint: None,
        }
    }
}

impl StoreConfig {
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

/// Delay between restarts of a failed mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestartConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            max_interval_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RestartConfig {
    /// Backoff policy that never gives up.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            current_interval: Duration::from_millis(self.initial_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            multiplier: self.multiplier,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

/// One subtree to mirror and the directory that receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    pub subtree: String,
    pub target: PathBuf,
    #[serde(default = "default_fsync")]
    pub fsync: bool,
}

fn default_fsync() -> bool {
    true
}

/// Parse a `SUBTREE=DIR` command-line mirror.
pub fn parse_mirror(raw: &str) -> std::result::Result<MirrorConfig, String> {
    let Some((subtree, target)) = raw.split_once('=') else {
        return Err(format!("expected SUBTREE=DIR, got {:?}", raw));
    };
    if target.is_empty() {
        return Err(format!("missing target directory in {:?}", raw));
    }
    Ok(MirrorConfig {
        subtree: subtree.to_string(),
        target: PathBuf::from(target),
        fsync: true,
    })
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Format is detected from file extension:
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CliError::config(path, e.to_string()))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "toml" => toml::from_str(&content)
                .map_err(|e| CliError::config(path, format!("invalid TOML: {}", e))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| CliError::config(path, format!("invalid JSON: {}", e))),
            _ => Err(CliError::config(
                path,
                format!("unsupported format {:?}; expected .toml or .json", extension),
            )),
        }
    }

    /// Build the effective configuration: file, then flags and environment.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(host) = &cli.etcd_host {
            config.store.host = host.clone();
        }
        if let Some(port) = cli.etcd_port {
            config.store.port = port;
        }
        if let Some(endpoint) = &cli.endpoint {
            config.store.endpoint = Some(endpoint.clone());
        }
        config.mirrors.extend(cli.mirrors.iter().cloned());

        config.validate()?;
        Ok(config)
    }

    /// Check that there is work to do and that no two mirrors share a target.
    pub fn validate(&self) -> Result<()> {
        if self.mirrors.is_empty() {
            return Err(CliError::user(
                "No mirrors configured; pass --mirror SUBTREE=DIR or add a [[mirror]] table",
            ));
        }
        if self.restart.multiplier < 1.0 {
            return Err(CliError::user("restart.multiplier must be at least 1.0"));
        }

        let mut targets: Vec<PathBuf> = Vec::with_capacity(self.mirrors.len());
        for mirror in &self.mirrors {
            let target = dunce::simplified(&std::path::absolute(&mirror.target)?).to_path_buf();
            if let Some(other) = targets
                .iter()
                .find(|t| t.starts_with(&target) || target.starts_with(t))
            {
                return Err(CliError::user(format!(
                    "Mirror targets overlap: {} and {}",
                    other.display(),
                    target.display()
                )));
            }
            targets.push(target);
        }
        Ok(())
    }
}
