//! Tap configuration.
//!
//! Values come from an optional config file (`.json` or `.toml`), overridden
//! field by field by CLI flags and environment variables. Both upstream URLs
//! are required; a run fails before any request when one is missing.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use decentraland_poaps_source::TransportOpts;
use serde::{Deserialize, Serialize};

use crate::TapOpts;

mod duration;

pub use duration::parse_duration;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Config file contents. Every field is optional here; missing values may
/// still be supplied on the command line.
///
/// Unknown keys are ignored so a Singer config shared with other taps loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub poaps_xdai_url: Option<String>,
    pub poaps_details_url: Option<String>,
    pub request_timeout: Option<String>,
    pub user_agent: Option<String>,
}

impl ConfigFile {
    /// Load a config file, choosing the format by extension.
    ///
    /// `.toml` files are parsed as TOML, everything else as JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML config file: {}", path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config file: {}", path.display()))
        }
    }

    /// Overlay the values given on the command line.
    pub fn merge_opts(mut self, opts: &TapOpts) -> Self {
        if let Some(url) = &opts.poaps_xdai_url {
            self.poaps_xdai_url = Some(url.clone());
        }
        if let Some(url) = &opts.poaps_details_url {
            self.poaps_details_url = Some(url.clone());
        }
        if let Some(timeout) = &opts.request_timeout {
            self.request_timeout = Some(timeout.clone());
        }
        if let Some(user_agent) = &opts.user_agent {
            self.user_agent = Some(user_agent.clone());
        }
        self
    }
}

/// Validated configuration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapConfig {
    /// GraphQL endpoint of the xDai POAP subgraph.
    pub poaps_xdai_url: String,
    /// Base URL of the POAP REST API.
    pub poaps_details_url: String,
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
}

impl TapConfig {
    /// Resolve the configuration from the config file (if any) and CLI options.
    pub fn resolve(opts: &TapOpts) -> anyhow::Result<Self> {
        let file = match &opts.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::from_file(file.merge_opts(opts))
    }

    /// Validate a merged config file.
    pub fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        let poaps_xdai_url = required_url(
            file.poaps_xdai_url,
            "poaps_xdai_url",
            "--poaps-xdai-url",
            "POAPS_XDAI_URL",
        )?;
        let poaps_details_url = required_url(
            file.poaps_details_url,
            "poaps_details_url",
            "--poaps-details-url",
            "POAPS_DETAILS_URL",
        )?;

        let request_timeout = match file.request_timeout {
            Some(value) => parse_duration(&value)
                .with_context(|| format!("Invalid request_timeout '{value}'"))?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };
        if request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than zero");
        }

        Ok(Self {
            poaps_xdai_url,
            poaps_details_url,
            request_timeout,
            user_agent: file.user_agent.filter(|ua| !ua.trim().is_empty()),
        })
    }

    pub fn transport_opts(&self) -> TransportOpts {
        TransportOpts {
            timeout: self.request_timeout,
            user_agent: self.user_agent.clone(),
        }
    }
}

fn required_url(
    value: Option<String>,
    key: &str,
    flag: &str,
    env: &str,
) -> anyhow::Result<String> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Missing required config value '{key}' (set it in the config file, {flag} or {env})"
            )
        })?;

    if !(value.starts_with("http://") || value.starts_with("https://")) {
        anyhow::bail!("Config value '{key}' must be an http(s) URL, got '{value}'");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn full_file() -> ConfigFile {
        ConfigFile {
            poaps_xdai_url: Some("https://subgraph.example/poap-xdai".to_string()),
            poaps_details_url: Some("https://api.poap.example".to_string()),
            request_timeout: None,
            user_agent: None,
        }
    }

    #[test]
    fn test_load_json_config_ignores_unknown_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "config.json",
            r#"{
                "poaps_xdai_url": "https://subgraph.example/poap-xdai",
                "poaps_details_url": "https://api.poap.example",
                "request_timeout": "10s",
                "start_date": "2021-01-01"
            }"#,
        );

        let file = ConfigFile::load(&path).unwrap();
        let config = TapConfig::from_file(file).unwrap();
        assert_eq!(config.poaps_details_url, "https://api.poap.example");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_load_toml_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "tap.toml",
            r#"
poaps_xdai_url = "https://subgraph.example/poap-xdai"
poaps_details_url = "https://api.poap.example"
user_agent = "analytics-bot"
"#,
        );

        let config = TapConfig::from_file(ConfigFile::load(&path).unwrap()).unwrap();
        assert_eq!(config.poaps_xdai_url, "https://subgraph.example/poap-xdai");
        assert_eq!(config.user_agent.as_deref(), Some("analytics-bot"));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_cli_values_override_file() {
        let opts = TapOpts {
            poaps_details_url: Some("http://localhost:9000".to_string()),
            request_timeout: Some("2m".to_string()),
            ..Default::default()
        };

        let config = TapConfig::from_file(full_file().merge_opts(&opts)).unwrap();
        assert_eq!(config.poaps_details_url, "http://localhost:9000");
        assert_eq!(config.poaps_xdai_url, "https://subgraph.example/poap-xdai");
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_missing_url_fails_with_hint() {
        let file = ConfigFile {
            poaps_xdai_url: None,
            ..full_file()
        };
        let err = TapConfig::from_file(file).unwrap_err().to_string();
        assert!(err.contains("poaps_xdai_url"));
        assert!(err.contains("POAPS_XDAI_URL"));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let file = ConfigFile {
            poaps_details_url: Some("ftp://api.poap.example".to_string()),
            ..full_file()
        };
        assert!(TapConfig::from_file(file).is_err());
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let file = ConfigFile {
            request_timeout: Some("forever".to_string()),
            ..full_file()
        };
        assert!(TapConfig::from_file(file).is_err());

        let file = ConfigFile {
            request_timeout: Some("0s".to_string()),
            ..full_file()
        };
        assert!(TapConfig::from_file(file).is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ConfigFile::load(&dir.path().join("absent.json")).is_err());
    }
}
