use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::youtube::DEFAULT_BASE_URL;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_SCRATCH_DIR: &str = "tmp";
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;

/// Optional on-disk settings, every key may be omitted
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub yt_dlp: Option<String>,
    pub subtitle_lang: Option<String>,
    pub innertube_base_url: Option<String>,
}

impl Config {
    /// Load config from the given path, or ~/.config/ytx-server/config.toml if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config =
                toml::from_str(&content).wrap_err_with(|| format!("invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytx-server")
        .join("config.toml")
}

/// Settings resolved at startup and handed to the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub scratch_dir: PathBuf,
    pub request_timeout: Duration,
    pub yt_dlp: String,
    pub subtitle_lang: String,
    pub innertube_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            yt_dlp: "yt-dlp".to_string(),
            subtitle_lang: "en".to_string(),
            innertube_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Fill in defaults from the config file, then the built-in values
    pub fn from_file(config: Config) -> Self {
        let defaults = Self::default();
        Self {
            bind: config.bind.unwrap_or(defaults.bind),
            port: config.port.unwrap_or(defaults.port),
            scratch_dir: config.scratch_dir.unwrap_or(defaults.scratch_dir),
            request_timeout: config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            yt_dlp: config.yt_dlp.unwrap_or(defaults.yt_dlp),
            subtitle_lang: config.subtitle_lang.unwrap_or(defaults.subtitle_lang),
            innertube_base_url: config.innertube_base_url.unwrap_or(defaults.innertube_base_url),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse().wrap_err_with(|| format!("invalid listen address {addr}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
port = 8080
bind = "127.0.0.1"
scratch_dir = "/var/tmp/ytx"
request_timeout_secs = 30
yt_dlp = "/usr/local/bin/yt-dlp"
subtitle_lang = "de"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.scratch_dir, Some(PathBuf::from("/var/tmp/ytx")));
        assert_eq!(config.request_timeout_secs, Some(30));
        assert_eq!(config.yt_dlp.as_deref(), Some("/usr/local/bin/yt-dlp"));
        assert_eq!(config.subtitle_lang.as_deref(), Some("de"));
        assert!(config.innertube_base_url.is_none());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.port.is_none());
        assert!(config.scratch_dir.is_none());
    }

    #[test]
    fn test_server_config_defaults() {
        let server = ServerConfig::from_file(Config::default());
        assert_eq!(server.port, DEFAULT_PORT);
        assert_eq!(server.scratch_dir, PathBuf::from(DEFAULT_SCRATCH_DIR));
        assert_eq!(server.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(server.yt_dlp, "yt-dlp");
        assert_eq!(server.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_server_config_from_partial_file() {
        let config: Config = toml::from_str(r#"port = 9000"#).unwrap();
        let server = ServerConfig::from_file(config);
        assert_eq!(server.port, 9000);
        assert_eq!(server.bind, DEFAULT_BIND);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(config.port.is_none());
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_bad_bind_address() {
        let server = ServerConfig {
            bind: "not an address".to_string(),
            ..ServerConfig::default()
        };
        assert!(server.socket_addr().is_err());
    }
}
