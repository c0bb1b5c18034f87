use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const CONFIG_ENV: &str = "TCPHTTP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "tcphttp.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Maximum tracing level: trace, debug, info, warn or error
    pub log_level: String,
}

/// Listener and per-connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Time a connection may sit without delivering a full request
    pub idle_timeout_secs: u64,
    /// TCP keep-alive probe period
    pub keepalive_interval_secs: u64,
    /// Per-write deadline; `None` lets a slow client stall its session
    pub write_timeout_secs: Option<u64>,
    /// Upper bound on the bytes of a single request, head and body together
    pub max_request_bytes: usize,
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 60,
            keepalive_interval_secs: 30,
            write_timeout_secs: Some(30),
            max_request_bytes: 1024 * 1024,
            read_buffer_size: 4096,
        }
    }
}

impl Config {
    /// Loads the YAML file named by `TCPHTTP_CONFIG` (or `tcphttp.yaml` when
    /// it exists), then applies the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn log_level(&self) -> anyhow::Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown log level {:?}", self.log_level))
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.log_level()?;
        if self.server.idle_timeout_secs == 0 {
            anyhow::bail!("server.idle_timeout_secs must be greater than zero");
        }
        if self.server.keepalive_interval_secs == 0 {
            anyhow::bail!("server.keepalive_interval_secs must be greater than zero");
        }
        if self.server.read_buffer_size == 0 {
            anyhow::bail!("server.read_buffer_size must be greater than zero");
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_secs.map(Duration::from_secs)
    }
}
