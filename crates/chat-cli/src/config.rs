//! Configuration for the chat CLI.
//!
//! Covers only the operational settings spec.md declares out of scope for
//! the protocol core (server host, key/cert file layout, timeouts, log
//! level). The three wire-relevant arguments — port, username, password —
//! are CLI positionals, not config fields; see [`crate::Cli`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level chat CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Rendezvous server connection settings.
    pub server: ServerConfig,
    /// Identity material file layout.
    pub keys: KeysConfig,
    /// Protocol deadlines (§5).
    pub timeouts: TimeoutsConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Rendezvous server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname or IP. The port is supplied as a CLI positional.
    #[serde(default = "default_host")]
    pub host: String,
}

/// Identity material file layout (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Directory holding `<username>.pem` private key files.
    #[serde(default = "default_keys_dir")]
    pub directory: PathBuf,
    /// CA certificate used to verify the server's identity.
    #[serde(default = "default_ca_cert")]
    pub ca_cert: PathBuf,
    /// Certificate revocation list checked alongside the CA certificate.
    #[serde(default = "default_crl")]
    pub crl: PathBuf,
}

/// Protocol deadlines (§5: 10s control-reply, 30s handshake).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Seconds to wait for a reply to `show`/`talk` before failing.
    #[serde(default = "default_control_reply_secs")]
    pub control_reply_secs: u64,
    /// Seconds allowed for a full handshake to reach `READY`.
    #[serde(default = "default_handshake_secs")]
    pub handshake_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive (e.g. `info`, `debug`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from("keys")
}

fn default_ca_cert() -> PathBuf {
    PathBuf::from("FoundationsOfCybersecurity_cert.pem")
}

fn default_crl() -> PathBuf {
    PathBuf::from("FoundationsOfCybersecurity_crl.pem")
}

fn default_control_reply_secs() -> u64 {
    10
}

fn default_handshake_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            directory: default_keys_dir(),
            ca_cert: default_ca_cert(),
            crl: default_crl(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            control_reply_secs: default_control_reply_secs(),
            handshake_secs: default_handshake_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// The default config file location, `$XDG_CONFIG_HOME/chat/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("chat/config.toml")
    }

    /// Load from the default path, writing a fresh default file if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration values that `serde`'s defaults can't enforce.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is out of its valid range.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "invalid log level: {}. must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        if self.timeouts.control_reply_secs == 0 {
            anyhow::bail!("control_reply_secs must be at least 1");
        }
        if self.timeouts.handshake_secs == 0 {
            anyhow::bail!("handshake_secs must be at least 1");
        }

        if self.server.host.is_empty() {
            anyhow::bail!("server host must not be empty");
        }

        Ok(())
    }
}
