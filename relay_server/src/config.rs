use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{fs, net::SocketAddr};

/// Server configuration persisted as TOML.
///
/// Missing keys fall back to their defaults, so an old file keeps working
/// after new settings are added.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Seats in a newly created session.
    pub default_capacity: usize,
    /// Width of generated session codes, in decimal digits.
    pub code_length: usize,
    /// Lowest client API version accepted when creating a session.
    pub min_api_version: u8,
    pub heartbeat_interval_secs: u64,
    /// Depth of each connection's outbound queue.
    pub outbound_buffer: usize,
    /// Directory served as static client assets.
    pub static_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            default_capacity: 6,
            code_length: 5,
            min_api_version: 0,
            heartbeat_interval_secs: 10,
            outbound_buffer: 256,
            static_dir: "public".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`. If the file does not exist, create it
    /// with reasonable defaults and return the default config.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)
                .with_context(|| format!("reading config file '{}'", path.display()))?;
            let cfg: Config = toml::from_str(&s)
                .with_context(|| format!("parsing TOML config '{}'", path.display()))?;
            Ok(cfg)
        } else {
            let cfg = Config::default();
            cfg.save(path)
                .with_context(|| format!("writing default config to '{}'", path.display()))?;
            Ok(cfg)
        }
    }

    /// Save the current config state back to the provided path (overwrites).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating config directory '{}'", parent.display()))?;
            }
        }
        let toml_text =
            toml::to_string_pretty(&self).with_context(|| "serializing config to TOML")?;
        fs::write(path, toml_text)
            .with_context(|| format!("writing config to '{}'", path.display()))?;
        Ok(())
    }

    /// Validate, then save. An unusable config never reaches disk.
    pub fn persist(&self, path: &Path) -> Result<()> {
        self.validate()
            .with_context(|| format!("refusing to persist invalid config to '{}'", path.display()))?;
        self.socket_addr()?;
        self.save(path)
    }

    /// Reject settings the relay cannot honor.
    ///
    /// Slot indices and occupant counts travel as single bytes, which bounds
    /// the capacity; codes are parsed as at most 18 decimal digits.
    pub fn validate(&self) -> Result<()> {
        if self.default_capacity == 0 || self.default_capacity > u8::MAX as usize {
            bail!(
                "default_capacity must be between 1 and {}, got {}",
                u8::MAX,
                self.default_capacity
            );
        }
        if self.code_length == 0 || self.code_length > 18 {
            bail!("code_length must be between 1 and 18, got {}", self.code_length);
        }
        if self.heartbeat_interval_secs == 0 {
            bail!("heartbeat_interval_secs must be positive");
        }
        if self.outbound_buffer == 0 {
            bail!("outbound_buffer must be positive");
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address '{}:{}'", self.bind, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_created_with_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("relay.toml");
        let cfg = Config::load_or_create(&path)?;
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_or_create(&path)?;
        assert_eq!(reloaded, cfg);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("relay.toml");
        fs::write(&path, "port = 9000\ndefault_capacity = 4\n")?;
        let cfg = Config::load_or_create(&path)?;
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.default_capacity, 4);
        assert_eq!(cfg.code_length, 5);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn validation_bounds() {
        assert!(Config::default().validate().is_ok());

        let cfg = Config { default_capacity: 0, ..Config::default() };
        assert!(cfg.validate().is_err());
        let cfg = Config { default_capacity: 256, ..Config::default() };
        assert!(cfg.validate().is_err());
        let cfg = Config { code_length: 19, ..Config::default() };
        assert!(cfg.validate().is_err());
        let cfg = Config { heartbeat_interval_secs: 0, ..Config::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn persist_refuses_invalid_config() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("relay.toml");
        fs::write(&path, "default_capacity = 0\n")?;
        let cfg = Config::load_or_create(&path)?;

        assert!(cfg.persist(&path).is_err());
        assert_eq!(fs::read_to_string(&path)?, "default_capacity = 0\n");

        let fixed = Config { default_capacity: 3, ..cfg };
        fixed.persist(&path)?;
        assert_eq!(Config::load_or_create(&path)?.default_capacity, 3);
        Ok(())
    }

    #[test]
    fn socket_addr_from_bind_and_port() -> Result<()> {
        let cfg = Config { bind: "127.0.0.1".into(), port: 4000, ..Config::default() };
        assert_eq!(cfg.socket_addr()?, "127.0.0.1:4000".parse::<SocketAddr>()?);
        Ok(())
    }
}
