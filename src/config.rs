use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    #[serde(default = "default_host_root")]
    pub host_root: String,
    #[serde(default = "default_pid1_root")]
    pub pid1_root: String,
    #[serde(default = "default_nsenter_timeout_secs")]
    pub nsenter_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9105".to_string(),
            host_root: default_host_root(),
            pid1_root: default_pid1_root(),
            nsenter_timeout_secs: default_nsenter_timeout_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port address".to_string(),
            ));
        }
        if self.host_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "host_root must not be empty".to_string(),
            ));
        }
        if self.pid1_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "pid1_root must not be empty".to_string(),
            ));
        }
        if !(1..=30).contains(&self.nsenter_timeout_secs) {
            return Err(ConfigError::Validation(
                "nsenter_timeout_secs must be in range 1..=30".to_string(),
            ));
        }

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_host_root() -> String {
    "/host".to_string()
}

fn default_pid1_root() -> String {
    "/proc/1/root".to_string()
}

const fn default_nsenter_timeout_secs() -> u64 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            listen: "127.0.0.1:9105".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        valid_config().validate().expect("config should validate");
    }

    #[test]
    fn rejects_bad_listen_addr() {
        let mut cfg = valid_config();
        cfg.listen = "not-an-addr".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_nsenter_timeout() {
        let mut cfg = valid_config();
        cfg.nsenter_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg: Config = serde_yaml::from_str("listen: \"0.0.0.0:9105\"\n").unwrap();
        assert_eq!(cfg.host_root, "/host");
        assert_eq!(cfg.pid1_root, "/proc/1/root");
        assert_eq!(cfg.nsenter_timeout_secs, 3);
        cfg.validate().expect("defaults should validate");
    }

    #[test]
    fn example_yaml_parses_and_validates() {
        let cfg: Config = serde_yaml::from_str(Config::example_yaml()).unwrap();
        cfg.validate().expect("example config should validate");
    }
}
