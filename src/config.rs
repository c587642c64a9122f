// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::core::constants::config::{
    ENV_ALLOW_NETWORK, ENV_CONFIG_PATH, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,
    pub log_format: String, // "json" or "text"
    pub allow_network: bool,
    pub timeout_secs: Option<u64>,
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Keys a YAML config file may set. Absent keys leave the current value alone.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    log_level: Option<String>,
    log_format: Option<String>,
    allow_network: Option<bool>,
    timeout_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let allow_network = match env::var(ENV_ALLOW_NETWORK) {
            Ok(v) => parse_bool(&v).ok_or(ConfigError::InvalidEnv {
                var: ENV_ALLOW_NETWORK,
                value: v,
            })?,
            Err(_) => defaults.allow_network,
        };
        let timeout_secs = match env::var(ENV_TIMEOUT_SECS) {
            Ok(v) => Some(v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TIMEOUT_SECS,
                value: v,
            })?),
            Err(_) => defaults.timeout_secs,
        };

        Ok(Self {
            log_level: env::var(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_format: env::var(ENV_LOG_FORMAT).unwrap_or(defaults.log_format),
            allow_network,
            timeout_secs,
            config_path: env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from),
        })
    }

    /// Overlay the keys present in a YAML file onto this config.
    pub fn load_yaml(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        self.config_path = Some(path.to_path_buf());
        Ok(())
    }

    fn apply_yaml(&mut self, content: &str) -> Result<(), serde_yaml_ng::Error> {
        let file: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml_ng::from_str(content)?
        };
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.log_format {
            self.log_format = v;
        }
        if let Some(v) = file.allow_network {
            self.allow_network = v;
        }
        if let Some(v) = file.timeout_secs {
            self.timeout_secs = Some(v);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            allow_network: false,
            timeout_secs: None,
            config_path: None,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deny_network_and_have_no_deadline() {
        let config = Config::default();
        assert!(!config.allow_network);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.log_format, "text");
    }

    #[test]
    fn test_yaml_overlay_only_touches_present_keys() {
        let mut config = Config::default();
        config
            .apply_yaml("allow_network: true\ntimeout_secs: 30\n")
            .unwrap();
        assert!(config.allow_network);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_yaml_rejects_unknown_keys() {
        let mut config = Config::default();
        assert!(config.apply_yaml("allow_net: true\n").is_err());
    }

    #[test]
    fn test_empty_yaml_is_a_no_op() {
        let mut config = Config::default();
        config.apply_yaml("").unwrap();
        assert!(!config.allow_network);
    }

    #[test]
    fn test_load_yaml_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelltool.yaml");
        std::fs::write(&path, "log_format: json\n").unwrap();

        let mut config = Config::default();
        config.load_yaml(&path).unwrap();
        assert_eq!(config.log_format, "json");
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            config.load_yaml(&missing),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
