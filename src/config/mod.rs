pub mod toml_config;

use crate::core::links::DEFAULT_LINK_ATTEMPTS;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_range, validate_socket_addr, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use toml_config::TomlConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0:5005";
pub const MAX_LINK_ATTEMPTS: u32 = 20;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, clap::Parser)]
#[command(name = "module-db")]
#[command(about = "Lab inventory service with cable path resolution")]
pub struct CliConfig {
    #[arg(long, short = 'c', help = "TOML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Listen address, e.g. 0.0.0.0:5005")]
    pub bind: Option<String>,

    #[arg(long, help = "Persist the store to this JSON file")]
    pub snapshot_path: Option<String>,

    #[arg(long, help = "Commit attempts for connect/disconnect under contention")]
    pub link_attempts: Option<u32>,

    #[arg(long, short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub json_logs: bool,
}

/// Effective settings: defaults, then the TOML file, then command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub bind: String,
    pub snapshot_path: Option<String>,
    pub link_attempts: u32,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            snapshot_path: None,
            link_attempts: DEFAULT_LINK_ATTEMPTS,
            verbose: false,
            json_logs: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::default();
        config.merge_toml(&TomlConfig::from_file(path)?);
        Ok(config)
    }

    pub fn merge_toml(&mut self, toml: &TomlConfig) {
        if let Some(bind) = toml.bind() {
            self.bind = bind.to_string();
        }
        if let Some(path) = toml.snapshot_path() {
            self.snapshot_path = Some(path.to_string());
        }
        if let Some(attempts) = toml.max_attempts() {
            self.link_attempts = attempts;
        }
        if let Some(verbose) = toml.verbose() {
            self.verbose = verbose;
        }
        if let Some(json) = toml.json_logs() {
            self.json_logs = json;
        }
    }

    #[cfg(feature = "cli")]
    pub fn from_cli(cli: &CliConfig) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };

        if let Some(bind) = &cli.bind {
            config.bind = bind.clone();
        }
        if let Some(path) = &cli.snapshot_path {
            config.snapshot_path = Some(path.clone());
        }
        if let Some(attempts) = cli.link_attempts {
            config.link_attempts = attempts;
        }
        // Flags can only switch these on.
        config.verbose |= cli.verbose;
        config.json_logs |= cli.json_logs;

        Ok(config)
    }
}

impl ConfigProvider for ServiceConfig {
    fn bind_address(&self) -> &str {
        &self.bind
    }

    fn snapshot_path(&self) -> Option<&str> {
        self.snapshot_path.as_deref()
    }

    fn link_attempts(&self) -> u32 {
        self.link_attempts
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_socket_addr("bind", &self.bind)?;
        if let Some(path) = &self.snapshot_path {
            validate_path("snapshot_path", path)?;
        }
        validate_range("link_attempts", self.link_attempts, 1, MAX_LINK_ATTEMPTS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::InventoryError;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:5005");
        assert_eq!(config.link_attempts(), 3);
        assert!(config.snapshot_path().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml = TomlConfig::from_toml_str(
            "[store]\nsnapshot_path = \"/tmp/db.json\"\n[links]\nmax_attempts = 7\n",
        )
        .unwrap();

        let mut config = ServiceConfig::default();
        config.merge_toml(&toml);

        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.snapshot_path.as_deref(), Some("/tmp/db.json"));
        assert_eq!(config.link_attempts, 7);
    }

    #[test]
    fn test_rejects_zero_attempts_and_bad_bind() {
        let config = ServiceConfig {
            link_attempts: 0,
            ..ServiceConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(InventoryError::InvalidConfigValueError { ref field, .. }) if field == "link_attempts"
        ));

        let config = ServiceConfig {
            bind: "not-an-address".to_string(),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_flags_win_over_file() {
        use clap::Parser;
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[server]\nbind = \"127.0.0.1:9000\"\n[links]\nmax_attempts = 4\n")
            .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = CliConfig::parse_from([
            "module-db",
            "--config",
            &path,
            "--bind",
            "127.0.0.1:9100",
            "--verbose",
        ]);
        let config = ServiceConfig::from_cli(&cli).unwrap();

        assert_eq!(config.bind, "127.0.0.1:9100");
        assert_eq!(config.link_attempts, 4);
        assert!(config.verbose);
        assert!(!config.json_logs);
    }
}
