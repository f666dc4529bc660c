use crate::utils::error::{InventoryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server: Option<ServerSection>,
    pub store: Option<StoreSection>,
    pub links: Option<LinksSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksSection {
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    pub verbose: Option<bool>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(InventoryError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML text after `${VAR}` substitution.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| InventoryError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${NAME}` with the environment variable; unknown names stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| InventoryError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn bind(&self) -> Option<&str> {
        self.server.as_ref().and_then(|s| s.bind.as_deref())
    }

    pub fn snapshot_path(&self) -> Option<&str> {
        self.store.as_ref().and_then(|s| s.snapshot_path.as_deref())
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.links.as_ref().and_then(|l| l.max_attempts)
    }

    pub fn verbose(&self) -> Option<bool> {
        self.logging.as_ref().and_then(|l| l.verbose)
    }

    pub fn json_logs(&self) -> Option<bool> {
        self.logging.as_ref().and_then(|l| l.json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
bind = "127.0.0.1:5005"

[store]
snapshot_path = "./data/module-db.json"

[links]
max_attempts = 5

[logging]
verbose = true
json = false
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.bind(), Some("127.0.0.1:5005"));
        assert_eq!(config.snapshot_path(), Some("./data/module-db.json"));
        assert_eq!(config.max_attempts(), Some(5));
        assert_eq!(config.verbose(), Some(true));
        assert_eq!(config.json_logs(), Some(false));
    }

    #[test]
    fn test_sections_are_optional() {
        let config = TomlConfig::from_toml_str("[server]\n").unwrap();
        assert_eq!(config.bind(), None);
        assert_eq!(config.snapshot_path(), None);
        assert_eq!(config.max_attempts(), None);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MODULE_DB_TEST_DATA_DIR", "/srv/module-db");

        let toml_content = r#"
[store]
snapshot_path = "${MODULE_DB_TEST_DATA_DIR}/store.json"

[links]
max_attempts = 2
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.snapshot_path(), Some("/srv/module-db/store.json"));

        std::env::remove_var("MODULE_DB_TEST_DATA_DIR");
    }

    #[test]
    fn test_invalid_toml() {
        let err = TomlConfig::from_toml_str("[links]\nmax_attempts = \"many\"\n").unwrap_err();
        assert!(matches!(err, InventoryError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nbind = \"0.0.0.0:8080\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.bind(), Some("0.0.0.0:8080"));
    }
}
