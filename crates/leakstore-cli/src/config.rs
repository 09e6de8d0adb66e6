//! Configuration management for leakctl

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use leakstore_search::SearchConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data root holding the bucket directories.
    pub data_dir: PathBuf,

    /// Search backend connection, if one is configured.
    pub search: Option<SearchConfig>,

    /// Worker cap for batch operations.
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            search: None,
            workers: None,
        }
    }
}

impl Config {
    /// Load config from file or create default
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Config file path (~/.leakstore/config.toml)
    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".leakstore").join("config.toml")
    }

    /// Search config with CLI overrides layered on top of the file.
    pub fn search_config(
        &self,
        endpoint: Option<&str>,
        ignore_ssl: bool,
    ) -> Result<SearchConfig> {
        let mut config = match (endpoint, &self.search) {
            (Some(endpoint), Some(file)) => {
                let mut c = file.clone();
                c.endpoint = endpoint.to_string();
                c
            }
            (Some(endpoint), None) => SearchConfig::new(endpoint),
            (None, Some(file)) => file.clone(),
            (None, None) => anyhow::bail!(
                "no search endpoint configured; pass --endpoint or set [search] in the config file"
            ),
        };
        if ignore_ssl {
            config.ignore_ssl = true;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leakstore_search::Auth;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.search.is_none());
        assert!(config.workers.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            data_dir: PathBuf::from("/srv/leaks"),
            search: Some(SearchConfig::new("https://es:9200").with_auth(Auth::ApiKey {
                key: "abc".to_string(),
            })),
            workers: Some(16),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let loaded: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.search, config.search);
        assert_eq!(loaded.workers, Some(16));
    }

    #[test]
    fn test_config_parses_creds_auth() {
        let toml_str = r#"
            data_dir = "/srv/leaks"

            [search]
            endpoint = "https://es:9200"
            ignore_ssl = true

            [search.auth]
            type = "creds"
            username = "reader"
            password = "hunter2"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let search = config.search.unwrap();
        assert!(search.ignore_ssl);
        assert_eq!(
            search.auth,
            Some(Auth::Credentials {
                username: "reader".to_string(),
                password: "hunter2".to_string()
            })
        );
    }

    #[test]
    fn test_search_config_override_precedence() {
        let config = Config {
            data_dir: PathBuf::from("."),
            search: Some(SearchConfig::new("https://file:9200")),
            workers: None,
        };

        let from_flag = config
            .search_config(Some("https://flag:9200"), false)
            .unwrap();
        assert_eq!(from_flag.endpoint, "https://flag:9200");

        let from_file = config.search_config(None, true).unwrap();
        assert_eq!(from_file.endpoint, "https://file:9200");
        assert!(from_file.ignore_ssl);

        let none = Config::default().search_config(None, false);
        assert!(none.is_err());
    }
}
