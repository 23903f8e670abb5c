//! Store configuration validation.
//!
//! Validates the connection settings before any executor is opened.

use crate::domain::error::EarniError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

/// `[store] backend`, defaulting to sqlite.
pub fn backend(config: &dyn ConfigPort) -> Result<Backend, EarniError> {
    let value = config
        .get_string("store", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    match value.trim().to_lowercase().as_str() {
        "sqlite" => Ok(Backend::Sqlite),
        "postgres" | "postgresql" => Ok(Backend::Postgres),
        other => Err(EarniError::ConfigInvalid {
            section: "store".to_string(),
            key: "backend".to_string(),
            reason: format!("unknown backend '{other}' (expected sqlite or postgres)"),
        }),
    }
}

/// `[postgres] connection_string`, falling back to `[database] conninfo`.
pub fn postgres_conninfo(config: &dyn ConfigPort) -> Result<String, EarniError> {
    config
        .get_string("postgres", "connection_string")
        .or_else(|| config.get_string("database", "conninfo"))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EarniError::ConfigMissing {
            section: "database".into(),
            key: "conninfo".into(),
        })
}

pub fn sqlite_path(config: &dyn ConfigPort) -> Result<String, EarniError> {
    config
        .get_string("sqlite", "path")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EarniError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        })
}

pub fn validate_store_config(config: &dyn ConfigPort) -> Result<Backend, EarniError> {
    let backend = backend(config)?;
    match backend {
        Backend::Sqlite => {
            sqlite_path(config)?;
        }
        Backend::Postgres => {
            postgres_conninfo(config)?;
        }
    }
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    #[test]
    fn backend_defaults_to_sqlite() {
        let config = MapConfig::new(&[]);
        assert_eq!(backend(&config).unwrap(), Backend::Sqlite);
    }

    #[test]
    fn backend_parses_postgres() {
        let config = MapConfig::new(&[("store", "backend", "PostgreSQL")]);
        assert_eq!(backend(&config).unwrap(), Backend::Postgres);
    }

    #[test]
    fn backend_rejects_unknown() {
        let config = MapConfig::new(&[("store", "backend", "mysql")]);
        match backend(&config) {
            Err(EarniError::ConfigInvalid { section, key, .. }) => {
                assert_eq!(section, "store");
                assert_eq!(key, "backend");
            }
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn conninfo_falls_back_to_database_section() {
        let config = MapConfig::new(&[("database", "conninfo", "host=localhost dbname=earni")]);
        assert_eq!(
            postgres_conninfo(&config).unwrap(),
            "host=localhost dbname=earni"
        );
    }

    #[test]
    fn connection_string_wins() {
        let config = MapConfig::new(&[
            ("postgres", "connection_string", "host=db"),
            ("database", "conninfo", "host=localhost"),
        ]);
        assert_eq!(postgres_conninfo(&config).unwrap(), "host=db");
    }

    #[test]
    fn postgres_requires_conninfo() {
        let config = MapConfig::new(&[("store", "backend", "postgres")]);
        assert!(matches!(
            validate_store_config(&config),
            Err(EarniError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn sqlite_requires_path() {
        let config = MapConfig::new(&[("store", "backend", "sqlite"), ("sqlite", "path", " ")]);
        match validate_store_config(&config) {
            Err(EarniError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn valid_sqlite_config() {
        let config = MapConfig::new(&[("sqlite", "path", "/tmp/earni.db")]);
        assert_eq!(validate_store_config(&config).unwrap(), Backend::Sqlite);
    }
}
