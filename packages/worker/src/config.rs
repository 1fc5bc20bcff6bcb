//! Host configuration read from the environment.

use std::str::FromStr;

use actors::WorkforceConfig;
use db::DbConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub db: DbConfig,
    pub workforce: WorkforceConfig,
}

impl HostConfig {
    /// Build a config from environment variables.
    ///
    /// Database:
    /// - `CATALOG_DB_ENDPOINT` (default: `mem://`; `rocksdb://path` needs the `rocksdb` feature)
    /// - `CATALOG_DB_NAMESPACE` (default: `catalog`)
    /// - `CATALOG_DB_DATABASE` (default: `main`)
    /// - `CATALOG_DB_USER`, `CATALOG_DB_PASS` (root sign-in; both or neither)
    ///
    /// Workforce:
    /// - `CATALOG_MAX_WORKERS` (default: 5)
    /// - `CATALOG_BATCH_SIZE` (default: 10)
    /// - `CATALOG_CHANNEL_CAPACITY` (default: 20)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |var: &str| lookup(var).and_then(non_empty);

        let mut db = DbConfig::default();
        if let Some(endpoint) = read("CATALOG_DB_ENDPOINT") {
            db.endpoint = endpoint;
        }
        if let Some(namespace) = read("CATALOG_DB_NAMESPACE") {
            db = db.with_namespace(namespace);
        }
        if let Some(database) = read("CATALOG_DB_DATABASE") {
            db = db.with_database(database);
        }
        match (read("CATALOG_DB_USER"), read("CATALOG_DB_PASS")) {
            (Some(user), Some(pass)) => db = db.with_credentials(user, pass),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: "CATALOG_DB_USER",
                    missing: "CATALOG_DB_PASS",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: "CATALOG_DB_PASS",
                    missing: "CATALOG_DB_USER",
                });
            }
            (None, None) => {}
        }

        let mut workforce = WorkforceConfig::default();
        if let Some(n) = parse_positive("CATALOG_MAX_WORKERS", read("CATALOG_MAX_WORKERS"))? {
            workforce.max_workers = n;
        }
        if let Some(n) = parse_positive("CATALOG_BATCH_SIZE", read("CATALOG_BATCH_SIZE"))? {
            workforce.batch_size = n;
        }
        if let Some(n) =
            parse_positive("CATALOG_CHANNEL_CAPACITY", read("CATALOG_CHANNEL_CAPACITY"))?
        {
            workforce.channel_capacity = n;
        }

        Ok(Self { db, workforce })
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_positive(var: &'static str, value: Option<String>) -> Result<Option<usize>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };

    match usize::from_str(&value) {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be at least 1".into(),
        }),
        Ok(n) => Ok(Some(n)),
        Err(e) => Err(ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        }),
    }
}
