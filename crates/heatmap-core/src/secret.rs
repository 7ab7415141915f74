//! Database credential collaborators.
//!
//! A secret is the same JSON document a cloud secret store would hand out:
//! `{"host": ..., "port": ..., "username": ..., "password": ..., "dbname": ...}`.
//! It is fetched once per invocation and turned into a typed
//! [`DatabaseSecret`] before any connection is opened.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result};

pub const DEFAULT_DB_PORT: u16 = 3306;

/// Env var prefix read by [`EnvSecretSource`].
const ENV_PREFIX: &str = "HEATMAP_DB_";

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseSecret {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Database name; for the embedded backend this is the database file.
    #[serde(default)]
    pub dbname: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_DB_PORT
}

impl DatabaseSecret {
    /// Parse a raw secret string as returned by the secret store.
    pub fn from_json(name: &str, raw: &str) -> Result<Self> {
        let secret: DatabaseSecret = serde_json::from_str(raw).map_err(|e| CoreError::Secret {
            name: name.to_string(),
            reason: format!("malformed secret document: {e}"),
        })?;
        secret.validate(name)?;
        Ok(secret)
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if let Some(db) = &self.dbname {
            if db.trim().is_empty() {
                return Err(CoreError::Secret {
                    name: name.to_string(),
                    reason: "dbname is empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Database file to open: the secret's `dbname`, else `fallback`.
    pub fn database_path<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.dbname.as_deref().unwrap_or(fallback)
    }
}

impl fmt::Debug for DatabaseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSecret")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .finish()
    }
}

/// Anything that can hand out database credentials by name.
pub trait SecretSource {
    fn get(&self, name: &str) -> Result<DatabaseSecret>;
}

/// Reads `HEATMAP_DB_HOST`, `_PORT`, `_USER`, `_PASSWORD` and `_NAME`.
///
/// The secret name is ignored; there is only one set of variables.
pub struct EnvSecretSource {
    vars: HashMap<String, String>,
}

impl EnvSecretSource {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars().filter(|(k, _)| k.starts_with(ENV_PREFIX)))
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars.into_iter().collect(),
        }
    }

    fn var(&self, suffix: &str) -> Option<&str> {
        self.vars
            .get(&format!("{ENV_PREFIX}{suffix}"))
            .map(String::as_str)
    }
}

impl SecretSource for EnvSecretSource {
    fn get(&self, name: &str) -> Result<DatabaseSecret> {
        let port = match self.var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| CoreError::Secret {
                name: name.to_string(),
                reason: format!("{ENV_PREFIX}PORT is not a port number: {e}"),
            })?,
            None => DEFAULT_DB_PORT,
        };
        let secret = DatabaseSecret {
            host: self.var("HOST").unwrap_or_default().to_string(),
            port,
            username: self.var("USER").unwrap_or_default().to_string(),
            password: self.var("PASSWORD").unwrap_or_default().to_string(),
            dbname: self.var("NAME").map(String::from),
        };
        secret.validate(name)?;
        debug!(secret = name, host = %secret.host, port = secret.port, "secret read from environment");
        Ok(secret)
    }
}

/// Reads `<dir>/<name>.json`. Names may contain `/` (`rds/db-test-private`).
pub struct FileSecretSource {
    dir: PathBuf,
}

impl FileSecretSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let rel = Path::new(name);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(CoreError::Secret {
                name: name.to_string(),
                reason: "secret name must be a relative path without '..'".to_string(),
            });
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl SecretSource for FileSecretSource {
    fn get(&self, name: &str) -> Result<DatabaseSecret> {
        let path = self.path_for(name)?;
        info!(secret = name, path = %path.display(), "fetching secret value");
        let raw = std::fs::read_to_string(&path).map_err(|e| CoreError::Secret {
            name: name.to_string(),
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        DatabaseSecret::from_json(name, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_secret_document() {
        let raw = r#"{"host":"db.local","port":3307,"username":"app","password":"pw","dbname":"/data/heatmap.db"}"#;
        let secret = DatabaseSecret::from_json("test", raw).unwrap();
        assert_eq!(secret.host, "db.local");
        assert_eq!(secret.port, 3307);
        assert_eq!(secret.database_path("/fallback.db"), "/data/heatmap.db");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let secret = DatabaseSecret::from_json("test", "{}").unwrap();
        assert_eq!(secret.port, DEFAULT_DB_PORT);
        assert_eq!(secret.database_path("/fallback.db"), "/fallback.db");
    }

    #[test]
    fn empty_dbname_rejected() {
        let err = DatabaseSecret::from_json("test", r#"{"dbname":"  "}"#).unwrap_err();
        assert!(matches!(err, CoreError::Secret { .. }));
    }

    #[test]
    fn debug_hides_password() {
        let secret = DatabaseSecret::from_json("test", r#"{"password":"hunter2"}"#).unwrap();
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn env_source_reads_prefixed_vars() {
        let source = EnvSecretSource::from_vars([
            ("HEATMAP_DB_HOST".to_string(), "localhost".to_string()),
            ("HEATMAP_DB_PORT".to_string(), "3310".to_string()),
            ("HEATMAP_DB_NAME".to_string(), "heatmap.db".to_string()),
        ]);
        let secret = source.get("ignored").unwrap();
        assert_eq!(secret.host, "localhost");
        assert_eq!(secret.port, 3310);
        assert_eq!(secret.dbname.as_deref(), Some("heatmap.db"));
    }

    #[test]
    fn env_source_rejects_bad_port() {
        let source =
            EnvSecretSource::from_vars([("HEATMAP_DB_PORT".to_string(), "not-a-port".to_string())]);
        assert!(source.get("x").is_err());
    }

    #[test]
    fn file_source_reads_nested_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("rds")).unwrap();
        std::fs::write(
            dir.path().join("rds/db-test-private.json"),
            r#"{"host":"h","dbname":"x.db"}"#,
        )
        .unwrap();

        let source = FileSecretSource::new(dir.path());
        let secret = source.get("rds/db-test-private").unwrap();
        assert_eq!(secret.dbname.as_deref(), Some("x.db"));
    }

    #[test]
    fn file_source_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSecretSource::new(dir.path());
        assert!(source.get("../etc/passwd").is_err());
        assert!(source.get("missing").is_err());
    }
}
