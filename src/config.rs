// ABOUTME: Run configuration loaded once at startup from a JSON or TOML file
// ABOUTME: Holds the credential template, catalog filters, pool limits and failure policy

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{ReindexError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "./conf/config.json";

/// Databases never reindexed, in addition to templates and databases refusing connections.
pub const DEFAULT_EXCLUDED_DATABASES: &[&str] = &["postgres", "template0", "template1", "zcloud"];

pub const DEFAULT_EXCLUDED_SCHEMAS: &[&str] = &["pg_catalog", "information_schema"];

/// Transport-security mode, using libpq's `sslmode` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

/// What to do when connecting to, or discovering indexes in, one database fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnDatabaseError {
    /// Terminate the whole run.
    #[default]
    Abort,
    /// Log the database as skipped and continue with the next one.
    Skip,
}

/// Connection parameters shared by every database of the run.
///
/// `dbname` is the initial database used for discovery; it is substituted
/// per database with [`CredentialTemplate::for_database`].
#[derive(Clone, Deserialize)]
pub struct CredentialTemplate {
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_dbname")]
    pub dbname: String,
    #[serde(default)]
    pub sslmode: SslMode,
}

impl CredentialTemplate {
    pub fn for_database(&self, dbname: &str) -> Self {
        Self {
            dbname: dbname.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for CredentialTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialTemplate")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolLimits {
    pub max_open: usize,
    pub max_idle: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_open: 20,
            max_idle: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReindexConfig {
    #[serde(flatten)]
    pub credentials: CredentialTemplate,
    #[serde(default = "default_excluded_databases")]
    pub exclude_databases: Vec<String>,
    #[serde(default = "default_excluded_schemas")]
    pub exclude_schemas: Vec<String>,
    #[serde(default)]
    pub pool: PoolLimits,
    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,
    #[serde(default)]
    pub on_database_error: OnDatabaseError,
}

impl ReindexConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReindexError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            Self::from_toml(&raw)
        } else {
            Self::from_json(&raw)
        }
        .map_err(|e| ReindexError::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> std::result::Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.host.trim().is_empty() {
            return Err(ReindexError::Config("host must not be empty".into()));
        }
        if self.credentials.user.trim().is_empty() {
            return Err(ReindexError::Config("user must not be empty".into()));
        }
        if self.pool.max_open == 0 {
            return Err(ReindexError::Config("pool.max_open must be at least 1".into()));
        }
        if self.pool.max_idle > self.pool.max_open {
            return Err(ReindexError::Config(format!(
                "pool.max_idle ({}) exceeds pool.max_open ({})",
                self.pool.max_idle, self.pool.max_open
            )));
        }
        if self.statement_timeout_secs == Some(0) {
            return Err(ReindexError::Config(
                "statement_timeout_secs must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_secs.map(Duration::from_secs)
    }
}

fn default_dbname() -> String {
    "postgres".to_string()
}

fn default_excluded_databases() -> Vec<String> {
    DEFAULT_EXCLUDED_DATABASES.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_schemas() -> Vec<String> {
    DEFAULT_EXCLUDED_SCHEMAS.iter().map(|s| s.to_string()).collect()
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}
