//! Runtime configuration for the authorization engine and its HTTP host.
//!
//! Values come from defaults, then a JSON file (optional), then `FLUXAUTH_*`
//! environment variables. The two privileged identities are fixed once the
//! config has been built and are shared read-only afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directory::DEFAULT_DIRECTORY_TIMEOUT;
use crate::error::{AuthError, AuthResult};

pub const DEFAULT_FLUXTEAM_ZELID: &str = "1hjy4bCYBJr4mny4zCE85J94RXa8W6q37";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Node-local database holding sessions and login phrases.
    pub local: String,
    pub logged_users: String,
    pub active_login_phrases: String,
    /// Global database holding registered application specs.
    pub apps_global: String,
    pub apps_information: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            local: "zelfluxlocal".into(),
            logged_users: "loggedusers".into(),
            active_login_phrases: "activeloginphrases".into(),
            apps_global: "zelappsglobal".into(),
            apps_information: "zelappsinformation".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// zelid of the node operator.
    pub admin_zelid: String,
    pub fluxteam_zelid: String,
    pub database: DatabaseConfig,
    pub http_port: u16,
    /// Optional JSON seed for the in-memory store.
    pub seed_file: Option<PathBuf>,
    /// Optional URL listing currently known applications.
    pub directory_url: Option<String>,
    pub directory_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_zelid: String::new(),
            fluxteam_zelid: DEFAULT_FLUXTEAM_ZELID.into(),
            database: DatabaseConfig::default(),
            http_port: 16127,
            seed_file: None,
            directory_url: None,
            directory_timeout_ms: DEFAULT_DIRECTORY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl AuthConfig {
    pub fn from_json_file(path: &Path) -> AuthResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| AuthError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes).map_err(|e| AuthError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overlaid with `FLUXAUTH_*` environment variables.
    pub fn from_env() -> AuthResult<Self> {
        Self::default().with_overrides(|k| std::env::var(k).ok())
    }

    /// Apply overrides from any key lookup (environment, test maps).
    pub fn with_overrides<F>(mut self, lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FLUXAUTH_ADMIN_ZELID") { self.admin_zelid = v; }
        if let Some(v) = lookup("FLUXAUTH_FLUXTEAM_ZELID") { self.fluxteam_zelid = v; }
        if let Some(v) = lookup("FLUXAUTH_LOCAL_DB") { self.database.local = v; }
        if let Some(v) = lookup("FLUXAUTH_APPS_DB") { self.database.apps_global = v; }
        if let Some(v) = lookup("FLUXAUTH_HTTP_PORT") {
            self.http_port = v
                .parse::<u16>()
                .map_err(|e| AuthError::Config(format!("FLUXAUTH_HTTP_PORT='{}': {}", v, e)))?;
        }
        if let Some(v) = lookup("FLUXAUTH_SEED_FILE") { self.seed_file = Some(PathBuf::from(v)); }
        if let Some(v) = lookup("FLUXAUTH_DIRECTORY_URL") { self.directory_url = Some(v); }
        if let Some(v) = lookup("FLUXAUTH_DIRECTORY_TIMEOUT_MS") {
            self.directory_timeout_ms = v
                .parse::<u64>()
                .map_err(|e| AuthError::Config(format!("FLUXAUTH_DIRECTORY_TIMEOUT_MS='{}': {}", v, e)))?;
        }
        Ok(self)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }
}
