//! Directory of currently known applications and their owners.
//!
//! The directory is rebuilt from network state by its owner and may briefly
//! disagree with the indexed app store; the owner resolver only uses it as a
//! fallback. Two implementations: a static in-memory list and an HTTP fetch
//! with a request timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownResource {
    pub name: String,
    pub owner: String,
}

#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Snapshot of known resources; may be empty.
    async fn list_known_resources(&self) -> AuthResult<Vec<KnownResource>>;
}

pub type SharedDirectory = Arc<dyn ResourceDirectory>;

/// In-memory directory; the host replaces the list as its view changes.
#[derive(Clone, Default)]
pub struct StaticDirectory {
    resources: Arc<RwLock<Vec<KnownResource>>>,
}

impl StaticDirectory {
    pub fn new(resources: Vec<KnownResource>) -> Self {
        Self { resources: Arc::new(RwLock::new(resources)) }
    }

    pub fn replace(&self, resources: Vec<KnownResource>) {
        *self.resources.write() = resources;
    }

    pub fn push(&self, name: &str, owner: &str) {
        self.resources.write().push(KnownResource { name: name.into(), owner: owner.into() });
    }
}

#[async_trait]
impl ResourceDirectory for StaticDirectory {
    async fn list_known_resources(&self) -> AuthResult<Vec<KnownResource>> {
        Ok(self.resources.read().clone())
    }
}

pub const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Fetches the list from a URL. Accepts a bare JSON array or a
/// `{"status": "success", "data": [..]}` envelope.
#[derive(Clone)]
pub struct HttpResourceDirectory {
    url: String,
    client: reqwest::Client,
}

impl HttpResourceDirectory {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("directory http client: {}", e)))?;
        Ok(Self { url: url.into(), client })
    }
}

fn resources_from_body(body: Value) -> AuthResult<Vec<KnownResource>> {
    let list = match body {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut obj) => {
            if obj.get("status").and_then(|s| s.as_str()).is_some_and(|s| s != "success") {
                return Err(AuthError::Lookup("directory responded with non-success status".into()));
            }
            obj.remove("data").ok_or_else(|| AuthError::Lookup("directory response has no data".into()))?
        }
        _ => return Err(AuthError::Lookup("unexpected directory response".into())),
    };
    let Value::Array(items) = list else {
        return Err(AuthError::Lookup("directory data is not a list".into()));
    };
    // entries without a string name/owner are skipped, not fatal
    Ok(items.into_iter().filter_map(|v| serde_json::from_value::<KnownResource>(v).ok()).collect())
}

#[async_trait]
impl ResourceDirectory for HttpResourceDirectory {
    async fn list_known_resources(&self) -> AuthResult<Vec<KnownResource>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::Lookup(format!("directory fetch {}: {}", self.url, e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Lookup(format!("directory fetch {}: http {}", self.url, status)));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AuthError::Lookup(format!("directory body {}: {}", self.url, e)))?;
        let out = resources_from_body(body)?;
        debug!(target: "fluxauth::owner", url = %self.url, count = out.len(), "directory fetched");
        Ok(out)
    }
}
