use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::directory::SharedDirectory;
use crate::error::{AuthError, AuthResult};
use crate::storage::{Filter, Projection, SharedStore};

/// Resolves the zelid owning an application: indexed app specs first, the
/// known-resource directory on a miss. Nothing is cached.
#[derive(Clone)]
pub struct OwnerResolver {
    store: SharedStore,
    directory: SharedDirectory,
    database: String,
    apps_information: String,
}

impl OwnerResolver {
    pub fn new(store: SharedStore, directory: SharedDirectory, db: &DatabaseConfig) -> Self {
        Self {
            store,
            directory,
            database: db.apps_global.clone(),
            apps_information: db.apps_information.clone(),
        }
    }

    pub async fn resolve_owner(&self, app_name: &str) -> AuthResult<Option<String>> {
        let filter = Filter::eq_ignore_case("name", app_name);
        let spec = self
            .store
            .find_one(&self.database, &self.apps_information, &filter, &Projection::only(&["owner"]))
            .await
            .map_err(|e| AuthError::Lookup(e.to_string()))?;
        if let Some(spec) = spec {
            if let Some(owner) = spec.get("owner").and_then(|o| o.as_str()) {
                debug!(target: "fluxauth::owner", app = app_name, source = "indexed", "owner resolved");
                return Ok(Some(owner.to_string()));
            }
        }

        // The directory is a best-effort second opinion; if it is unreachable the
        // app simply has no known owner.
        let known = match self.directory.list_known_resources().await {
            Ok(list) => list,
            Err(e) => {
                warn!(target: "fluxauth::owner", app = app_name, "directory unavailable: {}", e);
                return Ok(None);
            }
        };
        let wanted = app_name.to_lowercase();
        let owner = known.into_iter().find(|r| r.name.to_lowercase() == wanted).map(|r| r.owner);
        debug!(target: "fluxauth::owner", app = app_name, source = "directory", found = owner.is_some(), "owner lookup");
        Ok(owner)
    }
}
