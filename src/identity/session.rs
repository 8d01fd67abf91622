use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::DatabaseConfig;
use crate::error::{AuthError, AuthResult};
use crate::storage::{Filter, Projection, SharedStore};
use crate::tprintln;

/// A logged-in session as recorded by the login flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedSession {
    pub zelid: String,
    pub signature: String,
    /// Challenge phrase the signature was produced over.
    #[serde(rename = "loginPhrase")]
    pub login_phrase: String,
    #[serde(rename = "createdAt", default, deserialize_with = "lenient_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "expireAt", default, deserialize_with = "lenient_time", skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
}

/// Timestamps are owned by the login flow; accept RFC 3339 or epoch millis and
/// drop anything else rather than rejecting the session.
fn lenient_time<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(de)?;
    Ok(match v {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc)),
        Some(Value::Number(n)) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    })
}

/// Reads logged sessions and cleans up consumed login phrases.
///
/// Holds a clone of the process-wide store handle; never writes sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedStore,
    database: String,
    logged_users: String,
    active_login_phrases: String,
}

impl SessionManager {
    pub fn new(store: SharedStore, db: &DatabaseConfig) -> Self {
        Self {
            store,
            database: db.local.clone(),
            logged_users: db.logged_users.clone(),
            active_login_phrases: db.active_login_phrases.clone(),
        }
    }

    /// First session matching both `signature` and `zelid`. A miss is `Ok(None)`.
    pub async fn find_session(&self, zelid: &str, signature: &str) -> AuthResult<Option<SignedSession>> {
        let filter = Filter::and(vec![Filter::eq("signature", signature), Filter::eq("zelid", zelid)]);
        let found = self
            .store
            .find_one(&self.database, &self.logged_users, &filter, &Projection::All)
            .await
            .map_err(|e| AuthError::Lookup(e.to_string()))?;
        let Some(doc) = found else {
            debug!(target: "fluxauth::session", zelid, "no logged session");
            return Ok(None);
        };
        let session: SignedSession = serde_json::from_value(Value::Object(doc))
            .map_err(|e| AuthError::Lookup(format!("malformed session record: {}", e)))?;
        tprintln!("session.find zelid={} created_at={:?}", zelid, session.created_at);
        Ok(Some(session))
    }

    /// Best-effort removal of an active login phrase. Errors are logged, never
    /// returned; deleting an absent phrase is a no-op.
    pub async fn delete_login_phrase(&self, phrase: &str) {
        let filter = Filter::eq("loginPhrase", phrase);
        match self.store.find_one_and_delete(&self.database, &self.active_login_phrases, &filter).await {
            Ok(removed) => debug!(target: "fluxauth::session", removed = removed.is_some(), "delete_login_phrase"),
            Err(e) => error!(target: "fluxauth::session", "delete_login_phrase failed: {}", e),
        }
    }
}
