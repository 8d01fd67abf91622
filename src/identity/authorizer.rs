use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::{debug, warn};

use super::auth_header::ZelIdAuth;
use super::owner::OwnerResolver;
use super::scheme::IdentityScheme;
use super::session::SessionManager;
use crate::config::AuthConfig;
use crate::directory::SharedDirectory;
use crate::error::AuthError;
use crate::storage::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    User,
    Admin,
    FluxTeam,
    AdminAndFluxTeam,
    AppOwner,
    AppOwnerAbove,
}

impl Privilege {
    pub const ALL: [Privilege; 6] = [
        Privilege::User,
        Privilege::Admin,
        Privilege::FluxTeam,
        Privilege::AdminAndFluxTeam,
        Privilege::AppOwner,
        Privilege::AppOwnerAbove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Privilege::User => "user",
            Privilege::Admin => "admin",
            Privilege::FluxTeam => "fluxteam",
            Privilege::AdminAndFluxTeam => "adminandfluxteam",
            Privilege::AppOwner => "appowner",
            Privilege::AppOwnerAbove => "appownerabove",
        }
    }

    /// Which identities may hold a session at this tier.
    fn eligibility(self) -> Eligibility {
        let none = Eligibility { anyone: false, admin: false, fluxteam: false, owner: false };
        match self {
            Privilege::User => Eligibility { anyone: true, ..none },
            Privilege::Admin => Eligibility { admin: true, ..none },
            Privilege::FluxTeam => Eligibility { fluxteam: true, ..none },
            // admin is considered part of the flux team here
            Privilege::AdminAndFluxTeam => Eligibility { admin: true, fluxteam: true, ..none },
            Privilege::AppOwner => Eligibility { owner: true, ..none },
            Privilege::AppOwnerAbove => Eligibility { admin: true, fluxteam: true, owner: true, ..none },
        }
    }

    /// Owner tiers are scoped to one application.
    pub fn requires_app(self) -> bool {
        self.eligibility().owner
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Privilege::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AuthError::MalformedAuth(format!("unknown privilege '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy)]
struct Eligibility {
    anyone: bool,
    admin: bool,
    fluxteam: bool,
    owner: bool,
}

/// Turns a `zelidauth` claim into a yes/no answer for a privilege tier.
///
/// Every check runs the same sequence: parse the claim, test tier eligibility,
/// find the logged session, then verify the signature over its login phrase.
/// Any missing input or failed step answers `false`.
#[derive(Clone)]
pub struct PrivilegeEvaluator {
    admin_zelid: String,
    fluxteam_zelid: String,
    sessions: SessionManager,
    owners: OwnerResolver,
    scheme: Arc<dyn IdentityScheme>,
}

impl PrivilegeEvaluator {
    pub fn new(
        config: &AuthConfig,
        store: SharedStore,
        directory: SharedDirectory,
        scheme: Arc<dyn IdentityScheme>,
    ) -> Self {
        Self {
            admin_zelid: config.admin_zelid.clone(),
            fluxteam_zelid: config.fluxteam_zelid.clone(),
            sessions: SessionManager::new(store.clone(), &config.database),
            owners: OwnerResolver::new(store, directory, &config.database),
            scheme,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn owners(&self) -> &OwnerResolver {
        &self.owners
    }

    pub fn scheme(&self) -> &Arc<dyn IdentityScheme> {
        &self.scheme
    }

    /// Dispatch on a tier label. Unknown labels are not authorized.
    pub async fn verify_privilege(&self, privilege: &str, headers: Option<&HeaderMap>, app_name: Option<&str>) -> bool {
        match privilege.parse::<Privilege>() {
            Ok(p) => self.evaluate(headers, p, app_name).await,
            Err(e) => {
                debug!(target: "fluxauth::auth", "{}", e);
                false
            }
        }
    }

    pub async fn evaluate(&self, headers: Option<&HeaderMap>, privilege: Privilege, app_name: Option<&str>) -> bool {
        let Some(headers) = headers else { return false; };
        if privilege.requires_app() && app_name.map_or(true, str::is_empty) {
            return false;
        }
        let auth = match ZelIdAuth::from_headers(headers) {
            Some(Ok(auth)) => auth,
            Some(Err(e)) => {
                debug!(target: "fluxauth::auth", privilege = %privilege, "{}", e);
                return false;
            }
            None => return false,
        };
        self.evaluate_auth(&auth, privilege, app_name).await
    }

    /// Same decision for a claim that has already been parsed.
    pub async fn evaluate_auth(&self, auth: &ZelIdAuth, privilege: Privilege, app_name: Option<&str>) -> bool {
        if auth.zelid.is_empty() || auth.signature.is_empty() {
            return false;
        }
        if !self.is_eligible(privilege, &auth.zelid, app_name).await {
            debug!(target: "fluxauth::auth", zelid = %auth.zelid, privilege = %privilege, "not eligible");
            return false;
        }
        let session = match self.sessions.find_session(&auth.zelid, &auth.signature).await {
            Ok(Some(s)) => s,
            Ok(None) => return false,
            Err(e) => {
                warn!(target: "fluxauth::auth", zelid = %auth.zelid, "session lookup failed: {}", e);
                return false;
            }
        };
        // signature must cover this session's login phrase, proving key possession
        match self.scheme.verify(&session.login_phrase, &auth.zelid, &auth.signature) {
            Ok(valid) => {
                debug!(target: "fluxauth::auth", zelid = %auth.zelid, privilege = %privilege, valid, "session verified");
                valid
            }
            Err(_) => false,
        }
    }

    async fn is_eligible(&self, privilege: Privilege, zelid: &str, app_name: Option<&str>) -> bool {
        let rule = privilege.eligibility();
        if rule.anyone {
            return true;
        }
        if rule.admin && is_configured(&self.admin_zelid, zelid) {
            return true;
        }
        if rule.fluxteam && is_configured(&self.fluxteam_zelid, zelid) {
            return true;
        }
        if !rule.owner {
            return false;
        }
        let Some(app) = app_name.filter(|a| !a.is_empty()) else { return false; };
        match self.owners.resolve_owner(app).await {
            Ok(Some(owner)) => owner == zelid,
            Ok(None) => false,
            Err(e) => {
                warn!(target: "fluxauth::auth", app, "owner resolution failed: {}", e);
                false
            }
        }
    }

    pub async fn verify_user_session(&self, headers: Option<&HeaderMap>) -> bool {
        self.evaluate(headers, Privilege::User, None).await
    }

    pub async fn verify_admin_session(&self, headers: Option<&HeaderMap>) -> bool {
        self.evaluate(headers, Privilege::Admin, None).await
    }

    pub async fn verify_flux_team_session(&self, headers: Option<&HeaderMap>) -> bool {
        self.evaluate(headers, Privilege::FluxTeam, None).await
    }

    pub async fn verify_admin_and_flux_team_session(&self, headers: Option<&HeaderMap>) -> bool {
        self.evaluate(headers, Privilege::AdminAndFluxTeam, None).await
    }

    pub async fn verify_app_owner_session(&self, headers: Option<&HeaderMap>, app_name: Option<&str>) -> bool {
        self.evaluate(headers, Privilege::AppOwner, app_name).await
    }

    pub async fn verify_app_owner_or_higher_session(&self, headers: Option<&HeaderMap>, app_name: Option<&str>) -> bool {
        self.evaluate(headers, Privilege::AppOwnerAbove, app_name).await
    }
}

/// An unset configured identity never matches.
fn is_configured(configured: &str, zelid: &str) -> bool {
    !configured.is_empty() && configured == zelid
}

#[cfg(test)]
#[path = "authorizer_tests.rs"]
mod authorizer_tests;
