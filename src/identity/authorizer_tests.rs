use super::*;
use std::collections::HashSet;

use axum::http::HeaderValue;
use serde_json::json;

use crate::directory::StaticDirectory;
use crate::error::AuthResult;
use crate::identity::auth_header::ZELIDAUTH_HEADER;
use crate::identity::scheme::BitcoinMessageScheme;
use crate::storage::MemoryStore;

const ADMIN: &str = "1ExampleAdminZelID";
const TEAM: &str = "1ExampleFluxTeamZelID";
const OWNER: &str = "1ExampleAppOwnerZelID";
const NOBODY: &str = "1ExampleNobodyZelID";

/// Accepts exactly the (message, address, signature) triples it was given.
#[derive(Default)]
struct FakeScheme {
    valid: HashSet<(String, String, String)>,
    broken: bool,
}

impl FakeScheme {
    fn accepting(triples: &[(&str, &str, &str)]) -> Self {
        Self {
            valid: triples.iter().map(|(m, a, s)| (m.to_string(), a.to_string(), s.to_string())).collect(),
            broken: false,
        }
    }
}

impl IdentityScheme for FakeScheme {
    fn validate_address(&self, _address: &str) -> AuthResult<()> {
        Ok(())
    }

    fn verify(&self, message: &str, address: &str, signature: &str) -> AuthResult<bool> {
        if self.broken {
            return Err(AuthError::InvalidSignature("broken".into()));
        }
        Ok(self.valid.contains(&(message.to_string(), address.to_string(), signature.to_string())))
    }

    fn sign(&self, _message: &str, _wif: &str) -> AuthResult<String> {
        Err(AuthError::Signing("fake".into()))
    }
}

struct Fixture {
    store: MemoryStore,
    directory: StaticDirectory,
    evaluator: PrivilegeEvaluator,
}

fn config() -> AuthConfig {
    AuthConfig { admin_zelid: ADMIN.into(), fluxteam_zelid: TEAM.into(), ..AuthConfig::default() }
}

fn fixture_with(scheme: Arc<dyn IdentityScheme>) -> Fixture {
    let store = MemoryStore::new();
    let directory = StaticDirectory::default();
    let evaluator = PrivilegeEvaluator::new(&config(), Arc::new(store.clone()), Arc::new(directory.clone()), scheme);
    Fixture { store, directory, evaluator }
}

/// Sessions for every test identity, each signature valid over its phrase.
fn fixture() -> Fixture {
    let scheme = FakeScheme::accepting(&[
        ("challenge123", ADMIN, "sigA"),
        ("challengeT", TEAM, "sigT"),
        ("challengeO", OWNER, "sigO"),
        ("challengeN", NOBODY, "sigN"),
    ]);
    let f = fixture_with(Arc::new(scheme));
    for (zelid, sig, phrase) in [
        (ADMIN, "sigA", "challenge123"),
        (TEAM, "sigT", "challengeT"),
        (OWNER, "sigO", "challengeO"),
        (NOBODY, "sigN", "challengeN"),
    ] {
        f.store
            .insert_value("zelfluxlocal", "loggedusers", json!({"zelid": zelid, "signature": sig, "loginPhrase": phrase}))
            .unwrap();
    }
    f.store
        .insert_value("zelappsglobal", "zelappsinformation", json!({"name": "MyIndexedApp", "owner": OWNER}))
        .unwrap();
    f
}

fn headers(zelid: &str, signature: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    let v = json!({"zelid": zelid, "signature": signature}).to_string();
    h.insert(ZELIDAUTH_HEADER, HeaderValue::from_str(&v).unwrap());
    h
}

#[tokio::test]
async fn admin_example_scenario() {
    let f = fixture();
    let h = headers(ADMIN, "sigA");
    assert!(f.evaluator.verify_privilege("admin", Some(&h), None).await);
    assert!(!f.evaluator.verify_privilege("fluxteam", Some(&h), None).await);
}

#[tokio::test]
async fn eligibility_matrix() {
    let f = fixture();
    let app = Some("myindexedapp");
    let cases: [(&str, &str, [bool; 6]); 4] = [
        //                    user  admin  team   a&t    owner  owner+
        (ADMIN, "sigA", [true, true, false, true, false, true]),
        (TEAM, "sigT", [true, false, true, true, false, true]),
        (OWNER, "sigO", [true, false, false, false, true, true]),
        (NOBODY, "sigN", [true, false, false, false, false, false]),
    ];
    for (zelid, sig, expected) in cases {
        let h = headers(zelid, sig);
        for (p, want) in Privilege::ALL.into_iter().zip(expected) {
            let got = f.evaluator.evaluate(Some(&h), p, app).await;
            assert_eq!(got, want, "zelid={} privilege={}", zelid, p);
        }
    }
}

#[tokio::test]
async fn ineligible_identity_never_reaches_session_store() {
    let f = fixture();
    let h = headers(NOBODY, "sigN");
    for p in [Privilege::Admin, Privilege::FluxTeam, Privilege::AdminAndFluxTeam] {
        assert!(!f.evaluator.evaluate(Some(&h), p, None).await);
    }
    assert_eq!(f.store.query_count(), 0);
}

#[tokio::test]
async fn missing_inputs_are_denied_without_queries() {
    let f = fixture();
    assert!(!f.evaluator.evaluate(None, Privilege::User, None).await);
    assert!(!f.evaluator.evaluate(Some(&HeaderMap::new()), Privilege::User, None).await);

    let mut no_sig = HeaderMap::new();
    no_sig.insert(ZELIDAUTH_HEADER, HeaderValue::from_static(r#"{"zelid":"1ExampleAdminZelID"}"#));
    assert!(!f.evaluator.evaluate(Some(&no_sig), Privilege::User, None).await);

    let mut no_zelid = HeaderMap::new();
    no_zelid.insert(ZELIDAUTH_HEADER, HeaderValue::from_static(r#"{"signature":"sigA"}"#));
    assert!(!f.evaluator.evaluate(Some(&no_zelid), Privilege::Admin, None).await);

    let mut garbage = HeaderMap::new();
    garbage.insert(ZELIDAUTH_HEADER, HeaderValue::from_static("{not json"));
    assert!(!f.evaluator.evaluate(Some(&garbage), Privilege::User, None).await);

    // owner tiers need an app name before anything else happens
    let h = headers(OWNER, "sigO");
    assert!(!f.evaluator.verify_app_owner_session(Some(&h), None).await);
    assert!(!f.evaluator.verify_app_owner_or_higher_session(Some(&h), Some("")).await);

    assert_eq!(f.store.query_count(), 0);
}

#[tokio::test]
async fn form_encoded_header_is_accepted() {
    let f = fixture();
    let mut h = HeaderMap::new();
    h.insert(ZELIDAUTH_HEADER, HeaderValue::from_static("zelid=1ExampleAdminZelID&signature=sigA"));
    assert!(f.evaluator.verify_admin_session(Some(&h)).await);
}

#[tokio::test]
async fn unknown_privilege_label_is_false() {
    let f = fixture();
    let h = headers(ADMIN, "sigA");
    assert!(!f.evaluator.verify_privilege("superuser", Some(&h), None).await);
    assert!(!f.evaluator.verify_privilege("Admin", Some(&h), None).await);
    assert!(!f.evaluator.verify_privilege("", Some(&h), None).await);
}

#[tokio::test]
async fn session_must_exist_and_signature_must_verify() {
    let f = fixture();
    // no session recorded for this signature
    assert!(!f.evaluator.verify_admin_session(Some(&headers(ADMIN, "sigB"))).await);

    // session exists, but the signature does not cover its phrase
    f.store
        .insert_value("zelfluxlocal", "loggedusers", json!({"zelid": ADMIN, "signature": "sigStale", "loginPhrase": "old"}))
        .unwrap();
    assert!(!f.evaluator.verify_admin_session(Some(&headers(ADMIN, "sigStale"))).await);

    // a session belonging to someone else does not count
    assert!(!f.evaluator.verify_user_session(Some(&headers(ADMIN, "sigT"))).await);
}

#[tokio::test]
async fn owner_resolved_from_directory_fallback() {
    let f = fixture();
    f.directory.push("DirectoryOnlyApp", OWNER);
    let h = headers(OWNER, "sigO");
    assert!(f.evaluator.evaluate(Some(&h), Privilege::AppOwner, Some("DirectoryOnlyApp")).await);
    assert!(f.evaluator.evaluate(Some(&h), Privilege::AppOwner, Some("directoryonlyapp")).await);
    assert!(!f.evaluator.evaluate(Some(&h), Privilege::AppOwner, Some("UnknownApp")).await);
    let other = headers(NOBODY, "sigN");
    assert!(!f.evaluator.evaluate(Some(&other), Privilege::AppOwner, Some("DirectoryOnlyApp")).await);
}

#[tokio::test]
async fn owner_match_ignores_app_name_case() {
    let f = fixture();
    let h = headers(OWNER, "sigO");
    for name in ["MyIndexedApp", "myindexedapp", "MYINDEXEDAPP", "mYiNdExEdApP"] {
        assert!(f.evaluator.verify_app_owner_session(Some(&h), Some(name)).await, "{}", name);
    }
}

#[tokio::test]
async fn store_outage_fails_closed() {
    let f = fixture();
    f.store.set_offline(true);
    assert!(!f.evaluator.verify_admin_session(Some(&headers(ADMIN, "sigA"))).await);
    assert!(!f.evaluator.verify_app_owner_session(Some(&headers(OWNER, "sigO")), Some("MyIndexedApp")).await);
    f.store.set_offline(false);
    assert!(f.evaluator.verify_admin_session(Some(&headers(ADMIN, "sigA"))).await);
}

#[tokio::test]
async fn verifier_errors_fail_closed() {
    let scheme = FakeScheme { broken: true, ..FakeScheme::default() };
    let f = fixture_with(Arc::new(scheme));
    f.store
        .insert_value("zelfluxlocal", "loggedusers", json!({"zelid": ADMIN, "signature": "sigA", "loginPhrase": "challenge123"}))
        .unwrap();
    assert!(!f.evaluator.verify_admin_session(Some(&headers(ADMIN, "sigA"))).await);
}

#[tokio::test]
async fn unset_admin_never_matches() {
    let scheme = FakeScheme::accepting(&[("p", "", "s")]);
    let store = MemoryStore::new();
    let cfg = AuthConfig { admin_zelid: String::new(), ..AuthConfig::default() };
    let ev = PrivilegeEvaluator::new(&cfg, Arc::new(store), Arc::new(StaticDirectory::default()), Arc::new(scheme));
    let auth = ZelIdAuth { zelid: String::new(), signature: "s".into() };
    assert!(!ev.evaluate_auth(&auth, Privilege::Admin, None).await);
}

#[tokio::test]
async fn real_signatures_end_to_end() {
    let wif = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    let zelid = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
    let scheme = Arc::new(BitcoinMessageScheme::new());
    let sig = scheme.sign("16854683212345abcdef", wif).unwrap();

    let store = MemoryStore::new();
    store
        .insert_value("zelfluxlocal", "loggedusers", json!({"zelid": zelid, "signature": sig, "loginPhrase": "16854683212345abcdef"}))
        .unwrap();
    let cfg = AuthConfig { admin_zelid: zelid.into(), ..AuthConfig::default() };
    let ev = PrivilegeEvaluator::new(&cfg, Arc::new(store.clone()), Arc::new(StaticDirectory::default()), scheme.clone());

    let h = headers(zelid, &sig);
    assert!(ev.verify_admin_session(Some(&h)).await);
    assert!(ev.verify_user_session(Some(&h)).await);
    assert!(!ev.verify_flux_team_session(Some(&h)).await);

    // a second, different signature over the same phrase is also valid once logged
    let sig2 = scheme.sign("16854683212345abcdef", wif).unwrap();
    assert_ne!(sig, sig2);
    store
        .insert_value("zelfluxlocal", "loggedusers", json!({"zelid": zelid, "signature": sig2, "loginPhrase": "16854683212345abcdef"}))
        .unwrap();
    assert!(ev.verify_admin_session(Some(&headers(zelid, &sig2))).await);

    // a logged record whose signature covers a different phrase is rejected
    let forged = scheme.sign("another phrase", wif).unwrap();
    store
        .insert_value("zelfluxlocal", "loggedusers", json!({"zelid": zelid, "signature": forged, "loginPhrase": "16854683212345abcdef"}))
        .unwrap();
    assert!(!ev.verify_user_session(Some(&headers(zelid, &forged))).await);
}

#[test]
fn privilege_labels_round_trip() {
    for p in Privilege::ALL {
        assert_eq!(p.as_str().parse::<Privilege>().unwrap(), p);
        assert_eq!(p.to_string(), p.as_str());
    }
    assert!("appOwner".parse::<Privilege>().is_err());
    assert!(Privilege::AppOwner.requires_app());
    assert!(Privilege::AppOwnerAbove.requires_app());
    assert!(!Privilege::AdminAndFluxTeam.requires_app());
}
