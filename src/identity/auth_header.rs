use axum::http::HeaderMap;
use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

pub const ZELIDAUTH_HEADER: &str = "zelidauth";

/// Identity claim carried by the `zelidauth` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZelIdAuth {
    pub zelid: String,
    pub signature: String,
}

// Clients also send loginPhrase and other fields; only these two are read.
#[derive(Deserialize)]
struct RawAuth {
    zelid: Option<String>,
    signature: Option<String>,
}

impl ZelIdAuth {
    /// Parse a header value: a JSON object, or a form-encoded
    /// `zelid=..&signature=..` string. Anything else is `MalformedAuth`.
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::MalformedAuth("empty zelidauth".into()));
        }
        let parsed = if raw.starts_with('{') {
            serde_json::from_str::<RawAuth>(raw).map_err(|e| AuthError::MalformedAuth(e.to_string()))?
        } else {
            parse_form(raw)?
        };
        let zelid = parsed.zelid.filter(|z| !z.is_empty()).ok_or_else(|| AuthError::MalformedAuth("missing zelid".into()))?;
        let signature = parsed
            .signature
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::MalformedAuth("missing signature".into()))?;
        Ok(Self { zelid, signature })
    }

    /// `None` when the header is absent.
    pub fn from_headers(headers: &HeaderMap) -> Option<AuthResult<Self>> {
        let value = headers.get(ZELIDAUTH_HEADER)?;
        Some(
            value
                .to_str()
                .map_err(|e| AuthError::MalformedAuth(e.to_string()))
                .and_then(Self::parse),
        )
    }
}

/// Form-encoded claim. Bare keys read as empty values; the first occurrence of
/// a repeated key wins.
fn parse_form(raw: &str) -> AuthResult<RawAuth> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(raw).map_err(|e| AuthError::MalformedAuth(e.to_string()))?;
    let mut out = RawAuth { zelid: None, signature: None };
    for (k, v) in pairs {
        match k.as_str() {
            "zelid" if out.zelid.is_none() => out.zelid = Some(v),
            "signature" if out.signature.is_none() => out.signature = Some(v),
            _ => {}
        }
    }
    Ok(out)
}
