//! Unified error model for the authorization engine.
//! Every evaluator step converts these into a `false` decision; only signing and
//! startup paths hand them back to callers. The HTTP mapping lives here so the
//! request layer and the binaries agree on codes.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Claimed zelid is empty, has the wrong prefix, or is a long-form key that
    /// cannot be turned into an address.
    #[error("invalid zelid: {0}")]
    InvalidAddress(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("signing failed: {0}")]
    Signing(String),
    /// Store unreachable or the query could not be served.
    #[error("lookup failed: {0}")]
    Lookup(String),
    /// The `zelidauth` field could not be parsed into a zelid/signature pair.
    #[error("malformed zelidauth: {0}")]
    MalformedAuth(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::InvalidAddress(_) => "invalid_address",
            AuthError::InvalidSignature(_) => "invalid_signature",
            AuthError::Signing(_) => "signing_error",
            AuthError::Lookup(_) => "lookup_failure",
            AuthError::MalformedAuth(_) => "malformed_auth",
            AuthError::Config(_) => "config_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::InvalidAddress(m)
            | AuthError::InvalidSignature(m)
            | AuthError::Signing(m)
            | AuthError::Lookup(m)
            | AuthError::MalformedAuth(m)
            | AuthError::Config(m) => m.as_str(),
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::InvalidAddress(_) | AuthError::MalformedAuth(_) => 400,
            AuthError::InvalidSignature(_) => 401,
            AuthError::Lookup(_) => 503,
            AuthError::Signing(_) | AuthError::Config(_) => 500,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
