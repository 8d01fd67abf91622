use bitcoin::base58;
use bitcoin::hashes::{hash160, Hash};
use tracing::error;

use crate::error::{AuthError, AuthResult};

/// Every zelid starts with this character (P2PKH on the Bitcoin main chain).
pub const ZELID_PREFIX: char = '1';
/// Identities longer than this are raw public keys rather than addresses.
pub const LONG_FORM_THRESHOLD: usize = 36;
const PUBKEY_HASH_VERSION: u8 = 0x00;

pub fn is_long_form(address: &str) -> bool {
    address.len() > LONG_FORM_THRESHOLD
}

pub(crate) fn pubkey_hash(pubkey: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(pubkey).to_byte_array()
}

pub(crate) fn address_from_pubkey(pubkey: &[u8]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(PUBKEY_HASH_VERSION);
    payload.extend_from_slice(&pubkey_hash(pubkey));
    base58::encode_check(&payload)
}

/// Canonical short-form address for a hex-encoded public key:
/// `base58check(0x00 || hash160(pubkey))`.
///
/// The bytes are hashed as given; curve validity is settled later by signature
/// recovery, which can only ever produce a real point.
pub fn derive_address(pubkey_hex: &str) -> AuthResult<String> {
    let bytes = hex::decode(pubkey_hex)
        .map_err(|e| AuthError::InvalidAddress(format!("public key is not hex: {}", e)))?;
    if bytes.is_empty() {
        return Err(AuthError::InvalidAddress("empty public key".into()));
    }
    Ok(address_from_pubkey(&bytes))
}

/// Shape check for a claimed zelid.
pub fn validate(address: &str) -> AuthResult<()> {
    let res = check(address);
    if let Err(e) = &res {
        error!(target: "fluxauth::identity", zelid = address, "{}", e);
    }
    res
}

fn check(address: &str) -> AuthResult<()> {
    if address.is_empty() {
        return Err(AuthError::InvalidAddress("missing zelid".into()));
    }
    if !address.starts_with(ZELID_PREFIX) {
        return Err(AuthError::InvalidAddress(format!("zelid must start with '{}'", ZELID_PREFIX)));
    }
    if is_long_form(address) {
        derive_address(address)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const G_COMPRESSED: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const G_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    #[test]
    fn derives_known_addresses() {
        assert_eq!(derive_address(G_COMPRESSED).unwrap(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(derive_address(G_UNCOMPRESSED).unwrap(), "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm");
    }

    #[test]
    fn derive_rejects_non_hex() {
        assert!(matches!(derive_address("zz"), Err(AuthError::InvalidAddress(_))));
        assert!(matches!(derive_address("abc"), Err(AuthError::InvalidAddress(_))));
        assert!(matches!(derive_address(""), Err(AuthError::InvalidAddress(_))));
    }

    #[test]
    fn validate_short_form() {
        assert!(validate("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH").is_ok());
        assert!(validate("1ExampleAdminZelID").is_ok());
        assert!(matches!(validate(""), Err(AuthError::InvalidAddress(_))));
        assert!(matches!(validate("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"), Err(AuthError::InvalidAddress(_))));
        assert!(matches!(validate(G_COMPRESSED), Err(AuthError::InvalidAddress(_))));
    }

    #[test]
    fn validate_long_form_needs_derivable_key() {
        let hexish = format!("10{}", "ab".repeat(20));
        assert!(is_long_form(&hexish));
        assert!(validate(&hexish).is_ok());

        let not_hex = format!("1{}", "z".repeat(40));
        let err = validate(&not_hex).unwrap_err();
        assert!(err.message().contains("not hex"));
    }
}
