//! Bitcoin-style signed messages over zelid identities.
//!
//! Signatures are 65 bytes, base64 encoded: one header byte carrying the
//! recovery id and key/address flavour, then the compact `r || s`. Verification
//! recovers the public key and compares its hash with the claimed address.

use base64::Engine;
use bitcoin::address::NetworkUnchecked;
use bitcoin::base58;
use bitcoin::consensus::encode::{self, VarInt};
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::{Address, PrivateKey};
use tracing::error;

use super::address::{derive_address, is_long_form, pubkey_hash};
use crate::error::{AuthError, AuthResult};

/// Default magic, including its own length byte.
pub const BITCOIN_MESSAGE_MAGIC: &[u8] = b"\x18Bitcoin Signed Message:\n";

const SIGNATURE_LEN: usize = 65;
const HEADER_BASE: u8 = 27;
const FLAG_COMPRESSED: u8 = 4;
const FLAG_SEGWIT_P2SH: u8 = 8;
const FLAG_SEGWIT_P2WPKH: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegwitType {
    P2shP2wpkh,
    P2wpkh,
}

struct DecodedSignature {
    compressed: bool,
    segwit: Option<SegwitType>,
    recovery: RecoveryId,
    compact: [u8; 64],
}

fn invalid<E: std::fmt::Display>(e: E) -> AuthError {
    AuthError::InvalidSignature(e.to_string())
}

/// `sha256d(magic || compact_size(len) || message)`
pub fn magic_hash(message: &str, magic: &[u8]) -> [u8; 32] {
    let msg = message.as_bytes();
    let mut buf = Vec::with_capacity(magic.len() + 9 + msg.len());
    buf.extend_from_slice(magic);
    buf.extend_from_slice(&encode::serialize(&VarInt(msg.len() as u64)));
    buf.extend_from_slice(msg);
    sha256d::Hash::hash(&buf).to_byte_array()
}

fn decode_signature(raw: &[u8]) -> AuthResult<DecodedSignature> {
    if raw.len() != SIGNATURE_LEN {
        return Err(AuthError::InvalidSignature(format!("signature must be {} bytes, got {}", SIGNATURE_LEN, raw.len())));
    }
    if raw[0] < HEADER_BASE || raw[0] - HEADER_BASE > 15 {
        return Err(AuthError::InvalidSignature("invalid signature header byte".into()));
    }
    let flag = raw[0] - HEADER_BASE;
    let segwit = if flag & FLAG_SEGWIT_P2SH == 0 {
        None
    } else if flag & FLAG_COMPRESSED == 0 {
        Some(SegwitType::P2shP2wpkh)
    } else {
        Some(SegwitType::P2wpkh)
    };
    let recovery = RecoveryId::from_i32(i32::from(flag & 3)).map_err(invalid)?;
    let mut compact = [0u8; 64];
    compact.copy_from_slice(&raw[1..]);
    Ok(DecodedSignature { compressed: flag & FLAG_SEGWIT_P2WPKH != 0, segwit, recovery, compact })
}

/// hash160 of the p2wpkh redeem script `OP_0 <20-byte hash>`.
pub(crate) fn segwit_redeem_hash(pkh: &[u8; 20]) -> [u8; 20] {
    let mut script = Vec::with_capacity(22);
    script.extend_from_slice(&[0x00, 0x14]);
    script.extend_from_slice(pkh);
    pubkey_hash(&script)
}

fn base58_payload(address: &str) -> AuthResult<Vec<u8>> {
    let decoded = base58::decode_check(address).map_err(invalid)?;
    if decoded.is_empty() {
        return Err(AuthError::InvalidSignature("empty address payload".into()));
    }
    Ok(decoded[1..].to_vec())
}

fn bech32_p2wpkh_program(address: &str) -> AuthResult<Vec<u8>> {
    let parsed = address.parse::<Address<NetworkUnchecked>>().map_err(invalid)?.assume_checked();
    let script = parsed.script_pubkey();
    if !script.is_p2wpkh() {
        return Err(AuthError::InvalidSignature("address is not p2wpkh".into()));
    }
    Ok(script.as_bytes()[2..].to_vec())
}

/// Verify with the default magic and no forced segwit matching.
pub fn verify(message: &str, address: &str, signature: &str) -> AuthResult<bool> {
    verify_with(message, address, signature, BITCOIN_MESSAGE_MAGIC, false)
}

/// `Ok(false)` means a well-formed signature by some other key. Anything that
/// cannot be decoded or recovered is `InvalidSignature`.
pub fn verify_with(
    message: &str,
    address: &str,
    signature: &str,
    magic: &[u8],
    check_segwit_always: bool,
) -> AuthResult<bool> {
    let res = verify_inner(message, address, signature, magic, check_segwit_always);
    if let Err(e) = &res {
        error!(target: "fluxauth::identity", zelid = address, "{}", e);
    }
    res
}

fn verify_inner(
    message: &str,
    address: &str,
    signature: &str,
    magic: &[u8],
    check_segwit_always: bool,
) -> AuthResult<bool> {
    if address.is_empty() || message.is_empty() || signature.is_empty() {
        return Err(AuthError::InvalidSignature("missing parameters for message verification".into()));
    }
    let signing_address = if is_long_form(address) {
        derive_address(address).map_err(|e| AuthError::InvalidSignature(e.message().to_string()))?
    } else {
        address.to_string()
    };

    let raw = base64::engine::general_purpose::STANDARD.decode(signature).map_err(invalid)?;
    let parsed = decode_signature(&raw)?;
    if check_segwit_always && !parsed.compressed {
        return Err(AuthError::InvalidSignature("segwit check requires a compressed key signature".into()));
    }

    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(magic_hash(message, magic));
    let sig = RecoverableSignature::from_compact(&parsed.compact, parsed.recovery).map_err(invalid)?;
    let pubkey = secp.recover_ecdsa(&msg, &sig).map_err(invalid)?;
    let pkh = if parsed.compressed {
        pubkey_hash(&pubkey.serialize())
    } else {
        pubkey_hash(&pubkey.serialize_uncompressed())
    };

    match parsed.segwit {
        Some(SegwitType::P2shP2wpkh) => Ok(base58_payload(&signing_address)? == segwit_redeem_hash(&pkh)),
        Some(SegwitType::P2wpkh) => Ok(bech32_p2wpkh_program(&signing_address)? == pkh),
        None if check_segwit_always => match bech32_p2wpkh_program(&signing_address) {
            Ok(program) => Ok(program == pkh),
            Err(_) => {
                let payload = base58_payload(&signing_address)?;
                Ok(payload == pkh || payload == segwit_redeem_hash(&pkh))
            }
        },
        None => Ok(base58_payload(&signing_address)? == pkh),
    }
}

/// Sign with the default magic. Each call mixes in fresh entropy, so repeated
/// signatures over the same message differ while all verifying.
pub fn sign(message: &str, private_key_wif: &str) -> AuthResult<String> {
    sign_with(message, private_key_wif, BITCOIN_MESSAGE_MAGIC)
}

pub fn sign_with(message: &str, private_key_wif: &str, magic: &[u8]) -> AuthResult<String> {
    let res = sign_inner(message, private_key_wif, magic);
    if let Err(e) = &res {
        error!(target: "fluxauth::identity", "{}", e);
    }
    res
}

fn sign_inner(message: &str, private_key_wif: &str, magic: &[u8]) -> AuthResult<String> {
    let key = PrivateKey::from_wif(private_key_wif).map_err(|e| AuthError::Signing(e.to_string()))?;
    let mut entropy = [0u8; 32];
    getrandom::getrandom(&mut entropy).map_err(|e| AuthError::Signing(e.to_string()))?;

    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest(magic_hash(message, magic));
    let sig = secp.sign_ecdsa_recoverable_with_noncedata(&msg, &key.inner, &entropy);
    let (recovery, compact) = sig.serialize_compact();

    let mut header = HEADER_BASE + recovery.to_i32() as u8;
    if key.compressed {
        header += FLAG_COMPRESSED;
    }
    let mut out = Vec::with_capacity(SIGNATURE_LEN);
    out.push(header);
    out.extend_from_slice(&compact);
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// Re-encode a compressed-key signature with a segwit header flavour.
#[cfg(test)]
fn with_segwit_header(signature: &str, segwit: SegwitType) -> String {
    let mut raw = base64::engine::general_purpose::STANDARD.decode(signature).unwrap();
    let recovery = (raw[0] - HEADER_BASE) & 3;
    let flag = match segwit {
        SegwitType::P2shP2wpkh => FLAG_SEGWIT_P2SH,
        SegwitType::P2wpkh => FLAG_SEGWIT_P2WPKH,
    };
    raw[0] = HEADER_BASE + flag + recovery;
    base64::engine::general_purpose::STANDARD.encode(raw)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod message_tests;
