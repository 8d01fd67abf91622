use super::{address, message};
use crate::error::AuthResult;

/// Signature capability the evaluator depends on. Swap the implementation to
/// change curve or address encoding without touching the privilege logic.
pub trait IdentityScheme: Send + Sync {
    fn validate_address(&self, address: &str) -> AuthResult<()>;
    fn verify(&self, message: &str, address: &str, signature: &str) -> AuthResult<bool>;
    fn sign(&self, message: &str, private_key_wif: &str) -> AuthResult<String>;
}

/// secp256k1 Bitcoin signed messages over P2PKH zelids.
#[derive(Debug, Clone)]
pub struct BitcoinMessageScheme {
    magic: Vec<u8>,
    check_segwit_always: bool,
}

impl Default for BitcoinMessageScheme {
    fn default() -> Self {
        Self { magic: message::BITCOIN_MESSAGE_MAGIC.to_vec(), check_segwit_always: false }
    }
}

impl BitcoinMessageScheme {
    pub fn new() -> Self { Self::default() }

    pub fn with_magic(mut self, magic: &[u8]) -> Self {
        self.magic = magic.to_vec();
        self
    }

    pub fn check_segwit_always(mut self, on: bool) -> Self {
        self.check_segwit_always = on;
        self
    }
}

impl IdentityScheme for BitcoinMessageScheme {
    fn validate_address(&self, addr: &str) -> AuthResult<()> {
        address::validate(addr)
    }

    fn verify(&self, msg: &str, addr: &str, signature: &str) -> AuthResult<bool> {
        message::verify_with(msg, addr, signature, &self.magic, self.check_segwit_always)
    }

    fn sign(&self, msg: &str, private_key_wif: &str) -> AuthResult<String> {
        message::sign_with(msg, private_key_wif, &self.magic)
    }
}
