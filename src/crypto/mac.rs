use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::crypto::kdf::MAC_KEY_LENGTH;
use crate::error::{FilecryptError, Result};

pub type HmacSha512 = Hmac<Sha512>;

pub const MAC_LENGTH: usize = 64;

pub fn new_mac(key: &[u8; MAC_KEY_LENGTH]) -> Result<HmacSha512> {
    <HmacSha512 as Mac>::new_from_slice(key).map_err(|e| FilecryptError::Crypto(e.to_string()))
}

pub fn finalize(mac: HmacSha512) -> [u8; MAC_LENGTH] {
    let mut digest = [0u8; MAC_LENGTH];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    digest
}

/// Constant-time comparison of the accumulated digest against `expected`.
pub fn verify(mac: HmacSha512, expected: &[u8; MAC_LENGTH]) -> Result<()> {
    mac.verify_slice(expected)
        .map_err(|_| FilecryptError::Authentication)
}
