pub mod cipher;
pub mod kdf;
pub mod mac;

use rand::RngCore;

use crate::crypto::cipher::BLOCK_LENGTH;

/// Fresh IV from the thread-local CSPRNG.
pub fn generate_iv() -> [u8; BLOCK_LENGTH] {
    let mut iv = [0u8; BLOCK_LENGTH];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}
