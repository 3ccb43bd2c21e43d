use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretBox};
use sha1::Sha1;
use zeroize::Zeroizing;

pub const CIPHER_KEY_LENGTH: usize = 32;
pub const MAC_KEY_LENGTH: usize = 64;

/// Salt shared by every file. Security rests on the password and the
/// iteration count alone; changing it breaks compatibility with existing files.
pub const SALT: [u8; 16] = [
    0xE1, 0x78, 0xBF, 0x28, 0x11, 0xD0, 0xA1, 0x4A, 0xB0, 0x46, 0x50, 0x0F, 0x19, 0xDF, 0x51, 0x39,
];

#[cfg(debug_assertions)]
pub const DEFAULT_ITERATIONS: u32 = 1_000;
#[cfg(not(debug_assertions))]
pub const DEFAULT_ITERATIONS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2 rounds. Higher is slower for both the user and an attacker.
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Fast parameters for testing only.
    #[cfg(test)]
    pub fn test_params() -> Self {
        Self { iterations: 1 }
    }
}

/// Cipher and MAC keys derived from one password.
pub struct DerivedKeys {
    cipher_key: SecretBox<[u8; CIPHER_KEY_LENGTH]>,
    mac_key: SecretBox<[u8; MAC_KEY_LENGTH]>,
}

impl DerivedKeys {
    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_LENGTH] {
        self.cipher_key.expose_secret()
    }

    pub fn mac_key(&self) -> &[u8; MAC_KEY_LENGTH] {
        self.mac_key.expose_secret()
    }
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys")
            .field("cipher_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2-HMAC-SHA1 over the fixed salt. The first 32 bytes of output key
/// the cipher, the next 64 key the MAC. Never fails; an empty password is fine.
pub fn derive_keys(password: &str, params: &KdfParams) -> DerivedKeys {
    let mut okm = Zeroizing::new([0u8; CIPHER_KEY_LENGTH + MAC_KEY_LENGTH]);
    pbkdf2_hmac::<Sha1>(
        password.as_bytes(),
        &SALT,
        params.iterations.max(1),
        okm.as_mut_slice(),
    );

    let mut cipher_key = Box::new([0u8; CIPHER_KEY_LENGTH]);
    cipher_key.copy_from_slice(&okm[..CIPHER_KEY_LENGTH]);
    let mut mac_key = Box::new([0u8; MAC_KEY_LENGTH]);
    mac_key.copy_from_slice(&okm[CIPHER_KEY_LENGTH..]);

    DerivedKeys {
        cipher_key: SecretBox::new(cipher_key),
        mac_key: SecretBox::new(mac_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_keys_deterministic() {
        let params = KdfParams::test_params();
        let keys1 = derive_keys("password", &params);
        let keys2 = derive_keys("password", &params);
        assert_eq!(keys1.cipher_key(), keys2.cipher_key());
        assert_eq!(keys1.mac_key(), keys2.mac_key());
    }

    #[test]
    fn test_derive_keys_different_passwords() {
        let params = KdfParams::test_params();
        let keys1 = derive_keys("password1", &params);
        let keys2 = derive_keys("password2", &params);
        assert_ne!(keys1.cipher_key(), keys2.cipher_key());
        assert_ne!(keys1.mac_key(), keys2.mac_key());
    }

    #[test]
    fn test_derive_keys_different_iterations() {
        let keys1 = derive_keys("password", &KdfParams::new(1));
        let keys2 = derive_keys("password", &KdfParams::new(2));
        assert_ne!(keys1.cipher_key(), keys2.cipher_key());
    }

    #[test]
    fn test_keys_are_split_from_one_output() {
        let params = KdfParams::new(3);
        let keys = derive_keys("qwert", &params);

        let mut okm = [0u8; CIPHER_KEY_LENGTH + MAC_KEY_LENGTH];
        pbkdf2_hmac::<Sha1>(b"qwert", &SALT, 3, &mut okm);
        assert_eq!(keys.cipher_key()[..], okm[..CIPHER_KEY_LENGTH]);
        assert_eq!(keys.mac_key()[..], okm[CIPHER_KEY_LENGTH..]);
    }

    #[test]
    fn test_empty_password_accepted() {
        let keys = derive_keys("", &KdfParams::test_params());
        assert_eq!(keys.cipher_key().len(), CIPHER_KEY_LENGTH);
        assert_eq!(keys.mac_key().len(), MAC_KEY_LENGTH);
    }

    #[test]
    fn test_zero_iterations_treated_as_one() {
        let keys0 = derive_keys("password", &KdfParams::new(0));
        let keys1 = derive_keys("password", &KdfParams::new(1));
        assert_eq!(keys0.cipher_key(), keys1.cipher_key());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let keys = derive_keys("password", &KdfParams::test_params());
        let rendered = format!("{keys:?}");
        assert!(rendered.contains("REDACTED"));
    }
}
