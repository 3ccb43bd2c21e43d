//! Incremental AES-256-CBC with PKCS#7 padding.
//!
//! Both contexts accept input in arbitrary slices and emit whole blocks as
//! soon as they are known, so a file of any size passes through a fixed
//! amount of memory.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use block_padding::{Padding, Pkcs7};

use crate::crypto::kdf::CIPHER_KEY_LENGTH;
use crate::error::{FilecryptError, Result};

pub const BLOCK_LENGTH: usize = 16;

pub struct CbcEncryptor {
    inner: cbc::Encryptor<Aes256>,
    pending: Vec<u8>,
}

impl CbcEncryptor {
    pub fn new(key: &[u8; CIPHER_KEY_LENGTH], iv: &[u8; BLOCK_LENGTH]) -> Self {
        Self {
            inner: cbc::Encryptor::new(GenericArray::from_slice(key), GenericArray::from_slice(iv)),
            pending: Vec::with_capacity(BLOCK_LENGTH),
        }
    }

    /// Encrypts every complete block available and appends it to `out`.
    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);
        let ready = self.pending.len() - self.pending.len() % BLOCK_LENGTH;
        for chunk in self.pending[..ready].chunks_exact_mut(BLOCK_LENGTH) {
            self.inner.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        out.extend_from_slice(&self.pending[..ready]);
        self.pending.drain(..ready);
    }

    /// Pads the remainder and emits the final block. Always emits exactly one block.
    pub fn finalize(mut self, out: &mut Vec<u8>) {
        let mut block = aes::Block::default();
        let pos = self.pending.len();
        block[..pos].copy_from_slice(&self.pending);
        Pkcs7::pad(&mut block, pos);
        self.inner.encrypt_block_mut(&mut block);
        out.extend_from_slice(&block);
    }
}

pub struct CbcDecryptor {
    inner: cbc::Decryptor<Aes256>,
    pending: Vec<u8>,
}

impl CbcDecryptor {
    pub fn new(key: &[u8; CIPHER_KEY_LENGTH], iv: &[u8; BLOCK_LENGTH]) -> Self {
        Self {
            inner: cbc::Decryptor::new(GenericArray::from_slice(key), GenericArray::from_slice(iv)),
            pending: Vec::with_capacity(2 * BLOCK_LENGTH),
        }
    }

    /// Decrypts complete blocks, always holding back the last one since it
    /// carries the padding.
    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);
        let len = self.pending.len();
        if len <= BLOCK_LENGTH {
            return;
        }
        let held = match len % BLOCK_LENGTH {
            0 => BLOCK_LENGTH,
            rem => rem,
        };
        let ready = len - held;
        for chunk in self.pending[..ready].chunks_exact_mut(BLOCK_LENGTH) {
            self.inner.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        out.extend_from_slice(&self.pending[..ready]);
        self.pending.drain(..ready);
    }

    /// Decrypts the held-back block and strips its padding.
    pub fn finalize(mut self, out: &mut Vec<u8>) -> Result<()> {
        if self.pending.len() != BLOCK_LENGTH {
            return Err(FilecryptError::Authentication);
        }
        let block = GenericArray::from_mut_slice(&mut self.pending);
        self.inner.decrypt_block_mut(block);
        let plain = Pkcs7::unpad(&*block).map_err(|_| FilecryptError::Authentication)?;
        out.extend_from_slice(plain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; CIPHER_KEY_LENGTH] = [0x42; CIPHER_KEY_LENGTH];
    const IV: [u8; BLOCK_LENGTH] = [0x24; BLOCK_LENGTH];

    fn encrypt_in_pieces(plaintext: &[u8], piece: usize) -> Vec<u8> {
        let mut enc = CbcEncryptor::new(&KEY, &IV);
        let mut out = Vec::new();
        for part in plaintext.chunks(piece.max(1)) {
            enc.update(part, &mut out);
        }
        enc.finalize(&mut out);
        out
    }

    fn decrypt_in_pieces(ciphertext: &[u8], piece: usize) -> Result<Vec<u8>> {
        let mut dec = CbcDecryptor::new(&KEY, &IV);
        let mut out = Vec::new();
        for part in ciphertext.chunks(piece.max(1)) {
            dec.update(part, &mut out);
        }
        dec.finalize(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_matches_one_shot_cbc() {
        let plaintext = b"The quick brown fox jumps over the lazy dog, twice over.";
        let mut buf = vec![0u8; plaintext.len() + BLOCK_LENGTH];
        buf[..plaintext.len()].copy_from_slice(plaintext);
        let expected = cbc::Encryptor::<Aes256>::new(
            GenericArray::from_slice(&KEY),
            GenericArray::from_slice(&IV),
        )
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .unwrap()
        .to_vec();
        for piece in [1, 7, 16, 33, 1024] {
            assert_eq!(encrypt_in_pieces(plaintext, piece), expected);
        }
    }

    #[test]
    fn test_roundtrip_any_split() {
        let plaintext: Vec<u8> = (0..100u8).collect();
        let ciphertext = encrypt_in_pieces(&plaintext, 13);
        for piece in [1, 5, 16, 17, 200] {
            assert_eq!(decrypt_in_pieces(&ciphertext, piece).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_empty_input_is_one_padding_block() {
        let ciphertext = encrypt_in_pieces(b"", 1);
        assert_eq!(ciphertext.len(), BLOCK_LENGTH);
        assert!(decrypt_in_pieces(&ciphertext, 16).unwrap().is_empty());
    }

    #[test]
    fn test_block_aligned_input_gets_full_padding_block() {
        let ciphertext = encrypt_in_pieces(&[7u8; 32], 32);
        assert_eq!(ciphertext.len(), 48);
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let ciphertext = encrypt_in_pieces(b"Hello World", 4);
        assert!(decrypt_in_pieces(&ciphertext[..10], 4).is_err());
        assert!(decrypt_in_pieces(&[], 4).is_err());
    }

    #[test]
    fn test_bad_padding_rejected() {
        let ciphertext = encrypt_in_pieces(b"Hello World", 4);
        // Single block: the IV XORs straight into the padding byte.
        let mut iv = IV;
        iv[BLOCK_LENGTH - 1] ^= 0xFF;
        let mut dec = CbcDecryptor::new(&KEY, &iv);
        let mut out = Vec::new();
        dec.update(&ciphertext, &mut out);
        let result = dec.finalize(&mut out);
        assert!(matches!(result, Err(FilecryptError::Authentication)));
    }
}
