#![forbid(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

pub use crypto::kdf::{derive_keys, DerivedKeys, KdfParams};
pub use error::{ErrorKind, FilecryptError, Result};
pub use storage::encrypted_file::{
    decrypt, decrypt_stream, decrypt_with, encrypt, encrypt_stream, encrypt_with,
};
