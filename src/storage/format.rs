use std::io::{self, Read, Write};

use crate::crypto::cipher::BLOCK_LENGTH;
use crate::crypto::mac::MAC_LENGTH;
use crate::error::{FilecryptError, Result};

/// Magic bytes identifying an encrypted file: "Enc-v1"
pub const MAGIC: &[u8; MAGIC_LENGTH] = b"Enc-v1";

pub const MAGIC_LENGTH: usize = 6;

/// Length of the AES-CBC IV in bytes.
pub const IV_LENGTH: usize = BLOCK_LENGTH;

/// magic(6) + iv(16) + mac(64). The ciphertext body starts here.
pub const HEADER_LENGTH: usize = MAGIC_LENGTH + IV_LENGTH + MAC_LENGTH;

/// Fixed header at the start of every encrypted file.
///
/// The MAC covers the ciphertext body only; neither the magic nor the IV is
/// authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; MAGIC_LENGTH],
    pub iv: [u8; IV_LENGTH],
    pub mac: [u8; MAC_LENGTH],
}

impl Header {
    pub fn new(iv: [u8; IV_LENGTH], mac: [u8; MAC_LENGTH]) -> Self {
        Self {
            magic: *MAGIC,
            iv,
            mac,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut data = [0u8; HEADER_LENGTH];
        data[..MAGIC_LENGTH].copy_from_slice(&self.magic);
        data[MAGIC_LENGTH..MAGIC_LENGTH + IV_LENGTH].copy_from_slice(&self.iv);
        data[MAGIC_LENGTH + IV_LENGTH..].copy_from_slice(&self.mac);
        data
    }

    pub fn validate_magic(&self) -> Result<()> {
        validate_magic(&self.magic)
    }
}

pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> Result<()> {
    writer.write_all(&header.to_bytes())?;
    Ok(())
}

/// Reads the raw header without judging its contents.
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut data = [0u8; HEADER_LENGTH];
    reader.read_exact(&mut data).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => FilecryptError::format("File too small"),
        _ => FilecryptError::Io(e),
    })?;

    let mut header = Header::new([0u8; IV_LENGTH], [0u8; MAC_LENGTH]);
    header.magic.copy_from_slice(&data[..MAGIC_LENGTH]);
    header
        .iv
        .copy_from_slice(&data[MAGIC_LENGTH..MAGIC_LENGTH + IV_LENGTH]);
    header.mac.copy_from_slice(&data[MAGIC_LENGTH + IV_LENGTH..]);
    Ok(header)
}

pub fn is_valid_magic(magic: &[u8]) -> bool {
    magic == MAGIC
}

pub fn validate_magic(magic: &[u8]) -> Result<()> {
    if is_valid_magic(magic) {
        Ok(())
    } else {
        Err(FilecryptError::format("Invalid magic bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> Header {
        let mut mac = [0u8; MAC_LENGTH];
        for (i, b) in mac.iter_mut().enumerate() {
            *b = i as u8;
        }
        Header::new([0xA5; IV_LENGTH], mac)
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(HEADER_LENGTH, 86);
        let bytes = sample_header().to_bytes();
        assert_eq!(&bytes[..6], b"Enc-v1");
        assert_eq!(&bytes[6..22], &[0xA5; 16]);
        assert_eq!(bytes[22], 0);
        assert_eq!(bytes[85], 63);
    }

    #[test]
    fn test_write_then_read_header() {
        let header = sample_header();
        let mut data = Vec::new();
        write_header(&mut data, &header).unwrap();
        data.extend_from_slice(b"body");

        let mut cursor = Cursor::new(data);
        let read = read_header(&mut cursor).unwrap();
        assert_eq!(read, header);
        assert!(read.validate_magic().is_ok());
        assert_eq!(cursor.position(), HEADER_LENGTH as u64);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = sample_header().to_bytes();
        let result = read_header(&mut Cursor::new(&bytes[..HEADER_LENGTH - 1]));
        assert!(matches!(result, Err(FilecryptError::Format { .. })));

        let result = read_header(&mut Cursor::new(Vec::<u8>::new()));
        assert!(matches!(result, Err(FilecryptError::Format { .. })));
    }

    #[test]
    fn test_wrong_magic() {
        let mut bytes = sample_header().to_bytes();
        bytes[3] ^= 0x01;
        let header = read_header(&mut Cursor::new(&bytes[..])).unwrap();
        assert!(matches!(
            header.validate_magic(),
            Err(FilecryptError::Format { .. })
        ));
    }

    #[test]
    fn test_is_valid_magic() {
        assert!(is_valid_magic(b"Enc-v1"));
        assert!(!is_valid_magic(b"Enc-v2"));
        assert!(!is_valid_magic(b"Enc-v"));
    }
}
