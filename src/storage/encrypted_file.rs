use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hmac::Mac as _;
use tracing::{debug, warn};

use crate::crypto::cipher::{CbcDecryptor, CbcEncryptor, BLOCK_LENGTH};
use crate::crypto::kdf::{self, DerivedKeys, KdfParams};
use crate::crypto::{generate_iv, mac};
use crate::error::Result;
use crate::storage::format::{self, Header, HEADER_LENGTH};

const CHUNK_SIZE: usize = 64 * 1024;

/// Encrypt `source` into `dest` with the default KDF parameters.
pub fn encrypt(password: &str, source: &Path, dest: &Path) -> Result<()> {
    encrypt_with(password, source, dest, &KdfParams::default())
}

/// Decrypt `source` into `dest` with the default KDF parameters.
pub fn decrypt(password: &str, source: &Path, dest: &Path) -> Result<()> {
    decrypt_with(password, source, dest, &KdfParams::default())
}

/// Encrypt `source` into `dest`, creating or truncating `dest`.
///
/// A failure part way through may leave a partial `dest` behind; removing it
/// is up to the caller.
pub fn encrypt_with(password: &str, source: &Path, dest: &Path, params: &KdfParams) -> Result<()> {
    debug!(source = %source.display(), dest = %dest.display(), "encrypting file");
    ensure_distinct(source, dest)?;
    let keys = kdf::derive_keys(password, params);

    let mut input = BufReader::new(File::open(source)?);
    let mut output = BufWriter::new(File::create(dest)?);
    let written = encrypt_stream(&keys, &mut input, &mut output)?;

    let file = output.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    debug!(bytes = written, "encryption finished");
    Ok(())
}

/// Decrypt `source` into `dest`.
///
/// `dest` is only written once the MAC has been verified, and on any failure
/// it does not exist afterwards.
pub fn decrypt_with(password: &str, source: &Path, dest: &Path, params: &KdfParams) -> Result<()> {
    debug!(source = %source.display(), dest = %dest.display(), "decrypting file");
    ensure_distinct(source, dest)?;
    let result = decrypt_file(password, source, dest, params);
    if let Err(ref err) = result {
        warn!(dest = %dest.display(), error = %err, "decryption failed, removing output");
        remove_if_exists(dest);
    }
    result
}

/// Read the header of an encrypted file without a password.
pub fn read_file_header(path: &Path) -> Result<Header> {
    let mut input = BufReader::new(File::open(path)?);
    let header = format::read_header(&mut input)?;
    header.validate_magic()?;
    Ok(header)
}

/// Encrypt-then-MAC from `input` into `output`, returning the body length.
///
/// Header space is reserved at the current position of `output`, the body is
/// streamed after it, and the real header is written back once the MAC is
/// known. `output` is left positioned at the end of the body.
pub fn encrypt_stream<R: Read, W: Write + Seek>(
    keys: &DerivedKeys,
    input: &mut R,
    output: &mut W,
) -> Result<u64> {
    let start = output.stream_position()?;
    output.write_all(&[0u8; HEADER_LENGTH])?;

    let iv = generate_iv();
    let mut cipher = CbcEncryptor::new(keys.cipher_key(), &iv);
    let mut hmac = mac::new_mac(keys.mac_key())?;
    encrypt_body(&mut cipher, &mut hmac, input, output)?;

    let mut tail = Vec::with_capacity(BLOCK_LENGTH);
    cipher.finalize(&mut tail);
    hmac.update(&tail);
    output.write_all(&tail)?;

    let header = Header::new(iv, mac::finalize(hmac));
    let end = output.stream_position()?;
    output.seek(SeekFrom::Start(start))?;
    format::write_header(output, &header)?;
    output.seek(SeekFrom::Start(end))?;
    output.flush()?;

    Ok(end - start - HEADER_LENGTH as u64)
}

/// Verify-then-decrypt from `input` into `output`.
///
/// The body is read twice: once to recompute the MAC and, only if it matches,
/// once more to decrypt. Nothing is written to `output` on a MAC mismatch.
pub fn decrypt_stream<R: Read + Seek, W: Write>(
    keys: &DerivedKeys,
    input: &mut R,
    output: &mut W,
) -> Result<u64> {
    let start = input.stream_position()?;
    let header = format::read_header(input)?;
    header.validate_magic()?;
    let body_start = start + HEADER_LENGTH as u64;

    verify_body(keys, &header, input)?;

    input.seek(SeekFrom::Start(body_start))?;
    decrypt_body(keys, &header, input, output)
}

fn encrypt_body<R: Read, W: Write>(
    cipher: &mut CbcEncryptor,
    hmac: &mut mac::HmacSha512,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut out = Vec::with_capacity(CHUNK_SIZE + BLOCK_LENGTH);
    loop {
        let n = read_chunk(input, &mut buf)?;
        if n == 0 {
            return Ok(());
        }
        out.clear();
        cipher.update(&buf[..n], &mut out);
        hmac.update(&out);
        output.write_all(&out)?;
    }
}

fn verify_body<R: Read>(keys: &DerivedKeys, header: &Header, input: &mut R) -> Result<()> {
    let mut hmac = mac::new_mac(keys.mac_key())?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = read_chunk(input, &mut buf)?;
        if n == 0 {
            break;
        }
        hmac.update(&buf[..n]);
    }
    mac::verify(hmac, &header.mac)
}

/// Decrypts a body whose MAC already matched. A padding failure here means
/// the key or IV is wrong and is reported as an authentication failure.
fn decrypt_body<R: Read, W: Write>(
    keys: &DerivedKeys,
    header: &Header,
    input: &mut R,
    output: &mut W,
) -> Result<u64> {
    let mut cipher = CbcDecryptor::new(keys.cipher_key(), &header.iv);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut out = Vec::with_capacity(CHUNK_SIZE + BLOCK_LENGTH);
    let mut written = 0u64;
    loop {
        let n = read_chunk(input, &mut buf)?;
        if n == 0 {
            break;
        }
        out.clear();
        cipher.update(&buf[..n], &mut out);
        output.write_all(&out)?;
        written += out.len() as u64;
    }
    out.clear();
    cipher.finalize(&mut out)?;
    output.write_all(&out)?;
    output.flush()?;
    Ok(written + out.len() as u64)
}

fn decrypt_file(password: &str, source: &Path, dest: &Path, params: &KdfParams) -> Result<()> {
    let mut input = BufReader::new(File::open(source)?);
    let header = format::read_header(&mut input)?;
    header.validate_magic()?;

    let keys = kdf::derive_keys(password, params);
    verify_body(&keys, &header, &mut input)?;
    debug!("MAC verified");

    input.seek(SeekFrom::Start(HEADER_LENGTH as u64))?;
    let temp_path = temp_path_for(dest);
    let written = match write_plaintext(&keys, &header, &mut input, &temp_path) {
        Ok(written) => written,
        Err(err) => {
            remove_if_exists(&temp_path);
            return Err(err);
        }
    };

    if let Err(err) = fs::rename(&temp_path, dest) {
        remove_if_exists(&temp_path);
        return Err(err.into());
    }
    debug!(bytes = written, "decryption finished");
    Ok(())
}

/// Decrypt into `path`; the handle is closed before returning on every path.
fn write_plaintext<R: Read>(
    keys: &DerivedKeys,
    header: &Header,
    input: &mut R,
    path: &Path,
) -> Result<u64> {
    let mut output = BufWriter::new(File::create(path)?);
    let written = decrypt_body(keys, header, input, &mut output)?;
    let file = output.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(written)
}

/// Short reads are fine here and EOF is data, not an error, so `read_exact` does not fit.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let parent = dest.parent().unwrap_or(Path::new("."));
    let mut name = OsString::from(".");
    if let Some(file_name) = dest.file_name() {
        name.push(file_name);
    }
    name.push(format!(".filecrypt_tmp_{}", std::process::id()));
    parent.join(name)
}

/// Refuses to run when `source` and `dest` name the same file, since the
/// output side truncates or removes `dest`.
fn ensure_distinct(source: &Path, dest: &Path) -> Result<()> {
    if let (Ok(src), Ok(dst)) = (fs::canonicalize(source), fs::canonicalize(dest)) {
        if src == dst {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("source and destination are the same file: {}", src.display()),
            )
            .into());
        }
    }
    Ok(())
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove file"),
    }
}
