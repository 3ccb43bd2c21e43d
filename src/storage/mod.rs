pub mod encrypted_file;
pub mod format;
