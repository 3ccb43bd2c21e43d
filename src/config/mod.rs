use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::crypto::kdf::KdfParams;
use crate::error::{FilecryptError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// PBKDF2 rounds. Files must be decrypted with the count they were encrypted with.
    pub kdf_iterations: u32,
    pub encrypted_extension: String,
    pub decrypted_extension: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: KdfParams::default().iterations,
            encrypted_extension: "enc".to_string(),
            decrypted_extension: "dec".to_string(),
        }
    }
}

impl AppConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(self.kdf_iterations)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kdf_iterations == 0 {
            return Err(FilecryptError::Config(
                "kdf_iterations must be at least 1".to_string(),
            ));
        }
        if self.encrypted_extension.is_empty() || self.decrypted_extension.is_empty() {
            return Err(FilecryptError::Config(
                "file extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load() -> Result<Self> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = AppConfig::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(FilecryptError::Config(format!(
                "Config file not found: {}",
                path.display()
            )))
        }
    }

    /// Default output path when encrypting `input`: `<input>.<encrypted_extension>`.
    pub fn encrypted_path_for(&self, input: &Path) -> PathBuf {
        append_extension(input, &self.encrypted_extension)
    }

    /// Default output path when decrypting `input`: strips the encrypted
    /// extension if present, otherwise appends the decrypted one.
    pub fn decrypted_path_for(&self, input: &Path) -> PathBuf {
        match input.extension() {
            Some(ext) if ext == self.encrypted_extension.as_str() => input.with_extension(""),
            _ => append_extension(input, &self.decrypted_extension),
        }
    }
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn config_file_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", "filecrypt") {
        dirs.config_dir().join("config.toml")
    } else {
        PathBuf::from("filecrypt.toml")
    }
}
