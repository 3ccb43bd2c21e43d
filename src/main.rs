#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tracing::Level;

use filecrypt::config::AppConfig;
use filecrypt::error::{FilecryptError, Result};
use filecrypt::storage::encrypted_file;
use filecrypt::storage::format::{Header, HEADER_LENGTH};

#[derive(Parser)]
#[command(name = "filecrypt", version, about = "Password-based authenticated file encryption")]
struct Cli {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PBKDF2 iteration count, overriding the config
    #[arg(long)]
    iterations: Option<u32>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encrypt a file
    Encrypt {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decrypt a file, verifying it first
    Decrypt {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the header of an encrypted file
    Inspect { input: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = if let Some(ref config_path) = cli.config {
        AppConfig::load_from(config_path)?
    } else {
        AppConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load config, using defaults");
            AppConfig::default()
        })
    };
    if let Some(iterations) = cli.iterations {
        config.kdf_iterations = iterations;
    }
    config.validate()?;
    let params = config.kdf_params();

    match cli.command {
        Command::Encrypt { input, output } => {
            let output = output.unwrap_or_else(|| config.encrypted_path_for(&input));
            let password = prompt_new_password()?;
            encrypted_file::encrypt_with(password.expose_secret(), &input, &output, &params)?;
            println!("Encrypted {} -> {}", input.display(), output.display());
        }
        Command::Decrypt { input, output } => {
            let output = output.unwrap_or_else(|| config.decrypted_path_for(&input));
            let password = prompt_password("Password: ")?;
            encrypted_file::decrypt_with(password.expose_secret(), &input, &output, &params)?;
            println!("Decrypted {} -> {}", input.display(), output.display());
        }
        Command::Inspect { input } => inspect(&input)?,
    }
    Ok(())
}

fn prompt_password(prompt: &str) -> Result<SecretString> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(SecretString::from(password))
}

fn prompt_new_password() -> Result<SecretString> {
    let first = prompt_password("Password: ")?;
    let second = prompt_password("Confirm password: ")?;
    if first.expose_secret() != second.expose_secret() {
        return Err(FilecryptError::Config("passwords do not match".to_string()));
    }
    Ok(first)
}

fn inspect(input: &Path) -> Result<()> {
    let header = encrypted_file::read_file_header(input)?;
    let total = std::fs::metadata(input)?.len();
    print!("{}", describe_header(&header, total));
    Ok(())
}

fn describe_header(header: &Header, file_len: u64) -> String {
    format!(
        "magic:      {}\niv:         {}\nmac:        {}\nciphertext: {} bytes\n",
        String::from_utf8_lossy(&header.magic),
        hex::encode(header.iv),
        hex::encode(header.mac),
        file_len.saturating_sub(HEADER_LENGTH as u64)
    )
}
