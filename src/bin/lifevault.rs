//! Lifevault CLI - passphrase-locked planning records
//!
//! Sets up the vault, reports its state, and moves the decrypted record in
//! and out through plain JSON export bundles.

use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use lifevault::config::{self, SessionConfig};
use lifevault::error::{ErrorCategory, ErrorKind, Result, VaultError};
use lifevault::export::ExportBundle;
use lifevault::kdf::ScryptCost;
use lifevault::passphrase::{self, PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use lifevault::session::{LockState, Session};
use lifevault::store::{self, FileStore};

#[derive(Parser)]
#[command(name = "lifevault")]
#[command(version)]
#[command(about = "Passphrase-locked vault for financial, estate and next-of-kin plans.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Directory holding the vault
    #[arg(long, global = true, env = "LIFEVAULT_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// scrypt cost (log2 N) for newly wrapped keys
    #[arg(long, global = true, hide = true, value_name = "LOG_N")]
    kdf_log_n: Option<u8>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vault and choose its passphrase
    Setup,

    /// Show whether the vault is set up
    Status,

    /// Unlock the vault and write its contents to a plain JSON bundle
    #[command(alias = "e")]
    Export {
        /// Path to the file to write the bundle to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Unlock the vault and replace its contents with a JSON bundle
    #[command(alias = "i")]
    Import {
        /// Path to the bundle to import
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Permanently delete the vault and everything in it
    Wipe {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e.user_message());
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "lifevault=info",
        _ => "lifevault=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config::default_data_dir().ok_or_else(|| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::StorageFailure,
                "could not determine a data directory; pass --data-dir",
            )
        })?,
    };

    let mut session_config = SessionConfig::default();
    if let Some(log_n) = cli.kdf_log_n {
        session_config = session_config.with_scrypt(ScryptCost {
            log_n,
            ..ScryptCost::default()
        });
    }

    let mut session = Session::open(FileStore::open(&data_dir)?, session_config)?;

    match cli.command {
        Commands::Setup => setup(&mut session, cli.passphrase_stdin),
        Commands::Status => {
            println!("{}", session.state());
            println!("data directory: {}", data_dir.display());
            Ok(())
        }
        Commands::Export { output } => {
            unlock(&mut session, cli.passphrase_stdin)?;
            let bundle = ExportBundle::from_record(session.export_record()?);
            session.lock();
            store::write_private_file(&output, bundle.to_json()?.as_bytes())?;
            eprintln!("Exported to {}", output.display());
            Ok(())
        }
        Commands::Import { input } => {
            let record = read_bundle(&input)?.into_record()?;
            unlock(&mut session, cli.passphrase_stdin)?;
            session.import_record(record)?;
            session.lock();
            eprintln!("Imported {}", input.display());
            Ok(())
        }
        Commands::Wipe { yes } => {
            if !yes {
                return Err(VaultError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::InvalidState,
                    "wipe deletes all data permanently; pass --yes to confirm",
                ));
            }
            session.wipe()?;
            eprintln!("Vault wiped");
            Ok(())
        }
    }
}

fn setup(session: &mut Session<FileStore>, use_stdin: bool) -> Result<()> {
    if session.state() != LockState::Uninitialized {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::AlreadySetup,
            "vault is already set up",
        ));
    }

    let mut reader = get_passphrase_reader(use_stdin, "New passphrase (lifevault): ");
    let bytes = reader.read_passphrase()?;
    let new_passphrase = passphrase::as_str(&bytes)?;

    if !use_stdin {
        let mut confirm = TerminalPassphraseReader::with_prompt("Confirm passphrase (lifevault): ");
        if *confirm.read_passphrase()? != *bytes {
            return Err(VaultError::new(ErrorCategory::User, "passphrases do not match"));
        }
    }

    session.setup(new_passphrase)?;
    session.lock();
    eprintln!(
        "Vault created (passphrase strength: {}). The passphrase cannot be recovered if lost.",
        passphrase::strength(new_passphrase)
    );
    Ok(())
}

fn unlock(session: &mut Session<FileStore>, use_stdin: bool) -> Result<()> {
    let mut reader = get_passphrase_reader(use_stdin, "Passphrase (lifevault): ");
    let bytes = reader.read_passphrase()?;
    if session.unlock(passphrase::as_str(&bytes)?)? {
        Ok(())
    } else {
        Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::WrongPassphrase,
            "incorrect passphrase",
        ))
    }
}

fn read_bundle(path: &Path) -> Result<ExportBundle> {
    let json = fs::read_to_string(path).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to read {}: {}", path.display(), e),
            e,
        )
    })?;
    ExportBundle::from_json(&json)
}

fn get_passphrase_reader(use_stdin: bool, prompt: &str) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader::with_prompt(prompt))
    }
}
