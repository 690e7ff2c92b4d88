//! `myfs`: the command-line orchestrator for the volume engine.
//!
//! Every invocation first runs the SmartOTP challenge/response gate (3
//! attempts) over stdin/stdout, then opens the volume under `--volume-dir`
//! and dispatches the requested subcommand. This is a thin shell: each
//! subcommand maps directly onto one `myfs_engine::Volume` method.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand};
use log::error;
use myfs_engine::{EngineError, Volume};
use myfs_otp::{Challenge, Otp};

const OTP_ATTEMPTS: u32 = 3;
const OTP_WINDOW: Duration = Duration::from_secs(60);

const EXIT_ENGINE_ERROR: u8 = 1;
const EXIT_OTP_FAILED: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "myfs", about = "Access an encrypted MyFS volume")]
struct Cli {
    /// Directory containing MyFS.dat and metadata.dat (created if absent).
    #[arg(long, default_value = ".")]
    volume_dir: PathBuf,

    /// Volume access password, if the volume has one.
    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the volume if it doesn't exist yet, then exit.
    Init,
    /// List the files stored in the volume.
    List,
    /// Add a file to the volume.
    Add {
        source: PathBuf,
        name: String,
        #[arg(long)]
        file_password: Option<String>,
    },
    /// Export a stored file back to a path on disk.
    Export {
        name: String,
        #[arg(long)]
        dest: Option<PathBuf>,
        #[arg(long)]
        file_password: Option<String>,
    },
    /// Remove a file from the volume.
    Delete { name: String },
    /// Re-encrypt a stored file under a new per-file password.
    ResetPassword {
        name: String,
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
    /// Change the volume's own access password.
    ChangePassword {
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if !run_otp_gate() {
        eprintln!("OTP verification failed after {OTP_ATTEMPTS} attempts");
        return ExitCode::from(EXIT_OTP_FAILED);
    }

    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::from(EXIT_ENGINE_ERROR)
        }
    }
}

/// Prompts the operator with a SmartOTP challenge and reads their response
/// from stdin, granting [`OTP_ATTEMPTS`] tries before refusing access.
fn run_otp_gate() -> bool {
    for attempt in 1..=OTP_ATTEMPTS {
        let challenge = myfs_otp::generate_challenge();
        print!("SmartOTP challenge {} (attempt {attempt}/{OTP_ATTEMPTS}): ", challenge.as_str());
        std::io::stdout().flush().ok();

        let mut response = String::new();
        if std::io::stdin().read_line(&mut response).is_err() {
            return false;
        }
        let response = response.trim();

        if verify_response(&challenge, response) {
            return true;
        }
        eprintln!("incorrect response");
    }
    false
}

fn verify_response(challenge: &Challenge, response: &str) -> bool {
    let Ok(otp) = Otp::new(response) else {
        return false;
    };
    myfs_otp::verify(&otp, challenge, OTP_WINDOW, SystemTime::now())
}

fn dispatch(cli: &Cli) -> Result<(), EngineError> {
    let (volume_path, metadata_path) = volume_paths(&cli.volume_dir);
    let password = cli.password.as_deref();

    if matches!(cli.command, Command::Init) {
        Volume::open(&volume_path, &metadata_path, password)?;
        println!("volume ready at {}", volume_path.display());
        return Ok(());
    }

    let volume = Volume::open(&volume_path, &metadata_path, password)?;

    match &cli.command {
        Command::Init => unreachable!("handled above"),
        Command::List => {
            for file in volume.list_files()? {
                println!(
                    "{}\t{} bytes\t{}\t{}",
                    file.filename,
                    file.original_size,
                    if file.has_password { "protected" } else { "plain" },
                    file.modification_date,
                );
            }
        }
        Command::Add { source, name, file_password } => {
            volume.add_file(source, name, file_password.as_deref())?;
            println!("added {name:?}");
        }
        Command::Export { name, dest, file_password } => {
            volume.export_file(name, dest.as_deref(), file_password.as_deref())?;
            println!("exported {name:?}");
        }
        Command::Delete { name } => {
            volume.delete_file(name)?;
            println!("deleted {name:?}");
        }
        Command::ResetPassword { name, old_password, new_password } => {
            volume.reset_password(name, old_password, new_password)?;
            println!("reset password for {name:?}");
        }
        Command::ChangePassword { old_password, new_password } => {
            volume.change_access_password(old_password, new_password)?;
            println!("volume access password changed");
        }
    }
    Ok(())
}

fn volume_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join("MyFS.dat"), dir.join("metadata.dat"))
}
