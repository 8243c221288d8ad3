//! relman-keygen
//!
//! First-run bootstrap of the Ed25519 keypair used to sign release
//! artifacts. Writes `<name>.key` (keep secret) and `<name>.pub` (ship to
//! update clients).

use clap::Parser;
use release_manifest::publish::EXIT_FAILURE;
use release_manifest::signing::{generate_keypair, write_keypair, SIGNATURE_ALGORITHM};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relman-keygen")]
#[command(about = "Generate an Ed25519 keypair for signing release artifacts", version)]
struct Cli {
    /// Directory to write the key files into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Base name of the key files
    #[arg(long, default_value = "release")]
    name: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let key = generate_keypair();

    match write_keypair(&key, &cli.out_dir, &cli.name) {
        Ok(files) => {
            println!("Algorithm:   {}", SIGNATURE_ALGORITHM);
            println!("Private key: {}", files.private_key.display());
            println!("Public key:  {}", files.public_key.display());
            println!("Fingerprint: {}", files.fingerprint);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}
