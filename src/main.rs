//! relman CLI
//!
//! Entry point for the `relman` command: publishes one release into the
//! manifest.

use clap::Parser;
use release_manifest::config::DEFAULT_CONFIG_FILE;
use release_manifest::publish::EXIT_FAILURE;
use release_manifest::{PublishConfig, PublishReport, Publisher, SigningMode};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relman")]
#[command(about = "Publish a release's build artifacts into the release manifest", version)]
struct Cli {
    /// Release identifier (commit SHA or version tag)
    release_id: String,

    /// Path to config file (default: ./relman.toml when present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Manifest file to update
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Directory containing one build directory per release
    #[arg(long)]
    builds_root: Option<PathBuf>,

    /// Public base URL artifacts are served from
    #[arg(long)]
    base_url: Option<String>,

    /// Create the manifest if it does not exist (first run)
    #[arg(long)]
    allow_new_manifest: bool,

    /// Private key (PKCS#8 PEM) used to sign artifacts
    #[arg(long)]
    signing_key: Option<PathBuf>,

    /// Signing mode: off, optional or required
    #[arg(long)]
    signing_mode: Option<SigningMode>,

    /// Build the release record without writing the manifest
    #[arg(long)]
    dry_run: bool,

    /// Output the publish report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// CLI flags as the highest-precedence config layer
    fn overrides(&self) -> Value {
        let mut map = Map::new();
        if let Some(path) = &self.manifest {
            map.insert("manifest_path".into(), path_value(path));
        }
        if let Some(path) = &self.builds_root {
            map.insert("builds_root".into(), path_value(path));
        }
        if let Some(url) = &self.base_url {
            map.insert("base_url".into(), Value::String(url.clone()));
        }
        if self.allow_new_manifest {
            map.insert("allow_new_manifest".into(), Value::Bool(true));
        }
        if self.dry_run {
            map.insert("dry_run".into(), Value::Bool(true));
        }

        let mut signing = Map::new();
        if let Some(path) = &self.signing_key {
            signing.insert("key_path".into(), path_value(path));
            // A key on the command line means the caller expects signatures
            if self.signing_mode.is_none() {
                signing.insert("mode".into(), Value::String("required".into()));
            }
        }
        if let Some(mode) = self.signing_mode {
            let mode = serde_json::to_value(mode).unwrap_or(Value::Null);
            signing.insert("mode".into(), mode);
        }
        if !signing.is_empty() {
            map.insert("signing".into(), Value::Object(signing));
        }

        Value::Object(map)
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_file = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });

    let config = match PublishConfig::load(config_file.as_deref(), Some(cli.overrides())) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(EXIT_FAILURE);
        }
    };

    let publisher = match Publisher::new(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    match publisher.publish(&cli.release_id) {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing report: {}", e);
                        process::exit(EXIT_FAILURE);
                    }
                }
            } else {
                print_report(&report);
            }
            process::exit(report.exit_code());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn print_report(report: &PublishReport) {
    let record = &report.record;
    let verb = match (report.written, report.replaced) {
        (false, _) => "Dry run for",
        (true, true) => "Republished",
        (true, false) => "Published",
    };

    println!(
        "{} release {} -> {}",
        verb,
        report.release_id,
        report.manifest_path.display()
    );
    println!("  Signed: {}", if record.insecure { "no" } else { "yes" });
    for (group, entries) in &record.groups {
        let labels: Vec<&str> = entries.keys().map(String::as_str).collect();
        let signed = entries.values().filter(|e| e.is_signed()).count();
        println!(
            "  {}: {} ({}), {} signed",
            group,
            entries.len(),
            labels.join(", "),
            signed
        );
    }

    if !record.failures.is_empty() {
        println!("  Failed artifacts:");
        for failure in &record.failures {
            println!(
                "    {} [{}/{}] {}: {}",
                failure.file, failure.group, failure.label, failure.stage, failure.error
            );
        }
    }

    if !report.written {
        match serde_json::to_string_pretty(record) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing record: {}", e),
        }
    }
}
