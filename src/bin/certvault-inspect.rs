//! certvault-inspect - show what certvault would store for a PEM bundle
//!
//! Checks each file with the same bundle rules the certificate manager
//! applies on ingest and prints the content identifier and certificate
//! metadata, without writing anything.

use anyhow::{Context, Result};
use certvault::cert::{check_bundle, classify, is_valid_org_prefix, ParsedCertificate};
use certvault::core::config::{LogFormat, LoggingConfig};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Inspect PEM bundles before ingesting them
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PEM files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Organisation prefix for the derived identifier
    #[arg(long, default_value = "")]
    org: String,

    /// Passphrase for encrypted private keys
    #[arg(long, env = "CERTVAULT_SECRET", default_value = "", hide_env_values = true)]
    secret: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if !is_valid_org_prefix(&args.org) {
        anyhow::bail!("--org must not contain a path separator: {:?}", args.org);
    }

    certvault::core::logging::init(&LoggingConfig {
        level: if args.verbose { "debug" } else { "warn" }.to_string(),
        format: LogFormat::Text,
        file_line: false,
    });

    let mut failed = 0;
    for path in &args.files {
        if let Err(e) = inspect(path, &args) {
            eprintln!("{}: {:#}", path.display(), e);
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) could not be parsed", failed, args.files.len());
    }
    Ok(())
}

fn inspect(path: &Path, args: &Args) -> Result<()> {
    let data = std::fs::read(path).context("Failed to read file")?;
    let content = check_bundle(classify(&data, Some(args.secret.as_bytes()))?)
        .context("Bundle would be rejected")?;
    content
        .matched_private_key()
        .context("Bundle would be rejected")?;

    let parsed = ParsedCertificate::from_pem(&data, &args.secret).context("Failed to parse bundle")?;
    let meta = parsed.meta(&format!("{}{}", args.org, parsed.fingerprint()));

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        OutputFormat::Text => {
            println!("{}", path.display());
            println!("  id:          {}", meta.id);
            println!("  fingerprint: {}", meta.fingerprint);
            println!("  private key: {}", if meta.has_private_key { "yes" } else { "no" });
            if !meta.subject.is_empty() {
                println!("  subject:     {}", meta.subject);
            }
            if !meta.issuer.is_empty() {
                println!("  issuer:      {}", meta.issuer);
            }
            if let (Some(from), Some(until)) = (meta.not_before, meta.not_after) {
                println!("  valid:       {} .. {}", from, until);
            }
            if !meta.dns_names.is_empty() {
                println!("  dns names:   {}", meta.dns_names.join(", "));
            }
            println!("  chain:       {} certificate(s)", parsed.chain().len());
        }
    }

    Ok(())
}
