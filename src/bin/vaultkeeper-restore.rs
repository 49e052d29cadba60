// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vaultkeeper Restore Utility
//!
//! Puts a vault back to the state captured in a backup directory.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use vaultkeeper::backup::{load_manifest, restore};

#[derive(Parser, Debug)]
#[command(name = "vaultkeeper-restore")]
#[command(version)]
#[command(about = "Restore a vault from a Vaultkeeper backup")]
struct Args {
    /// Backup directory created by a vaultkeeper run
    backup: PathBuf,

    /// Dry run - show what would be restored without doing it
    #[arg(long)]
    dry_run: bool,

    /// List the backup's contents and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_target(false)
        .init();

    let args = Args::parse();

    if !args.backup.is_dir() {
        bail!("Backup directory not found: {:?}", args.backup);
    }

    let manifest = load_manifest(&args.backup)
        .with_context(|| format!("{:?} is not a vaultkeeper backup", args.backup))?;

    if args.list {
        println!(
            "Backup of {} taken {} (run {}, scope {:?})",
            manifest.vault_root.display(),
            manifest.created_at.format("%Y-%m-%d %H:%M:%S"),
            manifest.run_id,
            manifest.scope
        );
        println!("{:-<80}", "");
        println!("Files ({}):", manifest.files.len());
        for file in &manifest.files {
            println!("  {}  {}", &file.hash[..12.min(file.hash.len())], file.path.display());
        }
        println!("Moves ({}):", manifest.moves.len());
        for recorded in &manifest.moves {
            println!("  {} -> {}", recorded.from.display(), recorded.to.display());
        }
        return Ok(());
    }

    println!(
        "{}Restoring {} from {}...",
        if args.dry_run { "[DRY RUN] " } else { "" },
        manifest.vault_root.display(),
        args.backup.display()
    );

    let report = restore(&args.backup, args.dry_run).context("restore failed")?;

    for path in &report.removed {
        println!("  {}: {}", if args.dry_run { "Would remove" } else { "Removed" }, path.display());
    }
    for path in &report.corrupted {
        eprintln!("  Skip: {} (backup copy does not match its hash)", path.display());
    }

    println!();
    if args.dry_run {
        println!(
            "Dry run complete. {} file(s) would be restored, {} removed.",
            report.restored.len(),
            report.removed.len()
        );
    } else {
        println!(
            "Done. {} restored, {} removed, {} skipped.",
            report.restored.len(),
            report.removed.len(),
            report.corrupted.len()
        );
    }

    Ok(())
}
