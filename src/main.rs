//! fomod - Main entry point
//!
//! Headless driver for the installer engine: inspect a package, validate its
//! installer documents, or replay a choices file and print the merged tree.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use fomod_engine::cli::{Cli, Commands};
use fomod_engine::archive;
use fomod_engine::{
    FactSheet, FomodInstaller, InstallChoices, InstallOutcome, InstallerSettings,
    Package,
};

/// Initialize the tracing subscriber; RUST_LOG overrides the default level
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed");

    match cli.command {
        Commands::Inspect { dir, json } => {
            info!("Inspecting package: {:?}", dir);
            run_inspect(&dir, json)?;
        }
        Commands::Validate { dir } => {
            info!("Validating package: {:?}", dir);
            match Package::open(&dir) {
                Ok(package) => {
                    info!("Package validation successful");
                    println!(
                        "✓ Package is valid: '{}' with {} page(s) and {} plugin(s)",
                        package.manifest.metadata.display_name(),
                        package.manifest.config.steps.len(),
                        package.manifest.config.plugin_count()
                    );
                }
                Err(e) => {
                    error!("Package validation failed: {}", e);
                    eprintln!("✗ Package validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Install {
            dir,
            choices,
            facts,
            settings,
            save_choices,
            json,
        } => {
            let settings = match settings {
                Some(path) => InstallerSettings::load_from_file(&path)?,
                None => InstallerSettings::default(),
            };
            let facts = match facts {
                Some(path) => FactSheet::load_from_file(&path)?,
                None => FactSheet::new(),
            }
            .with_settings(&settings);
            let choices = match choices {
                Some(path) => {
                    let choices = InstallChoices::load_from_file(&path)?;
                    choices.validate().context("Invalid choices file")?;
                    choices
                }
                None => InstallChoices::new(),
            };

            info!("Running headless installation of {:?}", dir);
            run_install(&dir, settings, &facts, &choices, save_choices.as_deref(), json)?;
        }
    }

    Ok(())
}

/// Print metadata, pages, groups and plugins
fn run_inspect(dir: &Path, json: bool) -> Result<()> {
    let package = Package::open(dir)?;
    let manifest = &package.manifest;

    if json {
        let out = serde_json::json!({
            "layout": package.layout,
            "metadata": manifest.metadata,
            "installer_files": archive::installer_files(&package.source),
            "config": manifest.config,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let metadata = &manifest.metadata;
    println!("Name:    {}", metadata.display_name());
    for (label, value) in [
        ("Version", &metadata.version),
        ("Author", &metadata.author),
        ("Website", &metadata.url),
    ] {
        if !value.is_empty() {
            println!("{:<8} {}", format!("{}:", label), value);
        }
    }
    println!("Data:    {}", display_root(&package.layout.data_root));
    println!();

    println!("Installer files:");
    for file in archive::installer_files(&package.source) {
        println!("  {}", file);
    }

    let config = &manifest.config;
    println!("Required files: {}", config.required_files.len());
    for (page, step) in config.steps.iter().enumerate() {
        let conditional = if step.visible.is_some() { " (conditional)" } else { "" };
        println!("Page {}: {}{}", page + 1, step.name, conditional);
        for group in &step.groups {
            println!("  [{}] {}", group.group_type, group.name);
            for plugin in &group.plugins {
                let dynamic = if plugin.type_info.is_dynamic() { ", dynamic" } else { "" };
                println!(
                    "    - {} ({}{}, {} file(s))",
                    plugin.name,
                    plugin.type_info.default_type,
                    dynamic,
                    plugin.files.len()
                );
            }
        }
    }
    println!("Conditional installs: {}", config.conditional_installs.len());

    Ok(())
}

/// Replay choices and print the merged tree
fn run_install(
    dir: &Path,
    settings: InstallerSettings,
    facts: &FactSheet,
    choices: &InstallChoices,
    save_choices: Option<&Path>,
    json: bool,
) -> Result<()> {
    let installer = FomodInstaller::new(settings);
    let package = Package::open(dir)?;
    // The package source still holds the fomod directory below the data root
    if !installer.is_archive_supported(&package.source) {
        anyhow::bail!(
            "{} is not a FOMOD package or the installer is disabled",
            dir.display()
        );
    }

    let outcome = installer.install(package, facts, choices)?;

    match outcome {
        InstallOutcome::Success(report) => {
            if let Some(path) = save_choices {
                report.choices.save_to_file(path)?;
                info!("Choices saved to {:?}", path);
            }

            if json {
                let out = serde_json::json!({
                    "outcome": "success",
                    "name": report.metadata.display_name(),
                    "files": report.tree.files(),
                    "directories": report.tree.directories(),
                    "overwrites": report.overwrites,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("✓ Installed '{}'", report.metadata.display_name());
                print!("{}", report.tree.render());
                if !report.overwrites.is_empty() {
                    println!("\n--- Overwrites ---");
                    for notice in &report.overwrites {
                        println!(
                            "{}: {} (priority {}) replaced {} (priority {})",
                            notice.destination,
                            notice.winner.source,
                            notice.winner.priority,
                            notice.displaced.source,
                            notice.displaced.priority
                        );
                    }
                }
            }
        }
        InstallOutcome::ManualRequested { name } => {
            if json {
                println!("{}", serde_json::json!({ "outcome": "manual", "name": name }));
            } else {
                println!("Manual installation requested for '{}'", name);
            }
        }
        InstallOutcome::Cancelled => {
            if json {
                println!("{}", serde_json::json!({ "outcome": "cancelled" }));
            } else {
                println!("Installation cancelled");
            }
        }
    }

    Ok(())
}

fn display_root(root: &str) -> &str {
    if root.is_empty() { "<archive root>" } else { root }
}
