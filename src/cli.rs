use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fomod - Rule-driven FOMOD package installer
#[derive(Parser)]
#[command(name = "fomod")]
#[command(about = "Inspect, validate and headlessly install FOMOD mod packages")]
#[command(version)]
pub struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print metadata, pages, groups and plugins of a package
    Inspect {
        /// Extracted archive directory
        dir: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Parse a package's installer files and report errors
    Validate {
        /// Extracted archive directory
        dir: PathBuf,
    },
    /// Run the installer without interaction and print the resulting file tree
    Install {
        /// Extracted archive directory
        dir: PathBuf,

        /// Choices file to replay (defaults are used where absent)
        #[arg(short, long)]
        choices: Option<PathBuf>,

        /// Fact sheet describing the host's plugins, files and versions
        #[arg(short, long)]
        facts: Option<PathBuf>,

        /// Installer settings file
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Save the applied choices to this file
        #[arg(long)]
        save_choices: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
