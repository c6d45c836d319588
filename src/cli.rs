use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sous")]
#[command(version)]
#[command(about = "Declarative single-node provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the system to the manifest's declared state
    Apply(ApplyArgs),

    /// Check a manifest for structural problems without applying it
    Validate(ValidateArgs),

    /// Show the platform facts detected on this machine
    Facts,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Manifest to apply (defaults to ~/.config/sous/manifest.toml)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Report what would change without performing any action
    #[arg(long)]
    pub dry_run: bool,

    /// Override the detected platform family
    #[arg(long)]
    pub family: Option<String>,

    /// Override the detected platform version
    #[arg(long, requires = "family")]
    pub platform_version: Option<String>,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Manifest to validate (defaults to ~/.config/sous/manifest.toml)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}
