//! Command-line argument parsing for Model Fetcher
//!
//! This module defines the CLI structure using clap derive macros. Running
//! without a subcommand starts the interactive install.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Model Fetcher - install Stable Diffusion weights and support models
#[derive(Parser, Debug)]
#[command(
    name = "model_fetcher",
    version,
    about = "Interactively download model weight files and write models.yaml",
    long_about = "Walks you through choosing Stable Diffusion weight files, downloads them through a
shared content-addressed cache, installs the support models, and records the installed
models in the configuration file read by the image generation application."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand (defaults to `install`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Choose, download and register weight files, then install support models
    Install(InstallArgs),

    /// List the catalog and what is installed
    List,

    /// Install only the support models
    Support,

    /// Manage the access token
    Auth(AuthArgs),

    /// Manage the settings file
    Config(ConfigArgs),
}

/// Arguments for the install command
#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Model to mark as default instead of the first installed one
    #[arg(long = "default", value_name = "NAME")]
    pub default_model: Option<String>,

    /// Accept every default answer without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Do not install support models
    #[arg(long)]
    pub skip_support: bool,
}

/// Arguments for token management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Token actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Walk through licence acceptance and store a token
    Setup,

    /// Show where the token comes from
    Status,

    /// Remove the stored token file
    Clear,
}

/// Arguments for settings management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Settings actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default settings file
    Init {
        /// Where to write it (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Print the effective settings
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested by flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_install() {
        let cli = Cli::try_parse_from(["model_fetcher"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_install_flags() {
        let cli = Cli::try_parse_from([
            "model_fetcher",
            "install",
            "--default",
            "stable-diffusion-1.4",
            "--yes",
            "--skip-support",
        ])
        .unwrap();

        let Some(Commands::Install(args)) = cli.command else {
            panic!("expected install command");
        };
        assert_eq!(args.default_model.as_deref(), Some("stable-diffusion-1.4"));
        assert!(args.yes);
        assert!(args.skip_support);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "model_fetcher",
            "auth",
            "status",
            "--config",
            "settings.toml",
        ])
        .unwrap();
        assert_eq!(cli.global.config, Some(PathBuf::from("settings.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Auth(AuthArgs {
                action: AuthAction::Status
            }))
        ));
    }

    #[test]
    fn test_log_level() {
        let quiet = Cli::try_parse_from(["model_fetcher", "-q", "list"]).unwrap();
        let verbose = Cli::try_parse_from(["model_fetcher", "-v"]).unwrap();
        let debug = Cli::try_parse_from(["model_fetcher", "--very-verbose"]).unwrap();
        let plain = Cli::try_parse_from(["model_fetcher", "list"]).unwrap();

        assert_eq!(quiet.log_level(), Some(tracing::Level::ERROR));
        assert_eq!(verbose.log_level(), Some(tracing::Level::INFO));
        assert_eq!(debug.log_level(), Some(tracing::Level::DEBUG));
        assert_eq!(plain.log_level(), None);
    }
}
