//! Command-line interface components
//!
//! This module contains CLI-specific code for the Model Fetcher application,
//! including argument parsing, terminal prompts, and interrupt handling.

pub mod args;
pub mod commands;
pub mod prompt;
pub mod signals;

pub use args::{
    AuthAction, AuthArgs, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, InstallArgs,
};
pub use commands::{
    describe_abort, handle_auth, handle_config, handle_install, handle_list, handle_support,
};
pub use prompt::{AcceptDefaults, TerminalOperator};
pub use signals::spawn_interrupt_watcher;
