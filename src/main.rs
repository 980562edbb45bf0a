//! Model Fetcher CLI application
//!
//! Interactive installer for Stable Diffusion weight files and their support
//! models.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use model_fetcher::cli::{
    describe_abort, handle_auth, handle_config, handle_install, handle_list, handle_support,
    spawn_interrupt_watcher, Cli, Commands, InstallArgs,
};
use model_fetcher::config::AppConfig;
use model_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        if let Some(message) = describe_abort(&e) {
            println!("{}", message);
            return;
        }
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);
    info!("Model Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    spawn_interrupt_watcher();

    let cache_dir = cli.global.cache_dir.clone();
    match cli.command {
        None => {
            info!("Executing install command (default)");
            handle_install(InstallArgs::default(), &config, cache_dir).await?;
            Ok(())
        }
        Some(Commands::Install(args)) => {
            info!("Executing install command");
            handle_install(args, &config, cache_dir).await?;
            Ok(())
        }
        Some(Commands::List) => {
            info!("Executing list command");
            handle_list(&config).await
        }
        Some(Commands::Support) => {
            info!("Executing support command");
            handle_support(&config, cache_dir).await
        }
        Some(Commands::Auth(args)) => {
            info!("Executing auth command");
            handle_auth(args, &config).await
        }
        Some(Commands::Config(args)) => {
            info!("Executing config command");
            handle_config(args, &config).await
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to the settings file
fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| config.logging.level.clone());

    let mut filter = EnvFilter::from_default_env();
    match format!("model_fetcher={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
