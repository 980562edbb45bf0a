//! Command handlers for Model Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments and
//! settings to the provisioning engine.

use std::path::PathBuf;

use tracing::info;

use crate::app::{
    builtin_assets, CacheManager, Catalog, DefaultPolicy, HubClient, ModelsConfig, Operator,
    ProvisionOptions, ProvisionSummary, Provisioner,
};
use crate::auth::{setup_credentials, CredentialProvider, TokenStore};
use crate::cli::prompt::{AcceptDefaults, TerminalOperator};
use crate::cli::{AuthAction, AuthArgs, ConfigAction, ConfigArgs, InstallArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Everything a command needs that is built from settings
struct Runtime {
    catalog: Catalog,
    client: HubClient,
    tokens: TokenStore,
}

impl Runtime {
    async fn build(config: &AppConfig, cache_dir: Option<PathBuf>) -> Result<Self> {
        let catalog = Catalog::load(config.paths.catalog_file.as_deref())?;

        let mut cache_config = config.cache.to_runtime_config();
        if cache_dir.is_some() {
            cache_config.cache_root = cache_dir;
        }
        let cache = CacheManager::new(cache_config).await?;
        info!("Using cache at {}", cache.cache_root().display());

        let client = HubClient::new(
            &config.client.to_runtime_config(),
            config.hub.to_runtime_config(),
            cache,
        )?;
        let tokens = TokenStore::from_settings(config.hub.token_file.as_deref())?;

        Ok(Self {
            catalog,
            client,
            tokens,
        })
    }

    fn provisioner(&self, config: &AppConfig) -> Provisioner<'_, HubClient> {
        Provisioner::new(
            &self.catalog,
            &self.client,
            &self.tokens,
            config.install_layout(),
            builtin_assets(),
        )
    }
}

/// Handle the install command (also the default with no subcommand)
pub async fn handle_install(
    args: InstallArgs,
    config: &AppConfig,
    cache_dir: Option<PathBuf>,
) -> Result<ProvisionSummary> {
    let runtime = Runtime::build(config, cache_dir).await?;
    let provisioner = runtime.provisioner(config);

    let options = ProvisionOptions {
        accept_defaults: args.yes,
        skip_support: args.skip_support,
        policy: DefaultPolicy::from_override(args.default_model),
    };

    let mut operator: Box<dyn Operator> = if args.yes {
        Box::new(AcceptDefaults::stdout())
    } else {
        Box::new(TerminalOperator::stdio())
    };

    let summary = provisioner.run(operator.as_mut(), &options).await?;
    info!(
        "Install finished: {} installed, {} downloaded, {} failed",
        summary.installed.len(),
        summary.report.downloaded_count(),
        summary.report.failures().count()
    );
    Ok(summary)
}

/// Handle the support command
pub async fn handle_support(config: &AppConfig, cache_dir: Option<PathBuf>) -> Result<()> {
    let runtime = Runtime::build(config, cache_dir).await?;
    let provisioner = runtime.provisioner(config);
    let mut operator = TerminalOperator::stdio();

    let credential = runtime.tokens.get()?;
    let results = provisioner
        .install_support(credential.as_ref(), &mut operator)
        .await;

    let failed = results.iter().filter(|r| !r.status.is_success()).count();
    if failed > 0 {
        println!("{} of {} support models failed to install", failed, results.len());
    }
    Ok(())
}

/// Handle the list command
pub async fn handle_list(config: &AppConfig) -> Result<()> {
    let catalog = Catalog::load(config.paths.catalog_file.as_deref())?;
    let models_dir = &config.paths.models_dir;
    let models_config = ModelsConfig::load(&config.paths.model_config_file)?;
    let default = models_config.default_model();

    println!("Weight files (installed into {}):", models_dir.display());
    for (index, entry) in catalog.iter().enumerate() {
        let installed = models_dir.join(&entry.remote_filename).exists();
        let state = if installed { "installed" } else { "not installed" };
        let recommended = if entry.recommended { " (recommended)" } else { "" };
        let marker = if default == Some(entry.name.as_str()) { "*" } else { "" };
        println!(
            "[{}] {}{}{}: {}\n    {}",
            index + 1,
            entry.name,
            marker,
            recommended,
            state,
            entry.description
        );
    }

    if models_config.is_empty() {
        println!(
            "\nNo models registered in {}",
            config.paths.model_config_file.display()
        );
    } else {
        println!(
            "\n{} model(s) registered in {}; * marks the default",
            models_config.len(),
            config.paths.model_config_file.display()
        );
    }
    Ok(())
}

/// Handle token management commands
pub async fn handle_auth(args: AuthArgs, config: &AppConfig) -> Result<()> {
    let tokens = TokenStore::from_settings(config.hub.token_file.as_deref())?;

    match args.action {
        AuthAction::Setup => {
            let mut operator = TerminalOperator::stdio();
            setup_credentials(&tokens, &mut operator)?;
        }
        AuthAction::Status => {
            println!("{}", tokens.status().status_message());
        }
        AuthAction::Clear => {
            if tokens.clear()? {
                println!("Removed {}", tokens.token_file().display());
            } else {
                println!("No token file at {}", tokens.token_file().display());
            }
        }
    }

    Ok(())
}

/// Handle settings commands
pub async fn handle_config(args: ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Init { path } => {
            let path = match path {
                Some(path) => path,
                None => AppConfig::default_config_path()?,
            };
            AppConfig::init_file(&path).await?;
            println!("Created default configuration file:");
            println!("   {}", path.display());
            println!("   You can customize settings by editing this file.");
        }
        ConfigAction::Show => {
            print!("{}", config.render()?);
        }
    }
    Ok(())
}

/// Map an install abort to the message shown before exiting
pub fn describe_abort(error: &AppError) -> Option<&'static str> {
    match error {
        AppError::UserAbort => Some("Goodbye! Come back soon."),
        _ => None,
    }
}
