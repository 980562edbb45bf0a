//! Install run orchestration
//!
//! A run walks through the same steps every time:
//!
//! 1. offer to rename a legacy weight file
//! 2. let the operator choose a [`DownloadPlan`]
//! 3. obtain a credential if anything has to be downloaded
//! 4. fetch the plan, isolating per-artifact failures
//! 5. merge the installed models into models.yaml
//! 6. install the support models
//!
//! Only an explicit quit ends a run early; every other failure is reported to
//! the operator and the run carries on.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::app::catalog::Catalog;
use crate::app::fetcher::{DownloadPlan, FetchReport, FetchStatus, Fetcher, SuccessSet};
use crate::app::migrate::{migrate, MigrationOutcome};
use crate::app::model_config::{update_config_file, ConfigSynthesizer, ModelConfigPaths};
use crate::app::operator::Operator;
use crate::app::selection::{recommended_plan, select, DefaultPolicy};
use crate::app::store::RemoteStore;
use crate::app::support::{install_support, SupportAsset, SupportResult};
use crate::auth::{obtain_credential, Credential, CredentialProvider};
use crate::constants::paths;
use crate::errors::{error_chain, AppError, Result};

const INTRODUCTION: &str = "Welcome! This installer downloads the Stable Diffusion weight files
and the other large models needed for text to image generation. You may
interrupt it at any point and resume later.
";

/// Where installed files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub models_dir: PathBuf,
    pub model_config_file: PathBuf,
    pub inference_configs_dir: PathBuf,
    /// Support model destinations are relative to this directory
    pub install_root: PathBuf,
}

impl Default for InstallLayout {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(paths::MODELS_DIR),
            model_config_file: PathBuf::from(paths::MODEL_CONFIG_FILE),
            inference_configs_dir: PathBuf::from(paths::INFERENCE_CONFIGS_DIR),
            install_root: PathBuf::from(paths::INSTALL_ROOT),
        }
    }
}

impl InstallLayout {
    /// Directories that models.yaml stanzas point into
    pub fn model_config_paths(&self) -> ModelConfigPaths {
        ModelConfigPaths {
            models_dir: self.models_dir.clone(),
            inference_configs_dir: self.inference_configs_dir.clone(),
        }
    }
}

/// Switches for one run
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Take the recommended plan without asking
    pub accept_defaults: bool,
    /// Do not install support models
    pub skip_support: bool,
    /// Rule for the default model in models.yaml
    pub policy: DefaultPolicy,
}

/// What a run did
#[derive(Debug, Clone, Default)]
pub struct ProvisionSummary {
    pub migration: Option<MigrationOutcome>,
    pub report: FetchReport,
    pub installed: SuccessSet,
    /// models.yaml was rewritten
    pub config_written: bool,
    pub support: Vec<SupportResult>,
}

/// Runs the install flow against a remote store
pub struct Provisioner<'a, S: RemoteStore + ?Sized> {
    catalog: &'a Catalog,
    fetcher: Fetcher<'a, S>,
    credentials: &'a dyn CredentialProvider,
    layout: InstallLayout,
    support_assets: Vec<SupportAsset>,
}

impl<'a, S: RemoteStore + ?Sized> Provisioner<'a, S> {
    pub fn new(
        catalog: &'a Catalog,
        store: &'a S,
        credentials: &'a dyn CredentialProvider,
        layout: InstallLayout,
        support_assets: Vec<SupportAsset>,
    ) -> Self {
        Self {
            catalog,
            fetcher: Fetcher::new(store, layout.models_dir.clone()),
            credentials,
            layout,
            support_assets,
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Run the whole install flow
    ///
    /// # Errors
    ///
    /// Returns `AppError::UserAbort` when the operator quits, or an I/O error
    /// when the operator cannot be asked at all.
    pub async fn run(
        &self,
        operator: &mut dyn Operator,
        options: &ProvisionOptions,
    ) -> Result<ProvisionSummary> {
        operator.say(INTRODUCTION);
        operator.say("** WEIGHT SELECTION **");

        let mut summary = ProvisionSummary::default();
        let mut credential = None;

        let wants_weights = options.accept_defaults
            || operator.confirm(
                "Would you like to download the Stable Diffusion model weights now?",
                true,
            )?;
        if wants_weights {
            summary.migration = self.migrate_legacy(operator);

            match self.choose_plan(operator, options)? {
                Some(plan) => {
                    credential = self.credential_for(&plan, operator);
                    operator.say("\n** DOWNLOADING WEIGHTS **");
                    summary.report = self.install_weights(&plan, credential.as_ref(), operator).await;
                    summary.installed = summary.report.success_set();
                    summary.config_written =
                        self.write_model_config(&summary.installed, &options.policy, operator);
                }
                None => info!("Weight download skipped by operator"),
            }
        }

        if !options.skip_support {
            operator.say("\n** DOWNLOADING SUPPORT MODELS **");
            summary.support = self.install_support(credential.as_ref(), operator).await;
        }

        operator.say(&self.postscript());
        Ok(summary)
    }

    /// Offer the legacy rename; failures are reported and the run continues
    pub fn migrate_legacy(&self, operator: &mut dyn Operator) -> Option<MigrationOutcome> {
        match migrate(&self.layout.models_dir, self.catalog, operator) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                let reason = error_chain(&e);
                warn!("Legacy migration failed: {}", reason);
                operator.say(&format!("** Could not migrate legacy weights: {} **", reason));
                None
            }
        }
    }

    /// `None` means the operator declined but did not quit
    fn choose_plan(
        &self,
        operator: &mut dyn Operator,
        options: &ProvisionOptions,
    ) -> Result<Option<DownloadPlan>> {
        if options.accept_defaults {
            return Ok(Some(recommended_plan(self.catalog)));
        }
        if let Some(plan) = select(self.catalog, operator)? {
            return Ok(Some(plan));
        }
        if operator.confirm("Quit?", false)? {
            return Err(AppError::UserAbort);
        }
        Ok(None)
    }

    /// Licence walkthrough and token, only when something must be downloaded
    fn credential_for(
        &self,
        plan: &DownloadPlan,
        operator: &mut dyn Operator,
    ) -> Option<Credential> {
        if !self.fetcher.plan_needs_network(plan, self.catalog) {
            info!("Every selected weight file is present, no credential needed");
            return None;
        }

        operator.say("** LICENSE AGREEMENT FOR WEIGHT FILES **");
        match obtain_credential(self.credentials, operator) {
            Ok(credential) => Some(credential),
            Err(e) => {
                let reason = error_chain(&e);
                warn!("Continuing without a credential: {}", reason);
                operator.say(&format!(
                    "** No usable access token ({}). Gated downloads will fail. **",
                    reason
                ));
                None
            }
        }
    }

    /// Fetch every artifact of `plan` and report each outcome
    pub async fn install_weights(
        &self,
        plan: &DownloadPlan,
        credential: Option<&Credential>,
        operator: &mut dyn Operator,
    ) -> FetchReport {
        let report = self.fetcher.fetch_plan(plan, self.catalog, credential).await;

        for result in &report.results {
            let file = result
                .local_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| result.name.clone());
            match &result.status {
                FetchStatus::AlreadyPresent => operator.say(&format!(" * {}: exists", file)),
                FetchStatus::Downloaded => operator.say(&format!(" * {}: downloaded", file)),
                FetchStatus::Failed { reason } => {
                    operator.say(&format!("** Error downloading {}: {} **", result.name, reason))
                }
            }
        }

        let installed = report.success_set();
        if installed.is_empty() {
            operator.say("No weight files were installed.");
        } else {
            operator.say(&format!("Successfully installed {}", installed));
        }
        report
    }

    /// Merge `installed` into models.yaml; returns whether the file was written
    pub fn write_model_config(
        &self,
        installed: &SuccessSet,
        policy: &DefaultPolicy,
        operator: &mut dyn Operator,
    ) -> bool {
        let config_paths = self.layout.model_config_paths();
        let synthesizer = ConfigSynthesizer::new(self.catalog, &config_paths, policy.clone());
        let path = &self.layout.model_config_file;

        match update_config_file(path, &synthesizer, installed) {
            Ok(Some(_)) => {
                operator.say(&format!(
                    "Successfully created new configuration file {}",
                    path.display()
                ));
                true
            }
            Ok(None) => false,
            Err(e) => {
                let reason = error_chain(&e);
                warn!("Model config not updated: {}", reason);
                operator.say(&format!(
                    "**Error creating config file {}: {} **",
                    path.display(),
                    reason
                ));
                false
            }
        }
    }

    /// Install the support models under the install root
    pub async fn install_support(
        &self,
        credential: Option<&Credential>,
        operator: &mut dyn Operator,
    ) -> Vec<SupportResult> {
        install_support(
            &self.fetcher,
            &self.support_assets,
            &self.layout.install_root,
            credential,
            operator,
        )
        .await
    }

    fn postscript(&self) -> String {
        postscript(&self.layout.model_config_file)
    }
}

fn postscript(config_file: &Path) -> String {
    format!(
        "You're all set! The installed models are listed in {}.
Launch the image generation application to start using them.

Have fun!
",
        config_file.display()
    )
}
