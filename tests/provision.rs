//! End-to-end install runs against a fake remote store
//!
//! These tests drive the whole provisioning flow with scripted operator
//! answers and check the files it leaves behind.

mod common;

use std::fs;

use serde_yaml::Value;

use common::{catalog, FakeStore, MemoryTokens, Sandbox, ScriptedOperator};
use model_fetcher::app::{
    DefaultPolicy, FetchStatus, ModelsConfig, ProvisionOptions, Provisioner, SupportAsset,
    SupportFile,
};
use model_fetcher::app::{MigrationOutcome, RemoteLocation};
use model_fetcher::cli::AcceptDefaults;
use model_fetcher::AppError;

fn weights_only() -> ProvisionOptions {
    ProvisionOptions {
        skip_support: true,
        ..Default::default()
    }
}

fn load_config(sandbox: &Sandbox) -> ModelsConfig {
    ModelsConfig::load(&sandbox.layout.model_config_file).unwrap()
}

fn field<'a>(config: &'a ModelsConfig, stanza: &str, name: &str) -> Option<&'a Value> {
    config.stanza(stanza).and_then(|s| s.get(name))
}

#[tokio::test]
async fn test_default_run_installs_recommended_and_writes_config() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let mut operator = ScriptedOperator::new();
    let summary = provisioner.run(&mut operator, &weights_only()).await.unwrap();

    assert_eq!(summary.installed.to_string(), "base, inpaint, vae");
    assert!(summary.config_written);
    assert_eq!(store.calls(), 3);
    assert_eq!(store.credentials_seen(), 3);
    assert!(sandbox.model("base.ckpt").exists());
    assert!(!sandbox.model("sd-v1-4.ckpt").exists());

    assert!(operator.saw("** LICENSE AGREEMENT FOR WEIGHT FILES **"));
    assert!(operator.saw("Successfully installed base, inpaint, vae"));
    assert!(operator.saw("Successfully created new configuration file"));

    let config = load_config(&sandbox);
    assert_eq!(config.names().collect::<Vec<_>>(), vec!["base", "inpaint"]);
    assert_eq!(config.defaults(), vec!["base"]);

    // Both models reference the installed decoder
    let vae = Value::String(sandbox.model("vae.ckpt").to_string_lossy().into_owned());
    assert_eq!(field(&config, "base", "vae"), Some(&vae));
    assert_eq!(field(&config, "inpaint", "vae"), Some(&vae));
    assert_eq!(
        field(&config, "inpaint", "config"),
        Some(&Value::String(
            sandbox
                .layout
                .inference_configs_dir
                .join("v1-inpainting-inference.yaml")
                .to_string_lossy()
                .into_owned()
        ))
    );

    let written = fs::read_to_string(&sandbox.layout.model_config_file).unwrap();
    assert!(written.starts_with("# This file describes"));
}

#[tokio::test]
async fn test_second_run_touches_nothing_remote() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    provisioner
        .run(&mut ScriptedOperator::new(), &weights_only())
        .await
        .unwrap();
    assert_eq!(store.calls(), 3);

    let mut operator = ScriptedOperator::new();
    let summary = provisioner.run(&mut operator, &weights_only()).await.unwrap();

    assert_eq!(store.calls(), 3);
    assert!(summary
        .report
        .results
        .iter()
        .all(|r| r.status == FetchStatus::AlreadyPresent));
    assert!(operator.saw(" * base.ckpt: exists"));
    // Nothing to download, so no licence walkthrough
    assert!(!operator.saw("LICENSE AGREEMENT"));
    assert_eq!(load_config(&sandbox).defaults(), vec!["base"]);
}

#[tokio::test]
async fn test_failed_fetch_is_isolated() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs()).failing("org/inpaint");
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let mut operator = ScriptedOperator::new();
    let summary = provisioner.run(&mut operator, &weights_only()).await.unwrap();

    assert_eq!(summary.installed.to_string(), "base, vae");
    let failures: Vec<_> = summary.report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "inpaint");
    assert!(operator.saw("** Error downloading inpaint"));
    assert!(!sandbox.model("inpaint.ckpt").exists());

    let config = load_config(&sandbox);
    assert_eq!(config.names().collect::<Vec<_>>(), vec!["base"]);
    assert_eq!(config.default_model(), Some("base"));
    assert!(field(&config, "base", "vae").is_some());
}

#[tokio::test]
async fn test_legacy_weights_are_migrated_before_fetch() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(&sandbox.layout.models_dir).unwrap();
    fs::write(sandbox.model("model.ckpt"), "legacy weights").unwrap();

    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    // base yes, inpaint no, v1.4 yes, vae no
    let mut operator = ScriptedOperator::new().on("Download?", &[true, false, true, false]);
    let summary = provisioner.run(&mut operator, &weights_only()).await.unwrap();

    assert!(matches!(
        summary.migration,
        Some(MigrationOutcome::Renamed { .. })
    ));
    let v14 = summary
        .report
        .results
        .iter()
        .find(|r| r.name == "stable-diffusion-1.4")
        .unwrap();
    assert_eq!(v14.status, FetchStatus::AlreadyPresent);
    assert_eq!(store.retrieved(), vec!["org/base/base.ckpt".to_string()]);
    assert_eq!(
        fs::read_to_string(sandbox.model("sd-v1-4.ckpt")).unwrap(),
        "legacy weights"
    );

    // No decoder installed, so no vae field
    let config = load_config(&sandbox);
    assert!(field(&config, "stable-diffusion-1.4", "vae").is_none());
    assert_eq!(config.default_model(), Some("base"));
}

#[tokio::test]
async fn test_merge_keeps_operator_fields_and_stanzas() {
    let sandbox = Sandbox::new();
    fs::write(
        &sandbox.layout.model_config_file,
        "# my notes
base:
  description: old description
  weights: /old/base.ckpt
  custom_field: keep me
  default: false
hand-added:
  description: Added by hand
  weights: /elsewhere/model.ckpt
  default: true
",
    )
    .unwrap();

    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);
    provisioner
        .run(&mut ScriptedOperator::new(), &weights_only())
        .await
        .unwrap();

    let config = load_config(&sandbox);
    assert_eq!(
        config.names().collect::<Vec<_>>(),
        vec!["base", "hand-added", "inpaint"]
    );
    assert_eq!(
        field(&config, "base", "custom_field"),
        Some(&Value::String("keep me".to_string()))
    );
    assert_eq!(
        field(&config, "base", "description"),
        Some(&Value::String("Base model".to_string()))
    );
    assert_eq!(
        field(&config, "hand-added", "weights"),
        Some(&Value::String("/elsewhere/model.ckpt".to_string()))
    );
    assert_eq!(config.defaults(), vec!["base"]);
}

#[tokio::test]
async fn test_unparseable_config_is_left_alone() {
    let sandbox = Sandbox::new();
    let original = "base: [unclosed\n";
    fs::write(&sandbox.layout.model_config_file, original).unwrap();

    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let mut operator = ScriptedOperator::new();
    let summary = provisioner.run(&mut operator, &weights_only()).await.unwrap();

    assert!(!summary.config_written);
    assert_eq!(summary.installed.len(), 3);
    assert!(operator.saw("**Error creating config file"));
    assert_eq!(
        fs::read_to_string(&sandbox.layout.model_config_file).unwrap(),
        original
    );
}

#[tokio::test]
async fn test_named_default_override() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let options = ProvisionOptions {
        skip_support: true,
        policy: DefaultPolicy::Named("inpaint".to_string()),
        ..Default::default()
    };
    provisioner
        .run(&mut ScriptedOperator::new(), &options)
        .await
        .unwrap();

    assert_eq!(load_config(&sandbox).defaults(), vec!["inpaint"]);
}

#[tokio::test]
async fn test_quit_after_rejected_selection_aborts() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let mut operator = ScriptedOperator::new()
        .on("Ok to download?", &[false])
        .on("Change your selection?", &[false])
        .on("Quit?", &[true]);
    let result = provisioner.run(&mut operator, &weights_only()).await;

    assert!(matches!(result, Err(AppError::UserAbort)));
    assert_eq!(store.calls(), 0);
    assert!(!sandbox.layout.model_config_file.exists());
}

#[tokio::test]
async fn test_declining_quit_skips_weights_and_installs_support() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let assets = vec![SupportAsset {
        name: "restorer",
        description: "face restoration model",
        files: vec![SupportFile {
            location: RemoteLocation::url("https://example.com/restorer.pth"),
            destination: Some("weights/restorer.pth".into()),
        }],
    }];
    let provisioner =
        Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), assets);

    let mut operator = ScriptedOperator::new()
        .on("Ok to download?", &[false])
        .on("Change your selection?", &[false]);
    let summary = provisioner
        .run(&mut operator, &ProvisionOptions::default())
        .await
        .unwrap();

    assert!(summary.installed.is_empty());
    assert!(!summary.config_written);
    assert_eq!(summary.support.len(), 1);
    assert_eq!(summary.support[0].status, FetchStatus::Downloaded);
    assert!(sandbox.dir.path().join("weights/restorer.pth").exists());
    assert!(operator.saw("** DOWNLOADING SUPPORT MODELS **"));
    assert!(operator.saw("You're all set!"));
}

#[tokio::test]
async fn test_missing_token_does_not_stop_the_run() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::default();
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let mut operator = ScriptedOperator::new();
    let summary = provisioner.run(&mut operator, &weights_only()).await.unwrap();

    assert!(operator.saw("No usable access token"));
    assert_eq!(store.credentials_seen(), 0);
    assert_eq!(summary.installed.len(), 3);
}

#[tokio::test]
async fn test_pasted_token_is_saved() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::default();
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let mut operator = ScriptedOperator::new().secret_answer("hf_pasted_token");
    provisioner.run(&mut operator, &weights_only()).await.unwrap();

    use model_fetcher::auth::CredentialProvider;
    assert_eq!(
        tokens.get().unwrap().map(|c| c.expose().to_string()),
        Some("hf_pasted_token".to_string())
    );
    assert_eq!(store.credentials_seen(), 3);
}

#[tokio::test]
async fn test_accept_defaults_runs_without_prompts() {
    let sandbox = Sandbox::new();
    let store = FakeStore::new(&sandbox.blobs());
    let tokens = MemoryTokens::with_token("hf_test_token");
    let catalog = catalog();
    let provisioner = Provisioner::new(&catalog, &store, &tokens, sandbox.layout.clone(), vec![]);

    let options = ProvisionOptions {
        accept_defaults: true,
        skip_support: true,
        ..Default::default()
    };
    let mut operator = AcceptDefaults::new(Vec::new());
    let summary = provisioner.run(&mut operator, &options).await.unwrap();

    assert_eq!(summary.installed.to_string(), "base, inpaint, vae");
    assert_eq!(load_config(&sandbox).default_model(), Some("base"));
}
