//! Support models
//!
//! Besides the main weights the application needs a handful of smaller models
//! (face restoration, upscaling, tokenizers, the safety checker). Each is an
//! ordinary fetch: release assets are placed at the fixed paths the
//! application loads them from, while hub bundles only need to be present in
//! the shared cache.

use std::path::{Path, PathBuf};

use tracing::error;

use crate::app::fetcher::{FetchStatus, Fetcher};
use crate::app::operator::Operator;
use crate::app::store::{RemoteLocation, RemoteStore};
use crate::auth::Credential;
use crate::errors::error_chain;

/// One file of a support model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportFile {
    pub location: RemoteLocation,
    /// Install path relative to the install root; `None` keeps it in the cache
    pub destination: Option<PathBuf>,
}

impl SupportFile {
    fn placed(url: &str, destination: &str) -> Self {
        Self {
            location: RemoteLocation::url(url),
            destination: Some(PathBuf::from(destination)),
        }
    }

    fn cached(location: RemoteLocation) -> Self {
        Self {
            location,
            destination: None,
        }
    }
}

/// A support model made of one or more files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportAsset {
    pub name: &'static str,
    pub description: &'static str,
    pub files: Vec<SupportFile>,
}

fn hub_bundle(
    name: &'static str,
    description: &'static str,
    repo_id: &str,
    files: &[&str],
) -> SupportAsset {
    SupportAsset {
        name,
        description,
        files: files
            .iter()
            .map(|file| SupportFile::cached(RemoteLocation::hub(repo_id, *file)))
            .collect(),
    }
}

/// Support models installed after the weights, in install order
pub fn builtin_assets() -> Vec<SupportAsset> {
    vec![
        hub_bundle(
            "bert-tokenizer",
            "bert tokenizer",
            "bert-base-uncased",
            &["config.json", "vocab.txt", "tokenizer.json", "tokenizer_config.json"],
        ),
        hub_bundle(
            "clip-text-encoder",
            "CLIP text encoder",
            "openai/clip-vit-large-patch14",
            &[
                "config.json",
                "vocab.json",
                "merges.txt",
                "tokenizer.json",
                "tokenizer_config.json",
                "special_tokens_map.json",
                "pytorch_model.bin",
            ],
        ),
        SupportAsset {
            name: "realesrgan",
            description: "Real-ESRGAN upscaler",
            files: vec![SupportFile::placed(
                "https://github.com/xinntao/Real-ESRGAN/releases/download/v0.2.5.0/realesr-general-x4v3.pth",
                "models/realesrgan/realesr-general-x4v3.pth",
            )],
        },
        SupportAsset {
            name: "gfpgan",
            description: "GFPGAN face restoration models",
            files: vec![
                SupportFile::placed(
                    "https://github.com/TencentARC/GFPGAN/releases/download/v1.3.0/GFPGANv1.4.pth",
                    "src/gfpgan/experiments/pretrained_models/GFPGANv1.4.pth",
                ),
                SupportFile::placed(
                    "https://github.com/xinntao/facexlib/releases/download/v0.1.0/detection_Resnet50_Final.pth",
                    "gfpgan/weights/detection_Resnet50_Final.pth",
                ),
                SupportFile::placed(
                    "https://github.com/xinntao/facexlib/releases/download/v0.2.2/parsing_parsenet.pth",
                    "gfpgan/weights/parsing_parsenet.pth",
                ),
            ],
        },
        SupportAsset {
            name: "codeformer",
            description: "CodeFormer model file",
            files: vec![SupportFile::placed(
                "https://github.com/sczhou/CodeFormer/releases/download/v0.1.0/codeformer.pth",
                "ldm/invoke/restoration/codeformer/weights/codeformer.pth",
            )],
        },
        hub_bundle(
            "safety-checker",
            "safety model for NSFW content detection",
            "CompVis/stable-diffusion-safety-checker",
            &["config.json", "preprocessor_config.json", "pytorch_model.bin"],
        ),
    ]
}

/// Outcome of installing one support model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportResult {
    pub name: String,
    pub status: FetchStatus,
}

/// Install support models under `root`, isolating failures per model
pub async fn install_support<S: RemoteStore + ?Sized>(
    fetcher: &Fetcher<'_, S>,
    assets: &[SupportAsset],
    root: &Path,
    credential: Option<&Credential>,
    operator: &mut dyn Operator,
) -> Vec<SupportResult> {
    let mut results = Vec::with_capacity(assets.len());

    for asset in assets {
        operator.say(&format!("Installing {}...", asset.description));

        let mut all_present = true;
        let mut failure = None;
        for file in &asset.files {
            let outcome = match &file.destination {
                Some(destination) => fetcher
                    .fetch_to(&file.location, &root.join(destination), credential)
                    .await,
                None => fetcher
                    .warm(&file.location, credential)
                    .await
                    .map(|_| FetchStatus::Downloaded),
            };
            match outcome {
                Ok(FetchStatus::AlreadyPresent) => {}
                Ok(_) => all_present = false,
                Err(e) => {
                    let reason = error_chain(&e);
                    error!("Failed to install {} ({}): {}", asset.name, file.location, reason);
                    failure = Some(reason);
                    break;
                }
            }
        }

        let status = match failure {
            Some(reason) => {
                operator.say(&format!("** Error installing {}: {} **", asset.description, reason));
                FetchStatus::Failed { reason }
            }
            None if all_present => {
                operator.say("...already installed");
                FetchStatus::AlreadyPresent
            }
            None => {
                operator.say("...success");
                FetchStatus::Downloaded
            }
        };
        results.push(SupportResult {
            name: asset.name.to_string(),
            status,
        });
    }

    results
}
