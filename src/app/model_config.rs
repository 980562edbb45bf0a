//! models.yaml synthesis
//!
//! The image generation application reads its list of models from a YAML
//! file with one stanza per model. After each install the stanzas of every
//! installed model are merged into that file:
//!
//! - managed fields (`description`, `weights`, `config`, `width`, `height`,
//!   `vae`, `default`) are overwritten
//! - any other field, and any stanza the installer does not know, is kept as is
//!   and in its original position
//! - at most one stanza carries `default: true`
//!
//! The new file is written next to the old one and renamed over it, so a
//! failure at any point leaves the previous file untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Number, Value};
use tracing::{debug, info};

use crate::app::catalog::{Catalog, ConfigKind};
use crate::app::fetcher::SuccessSet;
use crate::app::selection::DefaultPolicy;
use crate::constants::{files, model_config as field};
use crate::errors::{ModelConfigError, ModelConfigResult};

/// Parsed models.yaml: ordered mapping of stanza name to stanza
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelsConfig {
    stanzas: Mapping,
}

impl ModelsConfig {
    /// Load the config at `path`; a missing, empty or comment-only file is empty
    pub fn load(path: &Path) -> ModelConfigResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No model config at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ModelConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content, path)
    }

    /// Parse config text; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> ModelConfigResult<Self> {
        let has_content = content.lines().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        });
        if !has_content {
            return Ok(Self::default());
        }

        let value: Value =
            serde_yaml::from_str(content).map_err(|source| ModelConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(stanzas) => Ok(Self { stanzas }),
            other => Err(ModelConfigError::InvalidStructure {
                reason: format!("expected a mapping of model names, found {}", kind_of(&other)),
            }),
        }
    }

    /// Stanza names in file order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stanzas.keys().filter_map(Value::as_str)
    }

    /// A stanza by name, when it is a mapping
    pub fn stanza(&self, name: &str) -> Option<&Mapping> {
        self.stanzas.get(name).and_then(Value::as_mapping)
    }

    /// Names of stanzas marked `default: true`
    pub fn defaults(&self) -> Vec<&str> {
        self.stanzas
            .iter()
            .filter(|(_, stanza)| {
                stanza
                    .as_mapping()
                    .and_then(|m| m.get(field::DEFAULT))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .filter_map(|(name, _)| name.as_str())
            .collect()
    }

    /// The default model, if exactly one is marked
    pub fn default_model(&self) -> Option<&str> {
        let defaults = self.defaults();
        if defaults.len() == 1 {
            Some(defaults[0])
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stanzas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stanzas.len()
    }

    /// Serialize with the fixed comment preamble
    pub fn render(&self) -> ModelConfigResult<String> {
        let body = if self.stanzas.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(&self.stanzas)?
        };
        Ok(format!("{}{}", field::PREAMBLE, body))
    }

    fn clear_defaults(&mut self) {
        for stanza in self.stanzas.values_mut() {
            if let Some(stanza) = stanza.as_mapping_mut() {
                stanza.shift_remove(field::DEFAULT);
            }
        }
    }

    /// Apply `update` to the stanza for `name`, created at the end when absent
    ///
    /// A non-mapping value under a managed name is replaced. The stanza keeps
    /// its position in the file.
    fn update_stanza(&mut self, name: &str, update: impl FnOnce(&mut Mapping)) {
        let slot = self
            .stanzas
            .entry(Value::String(name.to_string()))
            .or_insert(Value::Null);
        let mut stanza = match std::mem::replace(slot, Value::Null) {
            Value::Mapping(mapping) => mapping,
            _ => Mapping::new(),
        };
        update(&mut stanza);
        *slot = Value::Mapping(stanza);
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Directories the stanza paths point into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfigPaths {
    /// Directory holding weight files
    pub models_dir: PathBuf,
    /// Directory holding inference configs
    pub inference_configs_dir: PathBuf,
}

fn path_value(dir: &Path, file: &str) -> Value {
    Value::String(dir.join(file).to_string_lossy().into_owned())
}

/// Merges installed models into an existing config
pub struct ConfigSynthesizer<'a> {
    catalog: &'a Catalog,
    paths: &'a ModelConfigPaths,
    policy: DefaultPolicy,
}

impl<'a> ConfigSynthesizer<'a> {
    pub fn new(catalog: &'a Catalog, paths: &'a ModelConfigPaths, policy: DefaultPolicy) -> Self {
        Self {
            catalog,
            paths,
            policy,
        }
    }

    /// Local path of the auxiliary decoder to reference, if one is installed
    ///
    /// With several installed decoders the last one in catalog order wins.
    pub fn decoder_path(&self, installed: &SuccessSet) -> Option<Value> {
        self.catalog
            .iter()
            .filter(|entry| entry.is_auxiliary_decoder() && installed.contains(&entry.name))
            .last()
            .map(|entry| path_value(&self.paths.models_dir, &entry.remote_filename))
    }

    /// Merge stanzas for every installed model into `existing`
    ///
    /// When no model is installed the config is returned unchanged.
    pub fn synthesize(&self, mut existing: ModelsConfig, installed: &SuccessSet) -> ModelsConfig {
        let Some(default_name) = self.policy.choose(self.catalog, installed) else {
            return existing;
        };
        let vae = self.decoder_path(installed);

        existing.clear_defaults();

        for entry in self.catalog.iter() {
            let ConfigKind::Model { inference_config } = &entry.config_kind else {
                continue;
            };
            if !installed.contains(&entry.name) {
                continue;
            }

            existing.update_stanza(&entry.name, |stanza| {
                stanza.insert(
                    field::DESCRIPTION.into(),
                    Value::String(entry.description.clone()),
                );
                stanza.insert(
                    field::WEIGHTS.into(),
                    path_value(&self.paths.models_dir, &entry.remote_filename),
                );
                stanza.insert(
                    field::CONFIG.into(),
                    path_value(&self.paths.inference_configs_dir, inference_config),
                );
                stanza.insert(field::WIDTH.into(), Value::Number(Number::from(entry.width)));
                stanza.insert(field::HEIGHT.into(), Value::Number(Number::from(entry.height)));
                if let Some(vae) = &vae {
                    stanza.insert(field::VAE.into(), vae.clone());
                }
                if entry.name == default_name {
                    stanza.insert(field::DEFAULT.into(), Value::Bool(true));
                }
            });
        }

        existing
    }
}

/// Write `contents` to `target` through a temp file in the same directory
pub fn persist_atomic(target: &Path, contents: &str) -> ModelConfigResult<()> {
    persist_atomic_with(target, contents, |_| Ok(()))
}

/// As [`persist_atomic`], running `before_rename` on the written temp file
pub(crate) fn persist_atomic_with(
    target: &Path,
    contents: &str,
    before_rename: impl FnOnce(&Path) -> io::Result<()>,
) -> ModelConfigResult<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let write_error = |source| ModelConfigError::Write {
        dir: dir.clone(),
        source,
    };

    fs::create_dir_all(&dir).map_err(write_error)?;

    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(files::TEMP_FILE_SUFFIX)
        .tempfile_in(&dir)
        .map_err(write_error)?;

    temp.write_all(contents.as_bytes()).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;

    // Keep the permissions of the file being replaced
    let permissions = match fs::metadata(target) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        fs::set_permissions(temp.path(), permissions).map_err(write_error)?;
    }

    before_rename(temp.path()).map_err(write_error)?;

    temp.persist(target)
        .map_err(|e| ModelConfigError::Persist {
            path: target.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Load, merge and atomically rewrite the config at `path`
///
/// Returns the written config, or `None` when no model is installed and the
/// file was left alone.
pub fn update_config_file(
    path: &Path,
    synthesizer: &ConfigSynthesizer<'_>,
    installed: &SuccessSet,
) -> ModelConfigResult<Option<ModelsConfig>> {
    if synthesizer.policy.choose(synthesizer.catalog, installed).is_none() {
        info!("No models installed, leaving {} unchanged", path.display());
        return Ok(None);
    }

    let existing = ModelsConfig::load(path)?;
    let merged = synthesizer.synthesize(existing, installed);
    persist_atomic(path, &merged.render()?)?;
    info!("Wrote model config {}", path.display());
    Ok(Some(merged))
}
