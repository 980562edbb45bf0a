//! Artifact catalog
//!
//! The catalog is the immutable list of weight files the installer knows
//! about. It is parsed once at start-up from a TOML document (the built-in one
//! or an operator-supplied replacement) and passed explicitly to every
//! component that needs it.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::errors::{CatalogError, CatalogResult};

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

/// How an artifact appears in the persisted model config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKind {
    /// A primary model; becomes a top-level stanza using this inference config
    Model { inference_config: String },
    /// A decoder referenced by model stanzas, never a stanza itself
    AuxiliaryDecoder,
}

/// A single downloadable weight file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// Unique catalog key, also the stanza name
    pub name: String,
    /// Human readable description shown to the operator
    pub description: String,
    /// Repository identifier in the remote store
    pub remote_id: String,
    /// File name inside the repository, and on local disk
    pub remote_filename: String,
    /// Role in the persisted config
    pub config_kind: ConfigKind,
    /// Offered as selected by default
    pub recommended: bool,
    /// Training image width
    pub width: u32,
    /// Training image height
    pub height: u32,
}

impl ArtifactDescriptor {
    /// Whether the artifact becomes a stanza of its own
    pub fn is_model(&self) -> bool {
        matches!(self.config_kind, ConfigKind::Model { .. })
    }

    /// Whether the artifact is an auxiliary decoder
    pub fn is_auxiliary_decoder(&self) -> bool {
        matches!(self.config_kind, ConfigKind::AuxiliaryDecoder)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindToml {
    Model,
    AuxiliaryDecoder,
}

#[derive(Debug, Deserialize)]
struct EntryToml {
    name: String,
    description: String,
    repo_id: String,
    file: String,
    kind: KindToml,
    inference_config: Option<String>,
    #[serde(default)]
    recommended: bool,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct CatalogToml {
    artifacts: Vec<EntryToml>,
}

impl TryFrom<EntryToml> for ArtifactDescriptor {
    type Error = CatalogError;

    fn try_from(entry: EntryToml) -> CatalogResult<Self> {
        let invalid = |reason: &str| CatalogError::InvalidEntry {
            name: entry.name.clone(),
            reason: reason.to_string(),
        };

        if entry.name.trim().is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if entry.repo_id.trim().is_empty() || entry.file.trim().is_empty() {
            return Err(invalid("repo_id and file are required"));
        }
        if Path::new(&entry.file).components().count() != 1 {
            return Err(invalid("file must be a plain file name"));
        }

        let config_kind = match (entry.kind, entry.inference_config) {
            (KindToml::Model, Some(inference_config)) if !inference_config.is_empty() => {
                ConfigKind::Model { inference_config }
            }
            (KindToml::Model, _) => return Err(invalid("model entries need inference_config")),
            (KindToml::AuxiliaryDecoder, _) => ConfigKind::AuxiliaryDecoder,
        };

        Ok(Self {
            name: entry.name,
            description: entry.description,
            remote_id: entry.repo_id,
            remote_filename: entry.file,
            config_kind,
            recommended: entry.recommended,
            width: entry.width,
            height: entry.height,
        })
    }
}

/// Ordered, immutable set of artifact descriptors with unique names
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<ArtifactDescriptor>,
}

impl Catalog {
    /// Build a catalog from descriptors, rejecting duplicate names
    pub fn new(entries: Vec<ArtifactDescriptor>) -> CatalogResult<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(CatalogError::DuplicateName {
                    name: entry.name.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The catalog shipped with the binary
    pub fn builtin() -> CatalogResult<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Parse a catalog document
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        let parsed: CatalogToml = toml::from_str(content)?;
        let entries = parsed
            .artifacts
            .into_iter()
            .map(ArtifactDescriptor::try_from)
            .collect::<CatalogResult<Vec<_>>>()?;
        Self::new(entries)
    }

    /// Load a catalog document from disk
    pub fn from_file(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&content)?;
        debug!(
            "Loaded {} catalog entries from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Load from `path` when given, otherwise the built-in catalog
    pub fn load(path: Option<&Path>) -> CatalogResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// Look up a descriptor by name
    pub fn get(&self, name: &str) -> Option<&ArtifactDescriptor> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Look up a descriptor by name, failing for unknown names
    pub fn require(&self, name: &str) -> CatalogResult<&ArtifactDescriptor> {
        self.get(name).ok_or_else(|| CatalogError::UnknownArtifact {
            name: name.to_string(),
        })
    }

    /// 1-based display index of an entry
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(|index| index + 1)
    }

    /// Entries in catalog order
    pub fn iter(&self) -> std::slice::Iter<'_, ArtifactDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
