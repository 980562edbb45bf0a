//! Idempotent fetch-and-place
//!
//! The fetcher guarantees an artifact exists at its expected local path. A
//! file already at the destination is trusted and left alone; anything else is
//! retrieved through the [`RemoteStore`] cache and then hard-linked (or copied
//! via a temp file) into place, so a partially written file never appears at
//! the destination.
//!
//! Failures never escape: each one becomes a [`FetchStatus::Failed`] result so
//! the rest of the plan keeps going.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, error, info};

use crate::app::catalog::{ArtifactDescriptor, Catalog};
use crate::app::store::{RemoteLocation, RemoteStore};
use crate::auth::Credential;
use crate::constants::files;
use crate::errors::{error_chain, CatalogResult, FetchError, StoreResult};

/// Outcome of fetching one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Destination existed before the run; no network activity
    AlreadyPresent,
    /// Retrieved from the store (or its cache) and placed
    Downloaded,
    /// Could not be placed
    Failed { reason: String },
}

impl FetchStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Result of fetching one catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub name: String,
    pub status: FetchStatus,
    pub local_path: PathBuf,
}

/// Names of artifacts that are present after a plan ran, in plan order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuccessSet {
    names: Vec<String>,
}

impl SuccessSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

impl<S: Into<String>> FromIterator<S> for SuccessSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SuccessSet::default();
        for name in iter {
            let name = name.into();
            if !set.contains(&name) {
                set.names.push(name);
            }
        }
        set
    }
}

impl fmt::Display for SuccessSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(", "))
    }
}

/// Ordered selection of catalog entries to fetch
///
/// Each name maps to its 1-based catalog position for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    entries: Vec<(String, usize)>,
}

impl DownloadPlan {
    /// Plan of the named entries, kept in catalog order
    pub fn from_names<'a>(
        catalog: &Catalog,
        names: impl IntoIterator<Item = &'a str>,
    ) -> CatalogResult<Self> {
        let wanted: Vec<&str> = names.into_iter().collect();
        for name in &wanted {
            catalog.require(name)?;
        }
        Ok(Self {
            entries: catalog
                .iter()
                .enumerate()
                .filter(|(_, entry)| wanted.contains(&entry.name.as_str()))
                .map(|(index, entry)| (entry.name.clone(), index + 1))
                .collect(),
        })
    }

    pub(crate) fn push(&mut self, name: String, index: usize) {
        self.entries.push((name, index));
    }

    /// Entries as (name, display index)
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(name, index)| (name.as_str(), *index))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Results of running a plan
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub results: Vec<FetchResult>,
}

impl FetchReport {
    /// Names whose artifact is present at its destination
    pub fn success_set(&self) -> SuccessSet {
        self.results
            .iter()
            .filter(|result| result.status.is_success())
            .map(|result| result.name.clone())
            .collect()
    }

    /// Failed results with their reasons
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|result| match &result.status {
            FetchStatus::Failed { reason } => Some((result.name.as_str(), reason.as_str())),
            _ => None,
        })
    }

    /// Number of artifacts that needed the network
    pub fn downloaded_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.status == FetchStatus::Downloaded)
            .count()
    }
}

/// Places remote artifacts into a local directory
pub struct Fetcher<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
    models_dir: PathBuf,
}

impl<'a, S: RemoteStore + ?Sized> Fetcher<'a, S> {
    pub fn new(store: &'a S, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            models_dir: models_dir.into(),
        }
    }

    /// Expected local path of an artifact
    pub fn destination(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        self.models_dir.join(&descriptor.remote_filename)
    }

    /// Whether any entry of the plan is missing from disk
    pub fn plan_needs_network(&self, plan: &DownloadPlan, catalog: &Catalog) -> bool {
        plan.names()
            .filter_map(|name| catalog.get(name))
            .any(|descriptor| !self.destination(descriptor).exists())
    }

    /// Ensure one catalog artifact exists at its destination
    pub async fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        credential: Option<&Credential>,
    ) -> FetchResult {
        let destination = self.destination(descriptor);
        let location =
            RemoteLocation::hub(&descriptor.remote_id, &descriptor.remote_filename);

        let status = match self.fetch_to(&location, &destination, credential).await {
            Ok(status) => status,
            Err(e) => {
                let reason = error_chain(&e);
                error!("Failed to fetch {}: {}", descriptor.name, reason);
                FetchStatus::Failed { reason }
            }
        };

        FetchResult {
            name: descriptor.name.clone(),
            status,
            local_path: destination,
        }
    }

    /// Ensure `location` exists at `destination`
    ///
    /// Returns `AlreadyPresent` without touching the store when the
    /// destination exists.
    pub async fn fetch_to(
        &self,
        location: &RemoteLocation,
        destination: &Path,
        credential: Option<&Credential>,
    ) -> StoreResult<FetchStatus> {
        if fs::try_exists(destination).await.unwrap_or(false) {
            debug!("{} exists, skipping", destination.display());
            return Ok(FetchStatus::AlreadyPresent);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let blob = self.store.retrieve(location, credential).await?;
        place(&blob, destination).await?;
        info!("Installed {} at {}", location, destination.display());
        Ok(FetchStatus::Downloaded)
    }

    /// Make `location` available in the store's cache without placing it
    pub async fn warm(
        &self,
        location: &RemoteLocation,
        credential: Option<&Credential>,
    ) -> StoreResult<PathBuf> {
        self.store.retrieve(location, credential).await
    }

    /// Run a plan sequentially in plan order
    pub async fn fetch_plan(
        &self,
        plan: &DownloadPlan,
        catalog: &Catalog,
        credential: Option<&Credential>,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        for name in plan.names() {
            let result = match catalog.get(name) {
                Some(descriptor) => self.fetch(descriptor, credential).await,
                None => FetchResult {
                    name: name.to_string(),
                    status: FetchStatus::Failed {
                        reason: format!("'{}' is not in the catalog", name),
                    },
                    local_path: self.models_dir.join(name),
                },
            };
            report.results.push(result);
        }
        report
    }
}

/// Hard-link `source` to `destination`, or copy through a temp file
async fn place(source: &Path, destination: &Path) -> StoreResult<()> {
    place_with(source, destination, |from, to| std::fs::hard_link(from, to)).await
}

/// Place with `link`, falling back to copy-then-rename when it fails
///
/// The temp copy never outlives a failed placement.
async fn place_with<L>(source: &Path, destination: &Path, link: L) -> StoreResult<()>
where
    L: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match link(source, destination) {
        Ok(()) => {
            debug!("Linked {} -> {}", source.display(), destination.display());
            return Ok(());
        }
        Err(e) => debug!(
            "Hard link to {} failed ({}), copying instead",
            destination.display(),
            e
        ),
    }

    let temp_path = temp_sibling(destination);
    if let Err(e) = fs::copy(source, &temp_path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp_path, destination).await {
        error!(
            "Could not move {} into place: {}",
            temp_path.display(),
            e
        );
        let _ = fs::remove_file(&temp_path).await;
        return Err(FetchError::AtomicOperationFailed {
            temp_path,
            final_path: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// `weights.ckpt` -> `weights.ckpt.tmp`
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(files::TEMP_FILE_SUFFIX);
    path.with_file_name(name)
}
