//! Legacy weight file migration
//!
//! Early installs stored the v1.4 weights as `model.ckpt`. Renaming the file to
//! its catalog filename before any fetch lets the fetcher see it as already
//! present instead of downloading four gigabytes again.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::app::catalog::Catalog;
use crate::app::operator::Operator;
use crate::constants::legacy;
use crate::errors::MigrationError;

/// What the migrator did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No legacy file found
    NotPresent,
    /// Operator declined the rename
    Declined,
    /// Legacy file renamed
    Renamed { from: PathBuf, to: PathBuf },
    /// Canonical file already exists; legacy file left untouched
    CanonicalExists { legacy: PathBuf, canonical: PathBuf },
}

/// Offer to rename a legacy `model.ckpt` in `model_dir`
///
/// # Errors
///
/// Returns `MigrationError` if the canonical entry is missing from the
/// catalog, the operator cannot be asked, or the rename fails
pub fn migrate(
    model_dir: &Path,
    catalog: &Catalog,
    operator: &mut dyn Operator,
) -> Result<MigrationOutcome, MigrationError> {
    let legacy_path = model_dir.join(legacy::WEIGHTS_FILENAME);
    if !legacy_path.is_file() {
        return Ok(MigrationOutcome::NotPresent);
    }

    let canonical = catalog.require(legacy::CANONICAL_ARTIFACT)?;
    let new_name = &canonical.remote_filename;
    let canonical_path = model_dir.join(new_name);

    if canonical_path.exists() {
        operator.say(&format!(
            "Found a legacy \"{}\" but \"{}\" is already installed; leaving both in place.",
            legacy::WEIGHTS_FILENAME,
            new_name
        ));
        return Ok(MigrationOutcome::CanonicalExists {
            legacy: legacy_path,
            canonical: canonical_path,
        });
    }

    operator.say(&format!(
        "You seem to have the Stable Diffusion v1.4 \"{}\" already installed.",
        legacy::WEIGHTS_FILENAME
    ));
    let consent = operator.confirm(
        &format!("Ok to rename it to \"{}\" for future reference?", new_name),
        true,
    )?;
    if !consent {
        return Ok(MigrationOutcome::Declined);
    }

    operator.say(&format!("{} => {}", legacy::WEIGHTS_FILENAME, new_name));
    fs::rename(&legacy_path, &canonical_path).map_err(|source| MigrationError::Rename {
        from: legacy_path.clone(),
        to: canonical_path.clone(),
        source,
    })?;
    info!(
        "Renamed {} to {}",
        legacy_path.display(),
        canonical_path.display()
    );

    Ok(MigrationOutcome::Renamed {
        from: legacy_path,
        to: canonical_path,
    })
}
