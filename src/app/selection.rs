//! Weight selection and default-model policy
//!
//! [`select`] walks the operator through the catalog and returns a confirmed
//! [`DownloadPlan`]. [`DefaultPolicy`] decides which installed model the
//! persisted config marks as default.

use std::io;

use tracing::warn;

use crate::app::catalog::Catalog;
use crate::app::fetcher::{DownloadPlan, SuccessSet};
use crate::app::operator::Operator;

/// How the default model is chosen among installed models
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// The first installed model in catalog order
    #[default]
    FirstInCatalogOrder,
    /// A specific model, when it is installed
    Named(String),
}

impl DefaultPolicy {
    /// Build the policy from an optional operator override
    pub fn from_override(name: Option<String>) -> Self {
        name.map_or(Self::FirstInCatalogOrder, Self::Named)
    }

    /// Name of the model that becomes default, if any model is installed
    ///
    /// A named model that is not among the installed models falls back to
    /// the catalog-order rule.
    pub fn choose<'c>(&self, catalog: &'c Catalog, installed: &SuccessSet) -> Option<&'c str> {
        let mut models = catalog
            .iter()
            .filter(|entry| entry.is_model() && installed.contains(&entry.name));

        match self {
            Self::FirstInCatalogOrder => models.next().map(|entry| entry.name.as_str()),
            Self::Named(name) => {
                let first = models.clone().next().map(|entry| entry.name.as_str());
                match models.find(|entry| &entry.name == name) {
                    Some(entry) => Some(entry.name.as_str()),
                    None => {
                        warn!(
                            "Requested default '{}' is not an installed model, using {:?}",
                            name, first
                        );
                        first
                    }
                }
            }
        }
    }
}

/// Model that would become default if the whole plan installs
fn planned_default<'p>(plan: &'p DownloadPlan, catalog: &Catalog) -> Option<&'p str> {
    plan.names()
        .find(|name| catalog.get(name).is_some_and(|entry| entry.is_model()))
}

/// Ask the operator which weights to download
///
/// Returns `None` when the operator rejects the plan and declines to change
/// the selection.
pub fn select(catalog: &Catalog, operator: &mut dyn Operator) -> io::Result<Option<DownloadPlan>> {
    loop {
        operator.say(
            "
Choose the weight file(s) you wish to download. Before downloading you
will be given the option to view and change your selections.
",
        );

        let mut plan = DownloadPlan::default();
        for (index, entry) in catalog.iter().enumerate() {
            let counter = index + 1;
            let recommended = if entry.recommended {
                " (recommended)"
            } else {
                ""
            };
            operator.say(&format!(
                "[{}] {}:\n    {}{}",
                counter, entry.name, entry.description, recommended
            ));
            if operator.confirm("    Download?", entry.recommended)? {
                plan.push(entry.name.clone(), counter);
            }
        }

        operator.say("The following weight files will be downloaded:");
        let default = planned_default(&plan, catalog);
        for (name, counter) in plan.iter() {
            let marker = if Some(name) == default { "*" } else { "" };
            operator.say(&format!("   [{}] {}{}", counter, name, marker));
        }
        operator.say("*default");

        if operator.confirm("Ok to download?", true)? {
            return Ok(Some(plan));
        }
        if !operator.confirm("Change your selection?", true)? {
            return Ok(None);
        }
    }
}

/// Plan of every recommended entry, used when prompts are skipped
pub fn recommended_plan(catalog: &Catalog) -> DownloadPlan {
    let mut plan = DownloadPlan::default();
    for (index, entry) in catalog.iter().enumerate() {
        if entry.recommended {
            plan.push(entry.name.clone(), index + 1);
        }
    }
    plan
}
