//! Output registration: commit the batch's output references, then publish
//! the staged files.
//!
//! The order matters. Files only move into the public output directory after
//! the store has accepted every reference, so a failed commit leaves no
//! orphaned documents behind; the staging area is simply dropped.

use crate::error::BatchVaultError;
use crate::model::{OutputUpdate, RecipientOutcome};
use crate::pipeline::scratch::StagingArea;
use crate::store::GroupStore;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info};

/// Writes a batch's output references through the store in one transaction.
pub struct OutputRegistrar<'a> {
    store: &'a dyn GroupStore,
}

impl<'a> OutputRegistrar<'a> {
    pub fn new(store: &'a dyn GroupStore) -> Self {
        Self { store }
    }

    /// Commit all updates atomically.
    ///
    /// # Errors
    /// [`BatchVaultError::Persistence`] if the store cannot commit. Nothing
    /// is visible to other readers in that case.
    pub fn commit(&self, updates: &[OutputUpdate]) -> Result<(), BatchVaultError> {
        self.store
            .commit_output_references(updates)
            .map_err(BatchVaultError::Persistence)?;
        info!("Registered {} output references", updates.len());
        Ok(())
    }
}

/// Move every successfully rendered file from `staging` into `output_dir`,
/// replacing older files of the same name.
///
/// Runs after a successful commit, so a file that cannot be moved does not
/// stop the rest. Returns the names of the files left unpublished; their
/// references are already recorded and dangle until the batch is rerun.
pub fn publish_staged(
    staging: StagingArea,
    output_dir: &Path,
    outcomes: &[RecipientOutcome],
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unpublished = Vec::new();

    for outcome in outcomes.iter().filter(|o| o.is_rendered()) {
        if !seen.insert(outcome.file_name.as_str()) {
            // Overwrite policy: several members share one file.
            continue;
        }
        let from = staging.path_for(&outcome.file_name);
        let to = output_dir.join(&outcome.file_name);
        match std::fs::rename(&from, &to) {
            Ok(()) => debug!("Published {}", to.display()),
            Err(e) => {
                error!(
                    "Failed to publish {} for member {}: {}",
                    to.display(),
                    outcome.member_id,
                    e
                );
                unpublished.push(outcome.file_name.clone());
            }
        }
    }

    staging.discard();
    unpublished
}
