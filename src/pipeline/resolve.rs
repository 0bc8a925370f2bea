//! Recipient resolution: load the group and check there is someone to render for.

use crate::error::BatchVaultError;
use crate::model::{Group, GroupId};
use crate::store::GroupStore;
use tracing::debug;

/// Load `group_id` with its members.
///
/// # Errors
/// * [`BatchVaultError::GroupNotFound`]: no such group.
/// * [`BatchVaultError::EmptyGroup`]: the group has no members.
/// * [`BatchVaultError::Persistence`]: the store failed.
pub fn resolve_recipients(store: &dyn GroupStore, group_id: GroupId) -> Result<Group, BatchVaultError> {
    let group = store
        .find_group(group_id)?
        .ok_or(BatchVaultError::GroupNotFound { group_id })?;

    if group.members.is_empty() {
        return Err(BatchVaultError::EmptyGroup { group_id });
    }

    debug!(
        "Resolved group {} '{}' with {} members",
        group.id,
        group.name,
        group.members.len()
    );
    Ok(group)
}
