//! Persistence collaborator: groups, members and output references.
//!
//! The pipeline only talks to the [`GroupStore`] trait. [`SqliteStore`] is the
//! shipped backend; tests and embedders can supply their own.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::model::{Group, GroupId, Member, MemberId, NewMember, OutputUpdate};
use thiserror::Error;

/// Errors raised by a [`GroupStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The referenced group does not exist.
    #[error("group {group_id} not found")]
    GroupNotFound { group_id: GroupId },

    /// An output update named a member that does not exist.
    #[error("member {member_id} not found")]
    MemberNotFound { member_id: MemberId },

    /// The backend cannot serve requests (poisoned lock, closed connection, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage operations the personalization core and the CRUD surface need.
///
/// Implementations must be `Send + Sync`; the async entry point moves the
/// store onto a blocking worker thread.
pub trait GroupStore: Send + Sync {
    /// Create an empty group stamped with the current time.
    fn create_group(&self, name: &str) -> Result<Group, StoreError>;

    /// All groups, each with its members, in creation order.
    fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    /// Load one group with its members in load (insertion) order.
    fn find_group(&self, id: GroupId) -> Result<Option<Group>, StoreError>;

    /// Add a member to an existing group.
    ///
    /// # Errors
    /// [`StoreError::GroupNotFound`] if `group_id` does not exist.
    fn add_member(&self, group_id: GroupId, member: &NewMember) -> Result<Member, StoreError>;

    /// Apply all output-reference updates of one batch atomically.
    ///
    /// Either every update is visible afterwards or none is.
    fn commit_output_references(&self, updates: &[OutputUpdate]) -> Result<(), StoreError>;
}
