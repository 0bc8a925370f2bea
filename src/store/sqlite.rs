//! SQLite-backed [`GroupStore`].

use super::{GroupStore, StoreError};
use crate::model::{Group, GroupId, Member, NewMember, OutputUpdate};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Group/member store on a single SQLite connection.
///
/// The connection sits behind a mutex; every operation holds it for its
/// whole duration, so a batch commit is never interleaved with other writes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!("Opened SQLite store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }
}

fn load_members(conn: &Connection, group_id: GroupId) -> Result<Vec<Member>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, group_id, name, contact, output_ref
         FROM members
         WHERE group_id = ?1
         ORDER BY id ASC",
    )?;
    let members = stmt
        .query_map(params![group_id], |row| {
            Ok(Member {
                id: row.get(0)?,
                group_id: row.get(1)?,
                name: row.get(2)?,
                contact: row.get(3)?,
                output_reference: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

impl GroupStore for SqliteStore {
    fn create_group(&self, name: &str) -> Result<Group, StoreError> {
        let conn = self.lock()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO groups (name, created_at) VALUES (?1, ?2)",
            params![name, created_at],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created group {} ({})", id, name);
        Ok(Group {
            id,
            name: name.to_string(),
            created_at,
            members: Vec::new(),
        })
    }

    fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM groups ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, GroupId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, DateTime<Utc>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, created_at)| {
                Ok(Group {
                    id,
                    name,
                    created_at,
                    members: load_members(&conn, id)?,
                })
            })
            .collect()
    }

    fn find_group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT name, created_at FROM groups WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, DateTime<Utc>>(1)?)),
            )
            .optional()?;

        match row {
            Some((name, created_at)) => Ok(Some(Group {
                id,
                name,
                created_at,
                members: load_members(&conn, id)?,
            })),
            None => Ok(None),
        }
    }

    fn add_member(&self, group_id: GroupId, member: &NewMember) -> Result<Member, StoreError> {
        let conn = self.lock()?;
        let exists = conn
            .query_row("SELECT 1 FROM groups WHERE id = ?1", params![group_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::GroupNotFound { group_id });
        }

        conn.execute(
            "INSERT INTO members (group_id, name, contact) VALUES (?1, ?2, ?3)",
            params![group_id, member.name, member.contact],
        )?;
        Ok(Member {
            id: conn.last_insert_rowid(),
            group_id,
            name: member.name.clone(),
            contact: member.contact.clone(),
            output_reference: None,
        })
    }

    fn commit_output_references(&self, updates: &[OutputUpdate]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for update in updates {
            let changed = tx.execute(
                "UPDATE members SET output_ref = ?1 WHERE id = ?2",
                params![update.output_reference, update.member_id],
            )?;
            if changed == 0 {
                // Dropping `tx` rolls back everything applied so far.
                return Err(StoreError::MemberNotFound {
                    member_id: update.member_id,
                });
            }
        }
        tx.commit()?;
        debug!("Committed {} output references", updates.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_group(members: &[&str]) -> (SqliteStore, GroupId) {
        let store = SqliteStore::open_in_memory().unwrap();
        let group = store.create_group("Math-101").unwrap();
        for name in members {
            store
                .add_member(group.id, &NewMember::new(*name, "555-0100"))
                .unwrap();
        }
        (store, group.id)
    }

    #[test]
    fn find_group_loads_members_in_insertion_order() {
        let (store, id) = store_with_group(&["Ann Lee", "Bo#1", "Cy"]);
        let group = store.find_group(id).unwrap().expect("group exists");
        assert_eq!(group.name, "Math-101");
        let names: Vec<_> = group.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Ann Lee", "Bo#1", "Cy"]);
        assert!(group.members.iter().all(|m| m.group_id == id));
        assert!(group.members.iter().all(|m| m.output_reference.is_none()));
    }

    #[test]
    fn find_missing_group_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.find_group(99).unwrap().is_none());
    }

    #[test]
    fn add_member_to_missing_group_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .add_member(5, &NewMember::new("Ann", "1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::GroupNotFound { group_id: 5 }));
    }

    #[test]
    fn list_groups_includes_members() {
        let (store, _) = store_with_group(&["Ann"]);
        store.create_group("Empty").unwrap();
        let groups = store.list_groups().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 1);
        assert!(groups[1].members.is_empty());
    }

    #[test]
    fn commit_updates_all_references() {
        let (store, id) = store_with_group(&["Ann", "Bo"]);
        let members = store.find_group(id).unwrap().unwrap().members;
        let updates: Vec<_> = members
            .iter()
            .map(|m| OutputUpdate {
                member_id: m.id,
                output_reference: format!("/pdfs/t ({}).pdf", m.name),
            })
            .collect();
        store.commit_output_references(&updates).unwrap();

        let reloaded = store.find_group(id).unwrap().unwrap();
        assert_eq!(
            reloaded.members[0].output_reference.as_deref(),
            Some("/pdfs/t (Ann).pdf")
        );
        assert_eq!(
            reloaded.members[1].output_reference.as_deref(),
            Some("/pdfs/t (Bo).pdf")
        );
    }

    #[test]
    fn commit_is_all_or_nothing() {
        let (store, id) = store_with_group(&["Ann"]);
        let ann = store.find_group(id).unwrap().unwrap().members[0].id;
        let err = store
            .commit_output_references(&[
                OutputUpdate {
                    member_id: ann,
                    output_reference: "/pdfs/t (Ann).pdf".into(),
                },
                OutputUpdate {
                    member_id: 4242,
                    output_reference: "/pdfs/ghost.pdf".into(),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::MemberNotFound { member_id: 4242 }));

        let reloaded = store.find_group(id).unwrap().unwrap();
        assert_eq!(reloaded.members[0].output_reference, None);
    }

    #[test]
    fn empty_commit_is_a_no_op() {
        let (store, _) = store_with_group(&["Ann"]);
        store.commit_output_references(&[]).unwrap();
    }

    #[test]
    fn reopening_a_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bv.db");
        let id = {
            let store = SqliteStore::open(&path).unwrap();
            let g = store.create_group("Persisted").unwrap();
            store.add_member(g.id, &NewMember::new("Ann", "1")).unwrap();
            g.id
        };
        let store = SqliteStore::open(&path).unwrap();
        let group = store.find_group(id).unwrap().unwrap();
        assert_eq!(group.name, "Persisted");
        assert_eq!(group.members.len(), 1);
    }
}
