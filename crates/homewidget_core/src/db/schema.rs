//! Layout steps for partition files.

use super::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use std::cmp::Ordering;

/// `STEPS[n]` moves a file from version `n` to `n + 1`.
const STEPS: &[&str] = &[include_str!("sql/0001_shared_entries.sql")];

/// Layout version written by this build.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    Current,
    /// Older layout; holds the version found on disk.
    Behind(u32),
    /// Newer layout than this build knows.
    Ahead(u32),
}

/// Reads the on-disk layout version and compares it with [`CURRENT_VERSION`].
pub fn inspect(conn: &Connection) -> DbResult<SchemaState> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(match found.cmp(&CURRENT_VERSION) {
        Ordering::Equal => SchemaState::Current,
        Ordering::Less => SchemaState::Behind(found),
        Ordering::Greater => SchemaState::Ahead(found),
    })
}

/// Runs every missing step in one transaction and returns how many ran.
///
/// # Errors
/// - [`DbError::SchemaTooNew`] when the file is ahead of this build. The
///   file is left untouched.
pub fn upgrade(conn: &mut Connection) -> DbResult<u32> {
    if pending_from(inspect(conn)?)?.is_none() {
        return Ok(0);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Re-read under the write lock; another connection may have upgraded first.
    let Some(from) = pending_from(inspect(&tx)?)? else {
        return Ok(0);
    };
    for (index, sql) in STEPS.iter().enumerate().skip(from as usize) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", index as u32 + 1)?;
    }
    tx.commit()?;

    info!("event=schema_upgrade module=db status=ok from={from} to={CURRENT_VERSION}");
    Ok(CURRENT_VERSION - from)
}

fn pending_from(state: SchemaState) -> DbResult<Option<u32>> {
    match state {
        SchemaState::Current => Ok(None),
        SchemaState::Behind(found) => Ok(Some(found)),
        SchemaState::Ahead(found) => Err(DbError::SchemaTooNew {
            found,
            supported: CURRENT_VERSION,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{inspect, upgrade, SchemaState, CURRENT_VERSION};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn blank_file_is_behind_until_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(inspect(&conn).unwrap(), SchemaState::Behind(0));

        assert_eq!(upgrade(&mut conn).unwrap(), CURRENT_VERSION);
        assert_eq!(inspect(&conn).unwrap(), SchemaState::Current);
        assert_eq!(upgrade(&mut conn).unwrap(), 0);
    }

    #[test]
    fn newer_file_is_refused_and_left_alone() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 3)
            .unwrap();

        match upgrade(&mut conn).unwrap_err() {
            DbError::SchemaTooNew { found, supported } => {
                assert_eq!(found, CURRENT_VERSION + 3);
                assert_eq!(supported, CURRENT_VERSION);
            }
            other => panic!("unexpected error: {other}"),
        }
        let tables: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(tables, 0);
    }
}
