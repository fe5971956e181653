//! Keeps the last fetched [Snapshot] in SQLite so restarts can serve data
//! without waiting on the remote source.

use rusqlite::{Connection, OptionalExtension};
use time::{Duration, OffsetDateTime};

use crate::{Error, dataset::Snapshot};

/// Create the snapshot_cache table in the database.
///
/// The table holds at most one row: the most recently saved snapshot as JSON.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS snapshot_cache (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            snapshot TEXT NOT NULL,
            fetched_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// A snapshot read back from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    /// The cached data.
    pub snapshot: Snapshot,
    /// When the cached data was fetched from the remote source.
    pub fetched_at: OffsetDateTime,
}

impl CachedSnapshot {
    /// Whether the snapshot is younger than `max_age` at time `now`.
    pub fn is_fresh(&self, max_age: Duration, now: OffsetDateTime) -> bool {
        now - self.fetched_at < max_age
    }
}

/// Replaces the cached snapshot with `snapshot`.
///
/// # Errors
/// Returns [Error::JSONSerializationError] if the snapshot cannot be
/// serialized, or [Error::SqlError] if the write fails.
pub fn save_snapshot(snapshot: &Snapshot, connection: &Connection) -> Result<(), Error> {
    let json = serde_json::to_string(snapshot)?;

    connection.execute(
        "INSERT INTO snapshot_cache (id, snapshot, fetched_at) VALUES (1, ?1, ?2)
        ON CONFLICT(id) DO UPDATE SET snapshot = excluded.snapshot, fetched_at = excluded.fetched_at",
        (json, snapshot.fetched_at),
    )?;

    tracing::debug!("Saved snapshot fetched at {} to cache", snapshot.fetched_at);

    Ok(())
}

/// Gets the cached snapshot, if there is one.
///
/// A cached snapshot that can no longer be decoded is treated as missing.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn load_snapshot(connection: &Connection) -> Result<Option<CachedSnapshot>, Error> {
    let row = connection
        .query_row(
            "SELECT snapshot, fetched_at FROM snapshot_cache WHERE id = 1",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, OffsetDateTime>(1)?)),
        )
        .optional()?;

    let Some((json, fetched_at)) = row else {
        tracing::debug!("No cached snapshot found");
        return Ok(None);
    };

    match serde_json::from_str::<Snapshot>(&json) {
        Ok(snapshot) => Ok(Some(CachedSnapshot {
            snapshot,
            fetched_at,
        })),
        Err(error) => {
            tracing::warn!("Ignoring cached snapshot that could not be decoded: {error}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{
        Duration,
        macros::{date, datetime},
    };

    use crate::{dataset::Snapshot, normalize::Transaction, receivables::Receivables};

    use super::{CachedSnapshot, initialize, load_snapshot, save_snapshot};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn create_test_snapshot(sales: f64) -> Snapshot {
        Snapshot {
            transactions: vec![Transaction::new(
                date!(2024 - 07 - 01),
                sales,
                "Asha",
                "HE",
            )],
            receivables: Receivables::default(),
            fetched_at: datetime!(2025-01-15 09:30 UTC),
        }
    }

    #[test]
    fn load_from_empty_cache_returns_none() {
        let conn = get_test_connection();

        assert_eq!(load_snapshot(&conn).unwrap(), None);
    }

    #[test]
    fn save_then_load_returns_snapshot() {
        let conn = get_test_connection();
        let snapshot = create_test_snapshot(100.0);

        save_snapshot(&snapshot, &conn).unwrap();
        let cached = load_snapshot(&conn).unwrap().unwrap();

        assert_eq!(cached.snapshot, snapshot);
        assert_eq!(cached.fetched_at, snapshot.fetched_at);
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let conn = get_test_connection();

        save_snapshot(&create_test_snapshot(100.0), &conn).unwrap();
        save_snapshot(&create_test_snapshot(250.0), &conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM snapshot_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let cached = load_snapshot(&conn).unwrap().unwrap();
        assert_eq!(cached.snapshot.transactions[0].sales, 250.0);
    }

    #[test]
    fn undecodable_snapshot_is_ignored() {
        let conn = get_test_connection();
        conn.execute(
            "INSERT INTO snapshot_cache (id, snapshot, fetched_at) VALUES (1, 'not json', ?1)",
            [datetime!(2025-01-15 09:30 UTC)],
        )
        .unwrap();

        assert_eq!(load_snapshot(&conn).unwrap(), None);
    }

    #[test]
    fn freshness_uses_max_age() {
        let cached = CachedSnapshot {
            snapshot: create_test_snapshot(1.0),
            fetched_at: datetime!(2025-01-15 09:00 UTC),
        };

        let max_age = Duration::hours(1);
        assert!(cached.is_fresh(max_age, datetime!(2025-01-15 09:59 UTC)));
        assert!(!cached.is_fresh(max_age, datetime!(2025-01-15 10:00 UTC)));
    }
}
