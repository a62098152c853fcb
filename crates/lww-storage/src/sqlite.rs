//! SQLite timed set backend
//!
//! All timed sets of a store live in one table keyed by `(set_key, member)`,
//! indexed by `(set_key, score)` so a set reads back as a sorted range.
//! Several processes may open the same database file; the raise is a single
//! UPSERT statement, so SQLite's write lock makes it atomic across them.

use crate::config::Keyspace;
use lww_core::score::{from_score, to_score};
use lww_core::{Codec, ElementSet, Error, Raise, Result, StringCodec, TimedSet, Timestamp};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// How long a writer waits on another connection's lock before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RAISE_SQL: &str = r#"
    INSERT INTO lww_timed_sets (set_key, member, score)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(set_key, member) DO UPDATE SET
        score = excluded.score
    WHERE excluded.score > lww_timed_sets.score
"#;

/// Shared handle to a SQLite database holding timed sets
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::Connection(e.to_string()))?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(|e| Error::Store(e.to_string()))?;

        debug!(path = %path.as_ref().display(), "Opened SQLite store");
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Use a connection configured by the caller
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS lww_timed_sets (
                set_key TEXT NOT NULL,
                member TEXT NOT NULL,
                score REAL NOT NULL,
                PRIMARY KEY (set_key, member)
            );

            CREATE INDEX IF NOT EXISTS idx_lww_timed_sets_score ON lww_timed_sets(set_key, score);
            "#,
        )
        .map_err(|e| Error::Store(e.to_string()))?;

        debug!("SQLite timed set schema ready");
        Ok(())
    }

    /// Timed set of plain strings stored under `key`
    pub fn timed_set(&self, key: impl Into<String>) -> SqliteTimedSet<String> {
        self.timed_set_with_codec(key, StringCodec)
    }

    pub fn timed_set_with_codec<V, C: Codec<V>>(
        &self,
        key: impl Into<String>,
        codec: C,
    ) -> SqliteTimedSet<V, C> {
        SqliteTimedSet {
            conn: Arc::clone(&self.conn),
            key: key.into(),
            codec,
            _value: PhantomData,
        }
    }

    /// Element set of plain strings under `keyspace`
    pub fn element_set(
        &self,
        keyspace: impl Into<Keyspace>,
    ) -> Result<ElementSet<String, SqliteTimedSet<String>>> {
        self.element_set_with_codec(keyspace, StringCodec)
    }

    /// Element set whose additions and removals share `codec`
    pub fn element_set_with_codec<V, C: Codec<V> + Clone>(
        &self,
        keyspace: impl Into<Keyspace>,
        codec: C,
    ) -> Result<ElementSet<V, SqliteTimedSet<V, C>>> {
        let keyspace = keyspace.into();
        keyspace.validate()?;

        Ok(ElementSet::from_parts(
            self.timed_set_with_codec(keyspace.additions_key(), codec.clone()),
            self.timed_set_with_codec(keyspace.removals_key(), codec),
        ))
    }

    /// Drop every entry of the element set under `keyspace`
    pub fn clear_element_set(&self, keyspace: &Keyspace) -> Result<()> {
        self.timed_set(keyspace.additions_key()).clear()?;
        self.timed_set(keyspace.removals_key()).clear()
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

/// Timed set stored in SQLite
///
/// Timestamps are kept as microsecond scores, so lookups return them rounded
/// to the nearest microsecond.
pub struct SqliteTimedSet<V, C = StringCodec> {
    conn: Arc<Mutex<Connection>>,
    key: String,
    codec: C,
    _value: PhantomData<fn() -> V>,
}

impl<V, C> SqliteTimedSet<V, C> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Delete every entry of this set
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM lww_timed_sets WHERE set_key = ?1",
                params![self.key],
            )
            .map_err(|e| Error::Store(e.to_string()))?;

        debug!(key = %self.key, deleted, "Cleared timed set");
        Ok(())
    }
}

impl<V, C> std::fmt::Debug for SqliteTimedSet<V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTimedSet")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<V, C: Codec<V>> TimedSet<V> for SqliteTimedSet<V, C> {
    fn raise_if_newer(&self, value: &V, at: Timestamp) -> Result<Raise> {
        let member = self.codec.marshal(value)?;
        let score = to_score(&at)?;

        let conn = self.conn.lock();
        let changed = conn
            .prepare_cached(RAISE_SQL)
            .and_then(|mut stmt| stmt.execute(params![self.key, member, score]))
            .map_err(|e| Error::Store(e.to_string()))?;

        trace!(key = %self.key, member = %member, score, updated = changed > 0, "raise");
        Ok(if changed > 0 {
            Raise::Updated
        } else {
            Raise::Unchanged
        })
    }

    fn lookup(&self, value: &V) -> Result<Option<Timestamp>> {
        let member = self.codec.marshal(value)?;

        let score: Option<f64> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT score FROM lww_timed_sets WHERE set_key = ?1 AND member = ?2",
                params![self.key, member],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?
        };

        score.map(from_score).transpose()
    }

    fn for_each(&self, visitor: &mut dyn FnMut(V, Timestamp) -> Result<()>) -> Result<()> {
        // Read the whole range first so visitors can query other sets on the
        // same connection.
        let rows: Vec<(String, f64)> = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare_cached(
                    "SELECT member, score FROM lww_timed_sets WHERE set_key = ?1 ORDER BY score, member",
                )
                .map_err(|e| Error::Store(e.to_string()))?;

            let rows = stmt
                .query_map(params![self.key], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(|e| Error::Store(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Store(e.to_string()))?;
            rows
        };

        for (member, score) in rows {
            visitor(self.codec.unmarshal(&member)?, from_score(score)?)?;
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lww_timed_sets WHERE set_key = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok(count as usize)
    }
}
