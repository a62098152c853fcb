//! Redis timed set backend
//!
//! Each timed set is one sorted set (ZSET). Members are marshalled values and
//! scores are microsecond timestamps. The raise runs as a Lua script, which
//! Redis executes atomically, so clients in different processes never
//! interleave the read and the write.

use crate::config::Keyspace;
use lww_core::score::{from_score, to_score};
use lww_core::{Codec, ElementSet, Error, Raise, Result, StringCodec, TimedSet, Timestamp};
use parking_lot::Mutex;
use redis::{Commands, RedisError, Script};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// Sets member ARGV[2] to score ARGV[1] in sorted set KEYS[1] if the member is
/// missing or its current score is lower. Returns 1 when it wrote, 0 otherwise.
const RAISE_SCRIPT: &str = r#"
local current = tonumber(redis.call('ZSCORE', KEYS[1], ARGV[2]))
if not current or tonumber(ARGV[1]) > current then
    redis.call('ZADD', KEYS[1], ARGV[1], ARGV[2])
    return 1
else
    return 0
end
"#;

fn store_error(e: RedisError) -> Error {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        Error::Connection(e.to_string())
    } else {
        Error::Store(e.to_string())
    }
}

/// Shared handle to a Redis connection holding timed sets
#[derive(Clone)]
pub struct RedisStore {
    conn: Arc<Mutex<redis::Connection>>,
    script: Arc<Script>,
}

impl RedisStore {
    /// Connect to a Redis server, e.g. `redis://127.0.0.1:6379/0`
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Connection(e.to_string()))?;
        let conn = client.get_connection().map_err(store_error)?;

        debug!(url, "Connected to Redis store");
        Ok(Self::from_connection(conn))
    }

    /// Use a connection configured by the caller
    pub fn from_connection(conn: redis::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            script: Arc::new(Script::new(RAISE_SCRIPT)),
        }
    }

    /// Timed set of plain strings stored under `key`
    pub fn timed_set(&self, key: impl Into<String>) -> RedisTimedSet<String> {
        self.timed_set_with_codec(key, StringCodec)
    }

    pub fn timed_set_with_codec<V, C: Codec<V>>(
        &self,
        key: impl Into<String>,
        codec: C,
    ) -> RedisTimedSet<V, C> {
        RedisTimedSet {
            conn: Arc::clone(&self.conn),
            script: Arc::clone(&self.script),
            key: key.into(),
            codec,
            _value: PhantomData,
        }
    }

    /// Element set of plain strings under `keyspace`
    pub fn element_set(
        &self,
        keyspace: impl Into<Keyspace>,
    ) -> Result<ElementSet<String, RedisTimedSet<String>>> {
        self.element_set_with_codec(keyspace, StringCodec)
    }

    /// Element set whose additions and removals share `codec`
    pub fn element_set_with_codec<V, C: Codec<V> + Clone>(
        &self,
        keyspace: impl Into<Keyspace>,
        codec: C,
    ) -> Result<ElementSet<V, RedisTimedSet<V, C>>> {
        let keyspace = keyspace.into();
        keyspace.validate()?;

        Ok(ElementSet::from_parts(
            self.timed_set_with_codec(keyspace.additions_key(), codec.clone()),
            self.timed_set_with_codec(keyspace.removals_key(), codec),
        ))
    }

    /// Delete both sorted sets of the element set under `keyspace`
    pub fn clear_element_set(&self, keyspace: &Keyspace) -> Result<()> {
        self.timed_set(keyspace.additions_key()).clear()?;
        self.timed_set(keyspace.removals_key()).clear()
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

/// Timed set stored in a Redis sorted set
pub struct RedisTimedSet<V, C = StringCodec> {
    conn: Arc<Mutex<redis::Connection>>,
    script: Arc<Script>,
    key: String,
    codec: C,
    _value: PhantomData<fn() -> V>,
}

impl<V, C> RedisTimedSet<V, C> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Delete the sorted set
    pub fn clear(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        conn.del::<_, ()>(&self.key).map_err(store_error)?;

        debug!(key = %self.key, "Cleared timed set");
        Ok(())
    }
}

impl<V, C> std::fmt::Debug for RedisTimedSet<V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTimedSet")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<V, C: Codec<V>> TimedSet<V> for RedisTimedSet<V, C> {
    fn raise_if_newer(&self, value: &V, at: Timestamp) -> Result<Raise> {
        let member = self.codec.marshal(value)?;
        let score = to_score(&at)?;

        let mut conn = self.conn.lock();
        let written: i64 = self
            .script
            .key(&self.key)
            .arg(score)
            .arg(&member)
            .invoke(&mut *conn)
            .map_err(store_error)?;

        trace!(key = %self.key, member = %member, score, updated = written == 1, "raise");
        Ok(if written == 1 {
            Raise::Updated
        } else {
            Raise::Unchanged
        })
    }

    fn lookup(&self, value: &V) -> Result<Option<Timestamp>> {
        let member = self.codec.marshal(value)?;

        let score: Option<f64> = {
            let mut conn = self.conn.lock();
            conn.zscore(&self.key, &member).map_err(store_error)?
        };

        score.map(from_score).transpose()
    }

    fn for_each(&self, visitor: &mut dyn FnMut(V, Timestamp) -> Result<()>) -> Result<()> {
        let entries: Vec<(String, f64)> = {
            let mut conn = self.conn.lock();
            conn.zrange_withscores(&self.key, 0, -1)
                .map_err(store_error)?
        };

        for (member, score) in entries {
            visitor(self.codec.unmarshal(&member)?, from_score(score)?)?;
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let mut conn = self.conn.lock();
        conn.zcard(&self.key).map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a running Redis instance
    // Run with: cargo test --features redis -- --ignored

    use super::*;
    use chrono::{TimeZone, Utc};
    use lww_core::score::truncate;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string())
    }

    fn timed_set(key: &str) -> RedisTimedSet<String> {
        let set = RedisStore::open(&redis_url()).unwrap().timed_set(key);
        set.clear().unwrap();
        set
    }

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2016, 10, d, 0, 0, 0).unwrap()
    }

    #[test]
    #[ignore]
    fn test_redis_raise_and_lookup() {
        let set = timed_set("lww_test_raise");
        assert_eq!(set.lookup(&"Giants".to_string()).unwrap(), None);

        let now = Utc::now();
        assert_eq!(
            set.raise_if_newer(&"Giants".to_string(), now).unwrap(),
            Raise::Updated
        );
        assert_eq!(
            set.lookup(&"Giants".to_string()).unwrap(),
            Some(truncate(&now).unwrap())
        );
        assert_eq!(set.len().unwrap(), 1);
    }

    #[test]
    #[ignore]
    fn test_redis_only_newer_timestamps_win() {
        let set = timed_set("lww_test_newer");
        set.raise_if_newer(&"Hi!".to_string(), day(24)).unwrap();

        assert_eq!(
            set.raise_if_newer(&"Hi!".to_string(), day(23)).unwrap(),
            Raise::Unchanged
        );
        assert_eq!(set.lookup(&"Hi!".to_string()).unwrap(), Some(day(24)));

        assert_eq!(
            set.raise_if_newer(&"Hi!".to_string(), day(25)).unwrap(),
            Raise::Updated
        );
        assert_eq!(set.lookup(&"Hi!".to_string()).unwrap(), Some(day(25)));
    }

    #[test]
    #[ignore]
    fn test_redis_for_each_in_score_order() {
        let set = timed_set("lww_test_each");
        set.raise_if_newer(&"Koala".to_string(), day(1)).unwrap();
        set.raise_if_newer(&"Cat".to_string(), day(2)).unwrap();
        set.raise_if_newer(&"Dog".to_string(), day(3)).unwrap();

        let mut seen = Vec::new();
        set.for_each(&mut |value, _| {
            seen.push(value);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["Koala", "Cat", "Dog"]);
    }

    #[test]
    #[ignore]
    fn test_redis_concurrent_clients() {
        let url = redis_url();
        let first = RedisStore::open(&url).unwrap().timed_set("lww_test_race");
        let second = RedisStore::open(&url).unwrap().timed_set("lww_test_race");
        first.clear().unwrap();

        for round in 1..=25 {
            let member = format!("member-{}", round);
            std::thread::scope(|s| {
                s.spawn(|| first.raise_if_newer(&member, day(round)).unwrap());
                s.spawn(|| second.raise_if_newer(&member, day(round + 1)).unwrap());
            });
            assert_eq!(first.lookup(&member).unwrap(), Some(day(round + 1)));
        }
    }

    #[test]
    #[ignore]
    fn test_redis_element_set_cities() {
        let store = RedisStore::open(&redis_url()).unwrap();
        let keyspace = Keyspace::new("lww_test_cities");
        store.clear_element_set(&keyspace).unwrap();
        let set = store.element_set(keyspace).unwrap();

        assert!(set.get().unwrap().is_empty());
        for (i, city) in ["Montreal", "NYC", "Toronto", "Paris"].into_iter().enumerate() {
            set.add(&city.to_string(), day(i as u32 + 1)).unwrap();
        }
        set.remove(&"Montreal".to_string(), day(5)).unwrap();

        let mut cities = set.get().unwrap();
        cities.sort();
        assert_eq!(cities, vec!["NYC", "Paris", "Toronto"]);
    }
}
