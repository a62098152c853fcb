//! LWW Storage Backends
//!
//! Durable timed sets that several processes can share:
//! - SQLite (default): one table, atomic UPSERT raise
//! - Redis: one sorted set per timed set, atomic Lua raise
//!
//! Both store timestamps as microsecond scores (see [`lww_core::score`]) and
//! build element sets from a [`Keyspace`].

pub mod config;
#[cfg(feature = "redis")]
pub mod redis;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{Keyspace, DEFAULT_ADDITIONS_SUFFIX, DEFAULT_REMOVALS_SUFFIX};
#[cfg(feature = "redis")]
pub use crate::redis::{RedisStore, RedisTimedSet};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteStore, SqliteTimedSet};
