//! LWW Core - Last-Writer-Wins Element Set
//!
//! This crate provides the conflict-resolution primitive:
//! - Timed sets that keep the newest timestamp seen for each value
//! - An in-memory timed set guarded by a reader/writer lock
//! - The LWW element set built from an additions and a removals timed set
//! - Score encoding and codecs used by durable backends

pub mod codec;
pub mod element_set;
pub mod error;
pub mod memory;
pub mod score;
pub mod timed_set;

pub use codec::{Codec, JsonCodec, StringCodec};
pub use element_set::{ElementSet, SetStats};
pub use error::{Error, Result};
pub use memory::MemoryTimedSet;
pub use score::Timestamp;
pub use timed_set::{Raise, TimedSet};
