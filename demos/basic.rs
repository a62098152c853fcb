//! Basic LWW Element Set Example
//!
//! Two replicas edit the same set without talking to each other, then the
//! same edits are replayed against a SQLite-backed set.
//!
//! Run with: cargo run --example basic

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use lww_core::ElementSet;
use lww_storage::{Keyspace, SqliteStore};

const KEYSPACE: &str = r#"
prefix = "demo:cities"
"#;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting LWW example");
    println!("LWW Element Set Example\n");

    println!("=== In-Memory Replicas ===\n");
    memory_example()?;

    println!("\n=== SQLite Store ===\n");
    sqlite_example()?;

    Ok(())
}

fn memory_example() -> Result<()> {
    let start = Utc::now();
    let montreal = ElementSet::new();
    let paris = ElementSet::new();

    montreal.add(&"Montreal", start)?;
    montreal.add(&"NYC", start + Duration::milliseconds(1))?;
    paris.add(&"Paris", start + Duration::milliseconds(2))?;
    paris.remove(&"Montreal", start + Duration::milliseconds(3))?;

    println!("Montreal replica: {:?}", montreal.get()?);
    println!("Paris replica:    {:?}", paris.get()?);

    montreal.merge(&paris)?;
    paris.merge(&montreal)?;

    let mut merged = montreal.get()?;
    merged.sort();
    println!("After merge:      {:?}", merged);
    println!("Stats:            {:?}", montreal.stats()?);

    Ok(())
}

fn sqlite_example() -> Result<()> {
    let keyspace = Keyspace::from_toml_str(KEYSPACE)?;
    println!(
        "Keys: {} / {}",
        keyspace.additions_key(),
        keyspace.removals_key()
    );

    let store = SqliteStore::in_memory()?;
    let set = store.element_set(keyspace.clone())?;

    let start = Utc::now();
    for (i, city) in ["Montreal", "NYC", "Toronto", "Paris"].iter().enumerate() {
        set.add(&city.to_string(), start + Duration::milliseconds(i as i64))?;
    }
    set.remove(&"Montreal".to_string(), start + Duration::milliseconds(10))?;

    println!("Cities: {:?}", set.get()?);
    println!("Montreal present: {}", set.exists(&"Montreal".to_string())?);

    store.clear_element_set(&keyspace)?;
    println!("After clear: {:?}", set.get()?);

    Ok(())
}
