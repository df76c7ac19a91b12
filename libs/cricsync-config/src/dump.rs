//! Effective configuration dump.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::bind::Section;
use crate::model::{ClientConfig, StoreConfig, SyncOptions};

/// The three bound sections, keyed by section name. Secrets are redacted.
///
/// # Errors
/// Returns an error if a record cannot be serialized.
pub fn render_effective_config(
    client: &ClientConfig,
    store: &StoreConfig,
    sync: &SyncOptions,
) -> Result<Value, serde_json::Error> {
    let mut root = Map::new();
    insert_section(&mut root, client)?;
    insert_section(&mut root, store)?;
    insert_section(&mut root, sync)?;
    Ok(Value::Object(root))
}

fn insert_section<T: Section + Serialize>(
    root: &mut Map<String, Value>,
    section: &T,
) -> Result<(), serde_json::Error> {
    root.insert(T::NAME.to_owned(), serde_json::to_value(section)?);
    Ok(())
}
