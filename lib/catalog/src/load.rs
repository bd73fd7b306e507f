use std::path::Path;

use shortlist_core::CatalogItem;

use crate::{CatalogError, InMemoryCatalog, Result};

/// Load a catalog from a JSON array of items; a repeated id keeps the last row
pub fn load_json<P: AsRef<Path>>(path: P) -> Result<InMemoryCatalog> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json_str(&raw)
}

pub fn from_json_str(raw: &str) -> Result<InMemoryCatalog> {
    let items: Vec<CatalogItem> = serde_json::from_str(raw)?;
    Ok(InMemoryCatalog::from_items(items))
}
