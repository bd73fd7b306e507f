//! # Shortlist Catalog
//!
//! Catalog accessor used by the retrieval strategies. [`CatalogStore`] is the
//! seam to a real catalog service; [`InMemoryCatalog`] backs the CLI and tests.

pub mod error;
pub mod load;
pub mod memory;
pub mod store;

pub use error::{CatalogError, Result};
pub use load::{from_json_str, load_json};
pub use memory::InMemoryCatalog;
pub use store::{CatalogStore, CatalogVersion};
