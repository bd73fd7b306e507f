use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shortlist_core::{CatalogItem, Filter, ItemId, Predicate};

use crate::{CatalogStore, CatalogVersion, Result};

#[derive(Default)]
struct Rows {
    items: Vec<Arc<CatalogItem>>,
    positions: AHashMap<ItemId, usize>,
}

impl Rows {
    fn upsert(&mut self, item: Arc<CatalogItem>) {
        match self.positions.get(&item.id) {
            Some(&pos) => self.items[pos] = item,
            None => {
                self.positions.insert(item.id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    fn remove(&mut self, id: &ItemId) -> bool {
        let Some(pos) = self.positions.remove(id) else {
            return false;
        };
        self.items.remove(pos);
        for (offset, item) in self.items[pos..].iter().enumerate() {
            self.positions.insert(item.id.clone(), pos + offset);
        }
        true
    }
}

/// Catalog held in memory, rows kept in insertion order
pub struct InMemoryCatalog {
    rows: RwLock<Rows>,
    version: AtomicU64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Rows::default()),
            version: AtomicU64::new(0),
        }
    }

    pub fn from_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let catalog = Self::new();
        catalog.batch_upsert(items);
        catalog
    }

    /// Insert or replace a row by id; the row is normalized on the way in
    pub fn upsert(&self, item: CatalogItem) {
        self.rows.write().upsert(Arc::new(item.normalized()));
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    pub fn batch_upsert(&self, items: impl IntoIterator<Item = CatalogItem>) {
        let mut rows = self.rows.write();
        let mut changed = false;
        for item in items {
            rows.upsert(Arc::new(item.normalized()));
            changed = true;
        }
        if changed {
            self.version.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn remove(&self, id: &ItemId) -> bool {
        let removed = self.rows.write().remove(id);
        if removed {
            self.version.fetch_add(1, Ordering::AcqRel);
        }
        removed
    }

    pub fn get(&self, id: &ItemId) -> Option<Arc<CatalogItem>> {
        let rows = self.rows.read();
        rows.positions.get(id).map(|&pos| Arc::clone(&rows.items[pos]))
    }

    /// Snapshot of every row in catalog order
    pub fn iter(&self) -> Vec<Arc<CatalogItem>> {
        self.rows.read().items.clone()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn query(&self, predicate: &Predicate, limit: usize) -> Result<Vec<Arc<CatalogItem>>> {
        let rows = self.rows.read();
        Ok(rows
            .items
            .iter()
            .filter(|item| predicate.matches(item))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, predicate: &Predicate) -> Result<usize> {
        Ok(self.rows.read().items.iter().filter(|item| predicate.matches(item)).count())
    }

    async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Arc<CatalogItem>>> {
        let rows = self.rows.read();
        Ok(rows.items.iter().skip(offset).take(limit).cloned().collect())
    }

    fn len(&self) -> usize {
        self.rows.read().items.len()
    }

    fn version(&self) -> CatalogVersion {
        CatalogVersion(self.version.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortlist_core::FilterCondition;

    fn car(id: &str, make: &str, price: f64) -> CatalogItem {
        CatalogItem::new(id).with_attr("Make", make).with_attr("price", price)
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_items([
            car("a", "Honda", 20000.0),
            car("b", "Mazda", 25000.0),
            car("c", "Honda", 30000.0),
        ])
    }

    #[tokio::test]
    async fn test_query_respects_predicate_order_and_limit() {
        let catalog = catalog();
        let hondas = Predicate::new(FilterCondition::Equals { field: "make".into(), value: "honda".into() });

        let rows = catalog.query(&hondas, 10).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        assert_eq!(catalog.query(&hondas, 1).await.unwrap().len(), 1);
        assert_eq!(catalog.count(&hondas).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_scan_pages() {
        let catalog = catalog();
        let first = catalog.scan(0, 2).await.unwrap();
        let second = catalog.scan(2, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id.as_str(), "c");
        assert!(catalog.scan(5, 2).await.unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place_and_bumps_version() {
        let catalog = catalog();
        let before = catalog.version();

        catalog.upsert(car("a", "Kia", 15000.0));
        assert!(catalog.version() > before);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.iter()[0].text("make"), Some("kia"));
    }

    #[test]
    fn test_remove_keeps_order() {
        let catalog = catalog();
        assert!(catalog.remove(&ItemId::new("a")));
        assert!(!catalog.remove(&ItemId::new("zzz")));

        let ids: Vec<String> = catalog.iter().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(catalog.get(&ItemId::new("c")).map(|r| r.price()), Some(Some(30000.0)));
    }
}
