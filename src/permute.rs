//! Deterministic segment generator for local runs
//!
//! Walks the catalog's `make` and `year` domains and emits one segment per
//! `(make, year)` pair, makes varying fastest. Attributes pinned by the
//! request's must-have constraints are left out of the permutation.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use shortlist_catalog::InMemoryCatalog;
use shortlist_core::FilterSet;
use shortlist_retrieval::{SegmentError, SegmentGenerator};

#[derive(Debug, Clone, Default)]
pub struct DomainPermutations {
    makes: Vec<String>,
    years: Vec<i64>,
}

impl DomainPermutations {
    pub fn new(makes: Vec<String>, years: Vec<i64>) -> Self {
        Self { makes, years }
    }

    /// Collect the distinct makes and model years present in `catalog`
    pub fn from_catalog(catalog: &InMemoryCatalog) -> Self {
        let mut makes = BTreeSet::new();
        let mut years = BTreeSet::new();
        for item in catalog.iter() {
            if let Some(make) = item.text("make") {
                makes.insert(make.to_string());
            }
            if let Some(year) = item.number("year") {
                years.insert(year as i64);
            }
        }
        Self { makes: makes.into_iter().collect(), years: years.into_iter().rev().collect() }
    }
}

#[async_trait]
impl SegmentGenerator for DomainPermutations {
    async fn generate(&self, filters: &FilterSet, count: usize) -> Result<Vec<Value>, SegmentError> {
        let makes: &[String] = if filters.must_have.contains_key("make") { &[] } else { &self.makes };
        let years: &[i64] = if filters.must_have.contains_key("year") { &[] } else { &self.years };
        if makes.is_empty() && years.is_empty() {
            return Err(SegmentError::Generator("catalog has no make or year values to permute".to_string()));
        }

        let combinations = makes.len().max(1) * years.len().max(1);
        let segments = (0..count.min(combinations))
            .map(|i| {
                let mut constraints = Map::new();
                let mut label = Vec::new();
                if !makes.is_empty() {
                    let make = &makes[i % makes.len()];
                    constraints.insert("make".to_string(), json!(make));
                    label.push(make.clone());
                }
                if !years.is_empty() {
                    let year = years[(i / makes.len().max(1)) % years.len()];
                    constraints.insert("year".to_string(), json!(year));
                    label.push(year.to_string());
                }
                json!({ "constraints": constraints, "label": label.join(" ") })
            })
            .collect();
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortlist_core::{CatalogItem, Constraint};

    fn generator() -> DomainPermutations {
        let catalog = InMemoryCatalog::from_items([
            CatalogItem::new("1").with_attr("make", "Honda").with_attr("year", 2019.0),
            CatalogItem::new("2").with_attr("make", "Mazda").with_attr("year", 2021.0),
            CatalogItem::new("3").with_attr("make", "Honda").with_attr("year", 2021.0),
        ]);
        DomainPermutations::from_catalog(&catalog)
    }

    #[tokio::test]
    async fn test_permutes_makes_then_years() {
        let segments = generator().generate(&FilterSet::new(), 10).await.unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], json!({"constraints": {"make": "honda", "year": 2021}, "label": "honda 2021"}));
        assert_eq!(segments[1]["constraints"]["make"], "mazda");
        assert_eq!(segments[2]["constraints"]["year"], 2019);
    }

    #[tokio::test]
    async fn test_pinned_make_is_not_permuted() {
        let filters = FilterSet::new().with_must_have("make", Constraint::Exact("honda".into()));
        let segments = generator().generate(&filters, 10).await.unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s["constraints"].get("make").is_none()));
    }

    #[tokio::test]
    async fn test_empty_domains_fail() {
        let result = DomainPermutations::default().generate(&FilterSet::new(), 3).await;
        assert!(result.is_err());
    }
}
