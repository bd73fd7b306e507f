// Predicate language evaluated by catalog stores
use serde::{Deserialize, Serialize};

use crate::{AttrValue, CatalogItem, GeoPoint};

pub trait Filter {
    fn matches(&self, item: &CatalogItem) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCondition {
    Always,
    Equals { field: String, value: String },
    In { field: String, values: Vec<String> },
    Range { field: String, min: Option<f64>, max: Option<f64> },
    WithinMiles { center: GeoPoint, miles: f64 },
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Box<FilterCondition>),
}

impl FilterCondition {
    /// Conjunction that flattens nested `And`s and drops `Always`
    pub fn all(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        let mut flat = Vec::new();
        for condition in conditions {
            match condition {
                FilterCondition::Always => {}
                FilterCondition::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => FilterCondition::Always,
            1 => flat.remove(0),
            _ => FilterCondition::And(flat),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, FilterCondition::Always)
    }
}

/// Executable predicate over catalog rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    condition: FilterCondition,
}

impl Predicate {
    pub fn new(condition: FilterCondition) -> Self {
        Self { condition }
    }

    /// Predicate matching every row
    pub fn always() -> Self {
        Self::new(FilterCondition::Always)
    }

    pub fn condition(&self) -> &FilterCondition {
        &self.condition
    }

    #[must_use]
    pub fn and(self, other: FilterCondition) -> Self {
        Self::new(FilterCondition::all([self.condition, other]))
    }

    fn text_equals(value: &AttrValue, expected: &str) -> bool {
        match value {
            AttrValue::Text(s) => s == expected,
            AttrValue::Number(n) => expected.parse::<f64>().map(|e| (e - n).abs() < f64::EPSILON).unwrap_or(false),
        }
    }

    fn matches_condition(condition: &FilterCondition, item: &CatalogItem) -> bool {
        match condition {
            FilterCondition::Always => true,
            FilterCondition::Equals { field, value } => item
                .attr(field)
                .map(|v| Self::text_equals(v, value))
                .unwrap_or(false),
            FilterCondition::In { field, values } => item
                .attr(field)
                .map(|v| values.iter().any(|expected| Self::text_equals(v, expected)))
                .unwrap_or(false),
            FilterCondition::Range { field, min, max } => item
                .number(field)
                .map(|v| min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m))
                .unwrap_or(false),
            FilterCondition::WithinMiles { center, miles } => item
                .location
                .map(|loc| loc.distance_miles(center) <= *miles)
                .unwrap_or(false),
            FilterCondition::And(conditions) => {
                conditions.iter().all(|c| Self::matches_condition(c, item))
            }
            FilterCondition::Or(conditions) => {
                conditions.iter().any(|c| Self::matches_condition(c, item))
            }
            FilterCondition::Not(condition) => !Self::matches_condition(condition, item),
        }
    }
}

impl Filter for Predicate {
    fn matches(&self, item: &CatalogItem) -> bool {
        Self::matches_condition(&self.condition, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suv(id: &str, make: &str, price: f64) -> CatalogItem {
        CatalogItem::new(id)
            .with_attr("make", make)
            .with_attr("body_style", "suv")
            .with_attr("price", price)
            .with_attr("year", 2020.0)
    }

    #[test]
    fn test_equals_and_range() {
        let predicate = Predicate::new(FilterCondition::all([
            FilterCondition::Equals { field: "make".into(), value: "honda".into() },
            FilterCondition::Range { field: "price".into(), min: None, max: Some(30000.0) },
        ]));

        assert!(predicate.matches(&suv("1", "honda", 25000.0)));
        assert!(!predicate.matches(&suv("2", "honda", 35000.0)));
        assert!(!predicate.matches(&suv("3", "mazda", 25000.0)));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let item = CatalogItem::new("x");
        let eq = Predicate::new(FilterCondition::Equals { field: "make".into(), value: "honda".into() });
        let range = Predicate::new(FilterCondition::Range { field: "price".into(), min: Some(0.0), max: None });
        assert!(!eq.matches(&item));
        assert!(!range.matches(&item));
    }

    #[test]
    fn test_negated_conjunction() {
        let exclude = FilterCondition::Not(Box::new(FilterCondition::And(vec![
            FilterCondition::Equals { field: "make".into(), value: "toyota".into() },
            FilterCondition::Equals { field: "model".into(), value: "rav4".into() },
        ])));
        let predicate = Predicate::new(exclude);

        let rav4 = suv("1", "toyota", 20000.0).with_attr("model", "rav4");
        let highlander = suv("2", "toyota", 20000.0).with_attr("model", "highlander");
        assert!(!predicate.matches(&rav4));
        assert!(predicate.matches(&highlander));
    }

    #[test]
    fn test_numeric_equals() {
        let predicate = Predicate::new(FilterCondition::In {
            field: "year".into(),
            values: vec!["2019".into(), "2020".into()],
        });
        assert!(predicate.matches(&suv("1", "kia", 1.0)));
    }

    #[test]
    fn test_within_miles() {
        let center = GeoPoint::new(40.7128, -74.0060);
        let near = CatalogItem::new("n").with_location(GeoPoint::new(40.73, -73.99));
        let far = CatalogItem::new("f").with_location(GeoPoint::new(34.05, -118.24));
        let predicate = Predicate::new(FilterCondition::WithinMiles { center, miles: 25.0 });

        assert!(predicate.matches(&near));
        assert!(!predicate.matches(&far));
        assert!(!predicate.matches(&CatalogItem::new("nowhere")));
    }

    #[test]
    fn test_all_flattens() {
        let eq = |f: &str| FilterCondition::Equals { field: f.into(), value: "x".into() };
        let c = FilterCondition::all([
            FilterCondition::Always,
            FilterCondition::And(vec![eq("a"), eq("b")]),
            eq("c"),
        ]);
        assert_eq!(c, FilterCondition::And(vec![eq("a"), eq("b"), eq("c")]));
        assert!(FilterCondition::all(Vec::new()).is_always());
        assert_eq!(FilterCondition::all([FilterCondition::Always, eq("a")]), eq("a"));
    }
}
