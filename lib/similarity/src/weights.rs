//! Weight table
//!
//! Declares how much each attribute contributes to the preference and item
//! vectors, how numeric attributes are binned into tokens, and how soft
//! preference signals expand into tokens. The table is shared by the
//! vectorizer and the embedder so both project into the same token space.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Price thresholds separating the budget, mid and premium tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTiers {
    /// Prices at or below this are `budget`
    pub budget_max: f64,
    /// Prices at or above this are `premium`
    pub premium_min: f64,
}

impl Default for PriceTiers {
    fn default() -> Self {
        Self { budget_max: 20_000.0, premium_min: 40_000.0 }
    }
}

impl PriceTiers {
    pub fn tier(&self, price: f64) -> &'static str {
        if price <= self.budget_max {
            "budget"
        } else if price >= self.premium_min {
            "premium"
        } else {
            "mid"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    /// Per-attribute token weight
    pub attributes: BTreeMap<String, f32>,
    /// Weight of attributes missing from `attributes`
    pub default_weight: f32,
    /// Weight of tag, priority, affinity and price-tier tokens
    pub preference_weight: f32,
    /// Bin width per numeric attribute
    pub bins: BTreeMap<String, f64>,
    /// Upper bound on the bins a single range contributes
    pub max_range_bins: usize,
    /// Priority tag -> tokens it stands for
    pub priority_tokens: BTreeMap<String, Vec<String>>,
    pub price_tiers: PriceTiers,
}

impl Default for WeightTable {
    fn default() -> Self {
        let attributes = [
            ("make", 3.0),
            ("category", 2.5),
            ("model", 2.5),
            ("body_style", 2.0),
            ("year", 1.2),
            ("price", 1.5),
            ("mileage", 1.0),
            ("fuel", 1.0),
            ("drivetrain", 1.0),
            ("transmission", 0.8),
            ("color", 0.5),
        ]
        .into_iter()
        .map(|(name, w)| (name.to_string(), w))
        .collect();

        let bins = [("price", 5_000.0), ("mileage", 10_000.0), ("year", 1.0)]
            .into_iter()
            .map(|(name, w)| (name.to_string(), w))
            .collect();

        let priority_tokens = [
            ("fuel_efficiency", &["fuel:hybrid", "fuel:electric", "tag:fuel efficient"][..]),
            ("safety", &["tag:safety", "tag:top safety pick"][..]),
            ("family", &["body_style:suv", "body_style:minivan", "tag:third row"][..]),
            ("reliability", &["tag:reliable", "tag:certified"][..]),
            ("performance", &["tag:performance", "drivetrain:awd"][..]),
            ("off_road", &["drivetrain:4wd", "drivetrain:awd", "tag:off road"][..]),
        ]
        .into_iter()
        .map(|(p, tokens)| (p.to_string(), tokens.iter().map(|t| t.to_string()).collect()))
        .collect();

        Self {
            attributes,
            default_weight: 0.7,
            preference_weight: 0.4,
            bins,
            max_range_bins: 24,
            priority_tokens,
            price_tiers: PriceTiers::default(),
        }
    }
}

impl WeightTable {
    #[inline]
    pub fn weight(&self, attribute: &str) -> f32 {
        self.attributes.get(attribute).copied().unwrap_or(self.default_weight)
    }

    /// Bin width of a numeric attribute; unconfigured attributes bin by 1
    #[inline]
    pub fn bin_width(&self, attribute: &str) -> f64 {
        self.bins.get(attribute).copied().unwrap_or(1.0)
    }

    /// Validate the table
    /// - Weights must be finite and non-negative
    /// - Bin widths must be finite and positive
    /// - Price tiers must be ordered
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (name, weight) in &self.attributes {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(SchemaError::NegativeWeight(name.clone()));
            }
        }
        if !self.default_weight.is_finite() || self.default_weight < 0.0 {
            return Err(SchemaError::NegativeWeight("default_weight".to_string()));
        }
        if !self.preference_weight.is_finite() || self.preference_weight < 0.0 {
            return Err(SchemaError::NegativeWeight("preference_weight".to_string()));
        }
        for (name, width) in &self.bins {
            if !width.is_finite() || *width <= 0.0 {
                return Err(SchemaError::InvalidBinWidth(name.clone()));
            }
        }
        if self.max_range_bins == 0 {
            return Err(SchemaError::ZeroRangeBins);
        }
        if self.price_tiers.budget_max > self.price_tiers.premium_min {
            return Err(SchemaError::InvalidPriceTiers);
        }
        Ok(())
    }

    /// Stable hash of everything that influences token weights
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (name, weight) in &self.attributes {
            name.hash(&mut hasher);
            weight.to_bits().hash(&mut hasher);
        }
        self.default_weight.to_bits().hash(&mut hasher);
        self.preference_weight.to_bits().hash(&mut hasher);
        for (name, width) in &self.bins {
            name.hash(&mut hasher);
            width.to_bits().hash(&mut hasher);
        }
        self.max_range_bins.hash(&mut hasher);
        self.priority_tokens.hash(&mut hasher);
        self.price_tiers.budget_max.to_bits().hash(&mut hasher);
        self.price_tiers.premium_min.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

/// Errors that can occur during weight table validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Weight '{0}' must be finite and non-negative")]
    NegativeWeight(String),

    #[error("Bin width for '{0}' must be finite and positive")]
    InvalidBinWidth(String),

    #[error("max_range_bins must be at least 1")]
    ZeroRangeBins,

    #[error("price_tiers.budget_max must not exceed price_tiers.premium_min")]
    InvalidPriceTiers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let table = WeightTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.weight("make"), 3.0);
        assert_eq!(table.weight("sunroof"), 0.7);
        assert_eq!(table.bin_width("price"), 5000.0);
        assert_eq!(table.bin_width("seats"), 1.0);
    }

    #[test]
    fn test_negative_weight_error() {
        let mut table = WeightTable::default();
        table.attributes.insert("color".into(), -0.5);
        assert_eq!(table.validate(), Err(SchemaError::NegativeWeight("color".into())));

        let mut table = WeightTable::default();
        table.bins.insert("price".into(), 0.0);
        assert_eq!(table.validate(), Err(SchemaError::InvalidBinWidth("price".into())));
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let a = WeightTable::default();
        let mut b = WeightTable::default();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.attributes.insert("make".into(), 2.0);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_price_tiers() {
        let tiers = PriceTiers::default();
        assert_eq!(tiers.tier(15_000.0), "budget");
        assert_eq!(tiers.tier(30_000.0), "mid");
        assert_eq!(tiers.tier(55_000.0), "premium");
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let table: WeightTable = serde_json::from_str(r#"{"default_weight": 1.0}"#).unwrap();
        assert_eq!(table.default_weight, 1.0);
        assert_eq!(table.max_range_bins, 24);
    }
}
