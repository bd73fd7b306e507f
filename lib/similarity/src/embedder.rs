//! Item Embedder
//!
//! Converts catalog rows into sparse token vectors in the same token space as
//! the preference vector, so that cosine similarity between the two measures
//! how well a row fits the request.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use shortlist_core::{AttrValue, CatalogItem, TokenVector};

use crate::bins::{bin_index, bin_token, price_tier_token, tag_token, value_token};
use crate::weights::WeightTable;

#[derive(Debug, Clone)]
pub struct ItemEmbedder {
    weights: Arc<WeightTable>,
    include_tags: bool,
    include_price_tier: bool,
    fingerprint: u64,
}

impl ItemEmbedder {
    pub fn new(weights: Arc<WeightTable>) -> Self {
        EmbedderBuilder::new(weights).build()
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Identity of everything that influences `embed`; part of the cache token
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Convert a catalog row to a token vector
    ///
    /// The vector carries:
    /// 1. One token per attribute, binned for numbers, at the attribute weight
    /// 2. One token per tag at the preference weight
    /// 3. The price-tier token at the preference weight
    pub fn embed(&self, item: &CatalogItem) -> TokenVector {
        let pw = self.weights.preference_weight;
        let mut tokens: Vec<(String, f32)> = Vec::with_capacity(item.attributes.len() + item.tags.len() + 1);

        for (attribute, value) in &item.attributes {
            let weight = self.weights.weight(attribute);
            let width = self.weights.bin_width(attribute);
            let token = match value {
                AttrValue::Number(n) if n.is_finite() => bin_token(attribute, bin_index(*n, width)),
                AttrValue::Number(_) => continue,
                AttrValue::Text(s) if s.is_empty() => continue,
                AttrValue::Text(s) => value_token(attribute, s, width),
            };
            tokens.push((token, weight));
        }

        if self.include_tags {
            tokens.extend(item.tags.iter().map(|t| (tag_token(t), pw)));
        }

        if self.include_price_tier {
            if let Some(price) = item.price() {
                tokens.push((price_tier_token(self.weights.price_tiers.tier(price)), pw));
            }
        }

        TokenVector::from_weights(tokens)
    }
}

/// Builder for creating ItemEmbedder with custom options
#[derive(Debug, Clone)]
pub struct EmbedderBuilder {
    weights: Arc<WeightTable>,
    include_tags: bool,
    include_price_tier: bool,
}

impl EmbedderBuilder {
    pub fn new(weights: Arc<WeightTable>) -> Self {
        Self {
            weights,
            include_tags: true,
            include_price_tier: true,
        }
    }

    pub fn include_tags(mut self, include: bool) -> Self {
        self.include_tags = include;
        self
    }

    pub fn include_price_tier(mut self, include: bool) -> Self {
        self.include_price_tier = include;
        self
    }

    pub fn build(self) -> ItemEmbedder {
        let mut hasher = DefaultHasher::new();
        self.weights.fingerprint().hash(&mut hasher);
        self.include_tags.hash(&mut hasher);
        self.include_price_tier.hash(&mut hasher);

        ItemEmbedder {
            weights: self.weights,
            include_tags: self.include_tags,
            include_price_tier: self.include_price_tier,
            fingerprint: hasher.finish(),
        }
    }
}
