use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sparse weighted token vector, entries sorted by token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenVector {
    entries: Vec<(String, f32)>,
    norm: f32,
}

impl TokenVector {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (token, weight) pairs; a repeated token keeps its largest weight,
    /// non-positive weights are ignored
    pub fn from_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let mut merged: BTreeMap<String, f32> = BTreeMap::new();
        for (token, weight) in weights {
            if weight <= 0.0 || !weight.is_finite() {
                continue;
            }
            let slot = merged.entry(token.into()).or_insert(0.0);
            if weight > *slot {
                *slot = weight;
            }
        }
        let entries: Vec<(String, f32)> = merged.into_iter().collect();
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        Self { entries, norm }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.norm
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn weight(&self, token: &str) -> Option<f32> {
        self.entries
            .binary_search_by(|(t, _)| t.as_str().cmp(token))
            .ok()
            .map(|idx| self.entries[idx].1)
    }

    /// Sparse dot product by merge join
    pub fn dot(&self, other: &TokenVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            match self.entries[i].0.cmp(&other.entries[j].0) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    dot += self.entries[i].1 * other.entries[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot
    }

    /// Cosine similarity in [0, 1]; 0.0 exactly when the vectors share no token
    #[inline]
    pub fn cosine_similarity(&self, other: &TokenVector) -> f32 {
        if self.norm <= f32::EPSILON || other.norm <= f32::EPSILON {
            return 0.0;
        }
        let dot = self.dot(other);
        if dot <= 0.0 {
            return 0.0;
        }
        (dot / (self.norm * other.norm)).clamp(f32::MIN_POSITIVE, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let v1 = TokenVector::from_weights([("make:honda", 3.0), ("year:bin:2020", 1.0)]);
        let v2 = TokenVector::from_weights([("make:honda", 3.0), ("year:bin:2020", 1.0)]);
        assert!((v1.cosine_similarity(&v2) - 1.0).abs() < 1e-6);

        let v3 = TokenVector::from_weights([("make:mazda", 3.0)]);
        assert_eq!(v1.cosine_similarity(&v3), 0.0);
    }

    #[test]
    fn test_partial_overlap_is_positive() {
        let v1 = TokenVector::from_weights([("make:honda", 3.0), ("color:red", 0.5)]);
        let v2 = TokenVector::from_weights([("color:red", 0.5), ("make:kia", 3.0)]);
        let sim = v1.cosine_similarity(&v2);
        assert!(sim > 0.0 && sim < 0.1, "got {}", sim);
    }

    #[test]
    fn test_duplicate_tokens_keep_max() {
        let v = TokenVector::from_weights([("a", 1.0), ("a", 2.5), ("b", -1.0), ("c", f32::NAN)]);
        assert_eq!(v.len(), 1);
        assert_eq!(v.weight("a"), Some(2.5));
        assert_eq!(v.weight("b"), None);
    }

    #[test]
    fn test_empty_vector() {
        let empty = TokenVector::new();
        let v = TokenVector::from_weights([("a", 1.0)]);
        assert!(empty.is_empty());
        assert_eq!(empty.cosine_similarity(&v), 0.0);
    }
}
