//! Segment generation boundary
//!
//! The segment generator is an untrusted collaborator: it returns untyped
//! JSON. Everything it produces is validated and repaired here before it can
//! reach the catalog, and the request's hard constraints are stamped onto
//! every surviving segment.

use ahash::AHashSet;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use shortlist_core::{FilterSet, Normalizer, RawFilterSet, RawValue};

use crate::config::SegmentConfig;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentError {
    #[error("Segment generator failed: {0}")]
    Generator(String),
}

/// Produces alternative filter sets that partition the request's search space
#[async_trait]
pub trait SegmentGenerator: Send + Sync {
    async fn generate(&self, filters: &FilterSet, count: usize) -> Result<Vec<Value>, SegmentError>;
}

/// Expected shape of one generated segment
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentDraft {
    #[serde(alias = "filters")]
    pub constraints: BTreeMap<String, Value>,
    #[serde(default)]
    pub label: Option<String>,
}

/// A validated segment ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub filters: FilterSet,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NotAnObject,
    Malformed(String),
    Empty,
    Duplicate,
    Overlap(f64),
}

/// Outcome of validating one generator response
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub accepted: Vec<Segment>,
    pub rejected: Vec<(usize, Rejection)>,
    /// Constraint values dropped during repair
    pub repaired: usize,
}

/// Jaccard overlap of two sorted, deduplicated token lists
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let left: AHashSet<&String> = a.iter().collect();
    let right: AHashSet<&String> = b.iter().collect();
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

/// Number of valid segments a response needs to be accepted
pub fn required_valid(requested: usize, config: &SegmentConfig) -> usize {
    ((requested as f64 * config.min_valid_ratio).ceil() as usize).clamp(1, requested.max(1))
}

pub struct SegmentValidator<'a> {
    base: &'a FilterSet,
    normalizer: &'a Normalizer,
    overlap_threshold: f64,
}

impl<'a> SegmentValidator<'a> {
    pub fn new(base: &'a FilterSet, normalizer: &'a Normalizer, config: &SegmentConfig) -> Self {
        Self { base, normalizer, overlap_threshold: config.overlap_threshold }
    }

    /// Validate a generator response, keeping at most `limit` segments
    pub fn validate(&self, raw: Vec<Value>, limit: usize) -> Validation {
        let mut out = Validation::default();
        let mut signatures: Vec<Vec<String>> = Vec::new();

        for (idx, value) in raw.into_iter().enumerate() {
            if out.accepted.len() >= limit {
                break;
            }

            let segment = match self.repair(value, &mut out.repaired) {
                Ok(segment) => segment,
                Err(reason) => {
                    warn!(segment = idx, reason = ?reason, "rejected generated segment");
                    out.rejected.push((idx, reason));
                    continue;
                }
            };

            let signature = segment.filters.signature();
            let mut reason = None;
            for earlier in &signatures {
                if *earlier == signature {
                    reason = Some(Rejection::Duplicate);
                    break;
                }
                let overlap = jaccard(earlier, &signature);
                if overlap > self.overlap_threshold {
                    reason = Some(Rejection::Overlap(overlap));
                    break;
                }
            }
            if let Some(reason) = reason {
                debug!(segment = idx, reason = ?reason, "dropped redundant segment");
                out.rejected.push((idx, reason));
                continue;
            }

            signatures.push(signature);
            out.accepted.push(segment);
        }

        out
    }

    fn repair(&self, value: Value, repaired: &mut usize) -> Result<Segment, Rejection> {
        if !value.is_object() {
            return Err(Rejection::NotAnObject);
        }
        let draft: SegmentDraft = serde_json::from_value(value).map_err(|e| Rejection::Malformed(e.to_string()))?;

        let mut raw = RawFilterSet { location: self.base.location, ..Default::default() };
        for (name, value) in draft.constraints {
            match serde_json::from_value::<RawValue>(value) {
                Ok(v) => {
                    raw.constraints.insert(name, v);
                }
                Err(_) => *repaired += 1,
            }
        }

        let (parsed, errors) = FilterSet::from_raw(&raw, self.normalizer);
        *repaired += errors.len();

        let mut filters = FilterSet {
            constraints: BTreeMap::new(),
            must_have: self.base.must_have.clone(),
            avoid_list: self.base.avoid_list.clone(),
            location: self.base.location,
        };
        for (attr, constraint) in parsed.constraints {
            if self.base.must_have.contains_key(&attr) {
                *repaired += 1;
                continue;
            }
            filters.constraints.insert(attr, constraint);
        }

        if filters.constraints.is_empty() {
            return Err(Rejection::Empty);
        }
        Ok(Segment { filters, label: draft.label })
    }
}
