//! Engine configuration
//!
//! Every section is optional in the TOML file; missing keys take their
//! defaults and `EngineConfig::default()` is itself a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use shortlist_core::Normalizer;
use shortlist_similarity::{DiversityParams, KeywordReranker, WeightTable};

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}.")]
    ReadConfig { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config file at {path:?}.")]
    ParseConfig { path: PathBuf, source: toml::de::Error },
    #[error("{message}")]
    Validation { message: String },
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation { message: message.to_string() }
}

/// Which constraints the Single-Query strict tier applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryScope {
    /// must_have and the avoid list only
    #[default]
    MustHave,
    /// must_have, the avoid list and every soft constraint, relaxed one by one
    MustHaveAndFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Upper bound on the candidate pool and on K
    pub row_ceiling: usize,
    pub rows_per_segment: usize,
    /// Segments requested when the request does not say
    pub segment_count: usize,
    pub parallelism: usize,
    pub segment_timeout_ms: u64,
    pub overall_timeout_ms: u64,
    pub primary_scope: PrimaryScope,
    /// Page size of the full-catalog scan
    pub full_scan_page: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            row_ceiling: 1000,
            rows_per_segment: 200,
            segment_count: 10,
            parallelism: 4,
            segment_timeout_ms: 2000,
            overall_timeout_ms: 5000,
            primary_scope: PrimaryScope::MustHave,
            full_scan_page: 500,
        }
    }
}

impl RetrievalConfig {
    pub fn segment_timeout(&self) -> Duration {
        Duration::from_millis(self.segment_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Extra generator calls after the first
    pub max_retries: usize,
    /// Jaccard overlap above which a segment is a near-duplicate
    pub overlap_threshold: f64,
    /// Fraction of requested segments that must survive validation
    pub min_valid_ratio: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self { max_retries: 2, overlap_threshold: 0.8, min_valid_ratio: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub k1: f32,
    pub b: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        let reranker = KeywordReranker::default();
        Self { enabled: true, k1: reranker.k1, b: reranker.b }
    }
}

impl RerankConfig {
    pub fn reranker(&self) -> KeywordReranker {
        KeywordReranker::new(self.k1, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Drop rows without media before scoring
    pub photos_required: bool,
    pub parallelism: usize,
    pub item_timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { photos_required: false, parallelism: 8, item_timeout_ms: 800 }
    }
}

impl EnrichmentConfig {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub segments: SegmentConfig,
    pub weights: WeightTable,
    pub diversity: DiversityParams,
    pub rerank: RerankConfig,
    pub enrichment: EnrichmentConfig,
    pub normalization: Normalizer,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        let mut cfg: EngineConfig = toml::from_str(raw)?;
        normalize(&mut cfg);
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        validate(self)
    }
}

pub fn load(path: &Path) -> Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ConfigError::ReadConfig { path: path.to_path_buf(), source: err })?;

    let cfg = EngineConfig::from_toml_str(&raw)
        .map_err(|err| ConfigError::ParseConfig { path: path.to_path_buf(), source: err })?;

    validate(&cfg)?;

    Ok(cfg)
}

pub fn validate(cfg: &EngineConfig) -> Result<()> {
    let r = &cfg.retrieval;
    if r.row_ceiling == 0 {
        return Err(invalid("retrieval.row_ceiling must be greater than zero."));
    }
    if r.rows_per_segment == 0 {
        return Err(invalid("retrieval.rows_per_segment must be greater than zero."));
    }
    if r.segment_count == 0 {
        return Err(invalid("retrieval.segment_count must be greater than zero."));
    }
    if r.parallelism == 0 {
        return Err(invalid("retrieval.parallelism must be greater than zero."));
    }
    if r.segment_timeout_ms == 0 || r.overall_timeout_ms == 0 {
        return Err(invalid("retrieval timeouts must be greater than zero."));
    }
    if r.full_scan_page == 0 {
        return Err(invalid("retrieval.full_scan_page must be greater than zero."));
    }

    let s = &cfg.segments;
    if !s.overlap_threshold.is_finite() || !(0.0..=1.0).contains(&s.overlap_threshold) {
        return Err(invalid("segments.overlap_threshold must be in the range 0.0-1.0."));
    }
    if !s.min_valid_ratio.is_finite() || !(0.0..=1.0).contains(&s.min_valid_ratio) {
        return Err(invalid("segments.min_valid_ratio must be in the range 0.0-1.0."));
    }

    cfg.weights
        .validate()
        .map_err(|err| ConfigError::Validation { message: format!("weights: {err}") })?;
    cfg.diversity
        .validate()
        .map_err(|err| ConfigError::Validation { message: format!("diversity: {err}") })?;

    if !cfg.rerank.k1.is_finite() || cfg.rerank.k1 < 0.0 {
        return Err(invalid("rerank.k1 must be a finite number, zero or greater."));
    }
    if !cfg.rerank.b.is_finite() || !(0.0..=1.0).contains(&cfg.rerank.b) {
        return Err(invalid("rerank.b must be in the range 0.0-1.0."));
    }

    if cfg.enrichment.parallelism == 0 {
        return Err(invalid("enrichment.parallelism must be greater than zero."));
    }
    if cfg.enrichment.item_timeout_ms == 0 {
        return Err(invalid("enrichment.item_timeout_ms must be greater than zero."));
    }

    if cfg.normalization.distance_attribute.is_empty() {
        return Err(invalid("normalization.distance_attribute must be non-empty."));
    }

    Ok(())
}

fn normalize(cfg: &mut EngineConfig) {
    cfg.normalization.normalize_self();
    cfg.weights.attributes = std::mem::take(&mut cfg.weights.attributes)
        .into_iter()
        .map(|(name, weight)| (name.trim().to_lowercase().replace(' ', "_"), weight))
        .collect();
    cfg.weights.bins = std::mem::take(&mut cfg.weights.bins)
        .into_iter()
        .map(|(name, width)| (name.trim().to_lowercase().replace(' ', "_"), width))
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [retrieval]
            parallelism = 2
            primary_scope = "must_have_and_filters"

            [diversity]
            lambda = 0.5

            [weights.attributes]
            "Body Style" = 2.5

            [normalization.aliases]
            Maker = "make"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.retrieval.parallelism, 2);
        assert_eq!(cfg.retrieval.row_ceiling, 1000);
        assert_eq!(cfg.retrieval.primary_scope, PrimaryScope::MustHaveAndFilters);
        assert_eq!(cfg.diversity.lambda, 0.5);
        assert_eq!(cfg.diversity.cluster_size, 4);
        assert_eq!(cfg.weights.attributes.get("body_style"), Some(&2.5));
        assert_eq!(cfg.normalization.aliases.get("maker").map(String::as_str), Some("make"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval]\nparallelism = 0").unwrap();
        assert!(matches!(load(file.path()), Err(ConfigError::Validation { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[diversity]\nlambda = 1.5").unwrap();
        assert!(matches!(load(file.path()), Err(ConfigError::Validation { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weights]\ndefault_weight = -1.0").unwrap();
        assert!(matches!(load(file.path()), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_load_reports_path() {
        let missing = Path::new("/no/such/engine.toml");
        assert!(matches!(load(missing), Err(ConfigError::ReadConfig { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval\nbroken").unwrap();
        assert!(matches!(load(file.path()), Err(ConfigError::ParseConfig { .. })));
    }
}
