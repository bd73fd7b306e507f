//! Serializable views of a ranked result
//!
//! Flattens a [`RankedResult`] into ids, scores, signals and clusters so that
//! callers can inspect why each entry holds its rank.

use ahash::AHashSet;
use serde::Serialize;
use uuid::Uuid;

use shortlist_core::{Diagnostics, RankSignal, RankedEntry, RankedResult};

/// One ranked entry with the scores that placed it
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub rank: usize,
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
    pub signal: RankSignal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub has_media: bool,
}

impl EntryView {
    pub fn from_entry(entry: &RankedEntry) -> Self {
        let item = &entry.candidate.item;
        Self {
            rank: entry.rank,
            id: item.id.to_string(),
            title: item.title.clone(),
            similarity: entry.candidate.similarity,
            keyword_score: entry.keyword_score,
            signal: entry.signal,
            cluster: entry.candidate.cluster,
            price: item.price(),
            has_media: item.has_media(),
        }
    }
}

/// Summary statistics for a ranked result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultStats {
    pub results_count: usize,
    pub avg_similarity: f32,
    pub best_similarity: f32,
    /// Distinct clusters among the returned entries
    pub clusters_represented: usize,
}

impl ResultStats {
    pub fn compute(entries: &[RankedEntry]) -> Self {
        if entries.is_empty() {
            return Self {
                results_count: 0,
                avg_similarity: 0.0,
                best_similarity: 0.0,
                clusters_represented: 0,
            };
        }

        let similarities: Vec<f32> = entries.iter().map(|e| e.candidate.similarity).collect();
        let avg_similarity = similarities.iter().sum::<f32>() / similarities.len() as f32;
        // re-ranking may move the best match off the top
        let best_similarity = similarities.iter().copied().fold(f32::MIN, f32::max);
        let clusters: AHashSet<usize> = entries.iter().filter_map(|e| e.candidate.cluster).collect();

        Self {
            results_count: entries.len(),
            avg_similarity,
            best_similarity,
            clusters_represented: clusters.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub request_id: Uuid,
    pub entries: Vec<EntryView>,
    pub stats: ResultStats,
    pub diagnostics: Diagnostics,
}

impl ResultView {
    pub fn from_result(result: &RankedResult) -> Self {
        Self {
            request_id: result.diagnostics.request_id,
            entries: result.entries.iter().map(EntryView::from_entry).collect(),
            stats: ResultStats::compute(&result.entries),
            diagnostics: result.diagnostics.clone(),
        }
    }
}
