//! Keyword re-ranker
//!
//! Final pass over the diversified top-K: BM25 of the raw utterance against
//! each item's text, re-sorted descending and stable over the incoming order.
//! Any failure keeps the incoming order.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shortlist_core::{BM25Index, RankSignal, RerankOutcome, ScoredCandidate};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RerankError {
    #[error("Utterance has no query terms")]
    EmptyQuery,

    #[error("No item text to index")]
    EmptyIndex,

    #[error("Non-finite keyword score for item '{0}'")]
    NonFiniteScore(String),
}

/// Entry after re-ranking
#[derive(Debug, Clone)]
pub struct Reranked {
    pub candidate: ScoredCandidate,
    pub signal: RankSignal,
    pub keyword_score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeywordReranker {
    pub k1: f32,
    pub b: f32,
}

impl Default for KeywordReranker {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl KeywordReranker {
    pub fn new(k1: f32, b: f32) -> Self {
        Self { k1, b }
    }

    /// BM25 score of `utterance` against each candidate, in input order
    pub fn scores(&self, candidates: &[ScoredCandidate], utterance: &str) -> Result<Vec<f32>, RerankError> {
        if BM25Index::tokenize(utterance).is_empty() {
            return Err(RerankError::EmptyQuery);
        }

        let mut index = BM25Index::with_params(self.k1, self.b);
        let mut indexed_terms = 0;
        for candidate in candidates {
            let text = candidate.item.searchable_text();
            indexed_terms += BM25Index::tokenize(&text).len();
            index.insert_doc(candidate.id().as_str(), &text);
        }
        if index.is_empty() || indexed_terms == 0 {
            return Err(RerankError::EmptyIndex);
        }

        let by_id = index.scores(utterance);
        candidates
            .iter()
            .map(|c| {
                let score = by_id.get(c.id().as_str()).copied().unwrap_or(0.0);
                if score.is_finite() {
                    Ok(score)
                } else {
                    Err(RerankError::NonFiniteScore(c.id().to_string()))
                }
            })
            .collect()
    }

    /// Re-sort `picks` by keyword relevance, keeping the prior order on failure
    pub fn rerank(&self, picks: Vec<(ScoredCandidate, RankSignal)>, utterance: &str) -> (Vec<Reranked>, RerankOutcome) {
        if picks.is_empty() {
            return (Vec::new(), RerankOutcome::Skipped);
        }

        let candidates: Vec<ScoredCandidate> = picks.iter().map(|(c, _)| c.clone()).collect();
        let scores = match self.scores(&candidates, utterance) {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "keyword re-ranking failed, keeping diversified order");
                let kept = picks
                    .into_iter()
                    .map(|(candidate, signal)| Reranked { candidate, signal, keyword_score: None })
                    .collect();
                return (kept, RerankOutcome::Failed);
            }
        };

        let mut entries: Vec<(usize, Reranked)> = picks
            .into_iter()
            .zip(scores)
            .enumerate()
            .map(|(pos, ((candidate, signal), score))| {
                (pos, Reranked { candidate, signal, keyword_score: Some(score) })
            })
            .collect();

        if entries.iter().all(|(_, e)| e.keyword_score == Some(0.0)) {
            debug!("no keyword overlap, keeping diversified order");
            return (entries.into_iter().map(|(_, e)| e).collect(), RerankOutcome::Skipped);
        }

        // sort_by is stable, equal scores keep their diversified order
        entries.sort_by(|(_, a), (_, b)| {
            b.keyword_score
                .partial_cmp(&a.keyword_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let reranked = entries
            .into_iter()
            .enumerate()
            .map(|(new_pos, (old_pos, mut entry))| {
                if new_pos != old_pos {
                    entry.signal = RankSignal::KeywordRelevance;
                }
                entry
            })
            .collect();

        (reranked, RerankOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortlist_core::{CatalogItem, TokenVector};
    use std::sync::Arc;

    fn pick(id: &str, title: &str) -> (ScoredCandidate, RankSignal) {
        let item = CatalogItem::new(id).with_title(title);
        (
            ScoredCandidate::new(Arc::new(item), Arc::new(TokenVector::new()), 0.5),
            RankSignal::Similarity,
        )
    }

    fn order(entries: &[Reranked]) -> Vec<&str> {
        entries.iter().map(|e| e.candidate.id().as_str()).collect()
    }

    #[test]
    fn test_rerank_moves_keyword_match_up() {
        let picks = vec![pick("a", "compact sedan"), pick("b", "suv with third row"), pick("c", "hatchback")];
        let (entries, outcome) = KeywordReranker::default().rerank(picks, "need a third row");

        assert_eq!(outcome, RerankOutcome::Applied);
        assert_eq!(order(&entries), vec!["b", "a", "c"]);
        assert_eq!(entries[0].signal, RankSignal::KeywordRelevance);
        assert_eq!(entries[2].signal, RankSignal::Similarity);
        assert!(entries[0].keyword_score.unwrap() > 0.0);
    }

    #[test]
    fn test_empty_utterance_keeps_order() {
        let picks = vec![pick("a", "sedan"), pick("b", "suv")];
        let (entries, outcome) = KeywordReranker::default().rerank(picks, "  ?! ");
        assert_eq!(outcome, RerankOutcome::Failed);
        assert_eq!(order(&entries), vec!["a", "b"]);
        assert!(entries.iter().all(|e| e.keyword_score.is_none()));
    }

    #[test]
    fn test_textless_items_fail_gracefully() {
        let picks = vec![pick("a", ""), pick("b", "")];
        let (entries, outcome) = KeywordReranker::default().rerank(picks, "suv");
        assert_eq!(outcome, RerankOutcome::Failed);
        assert_eq!(order(&entries), vec!["a", "b"]);
    }

    #[test]
    fn test_no_overlap_is_skipped() {
        let picks = vec![pick("a", "sedan"), pick("b", "coupe")];
        let (entries, outcome) = KeywordReranker::default().rerank(picks, "pickup truck");
        assert_eq!(outcome, RerankOutcome::Skipped);
        assert_eq!(order(&entries), vec!["a", "b"]);
    }

    #[test]
    fn test_ties_are_stable() {
        let picks = vec![pick("a", "red suv"), pick("b", "blue suv"), pick("c", "green suv")];
        let (entries, outcome) = KeywordReranker::default().rerank(picks, "suv");
        assert_eq!(outcome, RerankOutcome::Applied);
        assert_eq!(order(&entries), vec!["a", "b", "c"]);
    }
}
