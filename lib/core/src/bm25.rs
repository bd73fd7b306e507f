// BM25 keyword scoring over item text
use ahash::AHashMap;

#[derive(Debug, Clone)]
pub struct BM25Index {
    // term -> (doc_id -> term_frequency)
    inverted_index: AHashMap<String, AHashMap<String, u32>>,
    // doc_id -> document length
    doc_lengths: AHashMap<String, u32>,
    total_docs: u64,
    k1: f32, // term frequency saturation parameter
    b: f32,  // length normalization parameter
}

impl BM25Index {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(1.2, 0.75)
    }

    #[inline]
    #[must_use]
    pub fn with_params(k1: f32, b: f32) -> Self {
        Self {
            inverted_index: AHashMap::new(),
            doc_lengths: AHashMap::new(),
            total_docs: 0,
            k1,
            b,
        }
    }

    /// Tokenize text for BM25 indexing
    /// Uses lowercase normalization and removes punctuation
    #[inline]
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != '-'))
            .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|s| !s.is_empty() && s.chars().count() > 1)
            .collect()
    }

    pub fn insert_doc(&mut self, doc_id: &str, text: &str) {
        self.delete_doc(doc_id);

        let tokens = Self::tokenize(text);
        let doc_len = tokens.len() as u32;

        let mut term_freqs: AHashMap<String, u32> = AHashMap::new();
        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
        }

        for (term, tf) in term_freqs {
            self.inverted_index
                .entry(term)
                .or_default()
                .insert(doc_id.to_string(), tf);
        }

        self.doc_lengths.insert(doc_id.to_string(), doc_len);
        self.total_docs += 1;
    }

    pub fn delete_doc(&mut self, doc_id: &str) {
        if self.doc_lengths.remove(doc_id).is_some() {
            self.inverted_index.retain(|_, docs| {
                docs.remove(doc_id);
                !docs.is_empty()
            });
            self.total_docs = self.total_docs.saturating_sub(1);
        }
    }

    /// Score every document containing at least one query term
    pub fn scores(&self, query: &str) -> AHashMap<String, f32> {
        let mut doc_scores: AHashMap<String, f32> = AHashMap::new();
        if self.total_docs == 0 {
            return doc_scores;
        }

        let mut query_terms = Self::tokenize(query);
        query_terms.sort();
        query_terms.dedup();

        let avgdl = self.doc_lengths.values().sum::<u32>() as f32 / self.total_docs as f32;

        for term in &query_terms {
            if let Some(docs) = self.inverted_index.get(term) {
                let df = docs.len() as f32;
                // Lucene-style idf keeps terms present in most documents positive
                let idf = (1.0 + (self.total_docs as f32 - df + 0.5) / (df + 0.5)).ln();

                for (doc_id, &tf) in docs {
                    if let Some(&doc_len) = self.doc_lengths.get(doc_id) {
                        let score = self.calculate_bm25_score(tf, doc_len, avgdl, idf);
                        *doc_scores.entry(doc_id.clone()).or_insert(0.0) += score;
                    }
                }
            }
        }

        doc_scores
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f32)> {
        let mut results: Vec<(String, f32)> = self.scores(query).into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(limit);
        results
    }

    fn calculate_bm25_score(&self, tf: u32, doc_len: u32, avgdl: f32, idf: f32) -> f32 {
        let tf_f32 = tf as f32;
        let doc_len_f32 = doc_len as f32;
        let avgdl = if avgdl > 0.0 { avgdl } else { 1.0 };

        // BM25 formula: idf * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * (doc_len / avgdl)))
        let numerator = tf_f32 * (self.k1 + 1.0);
        let denominator = tf_f32 + self.k1 * (1.0 - self.b + self.b * (doc_len_f32 / avgdl));

        idf * (numerator / denominator)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }
}

impl Default for BM25Index {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            BM25Index::tokenize("Toyota RAV4, AWD! (low-miles) a"),
            vec!["toyota", "rav4", "awd", "low-miles"]
        );
    }

    #[test]
    fn test_search_ranks_matching_docs() {
        let mut index = BM25Index::new();
        index.insert_doc("1", "red honda civic sedan");
        index.insert_doc("2", "blue mazda cx-5 suv with third row");
        index.insert_doc("3", "red mazda miata convertible");

        let results = index.search("red mazda", 10);
        assert_eq!(results[0].0, "3");
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, s)| *s > 0.0));
    }

    #[test]
    fn test_reinsert_replaces_document() {
        let mut index = BM25Index::new();
        index.insert_doc("1", "honda");
        index.insert_doc("1", "mazda");
        assert_eq!(index.len(), 1);
        assert!(index.search("honda", 5).is_empty());
        assert_eq!(index.search("mazda", 5).len(), 1);
    }

    #[test]
    fn test_empty_index_and_query() {
        let index = BM25Index::new();
        assert!(index.search("anything", 5).is_empty());

        let mut index = BM25Index::new();
        index.insert_doc("1", "honda");
        assert!(index.scores("?").is_empty());
    }
}
