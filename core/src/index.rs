use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type TermId = u32;

/// Vocabulary size kept by a fit unless configured otherwise.
pub const DEFAULT_MAX_FEATURES: usize = 100;

/// Vocabulary and smoothed IDF weights produced by one fit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermIndex {
    pub dictionary: HashMap<String, TermId>,
    pub idf: Vec<f32>, // indexed by term id
}

impl TermIndex {
    pub fn len(&self) -> usize { self.dictionary.len() }

    pub fn is_empty(&self) -> bool { self.dictionary.is_empty() }

    /// L2-normalized tf-idf vector over this vocabulary. Unknown terms are dropped.
    pub fn vectorize(&self, text: &str) -> DocumentVector {
        let mut tf_raw: HashMap<TermId, u32> = HashMap::new();
        for term in tokenize(text) {
            if let Some(&tid) = self.dictionary.get(&term) {
                *tf_raw.entry(tid).or_insert(0) += 1;
            }
        }
        let mut entries: Vec<(TermId, f32)> = tf_raw
            .into_iter()
            .map(|(tid, tf)| (tid, tf as f32 * self.idf[tid as usize]))
            .collect();
        entries.sort_by_key(|(tid, _)| *tid);

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in entries.iter_mut() { *w /= norm; }
        }
        DocumentVector { entries }
    }
}

/// Sparse unit-length vector; entries sorted by term id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentVector {
    pub entries: Vec<(TermId, f32)>,
}

impl DocumentVector {
    pub fn is_zero(&self) -> bool { self.entries.is_empty() }

    /// Cosine similarity. Both sides are already normalized, so this is the
    /// sparse dot product, clamped into [0, 1] to absorb rounding.
    pub fn cosine(&self, other: &DocumentVector) -> f32 {
        let (a, b) = (&self.entries, &other.entries);
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0f32;
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += a[i].1 * b[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot.clamp(0.0, 1.0)
    }
}

/// Term index plus one vector per fitted document, in corpus order.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    pub terms: TermIndex,
    pub vectors: Vec<DocumentVector>,
}

impl CatalogIndex {
    /// Fit vocabulary, IDF and document vectors over `docs` in one pass.
    ///
    /// The vocabulary keeps the `max_features` terms with the highest total
    /// corpus count (ties alphabetical); term ids are then assigned in
    /// alphabetical order. IDF is `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit<S: AsRef<str>>(docs: &[S], max_features: usize) -> Self {
        if docs.is_empty() {
            return Self::default();
        }
        let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut corpus_tf: HashMap<&str, u32> = HashMap::new();
        let mut df: HashMap<&str, u32> = HashMap::new();
        for tokens in &tokenized {
            let mut seen_in_doc: HashSet<&str> = HashSet::new();
            for t in tokens {
                *corpus_tf.entry(t.as_str()).or_insert(0) += 1;
                if seen_in_doc.insert(t.as_str()) {
                    *df.entry(t.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, u32)> = corpus_tf.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);
        let mut kept: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort_unstable();

        let n = docs.len() as f32;
        let mut dictionary = HashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (tid, term) in kept.iter().enumerate() {
            let df_t = df.get(term).copied().unwrap_or(0) as f32;
            idf.push(((1.0 + n) / (1.0 + df_t)).ln() + 1.0);
            dictionary.insert(term.to_string(), tid as TermId);
        }
        let terms = TermIndex { dictionary, idf };
        let vectors = docs.iter().map(|d| terms.vectorize(d.as_ref())).collect();
        Self { terms, vectors }
    }

    pub fn num_docs(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    /// Cosine similarity of `query` against every document, in corpus order.
    /// An empty index yields an empty vector.
    pub fn score(&self, query: &str) -> Vec<f32> {
        if self.is_empty() {
            return Vec::new();
        }
        let q = self.terms.vectorize(query);
        self.vectors.iter().map(|v| q.cosine(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fit_scores_nothing() {
        let idx = CatalogIndex::fit::<&str>(&[], DEFAULT_MAX_FEATURES);
        assert!(idx.is_empty());
        assert!(idx.score("concrete").is_empty());
    }

    #[test]
    fn vocabulary_is_capped_by_corpus_frequency() {
        let docs = ["steel steel steel beam", "steel rebar", "timber"];
        let idx = CatalogIndex::fit(&docs, 2);
        assert_eq!(idx.terms.len(), 2);
        assert!(idx.terms.dictionary.contains_key("steel"));
        // beam, rebar and timber tie at one occurrence; alphabetical wins
        assert!(idx.terms.dictionary.contains_key("beam"));
        assert!(idx.vectors[2].is_zero());
    }

    #[test]
    fn smoothed_idf_matches_formula() {
        let docs = ["crane lift", "crane"];
        let idx = CatalogIndex::fit(&docs, 10);
        let crane = idx.terms.dictionary["crane"] as usize;
        let lift = idx.terms.dictionary["lift"] as usize;
        assert!((idx.terms.idf[crane] - 1.0).abs() < 1e-6);
        assert!((idx.terms.idf[lift] - ((3.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn vectors_are_unit_length() {
        let docs = ["mobile crane lifting heavy materials", "diesel generator power"];
        let idx = CatalogIndex::fit(&docs, 100);
        for v in &idx.vectors {
            let norm: f32 = v.entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert!((idx.vectors[0].cosine(&idx.vectors[0]) - 1.0).abs() < 1e-5);
        assert_eq!(idx.vectors[0].cosine(&idx.vectors[1]), 0.0);
    }

    #[test]
    fn document_frequency_counts_each_doc_once() {
        let docs = ["steel steel steel", "steel beam"];
        let idx = CatalogIndex::fit(&docs, 10);
        let steel = idx.terms.dictionary["steel"] as usize;
        // df = 2 for n = 2, so idf is exactly 1
        assert!((idx.terms.idf[steel] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_vocabulary_query_scores_zero() {
        let docs = ["concrete formwork panels", "steel scaffolding"];
        let idx = CatalogIndex::fit(&docs, 100);
        assert_eq!(idx.score("landscaping shrubs"), vec![0.0, 0.0]);
        let s = idx.score("concrete");
        assert!(s[0] > 0.0 && s[1] == 0.0);
    }
}
