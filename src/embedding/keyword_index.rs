/// BM25 lexical index over the corpus
use crate::corpus::Corpus;
use ahash::{HashMap, HashMapExt};
use regex::Regex;
use std::cmp::Ordering;
use thiserror::Error;

/// Okapi BM25 term-frequency saturation
const BM25_K1: f32 = 1.5;
/// Okapi BM25 length normalization
const BM25_B: f32 = 0.75;
/// Floor for non-positive IDF, as a fraction of the mean IDF
const BM25_EPSILON: f32 = 0.25;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Tokenizer initialization failed: {0}")]
    TokenizerError(#[from] regex::Error),
}

/// Lowercasing word tokenizer (maximal runs of Unicode word characters)
#[derive(Debug, Clone)]
pub struct Tokenizer {
    word: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self, KeywordIndexError> {
        Ok(Self {
            word: Regex::new(r"\w+")?,
        })
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.word
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// One lexical match: corpus position and BM25 score
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub index: usize,
    pub score: f32,
}

/// BM25 index built once from a corpus snapshot
///
/// Scores every chunk for a query. Equal scores are ordered by corpus
/// position, so an empty query (all-zero scores) yields the corpus prefix.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    tokenizer: Tokenizer,
    /// Term counts per document
    doc_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<u32>,
    avg_doc_len: f32,
    idf: HashMap<String, f32>,
}

impl LexicalIndex {
    /// Build the index from a corpus
    pub fn build(corpus: &Corpus) -> Result<Self, KeywordIndexError> {
        let tokenizer = Tokenizer::new()?;

        let mut doc_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        // Number of documents containing each term
        let mut containing: HashMap<String, u32> = HashMap::new();

        for text in corpus.iter() {
            let tokens = tokenizer.tokenize(text);
            doc_lens.push(tokens.len() as u32);

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *containing.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let total_len: u64 = doc_lens.iter().map(|&l| l as u64).sum();
        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            total_len as f32 / doc_lens.len() as f32
        };

        let idf = compute_idf(&containing, corpus.len());

        tracing::debug!(
            "Built lexical index: {} documents, {} terms, avg length {:.2}",
            doc_lens.len(),
            idf.len(),
            avg_doc_len
        );

        Ok(Self {
            tokenizer,
            doc_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        })
    }

    /// BM25 score of every chunk for the query, in corpus order
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.doc_freqs.len()];
        if self.avg_doc_len == 0.0 {
            return scores;
        }

        for term in self.tokenizer.tokenize(query) {
            let Some(&idf) = self.idf.get(&term) else {
                continue;
            };

            for (doc, freqs) in self.doc_freqs.iter().enumerate() {
                let tf = freqs.get(&term).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    continue;
                }
                let norm = 1.0 - BM25_B + BM25_B * self.doc_lens[doc] as f32 / self.avg_doc_len;
                scores[doc] += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm);
            }
        }

        scores
    }

    /// Top-k chunks by score descending, ties by ascending corpus position
    pub fn search(&self, query: &str, k: usize) -> Vec<LexicalHit> {
        let scores = self.scores(query);

        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        ranked.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });

        ranked
            .into_iter()
            .take(k)
            .map(|index| LexicalHit {
                index,
                score: scores[index],
            })
            .collect()
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.doc_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_freqs.is_empty()
    }
}

/// Okapi IDF with negative values floored to a fraction of the mean
///
/// Terms are visited in sorted order and summed in f64 so the floor does
/// not depend on hash map iteration order.
fn compute_idf(containing: &HashMap<String, u32>, doc_count: usize) -> HashMap<String, f32> {
    let n = doc_count as f64;
    let mut terms: Vec<(&String, &u32)> = containing.iter().collect();
    terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut idf = HashMap::with_capacity(terms.len());
    let mut idf_sum = 0.0f64;
    let mut negative = Vec::new();

    for (term, &freq) in terms {
        let freq = freq as f64;
        let value = ((n - freq + 0.5) / (freq + 0.5)).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.clone());
        }
        idf.insert(term.clone(), value as f32);
    }

    if !idf.is_empty() {
        let floor = (BM25_EPSILON as f64 * idf_sum / idf.len() as f64) as f32;
        for term in negative {
            idf.insert(term, floor);
        }
    }

    idf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> Corpus {
        Corpus::new(texts.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_idf_floor_independent_of_insertion_order() {
        let entries: Vec<(String, u32)> = (0..200)
            .map(|i| (format!("term{}", i), (i % 7) as u32 + 1))
            .collect();

        let mut forward: HashMap<String, u32> = HashMap::new();
        for (term, freq) in &entries {
            forward.insert(term.clone(), *freq);
        }
        let mut reverse: HashMap<String, u32> = HashMap::new();
        for (term, freq) in entries.iter().rev() {
            reverse.insert(term.clone(), *freq);
        }

        let a = compute_idf(&forward, 10);
        let b = compute_idf(&reverse, 10);

        assert_eq!(a.len(), b.len());
        for (term, value) in &a {
            assert_eq!(value.to_bits(), b[term].to_bits(), "idf differs for {}", term);
        }
        // freq 7 of 10 docs is negative and floored
        assert!(a["term6"] > 0.0);
        assert_eq!(a["term6"].to_bits(), a["term13"].to_bits());
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_punctuation() {
        let tokenizer = Tokenizer::new().unwrap();
        assert_eq!(
            tokenizer.tokenize("What ARE mammals? snake_case, 42!"),
            vec!["what", "are", "mammals", "snake_case", "42"]
        );
        assert!(tokenizer.tokenize("  ?!.  ").is_empty());
    }

    #[test]
    fn test_shared_terms_rank_first() {
        let index = LexicalIndex::build(&corpus(&[
            "Cats are mammals.",
            "Dogs are mammals.",
            "The sky is blue.",
        ]))
        .unwrap();

        let hits = index.search("What are mammals?", 2);
        let positions: Vec<usize> = hits.iter().map(|h| h.index).collect();

        assert_eq!(positions, vec![0, 1]);
        assert!(hits[0].score > 0.0);
        assert_eq!(index.scores("What are mammals?")[2], 0.0);
    }

    #[test]
    fn test_rare_term_outranks_common_term() {
        let index = LexicalIndex::build(&corpus(&[
            "policy covers property",
            "policy covers liability",
            "policy excludes flood damage",
            "general policy terms",
        ]))
        .unwrap();

        let hits = index.search("flood policy", 1);
        assert_eq!(hits[0].index, 2);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let index = LexicalIndex::build(&corpus(&[
            "alpha beta",
            "gamma delta",
            "alpha beta",
            "epsilon",
            "zeta",
        ]))
        .unwrap();

        let hits = index.search("alpha", 3);
        assert!(hits[0].score > 0.0);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 2);
        assert_eq!(hits[0].score, hits[1].score);
        assert_eq!(hits[2].index, 1);
    }

    #[test]
    fn test_empty_query_returns_corpus_prefix() {
        let index = LexicalIndex::build(&corpus(&["one", "two", "three"])).unwrap();

        assert!(index.scores("?!").iter().all(|&s| s == 0.0));
        let positions: Vec<usize> = index.search("", 2).iter().map(|h| h.index).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_k_larger_than_corpus() {
        let index = LexicalIndex::build(&corpus(&["one", "two"])).unwrap();
        assert_eq!(index.search("one", 10).len(), 2);
    }

    #[test]
    fn test_empty_corpus() {
        let index = LexicalIndex::build(&corpus(&[])).unwrap();
        assert!(index.is_empty());
        assert!(index.search("anything", 5).is_empty());
    }

    #[test]
    fn test_repeated_query_terms_accumulate() {
        let index =
            LexicalIndex::build(&corpus(&["red fish", "blue fish", "green tree"])).unwrap();

        let once = index.scores("red")[0];
        let twice = index.scores("red red")[0];
        assert!((twice - 2.0 * once).abs() < 1e-6);
    }
}
