//! Text cleaning and TF-IDF vectorizing

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Prefix of the vectorized text feature columns
pub const TFIDF_PREFIX: &str = "tfidf_";

/// Suffix of the cleaned text column
pub const CLEAN_SUFFIX: &str = "_clean";

/// Lower-case, strip HTML tags, collapse anything non-alphanumeric to single spaces
pub fn clean_text(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => {
                in_tag = true;
                stripped.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => stripped.push(c),
        }
    }

    stripped
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace tokenizer over cleaned text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTokenizer {
    min_token_length: usize,
    stop_words: HashSet<String>,
}

impl TextTokenizer {
    pub fn new() -> Self {
        Self {
            min_token_length: 2,
            stop_words: HashSet::new(),
        }
    }

    pub fn with_english_stop_words(mut self) -> Self {
        self.stop_words = [
            "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for",
            "of", "with", "by", "is", "was", "are", "were", "be", "have", "has",
            "it", "this", "that", "i", "you", "he", "she", "we", "they", "br",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        self
    }

    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split_whitespace()
            .filter(|s| s.chars().count() >= self.min_token_length)
            .filter(|s| !self.stop_words.contains(*s))
            .collect()
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// TF-IDF vectorizer with a document-frequency ranked vocabulary
///
/// Terms are ranked by how many documents contain them (ties broken
/// alphabetically), the top `max_features` kept, and the output columns are
/// ordered alphabetically. Weights use raw term counts times the smoothed
/// idf `ln((1 + n) / (1 + df)) + 1`, and each row is L2-normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    tokenizer: TextTokenizer,
    max_features: usize,
    vocabulary: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            tokenizer: TextTokenizer::new().with_english_stop_words(),
            max_features,
            vocabulary: Vec::new(),
            idf: Vec::new(),
        }
    }

    /// Learn the vocabulary and idf weights from cleaned documents
    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        let n_docs = documents.len();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();

        for doc in documents {
            let unique: HashSet<&str> = self.tokenizer.tokenize(doc).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = doc_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let selected: BTreeMap<&str, usize> = ranked.into_iter().collect();
        if selected.is_empty() {
            return Err(PipelineError::Data(
                "TF-IDF vocabulary is empty after tokenizing".to_string(),
            ));
        }

        self.vocabulary = selected.keys().map(|t| t.to_string()).collect();
        self.idf = selected
            .values()
            .map(|&df| ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Ok(())
    }

    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        if self.vocabulary.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }

        let index: HashMap<&str, usize> = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let mut result: Array2<f64> = Array2::zeros((documents.len(), self.vocabulary.len()));
        for (row, doc) in documents.iter().enumerate() {
            for term in self.tokenizer.tokenize(doc) {
                if let Some(&col) = index.get(term) {
                    result[[row, col]] += 1.0;
                }
            }

            let mut weights = result.row_mut(row);
            for (w, idf) in weights.iter_mut().zip(&self.idf) {
                *w *= idf;
            }
            let norm = weights.dot(&weights).sqrt();
            if norm > 0.0 {
                weights.mapv_inplace(|w| w / norm);
            }
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    /// Output column names, `tfidf_<term>`
    pub fn feature_names(&self) -> Vec<String> {
        self.vocabulary
            .iter()
            .map(|t| format!("{}{}", TFIDF_PREFIX, t))
            .collect()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }
}
