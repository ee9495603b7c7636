//! Text vectorization: tokenizer, count and TF-IDF vectorizers

use crate::error::{ResaleError, Result};
use crate::listing::is_stop_word;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Simple text tokenizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTokenizer {
    lowercase: bool,
    min_token_length: usize,
    stop_words: bool,
}

impl TextTokenizer {
    pub fn new() -> Self {
        Self {
            lowercase: true,
            min_token_length: 2,
            stop_words: false,
        }
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    pub fn with_english_stop_words(mut self, enabled: bool) -> Self {
        self.stop_words = enabled;
        self
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let processed = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        processed
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() >= self.min_token_length.max(1))
            .filter(|s| !self.stop_words || !is_stop_word(&s.to_lowercase()))
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Vectorizer choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VectorizerKind {
    #[default]
    Count,
    Tfidf,
}

impl VectorizerKind {
    pub const ALL: [VectorizerKind; 2] = [VectorizerKind::Count, VectorizerKind::Tfidf];

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorizerKind::Count => "count",
            VectorizerKind::Tfidf => "tfidf",
        }
    }
}

impl fmt::Display for VectorizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for VectorizerKind {
    type Error = ResaleError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<VectorizerKind> for String {
    fn from(kind: VectorizerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for VectorizerKind {
    type Err = ResaleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or_else(|| {
            ResaleError::ConfigError(format!(
                "unsupported vectorizer '{}'; supported: [count, tfidf]",
                s
            ))
        })
    }
}

/// Vectorizer parameters. The TF-IDF keys are ignored by the count vectorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerParams {
    pub ngram_range: (usize, usize),
    pub max_features: Option<usize>,
    /// Minimum document count
    pub min_df: usize,
    /// Maximum document fraction
    pub max_df: f64,
    pub binary: bool,
    pub lowercase: bool,
    pub stop_words: bool,
    pub sublinear_tf: bool,
    pub smooth_idf: bool,
    pub normalize: bool,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            ngram_range: (1, 2),
            max_features: Some(5000),
            min_df: 1,
            max_df: 1.0,
            binary: false,
            lowercase: true,
            stop_words: false,
            sublinear_tf: false,
            smooth_idf: true,
            normalize: true,
        }
    }
}

/// Count-based text vectorizer.
///
/// Vocabulary selection ranks terms by document frequency (ties by term),
/// keeps the top `max_features`, then indexes the kept terms alphabetically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountVectorizer {
    tokenizer: TextTokenizer,
    vocabulary: BTreeMap<String, usize>,
    max_features: Option<usize>,
    min_df: usize,
    max_df: f64,
    ngram_range: (usize, usize),
    binary: bool,
    is_fitted: bool,
}

impl CountVectorizer {
    pub fn new() -> Self {
        Self {
            tokenizer: TextTokenizer::new(),
            vocabulary: BTreeMap::new(),
            max_features: None,
            min_df: 1,
            max_df: 1.0,
            ngram_range: (1, 1),
            binary: false,
            is_fitted: false,
        }
    }

    pub fn from_params(params: &VectorizerParams) -> Self {
        let mut vectorizer = Self::new()
            .with_ngram_range(params.ngram_range.0, params.ngram_range.1)
            .with_binary(params.binary)
            .with_df_bounds(params.min_df, params.max_df);
        vectorizer.max_features = params.max_features;
        vectorizer.tokenizer = TextTokenizer::new()
            .with_lowercase(params.lowercase)
            .with_english_stop_words(params.stop_words);
        vectorizer
    }

    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n);
        self
    }

    pub fn with_ngram_range(mut self, min: usize, max: usize) -> Self {
        self.ngram_range = (min.max(1), max.max(min.max(1)));
        self
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_df_bounds(mut self, min_df: usize, max_df: f64) -> Self {
        self.min_df = min_df;
        self.max_df = max_df;
        self
    }

    fn generate_ngrams(&self, tokens: &[String]) -> Vec<String> {
        let mut ngrams = Vec::new();
        for n in self.ngram_range.0..=self.ngram_range.1 {
            if tokens.len() >= n {
                for i in 0..=(tokens.len() - n) {
                    ngrams.push(tokens[i..i + n].join(" "));
                }
            }
        }
        ngrams
    }

    fn analyze(&self, doc: &str) -> Vec<String> {
        self.generate_ngrams(&self.tokenizer.tokenize(doc))
    }

    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        let n_docs = documents.len() as f64;
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let unique: HashSet<String> = self.analyze(doc).into_iter().collect();
            for ngram in unique {
                *doc_freq.entry(ngram).or_insert(0) += 1;
            }
        }

        let mut filtered: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, count)| *count >= self.min_df && *count as f64 <= self.max_df * n_docs)
            .collect();
        filtered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(max_n) = self.max_features {
            filtered.truncate(max_n);
        }

        if filtered.is_empty() {
            return Err(ResaleError::InvalidInput(
                "empty vocabulary; documents contain no usable terms".to_string(),
            ));
        }

        let mut terms: Vec<String> = filtered.into_iter().map(|(term, _)| term).collect();
        terms.sort();
        self.vocabulary = terms.into_iter().enumerate().map(|(idx, t)| (t, idx)).collect();
        self.is_fitted = true;
        Ok(())
    }

    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }

        let mut result = Array2::zeros((documents.len(), self.vocabulary.len()));
        for (doc_idx, doc) in documents.iter().enumerate() {
            for ngram in self.analyze(doc) {
                if let Some(&idx) = self.vocabulary.get(&ngram) {
                    if self.binary {
                        result[[doc_idx, idx]] = 1.0;
                    } else {
                        result[[doc_idx, idx]] += 1.0;
                    }
                }
            }
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    pub fn get_feature_names(&self) -> Vec<String> {
        self.vocabulary.keys().cloned().collect()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}

impl Default for CountVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// TF-IDF vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    count_vectorizer: CountVectorizer,
    idf: Option<Array1<f64>>,
    normalize: bool,
    smooth_idf: bool,
    sublinear_tf: bool,
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self {
            count_vectorizer: CountVectorizer::new(),
            idf: None,
            normalize: true,
            smooth_idf: true,
            sublinear_tf: false,
        }
    }

    pub fn from_params(params: &VectorizerParams) -> Self {
        Self {
            count_vectorizer: CountVectorizer::from_params(params),
            idf: None,
            normalize: params.normalize,
            smooth_idf: params.smooth_idf,
            sublinear_tf: params.sublinear_tf,
        }
    }

    pub fn with_max_features(mut self, n: usize) -> Self {
        self.count_vectorizer = self.count_vectorizer.with_max_features(n);
        self
    }

    pub fn with_ngram_range(mut self, min: usize, max: usize) -> Self {
        self.count_vectorizer = self.count_vectorizer.with_ngram_range(min, max);
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        let counts = self.count_vectorizer.fit_transform(documents)?;
        let n_docs = documents.len() as f64;

        let idf = counts
            .columns()
            .into_iter()
            .map(|col| {
                let df = col.iter().filter(|&&v| v > 0.0).count() as f64;
                if self.smooth_idf {
                    ((n_docs + 1.0) / (df + 1.0)).ln() + 1.0
                } else {
                    (n_docs / df.max(1.0)).ln() + 1.0
                }
            })
            .collect::<Array1<f64>>();

        self.idf = Some(idf);
        Ok(())
    }

    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        let idf = self.idf.as_ref().ok_or(ResaleError::ModelNotFitted)?;
        let mut tf = self.count_vectorizer.transform(documents)?;

        if self.sublinear_tf {
            tf.mapv_inplace(|v| if v > 0.0 { 1.0 + v.ln() } else { 0.0 });
        }
        for mut row in tf.rows_mut() {
            row *= idf;
            if self.normalize {
                let norm = row.dot(&row).sqrt();
                if norm > 0.0 {
                    row /= norm;
                }
            }
        }
        Ok(tf)
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    pub fn get_feature_names(&self) -> Vec<String> {
        self.count_vectorizer.get_feature_names()
    }
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fitted vectorizer of either kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TextVectorizer {
    Count(CountVectorizer),
    Tfidf(TfidfVectorizer),
}

impl TextVectorizer {
    pub fn new(kind: VectorizerKind, params: &VectorizerParams) -> Self {
        match kind {
            VectorizerKind::Count => TextVectorizer::Count(CountVectorizer::from_params(params)),
            VectorizerKind::Tfidf => TextVectorizer::Tfidf(TfidfVectorizer::from_params(params)),
        }
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        match self {
            TextVectorizer::Count(v) => v.fit_transform(documents),
            TextVectorizer::Tfidf(v) => v.fit_transform(documents),
        }
    }

    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        match self {
            TextVectorizer::Count(v) => v.transform(documents),
            TextVectorizer::Tfidf(v) => v.transform(documents),
        }
    }

    pub fn get_feature_names(&self) -> Vec<String> {
        match self {
            TextVectorizer::Count(v) => v.get_feature_names(),
            TextVectorizer::Tfidf(v) => v.get_feature_names(),
        }
    }
}
