//! Text feature extraction
//!
//! Per text column: an embedding block (vectorize, then reduce), descriptive
//! statistics, plus a sentiment score for the description and a missing
//! indicator for hashtags. Output blocks are laid out as embeddings, stats,
//! sentiment, indicator, each in configured column order.

use super::sentiment::SentimentAnalyzer;
use super::text_features::{TextVectorizer, VectorizerKind, VectorizerParams};
use crate::decomposition::{Reducer, ReducerKind, ReducerParams};
use crate::error::{ResaleError, Result};
use crate::listing::MISSING;
use crate::preprocessing::pipeline::stack;
use crate::utils::data_loader::string_column;
use ndarray::Array2;
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Text feature configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub text_cols: Vec<String>,
    pub use_stats: bool,
    pub use_embeddings: bool,
    pub use_sentiment: bool,
    pub use_missing_hashtags: bool,
    pub vectorizer_class: VectorizerKind,
    pub vectorizer_params: VectorizerParams,
    pub reducer_class: ReducerKind,
    pub reducer_params: ReducerParams,
    /// Column scored for sentiment
    pub sentiment_col: String,
    /// Column checked for the missing placeholder
    pub hashtags_col: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            text_cols: vec![
                "item_name".to_string(),
                "description".to_string(),
                "hashtags".to_string(),
            ],
            use_stats: true,
            use_embeddings: true,
            use_sentiment: true,
            use_missing_hashtags: true,
            vectorizer_class: VectorizerKind::default(),
            vectorizer_params: VectorizerParams::default(),
            reducer_class: ReducerKind::default(),
            reducer_params: ReducerParams::default(),
            sentiment_col: "description".to_string(),
            hashtags_col: "hashtags".to_string(),
        }
    }
}

impl TextConfig {
    pub fn with_text_cols(mut self, cols: &[&str]) -> Self {
        self.text_cols = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_stats(mut self, enabled: bool) -> Self {
        self.use_stats = enabled;
        self
    }

    pub fn with_embeddings(mut self, enabled: bool) -> Self {
        self.use_embeddings = enabled;
        self
    }

    pub fn with_sentiment(mut self, enabled: bool) -> Self {
        self.use_sentiment = enabled;
        self
    }

    pub fn with_missing_hashtags(mut self, enabled: bool) -> Self {
        self.use_missing_hashtags = enabled;
        self
    }

    pub fn with_vectorizer(mut self, kind: VectorizerKind, params: VectorizerParams) -> Self {
        self.vectorizer_class = kind;
        self.vectorizer_params = params;
        self
    }

    /// Select the vectorizer by registry key
    pub fn with_vectorizer_name(mut self, name: &str) -> Result<Self> {
        self.vectorizer_class = name.parse()?;
        Ok(self)
    }

    pub fn with_reducer(mut self, kind: ReducerKind, params: ReducerParams) -> Self {
        self.reducer_class = kind;
        self.reducer_params = params;
        self
    }

    /// Select the reducer by registry key
    pub fn with_reducer_name(mut self, name: &str) -> Result<Self> {
        self.reducer_class = name.parse()?;
        Ok(self)
    }

    pub fn with_n_components(mut self, n: usize) -> Self {
        self.reducer_params.n_components = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.use_stats || self.use_embeddings || self.use_sentiment || self.use_missing_hashtags)
        {
            return Err(ResaleError::ConfigError(
                "text features enabled but every text feature family is disabled".to_string(),
            ));
        }
        if (self.use_stats || self.use_embeddings) && self.text_cols.is_empty() {
            return Err(ResaleError::ConfigError(
                "text_cols is empty but per-column text features are enabled".to_string(),
            ));
        }
        if self.use_embeddings && self.reducer_params.n_components == 0 {
            return Err(ResaleError::InvalidParameter {
                name: "reducer_params.n_components".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let (lo, hi) = self.vectorizer_params.ngram_range;
        if lo == 0 || lo > hi {
            return Err(ResaleError::InvalidParameter {
                name: "vectorizer_params.ngram_range".to_string(),
                value: format!("({}, {})", lo, hi),
                reason: "expected 1 <= min <= max".to_string(),
            });
        }
        Ok(())
    }

    /// Output width implied by the configuration
    pub fn n_features_out(&self) -> usize {
        let per_column = if self.use_embeddings { self.reducer_params.n_components } else { 0 }
            + if self.use_stats { 3 } else { 0 };
        self.text_cols.len() * per_column
            + usize::from(self.use_sentiment)
            + usize::from(self.use_missing_hashtags)
    }
}

/// Length, word count and average word length of one value
pub fn text_stats(text: Option<&str>) -> [f64; 3] {
    let text = match text {
        Some(t) if t != MISSING => t,
        _ => return [0.0; 3],
    };
    let num_words = text.split_whitespace().count();
    if num_words == 0 {
        return [0.0; 3];
    }
    let length = text.chars().count() as f64;
    [length, num_words as f64, length / num_words as f64]
}

/// True when the value is absent or exactly the placeholder
pub fn is_missing_text(text: Option<&str>) -> bool {
    matches!(text, None | Some(MISSING))
}

/// Vectorizer and reducer fitted on one column's corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnEmbedding {
    column: String,
    vectorizer: TextVectorizer,
    reducer: Reducer,
}

impl ColumnEmbedding {
    fn fit_transform(config: &TextConfig, column: &str, documents: &[String]) -> Result<(Self, Array2<f64>)> {
        let mut vectorizer = TextVectorizer::new(config.vectorizer_class, &config.vectorizer_params);
        let mut reducer = Reducer::new(config.reducer_class, &config.reducer_params);

        let counts = vectorizer.fit_transform(documents)?;
        let reduced = reducer.fit_transform(&counts)?;
        debug!(
            column,
            vocabulary = counts.ncols(),
            components = reduced.ncols(),
            "Fitted text embedding"
        );

        let embedding = Self {
            column: column.to_string(),
            vectorizer,
            reducer,
        };
        Ok((embedding, reduced))
    }

    fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        self.reducer.transform(&self.vectorizer.transform(documents)?)
    }
}

/// Text feature extractor over a listing frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFeatureExtractor {
    config: TextConfig,
    sentiment: SentimentAnalyzer,
    embeddings: Vec<ColumnEmbedding>,
    is_fitted: bool,
    fit_time: Option<f64>,
}

impl TextFeatureExtractor {
    pub fn new(config: TextConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sentiment: SentimentAnalyzer::default(),
            embeddings: Vec::new(),
            is_fitted: false,
            fit_time: None,
        })
    }

    pub fn config(&self) -> &TextConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }

    /// Column values with nulls replaced by the placeholder
    fn documents(df: &DataFrame, column: &str) -> Result<Vec<String>> {
        Ok(string_column(df, column)?
            .into_iter()
            .map(|v| v.unwrap_or_else(|| MISSING.to_string()))
            .collect())
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.fit_transform(df)?;
        Ok(self)
    }

    /// Fit every enabled block and return the training matrix
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        let start = Instant::now();
        self.is_fitted = false;
        self.embeddings.clear();

        let mut blocks = Vec::new();
        if self.config.use_embeddings {
            let corpora = self
                .config
                .text_cols
                .iter()
                .map(|col| Ok((col.as_str(), Self::documents(df, col)?)))
                .collect::<Result<Vec<_>>>()?;

            let config = &self.config;
            let fitted = corpora
                .par_iter()
                .map(|(col, docs)| ColumnEmbedding::fit_transform(config, col, docs))
                .collect::<Result<Vec<_>>>()?;

            for (embedding, block) in fitted {
                self.embeddings.push(embedding);
                blocks.push(block);
            }
        }
        blocks.extend(self.dense_blocks(df)?);

        let matrix = stack(df.height(), &blocks)?;
        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());
        debug!(
            rows = df.height(),
            features = matrix.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted text features"
        );
        Ok(matrix)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let mut blocks = self
            .embeddings
            .iter()
            .map(|e| e.transform(&Self::documents(df, &e.column)?))
            .collect::<Result<Vec<_>>>()?;
        blocks.extend(self.dense_blocks(df)?);
        stack(df.height(), &blocks)
    }

    /// Stateless blocks: stats, sentiment, hashtags indicator
    fn dense_blocks(&self, df: &DataFrame) -> Result<Vec<Array2<f64>>> {
        let n = df.height();
        let mut blocks = Vec::new();

        if self.config.use_stats {
            let cols = &self.config.text_cols;
            let mut block = Array2::zeros((n, 3 * cols.len()));
            for (c, col) in cols.iter().enumerate() {
                for (i, value) in string_column(df, col)?.iter().enumerate() {
                    let stats = text_stats(value.as_deref());
                    for (k, s) in stats.iter().enumerate() {
                        block[[i, 3 * c + k]] = *s;
                    }
                }
            }
            blocks.push(block);
        }

        if self.config.use_sentiment {
            let values = string_column(df, &self.config.sentiment_col)?;
            let scores: Vec<f64> = values
                .par_iter()
                .map(|v| self.sentiment.polarity(v.as_deref()))
                .collect();
            blocks.push(Array2::from_shape_vec((n, 1), scores)?);
        }

        if self.config.use_missing_hashtags {
            let values = string_column(df, &self.config.hashtags_col)?;
            let flags: Vec<f64> = values
                .iter()
                .map(|v| if is_missing_text(v.as_deref()) { 1.0 } else { 0.0 })
                .collect();
            blocks.push(Array2::from_shape_vec((n, 1), flags)?);
        }

        Ok(blocks)
    }

    /// Output column names, in matrix order
    pub fn feature_names(&self) -> Vec<String> {
        let cfg = &self.config;
        let mut names = Vec::with_capacity(cfg.n_features_out());
        if cfg.use_embeddings {
            for col in &cfg.text_cols {
                names.extend(
                    (0..cfg.reducer_params.n_components).map(|i| format!("{}_{}{}", col, cfg.reducer_class, i)),
                );
            }
        }
        if cfg.use_stats {
            for col in &cfg.text_cols {
                for stat in ["length", "num_words", "avg_word_length"] {
                    names.push(format!("{}_{}", col, stat));
                }
            }
        }
        if cfg.use_sentiment {
            names.push(format!("{}_sentiment", cfg.sentiment_col));
        }
        if cfg.use_missing_hashtags {
            names.push(format!("{}_missing", cfg.hashtags_col));
        }
        names
    }

    pub fn n_features_out(&self) -> usize {
        self.config.n_features_out()
    }
}
