//! Text feature engineering
//!
//! - Tokenization and count / TF-IDF vectorization
//! - VADER sentiment
//! - The composed [`TextFeatureExtractor`]

pub mod extractor;
pub mod sentiment;
pub mod text_features;

pub use extractor::{is_missing_text, text_stats, TextConfig, TextFeatureExtractor};
pub use sentiment::SentimentAnalyzer;
pub use text_features::{
    CountVectorizer, TextTokenizer, TextVectorizer, TfidfVectorizer, VectorizerKind,
    VectorizerParams,
};
