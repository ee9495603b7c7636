//! Description sentiment
//!
//! Compound polarity from the VADER lexicon and rules (negation, boosters,
//! capitalisation, punctuation emphasis, contrastive "but"), normalised into
//! [-1, 1].

use crate::listing::MISSING;
use serde::{Deserialize, Serialize};
use vader_sentiment::SentimentIntensityAnalyzer;

/// VADER compound scorer. Stateless; the lexicon ships with the crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Compound polarity in [-1, 1]; 0.0 for absent text or the placeholder
    pub fn polarity(&self, text: Option<&str>) -> f64 {
        let text = match text {
            Some(t) if !t.trim().is_empty() && t != MISSING => t,
            _ => return 0.0,
        };
        let analyzer = SentimentIntensityAnalyzer::new();
        analyzer
            .polarity_scores(text)
            .get("compound")
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_is_neutral() {
        let analyzer = SentimentAnalyzer::new();
        assert_eq!(analyzer.polarity(None), 0.0);
        assert_eq!(analyzer.polarity(Some("missing")), 0.0);
        assert_eq!(analyzer.polarity(Some("   ")), 0.0);
    }

    #[test]
    fn test_common_listing_words() {
        let analyzer = SentimentAnalyzer::new();
        let good = analyzer.polarity(Some("good"));
        assert!(analyzer.polarity(Some("good condition")) > 0.0);
        assert!(analyzer.polarity(Some("very good")) > good);
        assert!(analyzer.polarity(Some("nice jacket")) > 0.0);
        assert!(analyzer.polarity(Some("love it")) > 0.0);
    }

    #[test]
    fn test_polarity_sign() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.polarity(Some("Beautiful coat in perfect condition")) > 0.5);
        assert!(analyzer.polarity(Some("terrible and ugly")) < -0.3);
        assert_eq!(analyzer.polarity(Some("trousers size 32")), 0.0);
    }

    #[test]
    fn test_negation_flips() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.polarity(Some("great")) > 0.0);
        assert!(analyzer.polarity(Some("not great")) < 0.0);
    }

    #[test]
    fn test_emphasis_increases_magnitude() {
        let analyzer = SentimentAnalyzer::new();
        let plain = analyzer.polarity(Some("great jacket"));
        assert!(analyzer.polarity(Some("very great jacket")) > plain);
        assert!(analyzer.polarity(Some("great jacket!!!")) > plain);
        assert!(analyzer.polarity(Some("GREAT jacket")) > plain);
    }

    #[test]
    fn test_but_shifts_weight() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.polarity(Some("great colour but ugly")) < 0.0);
    }

    #[test]
    fn test_bounded() {
        let analyzer = SentimentAnalyzer::new();
        let score = analyzer.polarity(Some("AMAZING PERFECT BEST love gorgeous stunning!!!!!!"));
        assert!(score <= 1.0 && score > 0.9);
    }
}
