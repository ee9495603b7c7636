//! Size normalisation
//!
//! Raw size tokens are resolved against per-garment size charts. Each chart is
//! an ordered list of canonical tokens; a token's position is its index spread
//! evenly over [0, 1]. Lookup is scoped by category: a category's own chart is
//! consulted first, then every chart in declaration order, so a token shared by
//! two charts always resolves to a documented winner.

use crate::error::{ResaleError, Result};
use crate::utils::data_loader::string_column;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical token for items without inherent sizing
pub const ONE_SIZE: &str = "ONE SIZE";

/// Ordered size tokens for one garment super-category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeChart {
    name: String,
    tokens: Vec<String>,
}

impl SizeChart {
    pub fn new(name: impl Into<String>, tokens: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tokens,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Evenly spaced position of `token` in [0, 1]
    pub fn position(&self, token: &str) -> Option<f64> {
        let idx = self.tokens.iter().position(|t| t == token)?;
        if self.tokens.len() < 2 {
            return Some(0.0);
        }
        Some(idx as f64 / (self.tokens.len() - 1) as f64)
    }

    /// Letter sizes, ending with `ONE SIZE`
    pub fn tops() -> Self {
        let tokens = ["XXS", "XS", "S", "M", "L", "XL", "XXL", "3XL", "4XL", ONE_SIZE];
        Self::new("tops", tokens.iter().map(|t| t.to_string()).collect())
    }

    /// Waist sizes 22 to 44
    pub fn bottoms() -> Self {
        Self::new("bottoms", (22..=44).map(|i| i.to_string()).collect())
    }

    /// Shoe sizes 4 to 15
    pub fn footwear() -> Self {
        Self::new("footwear", (4..=15).map(|i| i.to_string()).collect())
    }

    /// Chest sizes 34 to 54 in short, regular and long cuts
    pub fn tailoring() -> Self {
        let tokens = (34..=54)
            .step_by(2)
            .flat_map(|i| ["S", "R", "L"].into_iter().map(move |cut| format!("{}{}", i, cut)))
            .collect();
        Self::new("tailoring", tokens)
    }
}

/// Result of normalising one size value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SizeValue {
    Token(String),
    Position(f64),
    Missing,
}

impl SizeValue {
    /// Key handed to the categorical encoders; `None` for missing values
    pub fn category_key(&self) -> Option<String> {
        match self {
            SizeValue::Token(t) => Some(t.clone()),
            SizeValue::Position(p) => Some(format!("{:.6}", p)),
            SizeValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SizeValue::Missing)
    }
}

/// Maps (category, raw size) to a canonical token or chart position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeNormalizer {
    charts: Vec<SizeChart>,
    category_charts: BTreeMap<String, String>,
    one_size_categories: Vec<String>,
    normalize: bool,
}

impl Default for SizeNormalizer {
    fn default() -> Self {
        let category_charts = [
            ("tops", "tops"),
            ("outerwear", "tops"),
            ("bottoms", "bottoms"),
            ("footwear", "footwear"),
            ("tailoring", "tailoring"),
        ]
        .into_iter()
        .map(|(c, chart)| (c.to_string(), chart.to_string()))
        .collect();

        Self {
            charts: vec![
                SizeChart::tops(),
                SizeChart::bottoms(),
                SizeChart::footwear(),
                SizeChart::tailoring(),
            ],
            category_charts,
            one_size_categories: vec!["accessories".to_string()],
            normalize: false,
        }
    }
}

impl SizeNormalizer {
    pub fn new(normalize: bool) -> Self {
        Self {
            normalize,
            ..Default::default()
        }
    }

    /// Replace the charts, in lookup order
    pub fn with_charts(mut self, charts: Vec<SizeChart>) -> Self {
        self.charts = charts;
        self
    }

    /// Route a category to a named chart
    pub fn with_category_chart(mut self, category: impl Into<String>, chart: impl Into<String>) -> Self {
        self.category_charts.insert(category.into(), chart.into());
        self
    }

    pub fn with_one_size_categories(mut self, categories: Vec<String>) -> Self {
        self.one_size_categories = categories;
        self
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    pub fn charts(&self) -> &[SizeChart] {
        &self.charts
    }

    fn is_one_size(&self, category: Option<&str>) -> bool {
        category.is_some_and(|c| self.one_size_categories.iter().any(|o| o == c))
    }

    /// Chart that resolves `token` for `category`
    pub fn chart_for(&self, category: Option<&str>, token: &str) -> Option<&SizeChart> {
        let scoped = category
            .and_then(|c| self.category_charts.get(c))
            .and_then(|name| self.charts.iter().find(|chart| &chart.name == name))
            .filter(|chart| chart.contains(token));

        scoped.or_else(|| self.charts.iter().find(|chart| chart.contains(token)))
    }

    fn one_size_position(&self) -> f64 {
        self.charts
            .iter()
            .find_map(|chart| chart.position(ONE_SIZE))
            .unwrap_or(1.0)
    }

    /// Normalise one value
    pub fn transform(&self, category: Option<&str>, raw: Option<&str>) -> SizeValue {
        if self.is_one_size(category) {
            return if self.normalize {
                SizeValue::Position(self.one_size_position())
            } else {
                SizeValue::Token(ONE_SIZE.to_string())
            };
        }

        let raw = match raw {
            Some(r) => r,
            None => return SizeValue::Missing,
        };

        if !self.normalize {
            return SizeValue::Token(raw.to_string());
        }

        let token = raw.trim().to_uppercase();
        match self.chart_for(category, &token).and_then(|chart| chart.position(&token)) {
            Some(p) => SizeValue::Position(p),
            None => SizeValue::Missing,
        }
    }

    /// Normalise parallel category and size columns
    pub fn transform_values(
        &self,
        categories: &[Option<String>],
        sizes: &[Option<String>],
    ) -> Result<Vec<SizeValue>> {
        if categories.len() != sizes.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("{} sizes", categories.len()),
                actual: format!("{} sizes", sizes.len()),
            });
        }
        Ok(categories
            .iter()
            .zip(sizes.iter())
            .map(|(c, s)| self.transform(c.as_deref(), s.as_deref()))
            .collect())
    }

    /// Normalised `size` column for a frame with `size` and `category` columns.
    /// Positions come back as Float64, tokens as String; missing values are null.
    pub fn transform_frame(&self, df: &DataFrame) -> Result<Series> {
        let values = self.transform_values(&string_column(df, "category")?, &string_column(df, "size")?)?;

        let series = if self.normalize {
            let positions: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    SizeValue::Position(p) => Some(*p),
                    _ => None,
                })
                .collect();
            Series::new("size".into(), positions)
        } else {
            let tokens: Vec<Option<String>> = values.iter().map(SizeValue::category_key).collect();
            Series::new("size".into(), tokens)
        };
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chart_shapes() {
        assert_eq!(SizeChart::tops().tokens().len(), 10);
        assert_eq!(SizeChart::bottoms().tokens().len(), 23);
        assert_eq!(SizeChart::footwear().tokens().len(), 12);
        let tailoring = SizeChart::tailoring();
        assert_eq!(tailoring.tokens().len(), 33);
        assert_eq!(&tailoring.tokens()[..3], &["34S", "34R", "34L"]);
    }

    #[test]
    fn test_positions_are_evenly_spaced() {
        let tops = SizeChart::tops();
        assert_eq!(tops.position("XXS"), Some(0.0));
        assert_eq!(tops.position(ONE_SIZE), Some(1.0));
        assert!((tops.position("S").unwrap() - 2.0 / 9.0).abs() < 1e-12);
        assert_eq!(tops.position("XXXL"), None);
    }

    #[test]
    fn test_accessories_forced_to_one_size() {
        let raw = SizeNormalizer::new(false);
        assert_eq!(
            raw.transform(Some("accessories"), Some("M")),
            SizeValue::Token(ONE_SIZE.to_string())
        );

        let normalized = SizeNormalizer::new(true);
        assert_eq!(
            normalized.transform(Some("accessories"), None),
            SizeValue::Position(1.0)
        );
    }

    #[test]
    fn test_passthrough_mode() {
        let normalizer = SizeNormalizer::new(false);
        assert_eq!(
            normalizer.transform(Some("tops"), Some("weird")),
            SizeValue::Token("weird".to_string())
        );
        assert_eq!(normalizer.transform(Some("tops"), None), SizeValue::Missing);
    }

    #[test]
    fn test_unknown_token_is_missing() {
        let normalizer = SizeNormalizer::new(true);
        let value = normalizer.transform(Some("tops"), Some("XXXXL"));
        assert!(value.is_missing());
        assert_eq!(value.category_key(), None);
    }

    #[test]
    fn test_category_scoped_collision() {
        let charts = vec![
            SizeChart::new("tops", vec!["S".into(), "M".into(), "L".into()]),
            SizeChart::new("kids", vec!["XS".into(), "S".into()]),
        ];
        let normalizer = SizeNormalizer::new(true)
            .with_charts(charts)
            .with_category_chart("kidswear", "kids");

        // Own chart wins for its category
        assert_eq!(normalizer.transform(Some("kidswear"), Some("S")), SizeValue::Position(1.0));
        // Otherwise the first declared chart wins
        assert_eq!(normalizer.transform(Some("dresses"), Some("S")), SizeValue::Position(0.0));
    }

    #[test]
    fn test_lookup_trims_and_uppercases() {
        let normalizer = SizeNormalizer::new(true);
        assert_eq!(normalizer.transform(Some("tops"), Some(" xs ")), SizeValue::Position(1.0 / 9.0));
        assert_eq!(normalizer.transform(Some("tailoring"), Some("40r")).category_key(), Some("0.312500".to_string()));
    }

    #[test]
    fn test_transform_frame() {
        let df = df!(
            "size" => &["S", "28", "XS", "ONE SIZE", "8"],
            "category" => &["tops", "bottoms", "dresses", "accessories", "footwear"],
        )
        .unwrap();

        let series = SizeNormalizer::new(true).transform_frame(&df).unwrap();
        let values: Vec<f64> = series.f64().unwrap().into_no_null_iter().collect();
        let expected = [2.0 / 9.0, 6.0 / 22.0, 1.0 / 9.0, 1.0, 4.0 / 11.0];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert!((v - e).abs() < 1e-12);
        }

        let raw = SizeNormalizer::new(false).transform_frame(&df).unwrap();
        assert_eq!(raw.str().unwrap().get(1), Some("28"));
    }

    #[test]
    fn test_missing_columns_error() {
        let df = df!("size" => &["S"]).unwrap();
        let err = SizeNormalizer::new(true).transform_frame(&df).unwrap_err();
        assert!(matches!(err, ResaleError::FeatureNotFound(ref c) if c == "category"));
    }
}
