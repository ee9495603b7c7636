//! Routing of categorical columns to encoders

use super::config::{TabularConfig, CATEGORICAL_UNIVERSE};
use super::encoder::EncoderKind;
use crate::error::{ResaleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column name that gets its own normalise-then-encode pipeline
pub const SIZE_COLUMN: &str = "size";

/// Partition of the categorical columns into encoder groups, with `size`
/// pulled out of whichever group declared it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingAssignment {
    pub numeric: Vec<String>,
    pub one_hot: Vec<String>,
    pub ordinal: Vec<String>,
    pub catboost: Vec<String>,
    pub target: Vec<String>,
    pub size_encoder: Option<EncoderKind>,
    universe: Vec<String>,
    implicit_remainder: bool,
}

impl EncodingAssignment {
    /// Build the partition.
    ///
    /// With `target = None` or an empty list every universe column not
    /// claimed elsewhere goes to the target group, in universe order. A
    /// column declared in two groups is a configuration error.
    pub fn partition(
        universe: &[&str],
        numeric: &[String],
        one_hot: &[String],
        ordinal: &[String],
        catboost: &[String],
        target: Option<&[String]>,
    ) -> Result<Self> {
        if numeric.iter().any(|c| c == SIZE_COLUMN) {
            return Err(ResaleError::ConfigError(
                "size cannot be a numeric column; it is normalised and encoded".to_string(),
            ));
        }

        let mut owner: BTreeMap<String, &'static str> = BTreeMap::new();
        let mut claim = |cols: &[String], group: &'static str| -> Result<()> {
            for col in cols {
                if let Some(previous) = owner.insert(col.clone(), group) {
                    return Err(ResaleError::ConfigError(format!(
                        "column '{}' is declared in both {} and {}",
                        col, previous, group
                    )));
                }
            }
            Ok(())
        };
        claim(numeric, "numeric_cols")?;
        claim(one_hot, "ohe_cols")?;
        claim(ordinal, "oe_cols")?;
        claim(catboost, "catboost_cols")?;

        let target = target.filter(|cols| !cols.is_empty());
        let implicit_remainder = target.is_none();
        let target: Vec<String> = match target {
            Some(cols) => {
                claim(cols, "te_cols")?;
                cols.to_vec()
            }
            None => universe
                .iter()
                .filter(|col| !owner.contains_key(**col))
                .map(|col| col.to_string())
                .collect(),
        };

        let mut assignment = Self {
            numeric: numeric.to_vec(),
            one_hot: one_hot.to_vec(),
            ordinal: ordinal.to_vec(),
            catboost: catboost.to_vec(),
            target,
            size_encoder: None,
            universe: universe.iter().map(|c| c.to_string()).collect(),
            implicit_remainder,
        };
        assignment.extract_size();
        Ok(assignment)
    }

    /// Partition the default universe as a tabular config declares it
    pub fn from_config(config: &TabularConfig) -> Result<Self> {
        Self::partition(
            &CATEGORICAL_UNIVERSE,
            &config.numeric_cols,
            &config.ohe_cols,
            &config.oe_cols,
            &config.catboost_cols,
            config.te_cols.as_deref(),
        )
    }

    fn extract_size(&mut self) {
        let groups = [
            (EncoderKind::OneHot, &mut self.one_hot),
            (EncoderKind::Ordinal, &mut self.ordinal),
            (EncoderKind::CatBoost, &mut self.catboost),
            (EncoderKind::Target, &mut self.target),
        ];
        for (kind, cols) in groups {
            if let Some(pos) = cols.iter().position(|c| c == SIZE_COLUMN) {
                cols.remove(pos);
                self.size_encoder = Some(kind);
                return;
            }
        }
    }

    /// Encoder groups in output order
    pub fn groups(&self) -> [(EncoderKind, &[String]); 4] {
        [
            (EncoderKind::OneHot, self.one_hot.as_slice()),
            (EncoderKind::Ordinal, self.ordinal.as_slice()),
            (EncoderKind::CatBoost, self.catboost.as_slice()),
            (EncoderKind::Target, self.target.as_slice()),
        ]
    }

    /// Group that encodes `column`
    pub fn group_of(&self, column: &str) -> Option<EncoderKind> {
        if column == SIZE_COLUMN {
            return self.size_encoder;
        }
        self.groups()
            .into_iter()
            .find(|(_, cols)| cols.iter().any(|c| c == column))
            .map(|(kind, _)| kind)
    }

    /// Every categorical column that ends up encoded, size included
    pub fn categorical_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self.groups().iter().flat_map(|(_, c)| c.iter().cloned()).collect();
        if self.size_encoder.is_some() {
            cols.push(SIZE_COLUMN.to_string());
        }
        cols
    }

    /// No column in two groups, size only in its own slot, and, when the
    /// remainder was implicit, every universe column covered.
    pub fn is_total_and_disjoint(&self) -> bool {
        let mut seen = std::collections::BTreeSet::new();
        let groups = self.groups();
        let all = self
            .numeric
            .iter()
            .chain(groups.iter().flat_map(|(_, c)| c.iter()));
        for col in all {
            if col == SIZE_COLUMN || !seen.insert(col.as_str()) {
                return false;
            }
        }
        if !self.implicit_remainder {
            return true;
        }
        self.universe
            .iter()
            .all(|col| seen.contains(col.as_str()) || (col == SIZE_COLUMN && self.size_encoder.is_some()))
    }
}
