//! Dimensionality reducers for vectorized text
//!
//! - [`Pca`]: linear projection
//! - [`Umap`]: manifold embedding

pub mod pca;
pub mod umap;

pub use pca::Pca;
pub use umap::{Umap, UmapConfig};

use crate::error::{ResaleError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reducer choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReducerKind {
    #[default]
    Pca,
    Umap,
}

impl ReducerKind {
    pub const ALL: [ReducerKind; 2] = [ReducerKind::Pca, ReducerKind::Umap];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReducerKind::Pca => "pca",
            ReducerKind::Umap => "umap",
        }
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReducerKind {
    type Err = ResaleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or_else(|| {
            ResaleError::ConfigError(format!(
                "unsupported reducer '{}'; supported: [pca, umap]",
                s
            ))
        })
    }
}

impl TryFrom<String> for ReducerKind {
    type Error = ResaleError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ReducerKind> for String {
    fn from(kind: ReducerKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Reducer parameters. The neighbourhood keys only apply to UMAP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerParams {
    pub n_components: usize,
    pub random_state: u64,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub n_epochs: usize,
}

impl Default for ReducerParams {
    fn default() -> Self {
        Self {
            n_components: 100,
            random_state: 42,
            n_neighbors: 15,
            min_dist: 0.1,
            n_epochs: 200,
        }
    }
}

impl ReducerParams {
    pub fn with_n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Fitted reducer of either kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Reducer {
    Pca(Pca),
    Umap(Umap),
}

impl Reducer {
    pub fn new(kind: ReducerKind, params: &ReducerParams) -> Self {
        match kind {
            ReducerKind::Pca => Reducer::Pca(Pca::new(params.n_components, params.random_state)),
            ReducerKind::Umap => Reducer::Umap(Umap::new(UmapConfig {
                n_neighbors: params.n_neighbors,
                min_dist: params.min_dist,
                n_components: params.n_components,
                n_epochs: params.n_epochs,
                random_state: params.random_state,
                ..UmapConfig::default()
            })),
        }
    }

    pub fn kind(&self) -> ReducerKind {
        match self {
            Reducer::Pca(_) => ReducerKind::Pca,
            Reducer::Umap(_) => ReducerKind::Umap,
        }
    }

    pub fn n_components(&self) -> usize {
        match self {
            Reducer::Pca(r) => r.n_components(),
            Reducer::Umap(r) => r.config().n_components,
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Reducer::Pca(r) => r.is_fitted(),
            Reducer::Umap(r) => r.is_fitted(),
        }
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Reducer::Pca(r) => r.fit_transform(x),
            Reducer::Umap(r) => r.fit_transform(x),
        }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Reducer::Pca(r) => r.transform(x),
            Reducer::Umap(r) => r.transform(x),
        }
    }
}
