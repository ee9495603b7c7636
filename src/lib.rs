//! Resale price prediction for secondhand fashion listings
//!
//! Listing frames flow through two feature pipelines into a regressor:
//!
//! - [`preprocessing`] - Size normalisation, categorical encoder routing, numeric scaling
//! - [`feature_engineering`] - Text vectorisation, statistics, sentiment
//! - [`decomposition`] - PCA and UMAP reducers for vectorised text
//! - [`training`] - Estimator registry and RMSLE / WAPE metrics
//! - [`model`] - The composed model, its configuration and persistence
//! - [`export`] - Artifact envelope and object stores
//! - [`cli`] - Command-line experiment driver

// Core error handling
pub mod error;
pub mod listing;

// Feature pipelines
pub mod preprocessing;
pub mod feature_engineering;
pub mod decomposition;

// Models
pub mod training;
pub mod model;
pub mod export;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{ResaleError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ResaleError, Result};

    // Listings
    pub use crate::listing::{clean_text, records_to_frame, ListingRecord, MISSING, TARGET_COLUMN};

    // Tabular features
    pub use crate::preprocessing::{
        EncodingAssignment, SizeNormalizer, SizeValue, TabularConfig, TabularFeatureTransformer,
    };

    // Text features
    pub use crate::feature_engineering::{TextConfig, TextFeatureExtractor};
    pub use crate::decomposition::{ReducerKind, ReducerParams};

    // Estimators
    pub use crate::training::{rmsle, wape, EstimatorConfig, EstimatorKind, EvaluationMetrics};

    // Model
    pub use crate::model::{Model, ModelConfig, ModelMetadata, TargetTransform};

    // Persistence
    pub use crate::export::{DirectoryStore, InMemoryStore, ObjectStore, StoreCredentials};
}
