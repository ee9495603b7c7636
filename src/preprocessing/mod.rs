//! Tabular preprocessing
//!
//! - Size normalisation against garment size charts
//! - Routing of categorical columns to encoder groups
//! - One-hot, ordinal, CatBoost-style and target encoders
//! - Numeric scaling
//! - The composed [`TabularFeatureTransformer`]

pub mod config;
pub mod encoder;
pub mod pipeline;
pub mod routing;
pub mod scaler;
pub mod size;

pub use config::{
    CatBoostParams, OneHotParams, OrdinalParams, OrdinalUnknown, ScalerParamsConfig, TabularConfig,
    TargetParams, UnknownPolicy, CATEGORICAL_UNIVERSE, CONDITION_ORDER,
};
pub use encoder::{
    CatBoostEncoder, CategoricalValues, ColumnEncoder, EncoderKind, OneHotEncoder, OrdinalEncoder,
    TargetEncoder, MISSING_RANK, UNKNOWN_RANK,
};
pub use pipeline::TabularFeatureTransformer;
pub use routing::{EncodingAssignment, SIZE_COLUMN};
pub use scaler::{Scaler, ScalerType};
pub use size::{SizeChart, SizeNormalizer, SizeValue, ONE_SIZE};
