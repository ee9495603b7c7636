//! Model pipeline
//!
//! [`ModelConfig`] describes an experiment; [`Model`] is the fitted pipeline
//! with its persistence operations.

pub mod config;
pub mod pipeline;

pub use crate::export::serializer::ModelMetadata;
pub use config::{ModelConfig, TargetTransform};
pub use pipeline::Model;
