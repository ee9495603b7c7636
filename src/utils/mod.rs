//! Utility functions and types

pub mod data_loader;
pub mod linalg;

pub use data_loader::{float_column, load_data, save_csv, split_target, string_column};
