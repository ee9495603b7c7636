//! Data loading utilities
//!
//! Listing exports are read with every column as text so that size tokens such
//! as `"28"` or `"8.5"` survive untouched; typed extraction happens per column.

use crate::error::{ResaleError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Columns carried by raw exports that never feed the model
pub const BOOKKEEPING_COLUMNS: [&str; 2] = ["id", "parsing_date"];

/// Load a CSV or Parquet file, dispatching on the extension
pub fn load_data(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let start = Instant::now();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let df = match ext.as_str() {
        "csv" => load_csv(path)?,
        "parquet" | "pq" => {
            let file = open(path)?;
            ParquetReader::new(file).finish()?
        }
        other => {
            return Err(ResaleError::DataError(format!(
                "Unsupported file format: '{}' (expected csv or parquet)",
                other
            )))
        }
    };

    debug!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded data"
    );
    Ok(df)
}

/// Load a CSV file with a header row, every column as text
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let file = open(path.as_ref())?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(df)
}

/// Write a frame as CSV
pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ResaleError::ArtifactNotFound(path.display().to_string())
        } else {
            ResaleError::IoError(e)
        }
    })
}

/// Extract a column as optional strings. Numeric columns are rendered as text.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| ResaleError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    let ca = series.str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Extract a column as optional floats. Unparseable text becomes null.
pub fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| ResaleError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;
    Ok(ca.into_iter().collect())
}

/// Extract a dense target vector; nulls are rejected
pub fn target_column(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let values = float_column(df, name)?;
    let dense: Option<Vec<f64>> = values.into_iter().collect();
    dense.map(Array1::from_vec).ok_or_else(|| {
        ResaleError::InvalidInput(format!("Target column '{}' contains missing values", name))
    })
}

/// Split a raw export into model inputs and the target column.
/// Bookkeeping columns are dropped when present.
pub fn split_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Array1<f64>)> {
    let y = target_column(df, target)?;
    let mut features = df.drop(target)?;
    for col in BOOKKEEPING_COLUMNS {
        if features.get_column_index(col).is_some() {
            features = features.drop(col)?;
        }
    }
    Ok((features, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_column_renders_numbers() {
        let df = df!(
            "size" => &["S", "28", "XS"],
            "n_photos" => &[3i64, 5, 7],
        )
        .unwrap();

        let sizes = string_column(&df, "size").unwrap();
        assert_eq!(sizes[1].as_deref(), Some("28"));

        let photos = string_column(&df, "n_photos").unwrap();
        assert_eq!(photos[2].as_deref(), Some("7"));
    }

    #[test]
    fn test_missing_column_is_feature_not_found() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let err = string_column(&df, "designer").unwrap_err();
        assert!(matches!(err, ResaleError::FeatureNotFound(ref c) if c == "designer"));
    }

    #[test]
    fn test_float_column_parses_text() {
        let df = df!("n_photos" => &["3", "x", "4.5"]).unwrap();
        let values = float_column(&df, "n_photos").unwrap();
        assert_eq!(values, vec![Some(3.0), None, Some(4.5)]);
    }

    #[test]
    fn test_split_target_drops_bookkeeping() {
        let df = df!(
            "id" => &[1i64, 2],
            "designer" => &["Acne", "Rick Owens"],
            "sold_price" => &[120.0, 480.0],
        )
        .unwrap();

        let (features, y) = split_target(&df, "sold_price").unwrap();
        assert_eq!(features.get_column_names().len(), 1);
        assert_eq!(y.to_vec(), vec![120.0, 480.0]);
    }

    #[test]
    fn test_target_with_nulls_rejected() {
        let df = df!("sold_price" => &[Some(1.0), None]).unwrap();
        assert!(matches!(
            target_column(&df, "sold_price"),
            Err(ResaleError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_csv_round_trip_keeps_size_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.csv");

        let mut df = df!(
            "size" => &["28", "8.5", "ONE SIZE"],
            "n_photos" => &[1.0, 2.0, 3.0],
        )
        .unwrap();
        save_csv(&mut df, &path).unwrap();

        let loaded = load_data(&path).unwrap();
        let sizes = string_column(&loaded, "size").unwrap();
        assert_eq!(sizes[0].as_deref(), Some("28"));
        assert_eq!(sizes[1].as_deref(), Some("8.5"));
        let photos = float_column(&loaded, "n_photos").unwrap();
        assert_eq!(photos[2], Some(3.0));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load_data("listings.xlsx"),
            Err(ResaleError::DataError(_))
        ));
    }
}
