//! Parquet persistence for regression datasets
//!
//! Layout: one `Float64` column per feature (`x0`, `x1`, ...) followed by the
//! target column `y`. On load, every `Float64` column other than the target
//! becomes a feature in schema order; other column types are skipped.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use super::Dataset;
use crate::{Error, Result};

/// Target column name used when writing datasets.
pub const TARGET_COLUMN: &str = "y";

/// Rows per Parquet row group.
const ROW_GROUP_SIZE: usize = 8192;

/// Convert a dataset to a single record batch.
///
/// # Errors
///
/// Returns an Arrow error if the batch cannot be assembled.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(dataset.n_features() + 1);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(dataset.n_features() + 1);

    for (idx, column) in dataset.features().iter().enumerate() {
        fields.push(Field::new(format!("x{idx}"), DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from(column.clone())));
    }
    fields.push(Field::new(TARGET_COLUMN, DataType::Float64, false));
    columns.push(Arc::new(Float64Array::from(dataset.targets().to_vec())));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Rebuild a dataset from record batches sharing one schema.
///
/// # Errors
///
/// `InvalidInput` if the target column is missing, is not `Float64`,
/// contains nulls, or no feature column is present.
pub fn from_record_batches(batches: &[RecordBatch], target: &str) -> Result<Dataset> {
    let Some(first) = batches.first() else {
        return Err(Error::InvalidInput("no record batches to read".to_string()));
    };
    let schema = first.schema();

    let target_idx = schema
        .index_of(target)
        .map_err(|_| Error::InvalidInput(format!("target column '{target}' not found")))?;
    if schema.field(target_idx).data_type() != &DataType::Float64 {
        return Err(Error::InvalidInput(format!(
            "target column '{target}' must be Float64, found {}",
            schema.field(target_idx).data_type()
        )));
    }

    let feature_idx: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(idx, field)| *idx != target_idx && field.data_type() == &DataType::Float64)
        .map(|(idx, _)| idx)
        .collect();

    let mut features = vec![Vec::new(); feature_idx.len()];
    let mut targets = Vec::new();

    for batch in batches {
        if batch.schema() != schema {
            return Err(Error::StorageError(format!(
                "Schema mismatch: expected {:?}, got {:?}",
                schema,
                batch.schema()
            )));
        }
        targets.extend(float_values(batch, target_idx)?);
        for (slot, &idx) in features.iter_mut().zip(&feature_idx) {
            slot.extend(float_values(batch, idx)?);
        }
    }

    Dataset::new(features, targets)
}

fn float_values(batch: &RecordBatch, idx: usize) -> Result<Vec<f64>> {
    let name = batch.schema().field(idx).name().clone();
    let array = batch
        .column(idx)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::InvalidInput(format!("column '{name}' is not Float64")))?;
    if array.null_count() > 0 {
        return Err(Error::InvalidInput(format!("column '{name}' contains nulls")));
    }
    Ok(array.values().to_vec())
}

/// Load a dataset from a Parquet file.
///
/// # Errors
///
/// `StorageError` if the file cannot be opened or decoded; `InvalidInput`
/// if its columns do not describe a dataset (see [`from_record_batches`]).
pub fn load_parquet<P: AsRef<Path>>(path: P, target: &str) -> Result<Dataset> {
    let file = File::open(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }

    tracing::debug!(path = %path.as_ref().display(), batches = batches.len(), "loaded parquet dataset");
    from_record_batches(&batches, target)
}

/// Write a dataset to a Parquet file.
///
/// # Errors
///
/// `StorageError` if the file cannot be created or encoded.
pub fn write_parquet<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    let file = File::create(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet file: {e}")))?;
    write_to(dataset, file)?;
    Ok(())
}

/// Encode a dataset as Parquet bytes, e.g. for logging as an artifact.
///
/// # Errors
///
/// `StorageError` if encoding fails.
pub fn write_parquet_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    write_to(dataset, Vec::new())
}

fn write_to<W: std::io::Write + Send>(dataset: &Dataset, sink: W) -> Result<W> {
    let batch = to_record_batch(dataset)?;
    let props = WriterProperties::builder()
        .set_max_row_group_size(ROW_GROUP_SIZE)
        .build();
    let mut writer = ArrowWriter::try_new(sink, batch.schema(), Some(props))
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| Error::StorageError(format!("Failed to write record batch: {e}")))?;
    writer
        .into_inner()
        .map_err(|e| Error::StorageError(format!("Failed to finish Parquet file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;

    fn sample() -> Dataset {
        Dataset::new(
            vec![vec![1.0, 2.0, 3.0], vec![0.5, 0.25, 0.125]],
            vec![8.0, 11.0, 14.0],
        )
        .unwrap()
    }

    #[test]
    fn test_record_batch_layout() {
        let batch = to_record_batch(&sample()).unwrap();
        let names: Vec<&str> = batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, vec!["x0", "x1", "y"]);
        assert_eq!(batch.num_rows(), 3);
    }

    #[test]
    fn test_parquet_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.parquet");
        write_parquet(&sample(), &path).unwrap();
        assert_eq!(load_parquet(&path, TARGET_COLUMN).unwrap(), sample());
    }

    #[test]
    fn test_parquet_bytes_match_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bytes.parquet");
        std::fs::write(&path, write_parquet_bytes(&sample()).unwrap()).unwrap();
        assert_eq!(load_parquet(&path, TARGET_COLUMN).unwrap(), sample());
    }

    #[test]
    fn test_non_float_columns_skipped() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("label", DataType::Utf8, false),
            Field::new("x", DataType::Float64, false),
            Field::new("target", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["a", "b"])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![3.0, 4.0])),
            ],
        )
        .unwrap();
        let data = from_record_batches(&[batch], "target").unwrap();
        assert_eq!(data.features(), &[vec![1.0, 2.0]]);
        assert_eq!(data.targets(), &[3.0, 4.0]);
    }

    #[test]
    fn test_missing_target_column() {
        let batch = to_record_batch(&sample()).unwrap();
        let err = from_record_batches(&[batch], "label").unwrap_err();
        assert!(err.to_string().contains("'label' not found"));
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let err = load_parquet("/nonexistent/data.parquet", TARGET_COLUMN).unwrap_err();
        assert!(matches!(err, Error::StorageError(_)));
    }
}
