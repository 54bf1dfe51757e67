//! Tabular encoding of a window.
//!
//! Records are laid out as an all-`Utf8` Arrow batch in header order, then
//! written as CSV (header row + rows) or Parquet. Cells for fields a record
//! lacks are null, which both writers render as empty; fields outside the
//! header are dropped.

use crate::config::{ArtifactFormat, ParquetCompression};
use crate::record::Record;
use crate::FlushError;
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// Build the Arrow batch for a window.
pub fn to_record_batch(header: &[String], records: &[Record]) -> Result<RecordBatch, FlushError> {
    let schema = Arc::new(Schema::new(
        header
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let columns: Vec<ArrayRef> = header
        .iter()
        .map(|name| {
            let cells: Vec<Option<String>> = records.iter().map(|r| r.cell(name)).collect();
            Arc::new(StringArray::from(cells)) as ArrayRef
        })
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(records.len()));
    RecordBatch::try_new_with_options(schema, columns, &options)
        .map_err(|e| FlushError::Serialization(format!("Failed to build record batch: {}", e)))
}

/// Encode a window in the requested format.
pub fn encode(
    header: &[String],
    records: &[Record],
    format: ArtifactFormat,
    compression: ParquetCompression,
) -> Result<Bytes, FlushError> {
    let batch = to_record_batch(header, records)?;
    match format {
        ArtifactFormat::Csv => encode_csv(&batch),
        ArtifactFormat::Parquet => encode_parquet(&batch, compression),
    }
}

fn encode_csv(batch: &RecordBatch) -> Result<Bytes, FlushError> {
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(Vec::new());

    writer
        .write(batch)
        .map_err(|e| FlushError::Serialization(format!("Failed to write CSV: {}", e)))?;

    Ok(Bytes::from(writer.into_inner()))
}

fn encode_parquet(
    batch: &RecordBatch,
    compression: ParquetCompression,
) -> Result<Bytes, FlushError> {
    let compression = match compression {
        ParquetCompression::Snappy => Compression::SNAPPY,
        ParquetCompression::Gzip => Compression::GZIP(Default::default()),
        ParquetCompression::Lz4 => Compression::LZ4,
        ParquetCompression::Zstd => Compression::ZSTD(Default::default()),
        ParquetCompression::None => Compression::UNCOMPRESSED,
    };

    let props = WriterProperties::builder()
        .set_compression(compression)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props)).map_err(|e| {
        FlushError::Serialization(format!("Failed to create Parquet writer: {}", e))
    })?;

    writer
        .write(batch)
        .map_err(|e| FlushError::Serialization(format!("Failed to write Parquet: {}", e)))?;

    writer
        .close()
        .map_err(|e| FlushError::Serialization(format!("Failed to close Parquet writer: {}", e)))?;

    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordInput;
    use serde_json::json;

    fn records(values: Vec<serde_json::Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| Record::normalize(RecordInput::Structured(v)).unwrap())
            .collect()
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn csv_text(header: &[String], records: &[Record]) -> String {
        let bytes = encode(header, records, ArtifactFormat::Csv, ParquetCompression::None).unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_csv_header_and_rows() {
        let rows = records(vec![
            json!({"id": 1, "name": "alice"}),
            json!({"id": 2, "name": "bob"}),
        ]);
        let text = csv_text(&header(&["id", "name"]), &rows);
        assert_eq!(text, "id,name\n1,alice\n2,bob\n");
    }

    #[test]
    fn test_csv_uses_header_order() {
        let rows = records(vec![
            json!({"b": "first", "a": "second"}),
            json!({"a": "x", "b": "y"}),
        ]);
        let text = csv_text(&header(&["b", "a"]), &rows);
        assert_eq!(text, "b,a\nfirst,second\ny,x\n");
    }

    #[test]
    fn test_csv_tolerates_schema_drift() {
        let rows = records(vec![
            json!({"id": 1, "name": "alice"}),
            json!({"id": 2, "extra": true}),
            json!({"name": "carol"}),
        ]);
        let text = csv_text(&header(&["id", "name"]), &rows);
        assert_eq!(text, "id,name\n1,alice\n2,\n,carol\n");
    }

    #[test]
    fn test_csv_quotes_special_characters() {
        let rows = records(vec![json!({"note": "a, b", "tags": ["x", "y"]})]);
        let text = csv_text(&header(&["note", "tags"]), &rows);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("note,tags"));
        assert_eq!(lines.next(), Some(r#""a, b","[""x"",""y""]""#));
    }

    #[test]
    fn test_record_batch_shape() {
        let rows = records(vec![json!({"a": 1}), json!({"a": null})]);
        let batch = to_record_batch(&header(&["a"]), &rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 1);
        assert_eq!(batch.column(0).null_count(), 1);
    }

    #[test]
    fn test_parquet_encoding() {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let rows = records(vec![
            json!({"id": 1, "name": "alice"}),
            json!({"id": 2}),
        ]);
        let bytes = encode(
            &header(&["id", "name"]),
            &rows,
            ArtifactFormat::Parquet,
            ParquetCompression::Snappy,
        )
        .unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total_rows, 2);

        let schema = batches[0].schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
    }
}
