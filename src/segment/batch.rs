//! Record ↔ Arrow RecordBatch conversion

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{Result, StoreError};
use crate::record::{Column, Record};

/// Arrow schema of a segment, one non-null column per record field
pub fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(Column::Stb.name(), DataType::Utf8, false),
        Field::new(Column::Title.name(), DataType::Utf8, false),
        Field::new(Column::Provider.name(), DataType::Utf8, false),
        Field::new(Column::Date.name(), DataType::Int64, false),
        Field::new(Column::Rev.name(), DataType::Float64, false),
        Field::new(Column::ViewTime.name(), DataType::Int32, false),
    ]))
}

pub fn records_to_batch(records: &[Record]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.stb.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.title.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.provider.as_str()))),
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.date))),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.rev))),
        Arc::new(Int32Array::from_iter_values(records.iter().map(|r| r.view_time))),
    ];
    Ok(RecordBatch::try_new(schema(), columns)?)
}

pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let stb = typed_column::<StringArray>(batch, Column::Stb)?;
    let title = typed_column::<StringArray>(batch, Column::Title)?;
    let provider = typed_column::<StringArray>(batch, Column::Provider)?;
    let date = typed_column::<Int64Array>(batch, Column::Date)?;
    let rev = typed_column::<Float64Array>(batch, Column::Rev)?;
    let view_time = typed_column::<Int32Array>(batch, Column::ViewTime)?;

    Ok((0..batch.num_rows())
        .map(|i| Record {
            stb: stb.value(i).to_string(),
            title: title.value(i).to_string(),
            provider: provider.value(i).to_string(),
            date: date.value(i),
            rev: rev.value(i),
            view_time: view_time.value(i),
        })
        .collect())
}

fn typed_column<'a, T: 'static>(batch: &'a RecordBatch, column: Column) -> Result<&'a T> {
    batch
        .column_by_name(column.name())
        .and_then(|array| array.as_any().downcast_ref::<T>())
        .ok_or_else(|| {
            StoreError::Storage(format!(
                "segment column `{}` is missing or has the wrong type",
                column.name()
            ))
        })
}
