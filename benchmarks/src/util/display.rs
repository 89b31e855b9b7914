// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Result table printing

use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, StringArray};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use datafusion::error::Result;

use crate::engine::QueryOutcome;

/// Render `batches` as a table. Floating point columns are rounded to
/// `float_precision` decimals when given.
pub fn format_results(
    batches: &[RecordBatch],
    float_precision: Option<usize>,
) -> Result<String> {
    let formatted = match float_precision {
        Some(precision) => batches
            .iter()
            .map(|batch| round_floats(batch, precision))
            .collect::<Result<Vec<_>>>()?,
        None => batches.to_vec(),
    };
    Ok(pretty_format_batches(&formatted)?.to_string())
}

pub fn print_results(batches: &[RecordBatch], float_precision: Option<usize>) -> Result<()> {
    println!("{}", format_results(batches, float_precision)?);
    Ok(())
}

/// Print the result table of a completed query, or where a suspended query
/// left its checkpoint
pub fn print_outcome(outcome: &QueryOutcome, float_precision: Option<usize>) -> Result<()> {
    match outcome {
        QueryOutcome::Completed(batches) => print_results(batches, float_precision),
        QueryOutcome::Suspended(report) => {
            println!(
                "Query suspended after {:.3}s with {} rows produced, checkpoint: {}",
                report.suspended_after.as_secs_f64(),
                report.rows,
                report.location.display()
            );
            Ok(())
        }
    }
}

fn round_floats(batch: &RecordBatch, precision: usize) -> Result<RecordBatch> {
    let schema = batch.schema();
    if !schema.fields().iter().any(|f| is_float(f.data_type())) {
        return Ok(batch.clone());
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let rendered: Option<StringArray> = match field.data_type() {
            DataType::Float64 => Some(
                column
                    .as_primitive::<Float64Type>()
                    .iter()
                    .map(|v| v.map(|v| format!("{v:.precision$}")))
                    .collect(),
            ),
            DataType::Float32 => Some(
                column
                    .as_primitive::<Float32Type>()
                    .iter()
                    .map(|v| v.map(|v| format!("{v:.precision$}")))
                    .collect(),
            ),
            _ => None,
        };
        match rendered {
            Some(array) => {
                fields.push(Field::new(field.name(), DataType::Utf8, field.is_nullable()));
                columns.push(Arc::new(array));
            }
            None => {
                fields.push(field.as_ref().clone());
                columns.push(Arc::clone(column));
            }
        }
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn is_float(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Float32 | DataType::Float64)
}
