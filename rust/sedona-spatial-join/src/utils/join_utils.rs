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

use arrow::compute::take_record_batch;
use arrow_array::{RecordBatch, RecordBatchOptions, UInt32Array};
use arrow_schema::SchemaRef;
use datafusion_common::{JoinSide, Result};

/// Returns a new [RecordBatch] by taking rows from the build and probe batches
///
/// Output columns are the left input's columns followed by the right input's
/// columns, whichever of them was indexed.
pub(crate) fn build_batch_from_indices(
    schema: &SchemaRef,
    build_batch: &RecordBatch,
    probe_batch: &RecordBatch,
    build_indices: &UInt32Array,
    probe_indices: &UInt32Array,
    build_side: JoinSide,
) -> Result<RecordBatch> {
    let build = take_record_batch(build_batch, build_indices)?;
    let probe = take_record_batch(probe_batch, probe_indices)?;
    let (left, right) = match build_side {
        JoinSide::Left => (build, probe),
        _ => (probe, build),
    };

    let columns = left
        .columns()
        .iter()
        .chain(right.columns())
        .cloned()
        .collect::<Vec<_>>();

    // Explicit row count so that inputs without columns still produce rows
    let options = RecordBatchOptions::new().with_row_count(Some(build_indices.len()));
    Ok(RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &options,
    )?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::{Array, Int32Array, StringArray};
    use arrow_schema::{DataType, Field, Schema};

    use super::*;

    fn batch(name: &str, values: Vec<i32>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new(name, DataType::Int32, false)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    #[test]
    fn left_then_right() {
        let left = batch("l", vec![10, 11, 12]);
        let right = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("r", DataType::Utf8, false)])),
            vec![Arc::new(StringArray::from(vec!["a", "b"]))],
        )
        .unwrap();
        let schema = Arc::new(Schema::new(vec![
            Field::new("l", DataType::Int32, false),
            Field::new("r", DataType::Utf8, false),
        ]));

        // Left indexed
        let out = build_batch_from_indices(
            &schema,
            &left,
            &right,
            &UInt32Array::from(vec![2, 0]),
            &UInt32Array::from(vec![1, 1]),
            JoinSide::Left,
        )
        .unwrap();
        assert_eq!(out.column(0).as_ref(), &Int32Array::from(vec![12, 10]) as &dyn Array);
        assert_eq!(out.column(1).as_ref(), &StringArray::from(vec!["b", "b"]) as &dyn Array);

        // Right indexed
        let out = build_batch_from_indices(
            &schema,
            &right,
            &left,
            &UInt32Array::from(vec![0]),
            &UInt32Array::from(vec![1]),
            JoinSide::Right,
        )
        .unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column(0).as_ref(), &Int32Array::from(vec![11]) as &dyn Array);
        assert_eq!(out.column(1).as_ref(), &StringArray::from(vec!["a"]) as &dyn Array);
    }
}
