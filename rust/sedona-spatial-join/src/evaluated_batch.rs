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
use arrow_array::RecordBatch;
use datafusion_common::{DataFusionError, JoinSide, Result};
use datafusion_expr::ColumnarValue;
use geo_types::Geometry;
use sedona_common::SpatialError;
use sedona_functions::executor::WkbExecutor;
use sedona_geometry::{bounding_box::BoundingBox, decode::geometry_from_wkb};
use sedona_schema::schema::GeometryColumn;

/// The decoded geometry of one input row
#[derive(Debug, Clone, PartialEq)]
pub enum RowGeometry {
    /// SQL NULL or a row whose payload failed to decode; never matches
    Null,
    Empty,
    Value(Geometry<f64>),
}

impl RowGeometry {
    /// The geometry in the form the predicate evaluator expects, or `None` for null rows
    pub fn as_predicate_arg(&self) -> Option<Option<&Geometry<f64>>> {
        match self {
            RowGeometry::Null => None,
            RowGeometry::Empty => Some(None),
            RowGeometry::Value(geom) => Some(Some(geom)),
        }
    }
}

/// A row that was excluded from a join because its geometry failed to decode
#[derive(Debug, Clone, PartialEq)]
pub struct RowFault {
    pub side: JoinSide,
    /// Index of the input batch on that side
    pub batch: usize,
    /// Row within the batch
    pub row: usize,
    pub error: SpatialError,
}

impl std::fmt::Display for RowFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} batch {} row {}: {}",
            self.side, self.batch, self.row, self.error
        )
    }
}

/// A record batch with its geometry column decoded
///
/// Decoding happens once per input row and the decoded geometries and
/// envelopes are shared by index construction, probing, and refinement.
#[derive(Debug, Clone)]
pub struct EvaluatedBatch {
    pub batch: RecordBatch,
    pub geometries: Vec<RowGeometry>,
    /// Envelopes of non-empty geometries
    pub rects: Vec<Option<BoundingBox>>,
    pub faults: Vec<RowFault>,
}

impl EvaluatedBatch {
    /// Decode the geometry column of `batch`
    ///
    /// Malformed payloads fail the whole batch in strict mode. Otherwise the
    /// row is treated as null and recorded as a [RowFault].
    pub fn try_new(
        batch: RecordBatch,
        column: &GeometryColumn,
        side: JoinSide,
        batch_index: usize,
        strict_mode: bool,
    ) -> Result<Self> {
        let num_rows = batch.num_rows();
        let mut geometries = Vec::with_capacity(num_rows);
        let mut rects = Vec::with_capacity(num_rows);
        let mut faults = Vec::new();

        let arg_types = [column.sedona_type.clone()];
        let args = [ColumnarValue::Array(batch.column(column.index).clone())];
        let executor = WkbExecutor::new(&arg_types, &args);
        let mut row = 0;
        executor.execute_binary_void(|maybe_bytes| {
            let decoded = match maybe_bytes {
                Some(bytes) => geometry_from_wkb(bytes),
                None => Ok(None),
            };

            match (maybe_bytes, decoded) {
                (None, _) => {
                    geometries.push(RowGeometry::Null);
                    rects.push(None);
                }
                (Some(_), Ok(None)) => {
                    geometries.push(RowGeometry::Empty);
                    rects.push(None);
                }
                (Some(_), Ok(Some(geom))) => {
                    rects.push(BoundingBox::from_geometry(&geom));
                    geometries.push(RowGeometry::Value(geom));
                }
                (Some(_), Err(error)) => {
                    let fault = RowFault {
                        side,
                        batch: batch_index,
                        row,
                        error,
                    };

                    if strict_mode {
                        return Err(DataFusionError::Context(
                            format!("{side} batch {batch_index} row {row}"),
                            Box::new(fault.error.into()),
                        ));
                    }

                    log::warn!("Skipping row with malformed geometry: {fault}");
                    faults.push(fault);
                    geometries.push(RowGeometry::Null);
                    rects.push(None);
                }
            }

            row += 1;
            Ok(())
        })?;

        Ok(Self {
            batch,
            geometries,
            rects,
            faults,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}
