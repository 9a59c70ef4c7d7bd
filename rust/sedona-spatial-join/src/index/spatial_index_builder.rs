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
use arrow::compute::concat_batches;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use datafusion_common::{JoinSide, Result};
use geo_index::rtree::{sort::HilbertSort, RTreeBuilder};
use sedona_geometry::bounding_box::BoundingBox;
use sedona_schema::schema::GeometryColumn;

use crate::{
    evaluated_batch::{EvaluatedBatch, RowGeometry},
    index::SpatialIndex,
    metrics::SpatialJoinMetrics,
    planner::{JoinStrategy, SpatialJoinPlan},
};

/// Builder for constructing a [SpatialIndex] from the build side batches.
///
/// Batches are decoded as they are added; the R-tree is packed once all of
/// them are known.
pub struct SpatialIndexBuilder {
    schema: SchemaRef,
    column: GeometryColumn,
    side: JoinSide,
    strategy: JoinStrategy,
    strict_mode: bool,
    batches: Vec<EvaluatedBatch>,
    metrics: SpatialJoinMetrics,
}

impl SpatialIndexBuilder {
    pub fn new(plan: &SpatialJoinPlan, metrics: SpatialJoinMetrics) -> Self {
        let (schema, column) = match plan.build_side {
            JoinSide::Left => (plan.left_schema.clone(), plan.left_column.clone()),
            _ => (plan.right_schema.clone(), plan.right_column.clone()),
        };

        Self {
            schema,
            column,
            side: plan.build_side,
            strategy: plan.strategy,
            strict_mode: plan.options.strict_mode,
            batches: Vec::new(),
            metrics,
        }
    }

    /// Add a geometry batch to be indexed.
    pub fn add_batch(&mut self, batch: RecordBatch) -> Result<()> {
        self.metrics.build_input_batches.add(1);
        self.metrics.build_input_rows.add(batch.num_rows());

        let evaluated = EvaluatedBatch::try_new(
            batch,
            &self.column,
            self.side,
            self.batches.len(),
            self.strict_mode,
        )?;
        self.metrics.row_faults.add(evaluated.faults.len());
        self.batches.push(evaluated);
        Ok(())
    }

    /// Finish building and return the completed [SpatialIndex].
    pub fn finish(self) -> Result<SpatialIndex> {
        let batch = concat_batches(&self.schema, self.batches.iter().map(|b| &b.batch))?;

        let mut geometries = Vec::with_capacity(batch.num_rows());
        let mut rects = Vec::with_capacity(batch.num_rows());
        let mut faults = Vec::new();
        for evaluated in self.batches {
            geometries.extend(evaluated.geometries);
            rects.extend(evaluated.rects);
            faults.extend(evaluated.faults);
        }

        let num_indexed = rects.iter().flatten().count();
        let mut rtree_builder = RTreeBuilder::<f64>::new(num_indexed as u32);
        let mut data_id_to_row = Vec::with_capacity(num_indexed);
        let mut empty_rows = Vec::new();
        let mut extent: Option<BoundingBox> = None;
        for (row, (geometry, rect)) in geometries.iter().zip(&rects).enumerate() {
            match (geometry, rect) {
                (_, Some(rect)) => {
                    rtree_builder.add(rect.xmin, rect.ymin, rect.xmax, rect.ymax);
                    data_id_to_row.push(row as u32);
                    match extent.as_mut() {
                        Some(extent) => extent.update(rect),
                        None => extent = Some(*rect),
                    }
                }
                (RowGeometry::Empty, None) => empty_rows.push(row as u32),
                _ => {}
            }
        }
        let rtree = rtree_builder.finish::<HilbertSort>();
        self.metrics.build_indexed_rows.add(num_indexed);

        log::debug!(
            "Built spatial index with {num_indexed} geometries from {} rows ({} faults)",
            batch.num_rows(),
            faults.len()
        );

        Ok(SpatialIndex::new(
            self.strategy,
            batch,
            geometries,
            rtree,
            extent,
            data_id_to_row,
            empty_rows,
            faults,
        ))
    }
}
