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

//! Seeded random data for join and index tests
//!
//! The same builder settings always produce the same batches, so tests
//! comparing an indexed join against a nested loop are reproducible.
use std::sync::Arc;

use arrow_array::{ArrayRef, BinaryArray, BinaryViewArray, Float64Array, Int32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use datafusion_common::{plan_err, DataFusionError, Result};
use geo_types::{Coord, Geometry, LineString, Point, Polygon, Rect};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sedona_geometry::wkb_factory::wkb_from_geometry;
use sedona_schema::datatypes::{SedonaType, WKB_GEOMETRY};

/// Shape of generated geometries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomGeometryType {
    Point,
    Polygon,
}

/// Builder for seeded random partitions of geometry batches
///
/// Every batch has the schema `id: Int32, dist: Float64, geometry: <type>`.
/// Ids are unique across all partitions and increase in generation order.
#[derive(Debug, Clone)]
pub struct RandomPartitionedDataBuilder {
    seed: u64,
    num_partitions: usize,
    batches_per_partition: usize,
    rows_per_batch: usize,
    geometry_type: RandomGeometryType,
    sedona_type: SedonaType,
    bounds: Rect<f64>,
    size_range: (f64, f64),
    null_rate: f64,
}

impl Default for RandomPartitionedDataBuilder {
    fn default() -> Self {
        Self {
            seed: 42,
            num_partitions: 1,
            batches_per_partition: 1,
            rows_per_batch: 10,
            geometry_type: RandomGeometryType::Point,
            sedona_type: WKB_GEOMETRY,
            bounds: Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 }),
            size_range: (1.0, 10.0),
            null_rate: 0.0,
        }
    }
}

impl RandomPartitionedDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn num_partitions(mut self, num_partitions: usize) -> Self {
        self.num_partitions = num_partitions;
        self
    }

    pub fn batches_per_partition(mut self, batches_per_partition: usize) -> Self {
        self.batches_per_partition = batches_per_partition;
        self
    }

    pub fn rows_per_batch(mut self, rows_per_batch: usize) -> Self {
        self.rows_per_batch = rows_per_batch;
        self
    }

    pub fn geometry_type(mut self, geometry_type: RandomGeometryType) -> Self {
        self.geometry_type = geometry_type;
        self
    }

    pub fn sedona_type(mut self, sedona_type: SedonaType) -> Self {
        self.sedona_type = sedona_type;
        self
    }

    pub fn bounds(mut self, bounds: Rect<f64>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Range of polygon widths (ignored for points)
    pub fn size_range(mut self, size_range: (f64, f64)) -> Self {
        self.size_range = size_range;
        self
    }

    /// Probability that a geometry is null
    pub fn null_rate(mut self, null_rate: f64) -> Self {
        self.null_rate = null_rate;
        self
    }

    pub fn schema(&self) -> Result<SchemaRef> {
        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("dist", DataType::Float64, false),
            self.sedona_type.to_storage_field("geometry", true)?,
        ])))
    }

    /// Generate the partitions
    pub fn build(&self) -> Result<(SchemaRef, Vec<Vec<RecordBatch>>)> {
        if !self.sedona_type.is_geometry_or_geography() {
            return plan_err!("Can't generate random data of type {}", self.sedona_type);
        }
        if !(0.0..=1.0).contains(&self.null_rate) {
            return plan_err!("null_rate must be between 0 and 1");
        }

        let schema = self.schema()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut next_id = 0i32;

        let mut partitions = Vec::with_capacity(self.num_partitions);
        for _ in 0..self.num_partitions {
            let mut batches = Vec::with_capacity(self.batches_per_partition);
            for _ in 0..self.batches_per_partition {
                let batch = self.random_batch(&mut rng, &schema, next_id)?;
                next_id += self.rows_per_batch as i32;
                batches.push(batch);
            }
            partitions.push(batches);
        }

        Ok((schema, partitions))
    }

    fn random_batch(&self, rng: &mut StdRng, schema: &SchemaRef, first_id: i32) -> Result<RecordBatch> {
        let ids = Int32Array::from_iter_values(first_id..first_id + self.rows_per_batch as i32);
        let dists = Float64Array::from_iter_values(
            (0..self.rows_per_batch).map(|_| rng.gen_range(0.0..self.size_range.1.max(1.0))),
        );

        let mut wkbs = Vec::with_capacity(self.rows_per_batch);
        for _ in 0..self.rows_per_batch {
            if rng.gen_bool(self.null_rate) {
                wkbs.push(None);
                continue;
            }

            let geom = self.random_geometry(rng);
            wkbs.push(Some(
                wkb_from_geometry(&geom).map_err(|e| DataFusionError::External(Box::new(e)))?,
            ));
        }

        let geometry: ArrayRef = match self.sedona_type.storage_type() {
            DataType::BinaryView => Arc::new(wkbs.into_iter().collect::<BinaryViewArray>()),
            _ => Arc::new(wkbs.into_iter().collect::<BinaryArray>()),
        };

        Ok(RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(ids), Arc::new(dists), geometry],
        )?)
    }

    fn random_geometry(&self, rng: &mut StdRng) -> Geometry<f64> {
        let min = self.bounds.min();
        let max = self.bounds.max();
        let center = Coord {
            x: rng.gen_range(min.x..=max.x),
            y: rng.gen_range(min.y..=max.y),
        };

        match self.geometry_type {
            RandomGeometryType::Point => Geometry::Point(Point(center)),
            RandomGeometryType::Polygon => {
                let (min_size, max_size) = self.size_range;
                let radius = rng.gen_range(min_size..=max_size.max(min_size)) / 2.0;
                let num_vertices = rng.gen_range(3..=8);
                let start = rng.gen_range(0.0..std::f64::consts::TAU);

                let mut ring = (0..num_vertices)
                    .map(|i| {
                        let angle = start + std::f64::consts::TAU * i as f64 / num_vertices as f64;
                        Coord {
                            x: center.x + radius * angle.cos(),
                            y: center.y + radius * angle.sin(),
                        }
                    })
                    .collect::<Vec<_>>();
                ring.push(ring[0]);
                Geometry::Polygon(Polygon::new(LineString::new(ring), vec![]))
            }
        }
    }
}
