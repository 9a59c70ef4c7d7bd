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
use datafusion_common::Result;
use geo_index::rtree::{RTree, RTreeIndex};
use geo_types::Geometry;
use sedona_common::sedona_internal_err;
use sedona_geo::predicate::{evaluate_relation, knn_distance, planar_distance};
use sedona_geometry::bounding_box::BoundingBox;
use sedona_geometry::spatial_relation::SpatialRelationType;

use crate::{
    evaluated_batch::{RowFault, RowGeometry},
    index::QueryResultMetrics,
    planner::JoinStrategy,
};

/// Spatial index over the build side of a join
///
/// Holds the concatenated build batch, its decoded geometries, and a packed
/// R-tree of the envelopes of its non-empty geometries. Built once and then
/// shared read-only by every probe worker.
#[derive(Debug)]
pub struct SpatialIndex {
    strategy: JoinStrategy,

    /// All build side rows
    batch: RecordBatch,
    geometries: Vec<RowGeometry>,

    /// R-tree index for the build geometries. It takes MBRs as query windows and returns
    /// data indexes that are translated to build rows using `data_id_to_row`.
    rtree: RTree<f64>,
    data_id_to_row: Vec<u32>,

    /// Union of all indexed envelopes
    extent: Option<BoundingBox>,

    /// Build rows holding empty geometries (never inserted in the R-tree)
    empty_rows: Vec<u32>,

    faults: Vec<RowFault>,
}

impl SpatialIndex {
    pub(crate) fn new(
        strategy: JoinStrategy,
        batch: RecordBatch,
        geometries: Vec<RowGeometry>,
        rtree: RTree<f64>,
        extent: Option<BoundingBox>,
        data_id_to_row: Vec<u32>,
        empty_rows: Vec<u32>,
        faults: Vec<RowFault>,
    ) -> Self {
        Self {
            strategy,
            batch,
            geometries,
            rtree,
            data_id_to_row,
            extent,
            empty_rows,
            faults,
        }
    }

    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }

    /// The build side rows (in input order across all build batches)
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of geometries in the R-tree
    pub fn num_indexed(&self) -> usize {
        self.data_id_to_row.len()
    }

    /// Rows of the build side that were skipped while decoding
    pub fn faults(&self) -> &[RowFault] {
        &self.faults
    }

    /// Find the build rows matching one probe geometry
    ///
    /// Matching rows are appended to `build_rows`: in increasing row order
    /// for relation and distance strategies and by increasing distance then
    /// row for KNN.
    pub fn query(
        &self,
        probe: &RowGeometry,
        probe_rect: Option<&BoundingBox>,
        build_rows: &mut Vec<u32>,
    ) -> Result<QueryResultMetrics> {
        match self.strategy {
            JoinStrategy::IndexedRelation(relation) => {
                self.query_relation(relation, probe, probe_rect, build_rows)
            }
            JoinStrategy::IndexedDistance(distance) => {
                self.query_distance(distance, probe, probe_rect, build_rows)
            }
            JoinStrategy::KNearestNeighbors { k, use_spheroid } => {
                self.query_knn(probe, probe_rect, k, use_spheroid, build_rows)
            }
            JoinStrategy::NestedLoop(relation) => self.query_all(relation, probe, build_rows),
        }
    }

    /// Sorted, deduplicated build rows whose envelopes intersect `window`
    fn candidates(&self, window: &BoundingBox) -> Vec<u32> {
        if self.data_id_to_row.is_empty() {
            return Vec::new();
        }

        let mut candidates = self
            .rtree
            .search(window.xmin, window.ymin, window.xmax, window.ymax);

        // Sort and dedup candidates so a build row is refined (and emitted) at most once
        candidates.sort_unstable();
        candidates.dedup();
        candidates
            .into_iter()
            .map(|data_id| self.data_id_to_row[data_id as usize])
            .collect()
    }

    fn build_geometry(&self, row: u32) -> Result<&Geometry<f64>> {
        match self.geometries.get(row as usize) {
            Some(RowGeometry::Value(geom)) => Ok(geom),
            _ => sedona_internal_err!("Indexed build row {row} has no geometry"),
        }
    }

    fn query_relation(
        &self,
        relation: SpatialRelationType,
        probe: &RowGeometry,
        probe_rect: Option<&BoundingBox>,
        build_rows: &mut Vec<u32>,
    ) -> Result<QueryResultMetrics> {
        let (probe_geom, probe_rect) = match (probe, probe_rect) {
            (RowGeometry::Value(geom), Some(rect)) => (geom, rect),
            (RowGeometry::Empty, _) => {
                // Empty geometries have no envelope; only other empties can match
                let before = build_rows.len();
                if evaluate_relation(relation, None, None) {
                    build_rows.extend_from_slice(&self.empty_rows);
                }
                return Ok(QueryResultMetrics {
                    count: build_rows.len() - before,
                    candidate_count: self.empty_rows.len(),
                });
            }
            _ => return Ok(QueryResultMetrics::default()),
        };

        let candidates = self.candidates(probe_rect);
        let mut count = 0;
        for row in &candidates {
            let build_geom = self.build_geometry(*row)?;
            if evaluate_relation(relation, Some(build_geom), Some(probe_geom)) {
                build_rows.push(*row);
                count += 1;
            }
        }

        Ok(QueryResultMetrics {
            count,
            candidate_count: candidates.len(),
        })
    }

    fn query_distance(
        &self,
        distance: f64,
        probe: &RowGeometry,
        probe_rect: Option<&BoundingBox>,
        build_rows: &mut Vec<u32>,
    ) -> Result<QueryResultMetrics> {
        let (RowGeometry::Value(probe_geom), Some(probe_rect)) = (probe, probe_rect) else {
            return Ok(QueryResultMetrics::default());
        };

        let candidates = self.candidates(&probe_rect.expand(distance));
        let mut count = 0;
        for row in &candidates {
            let build_geom = self.build_geometry(*row)?;
            match planar_distance(Some(build_geom), Some(probe_geom)) {
                Some(actual) if actual <= distance => {
                    build_rows.push(*row);
                    count += 1;
                }
                _ => {}
            }
        }

        Ok(QueryResultMetrics {
            count,
            candidate_count: candidates.len(),
        })
    }

    fn query_all(
        &self,
        relation: SpatialRelationType,
        probe: &RowGeometry,
        build_rows: &mut Vec<u32>,
    ) -> Result<QueryResultMetrics> {
        let Some(probe_arg) = probe.as_predicate_arg() else {
            return Ok(QueryResultMetrics::default());
        };

        let mut metrics = QueryResultMetrics::default();
        for (row, build) in self.geometries.iter().enumerate() {
            let Some(build_arg) = build.as_predicate_arg() else {
                continue;
            };

            metrics.candidate_count += 1;
            if evaluate_relation(relation, build_arg, probe_arg) {
                build_rows.push(row as u32);
                metrics.count += 1;
            }
        }

        Ok(metrics)
    }

    /// Query the spatial index for the k nearest neighbors of a given geometry.
    ///
    /// Exactly `min(k, non-empty build rows)` rows are returned, ordered by
    /// distance and then by build row so that ties resolve the same way on
    /// every run. Empty build rows have no distance and are never returned.
    fn query_knn(
        &self,
        probe: &RowGeometry,
        probe_rect: Option<&BoundingBox>,
        k: u32,
        use_spheroid: bool,
        build_rows: &mut Vec<u32>,
    ) -> Result<QueryResultMetrics> {
        let (RowGeometry::Value(probe_geom), Some(probe_rect)) = (probe, probe_rect) else {
            return Ok(QueryResultMetrics::default());
        };
        if k == 0 || self.data_id_to_row.is_empty() {
            return Ok(QueryResultMetrics::default());
        }

        let candidates = if use_spheroid {
            self.knn_spheroid_candidates(probe_geom, probe_rect, k)?
        } else {
            self.knn_planar_candidates(probe_geom, probe_rect, k)?
        };

        let mut by_distance = Vec::with_capacity(candidates.len());
        for row in &candidates {
            let build_geom = self.build_geometry(*row)?;
            if let Some(distance) = knn_distance(Some(probe_geom), Some(build_geom), use_spheroid)
            {
                if !distance.is_nan() {
                    by_distance.push((distance, *row));
                }
            }
        }

        by_distance.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        by_distance.truncate(k as usize);
        build_rows.extend(by_distance.iter().map(|(_, row)| *row));

        Ok(QueryResultMetrics {
            count: by_distance.len(),
            candidate_count: candidates.len(),
        })
    }

    /// The largest KNN distance from `probe_geom` to the k entries nearest
    /// to the center of `probe_rect`, or `None` if one of them has no
    /// finite distance
    fn initial_knn_bound(
        &self,
        probe_geom: &Geometry<f64>,
        probe_rect: &BoundingBox,
        k: u32,
        use_spheroid: bool,
    ) -> Result<Option<f64>> {
        let center_x = (probe_rect.xmin + probe_rect.xmax) / 2.0;
        let center_y = (probe_rect.ymin + probe_rect.ymax) / 2.0;
        let initial = self
            .rtree
            .neighbors(center_x, center_y, Some(k as usize), None);

        let mut max_distance: f64 = 0.0;
        for data_id in initial {
            let row = self.data_id_to_row[data_id as usize];
            let build_geom = self.build_geometry(row)?;
            match knn_distance(Some(probe_geom), Some(build_geom), use_spheroid) {
                Some(distance) if distance.is_finite() => {
                    max_distance = max_distance.max(distance);
                }
                _ => return Ok(None),
            }
        }

        Ok(Some(max_distance))
    }

    /// Build rows that include every row among the k nearest of `probe_geom`
    ///
    /// The k entries nearest to the probe envelope's center give an upper
    /// bound `d` on the k-th smallest exact distance. Any row at most `d`
    /// away has an envelope within `d` of the probe envelope, so searching
    /// the probe envelope expanded by `d` finds all of them, including ties.
    fn knn_planar_candidates(
        &self,
        probe_geom: &Geometry<f64>,
        probe_rect: &BoundingBox,
        k: u32,
    ) -> Result<Vec<u32>> {
        let Some(max_distance) = self.initial_knn_bound(probe_geom, probe_rect, k, false)? else {
            return Ok(self.data_id_to_row.clone());
        };

        // Widen slightly so rounding in the window can't drop a row at exactly the k-th distance
        let window = probe_rect.expand(max_distance * (1.0 + 1e-9) + 1e-9);
        Ok(self.candidates(&window))
    }

    /// Build rows that include every row among the k nearest of `probe_geom`
    /// by great circle distance
    ///
    /// Works like [Self::knn_planar_candidates] but turns the bound `d` in
    /// meters into a lon/lat window: every point within `d` of a point at
    /// latitude `lat` lies within `d / R` radians of latitude and
    /// `asin(sin(d / R) / cos(lat))` of longitude. The window spans every
    /// longitude when it reaches a pole or crosses the antimeridian. Data
    /// outside the valid lon/lat range is scanned in full.
    fn knn_spheroid_candidates(
        &self,
        probe_geom: &Geometry<f64>,
        probe_rect: &BoundingBox,
        k: u32,
    ) -> Result<Vec<u32>> {
        let in_range = |rect: &BoundingBox| {
            rect.xmin >= -180.0 && rect.xmax <= 180.0 && rect.ymin >= -90.0 && rect.ymax <= 90.0
        };
        if !in_range(probe_rect) || !self.extent.as_ref().is_some_and(in_range) {
            return Ok(self.data_id_to_row.clone());
        }

        let Some(max_distance) = self.initial_knn_bound(probe_geom, probe_rect, k, true)? else {
            return Ok(self.data_id_to_row.clone());
        };

        let radians = max_distance / MEAN_EARTH_RADIUS * (1.0 + 1e-9) + 1e-12;
        let dlat = radians.to_degrees();
        let ymin = probe_rect.ymin - dlat;
        let ymax = probe_rect.ymax + dlat;
        if ymin <= -90.0 || ymax >= 90.0 {
            return Ok(self.candidates(&BoundingBox::new(
                -180.0,
                ymin.max(-90.0),
                180.0,
                ymax.min(90.0),
            )));
        }

        let max_lat = ymin.abs().max(ymax.abs()).to_radians();
        let ratio = radians.sin() / max_lat.cos();
        let (xmin, xmax) = if ratio >= 1.0 {
            (-180.0, 180.0)
        } else {
            let dlon = ratio.asin().to_degrees();
            let xmin = probe_rect.xmin - dlon;
            let xmax = probe_rect.xmax + dlon;
            if xmin < -180.0 || xmax > 180.0 {
                (-180.0, 180.0)
            } else {
                (xmin, xmax)
            }
        };

        Ok(self.candidates(&BoundingBox::new(xmin, ymin, xmax, ymax)))
    }
}

/// Earth radius (meters) used by the Haversine distance
const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;
