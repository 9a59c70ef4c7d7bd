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
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// A shared counter
///
/// Clones update the same value so a counter can be handed to every worker.
#[derive(Debug, Clone, Default)]
pub struct Count {
    value: Arc<AtomicUsize>,
}

impl Count {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self) -> usize {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters reported by a spatial join
#[derive(Debug, Clone, Default)]
pub struct SpatialJoinMetrics {
    pub build_input_batches: Count,
    pub build_input_rows: Count,
    /// Geometries inserted into the R-tree (non-empty build rows)
    pub build_indexed_rows: Count,
    pub probe_input_batches: Count,
    pub probe_input_rows: Count,
    /// Pairs produced by the index before refinement
    pub join_result_candidates: Count,
    /// Pairs that satisfied the predicate
    pub join_result_count: Count,
    pub output_batches: Count,
    pub output_rows: Count,
    /// Rows excluded because their geometry failed to decode
    pub row_faults: Count,
}

impl SpatialJoinMetrics {
    /// `(name, value)` for every counter
    pub fn values(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("build_input_batches", self.build_input_batches.value()),
            ("build_input_rows", self.build_input_rows.value()),
            ("build_indexed_rows", self.build_indexed_rows.value()),
            ("probe_input_batches", self.probe_input_batches.value()),
            ("probe_input_rows", self.probe_input_rows.value()),
            ("join_result_candidates", self.join_result_candidates.value()),
            ("join_result_count", self.join_result_count.value()),
            ("output_batches", self.output_batches.value()),
            ("output_rows", self.output_rows.value()),
            ("row_faults", self.row_faults.value()),
        ]
    }
}

impl std::fmt::Display for SpatialJoinMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self
            .values()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>();
        write!(f, "{}", values.join(", "))
    }
}
