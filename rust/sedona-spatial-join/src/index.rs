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

//! R-tree index over the build side of a spatial join

mod spatial_index;
mod spatial_index_builder;

pub use spatial_index::SpatialIndex;
pub use spatial_index_builder::SpatialIndexBuilder;

/// Counts produced by probing the index with one geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryResultMetrics {
    /// Matches after refinement
    pub count: usize,
    /// Candidates evaluated during refinement
    pub candidate_count: usize,
}
