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

//! CRS-checked spatial joins over Arrow record batches
//!
//! A join is planned with [SpatialJoinPlanner], which validates that both
//! geometry columns share a CRS and picks a strategy, and then run with
//! [SpatialJoinExec].

pub mod evaluated_batch;
pub mod exec;
pub mod index;
pub mod metrics;
pub mod planner;
pub mod spatial_predicate;
mod utils;

pub use exec::{SpatialJoinExec, SpatialJoinResult};
pub use planner::{JoinInput, JoinState, JoinStrategy, SpatialJoinPlan, SpatialJoinPlanner};
pub use spatial_predicate::SpatialPredicate;
