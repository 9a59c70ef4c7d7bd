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

//! Coordinate reference system catalog and transforms
//!
//! The [CrsRegistry](registry::CrsRegistry) resolves user-supplied CRS
//! identifiers and builds [TransformPipeline](pipeline::TransformPipeline)s
//! between registered CRSes. Catalog entries carry PROJ.4 definitions
//! (geographic coordinates, Web Mercator, and UTM on WGS 84) evaluated with
//! `proj4rs`; other pairs can be served by an external
//! [CrsEngine](sedona_geometry::transform::CrsEngine).
pub mod pipeline;
pub mod proj4;
pub mod registry;

pub use pipeline::TransformPipeline;
pub use registry::{configure_global_crs_registry, CanonicalCrs, CrsRegistry, CrsRegistryBuilder};
