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
use std::sync::Arc;

use sedona_geometry::{error::SedonaGeometryError, transform::CrsTransform};
use sedona_schema::crs::CrsIdentifier;

/// A resolved coordinate transform between two CRSes
///
/// Pipelines are immutable and cheap to clone, so a single pipeline may be
/// shared by every worker processing a column.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    source: CrsIdentifier,
    target: CrsIdentifier,
    transform: Option<Arc<dyn CrsTransform>>,
    tolerance: f64,
}

impl TransformPipeline {
    /// A pipeline between CRSes whose coordinates are interchangeable
    pub(crate) fn identity(source: CrsIdentifier, target: CrsIdentifier, tolerance: f64) -> Self {
        Self {
            source,
            target,
            transform: None,
            tolerance,
        }
    }

    pub(crate) fn new(
        source: CrsIdentifier,
        target: CrsIdentifier,
        transform: Arc<dyn CrsTransform>,
        tolerance: f64,
    ) -> Self {
        Self {
            source,
            target,
            transform: Some(transform),
            tolerance,
        }
    }

    pub fn source(&self) -> &CrsIdentifier {
        &self.source
    }

    pub fn target(&self) -> &CrsIdentifier {
        &self.target
    }

    /// Whether this pipeline leaves every coordinate unchanged
    ///
    /// Callers may skip decoding entirely for identity pipelines and return
    /// input bytes as-is.
    pub fn is_identity(&self) -> bool {
        self.transform.is_none()
    }

    /// Absolute tolerance, in target units, of a forward-then-inverse round trip
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Transform a single coordinate
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64), SedonaGeometryError> {
        let mut coord = (x, y);
        self.transform_coord(&mut coord)?;
        Ok(coord)
    }
}

impl CrsTransform for TransformPipeline {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
        match &self.transform {
            Some(transform) => transform.transform_coord(coord),
            None => Ok(()),
        }
    }

    fn transform_coord_3d(&self, coord: &mut (f64, f64, f64)) -> Result<(), SedonaGeometryError> {
        match &self.transform {
            Some(transform) => transform.transform_coord_3d(coord),
            None => Ok(()),
        }
    }
}
