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
use std::fmt::{Debug, Formatter};

use proj4rs::{proj::Proj, transform::transform};
use sedona_geometry::{error::SedonaGeometryError, transform::CrsTransform};

/// A [CrsTransform] between two PROJ.4 definitions, computed by `proj4rs`
///
/// Geographic definitions (`+proj=longlat`) take and produce degrees.
pub struct Proj4Transform {
    source_definition: String,
    target_definition: String,
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl Proj4Transform {
    pub fn try_new(source: &str, target: &str) -> Result<Self, SedonaGeometryError> {
        Ok(Self {
            source_definition: source.to_string(),
            target_definition: target.to_string(),
            source: parse_definition(source)?,
            target: parse_definition(target)?,
            source_geographic: is_geographic_definition(source),
            target_geographic: is_geographic_definition(target),
        })
    }
}

impl Debug for Proj4Transform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proj4Transform")
            .field("source", &self.source_definition)
            .field("target", &self.target_definition)
            .finish()
    }
}

impl CrsTransform for Proj4Transform {
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
        let mut xyz = (coord.0, coord.1, 0.0);
        self.transform_coord_3d(&mut xyz)?;
        *coord = (xyz.0, xyz.1);
        Ok(())
    }

    fn transform_coord_3d(&self, coord: &mut (f64, f64, f64)) -> Result<(), SedonaGeometryError> {
        let (x, y) = (coord.0, coord.1);
        if self.source_geographic {
            coord.0 = coord.0.to_radians();
            coord.1 = coord.1.to_radians();
        }

        transform(&self.source, &self.target, coord).map_err(|err| {
            SedonaGeometryError::Invalid(format!("Can't transform ({x}, {y}): {err}"))
        })?;

        if self.target_geographic {
            coord.0 = coord.0.to_degrees();
            coord.1 = coord.1.to_degrees();
        }

        Ok(())
    }
}

/// Whether a PROJ.4 definition has longitude/latitude coordinates
pub fn is_geographic_definition(definition: &str) -> bool {
    definition
        .split_whitespace()
        .any(|param| matches!(param, "+proj=longlat" | "+proj=latlong" | "+proj=lonlat"))
}

fn parse_definition(definition: &str) -> Result<Proj, SedonaGeometryError> {
    Proj::from_proj_string(definition).map_err(|err| {
        SedonaGeometryError::Invalid(format!("Invalid PROJ definition '{definition}': {err}"))
    })
}
