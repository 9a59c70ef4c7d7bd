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
use std::{collections::HashMap, fmt::Display};

use arrow_schema::{DataType, Field};
use datafusion_common::{plan_err, Result};
use serde_json::{Map, Value};

use crate::crs::{crs_display, deserialize_crs_from_json, Crs};

/// Arrow extension name key in field metadata
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";

/// Arrow extension metadata key in field metadata
pub const EXTENSION_METADATA_KEY: &str = "ARROW:extension:metadata";

const GEOARROW_WKB: &str = "geoarrow.wkb";

/// Edge interpolation of a geometry or geography type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edges {
    Planar,
    Spherical,
}

/// Data types supported by Sedona
///
/// Geometry types carry their [Crs] as part of the type: two geometry
/// columns with different CRSes have different types, and the CRS of a
/// column is known without reading any rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SedonaType {
    Arrow(DataType),
    Wkb(Edges, Crs),
    WkbView(Edges, Crs),
}

/// Sentinel for a WKB geometry with no CRS
pub const WKB_GEOMETRY: SedonaType = SedonaType::Wkb(Edges::Planar, None);

/// Sentinel for a WKB geometry with no CRS stored in a view array
pub const WKB_VIEW_GEOMETRY: SedonaType = SedonaType::WkbView(Edges::Planar, None);

/// Sentinel for a WKB geography with no CRS
pub const WKB_GEOGRAPHY: SedonaType = SedonaType::Wkb(Edges::Spherical, None);

impl From<DataType> for SedonaType {
    fn from(value: DataType) -> Self {
        SedonaType::Arrow(value)
    }
}

impl SedonaType {
    /// The CRS of a geometry or geography type
    ///
    /// Returns `None` for non-spatial types and `Some(&None)` for spatial
    /// types without a declared CRS.
    pub fn crs(&self) -> Option<&Crs> {
        match self {
            SedonaType::Wkb(_, crs) | SedonaType::WkbView(_, crs) => Some(crs),
            SedonaType::Arrow(_) => None,
        }
    }

    pub fn edges(&self) -> Option<Edges> {
        match self {
            SedonaType::Wkb(edges, _) | SedonaType::WkbView(edges, _) => Some(*edges),
            SedonaType::Arrow(_) => None,
        }
    }

    pub fn is_geometry_or_geography(&self) -> bool {
        !matches!(self, SedonaType::Arrow(_))
    }

    /// Return a copy of this type with a different CRS
    ///
    /// The encoding and edges are unchanged.
    pub fn with_crs(&self, crs: Crs) -> Result<SedonaType> {
        match self {
            SedonaType::Wkb(edges, _) => Ok(SedonaType::Wkb(*edges, crs)),
            SedonaType::WkbView(edges, _) => Ok(SedonaType::WkbView(*edges, crs)),
            SedonaType::Arrow(data_type) => {
                plan_err!("Can't set the CRS of non-spatial type {data_type}")
            }
        }
    }

    /// The Arrow type used to store values of this type
    pub fn storage_type(&self) -> DataType {
        match self {
            SedonaType::Arrow(data_type) => data_type.clone(),
            SedonaType::Wkb(_, _) => DataType::Binary,
            SedonaType::WkbView(_, _) => DataType::BinaryView,
        }
    }

    pub fn encoding_name(&self) -> String {
        match self {
            SedonaType::Arrow(data_type) => data_type.to_string().to_lowercase(),
            SedonaType::Wkb(Edges::Planar, _) => "wkb".to_string(),
            SedonaType::Wkb(Edges::Spherical, _) => "wkb geography".to_string(),
            SedonaType::WkbView(Edges::Planar, _) => "wkb_view".to_string(),
            SedonaType::WkbView(Edges::Spherical, _) => "wkb_view geography".to_string(),
        }
    }

    /// Short description used by schema introspection: `<encoding> <crs|none>`
    pub fn describe(&self) -> String {
        match self.crs() {
            Some(crs) => format!("{} {}", self.encoding_name(), crs_display(crs)),
            None => self.encoding_name(),
        }
    }

    /// Construct the Arrow field used to store this type
    ///
    /// Spatial types are stored as `geoarrow.wkb` extension fields whose
    /// metadata carries the CRS in canonical form.
    pub fn to_storage_field(&self, name: &str, nullable: bool) -> Result<Field> {
        let field = Field::new(name, self.storage_type(), nullable);
        let (edges, crs) = match self {
            SedonaType::Arrow(_) => return Ok(field),
            SedonaType::Wkb(edges, crs) | SedonaType::WkbView(edges, crs) => (edges, crs),
        };

        let mut extension_metadata = Map::new();
        if let Some(crs) = crs {
            extension_metadata.insert("crs".to_string(), crs.to_json());
        }
        if *edges == Edges::Spherical {
            extension_metadata.insert("edges".to_string(), Value::from("spherical"));
        }

        let metadata = HashMap::from([
            (EXTENSION_NAME_KEY.to_string(), GEOARROW_WKB.to_string()),
            (
                EXTENSION_METADATA_KEY.to_string(),
                Value::Object(extension_metadata).to_string(),
            ),
        ]);

        Ok(field.with_metadata(metadata))
    }

    /// Recover a [SedonaType] from an Arrow field
    ///
    /// Fields without the `geoarrow.wkb` extension are plain Arrow types.
    pub fn from_storage_field(field: &Field) -> Result<SedonaType> {
        let metadata = field.metadata();
        match metadata.get(EXTENSION_NAME_KEY).map(|s| s.as_str()) {
            Some(GEOARROW_WKB) => {}
            _ => return Ok(SedonaType::Arrow(field.data_type().clone())),
        }

        let (edges, crs) = match metadata.get(EXTENSION_METADATA_KEY) {
            Some(extension_metadata) if !extension_metadata.is_empty() => {
                parse_extension_metadata(extension_metadata)?
            }
            _ => (Edges::Planar, None),
        };

        match field.data_type() {
            DataType::Binary => Ok(SedonaType::Wkb(edges, crs)),
            DataType::BinaryView => Ok(SedonaType::WkbView(edges, crs)),
            other => plan_err!(
                "Unsupported storage type {other} for geoarrow.wkb field '{}'",
                field.name()
            ),
        }
    }
}

fn parse_extension_metadata(value: &str) -> Result<(Edges, Crs)> {
    let parsed: Value = match serde_json::from_str(value) {
        Ok(parsed) => parsed,
        Err(err) => return plan_err!("Invalid geoarrow.wkb extension metadata: {err}"),
    };

    let Value::Object(map) = parsed else {
        return plan_err!("Expected geoarrow.wkb extension metadata to be a JSON object");
    };

    let edges = match map.get("edges").and_then(|edges| edges.as_str()) {
        None | Some("planar") => Edges::Planar,
        Some("spherical") => Edges::Spherical,
        Some(other) => return plan_err!("Unsupported edges value '{other}'"),
    };

    let crs = match map.get("crs") {
        Some(crs) => deserialize_crs_from_json(crs)?,
        None => None,
    };

    Ok((edges, crs))
}

impl Display for SedonaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SedonaType::Arrow(data_type) => write!(f, "{data_type}"),
            SedonaType::Wkb(Edges::Planar, crs) => {
                write!(f, "geometry<wkb, {}>", crs_display(crs))
            }
            SedonaType::Wkb(Edges::Spherical, crs) => {
                write!(f, "geography<wkb, {}>", crs_display(crs))
            }
            SedonaType::WkbView(Edges::Planar, crs) => {
                write!(f, "geometry<wkb_view, {}>", crs_display(crs))
            }
            SedonaType::WkbView(Edges::Spherical, crs) => {
                write!(f, "geography<wkb_view, {}>", crs_display(crs))
            }
        }
    }
}
