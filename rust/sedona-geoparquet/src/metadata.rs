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

//! Strongly-typed structs corresponding to the `geo` metadata of GeoParquet files
//!
//! Parquet readers surface file key/value metadata as Arrow schema metadata,
//! so the codec works on [Schema]s: [GeoParquetMetadata::apply_to_schema]
//! turns binary columns described by the metadata into geometry columns, and
//! [GeoParquetMetadata::try_from_schema] produces metadata for writing.
use std::collections::HashMap;
use std::fmt::Display;

use arrow_schema::{DataType, Field, Schema};
use datafusion_common::{plan_err, DataFusionError, Result};
use sedona_geometry::bounding_box::BoundingBox;
use sedona_schema::{
    crs::{deserialize_crs_from_json, lnglat, Crs},
    datatypes::{Edges, SedonaType},
    schema::SedonaSchema,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Schema metadata key holding the GeoParquet metadata JSON
pub const GEOPARQUET_METADATA_KEY: &str = "geo";

/// Version written by [GeoParquetMetadata::try_from_schema]
pub const GEOPARQUET_VERSION: &str = "1.1.0";

/// The actual encoding of the geometry in the Parquet file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[allow(clippy::upper_case_acronyms)]
pub enum GeoParquetColumnEncoding {
    /// Serialized Well-known Binary encoding
    #[default]
    WKB,
    /// Native Point encoding
    #[serde(rename = "point")]
    Point,
    /// Native LineString encoding
    #[serde(rename = "linestring")]
    LineString,
    /// Native Polygon encoding
    #[serde(rename = "polygon")]
    Polygon,
    /// Native MultiPoint encoding
    #[serde(rename = "multipoint")]
    MultiPoint,
    /// Native MultiLineString encoding
    #[serde(rename = "multilinestring")]
    MultiLineString,
    /// Native MultiPolygon encoding
    #[serde(rename = "multipolygon")]
    MultiPolygon,
}

impl Display for GeoParquetColumnEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use GeoParquetColumnEncoding::*;
        match self {
            WKB => write!(f, "WKB"),
            Point => write!(f, "point"),
            LineString => write!(f, "linestring"),
            Polygon => write!(f, "polygon"),
            MultiPoint => write!(f, "multipoint"),
            MultiLineString => write!(f, "multilinestring"),
            MultiPolygon => write!(f, "multipolygon"),
        }
    }
}

/// Top-level GeoParquet file metadata
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeoParquetMetadata {
    /// The version identifier for the GeoParquet specification.
    pub version: String,

    /// The name of the "primary" geometry column. In cases where a GeoParquet file contains
    /// multiple geometry columns, the primary geometry may be used by default in geospatial
    /// operations.
    pub primary_column: String,

    /// Metadata about geometry columns. Each key is the name of a geometry column in the table.
    pub columns: HashMap<String, GeoParquetColumnMetadata>,
}

impl Default for GeoParquetMetadata {
    fn default() -> Self {
        Self {
            version: GEOPARQUET_VERSION.to_string(),
            primary_column: Default::default(),
            columns: Default::default(),
        }
    }
}

/// GeoParquet column metadata
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct GeoParquetColumnMetadata {
    /// Name of the geometry encoding format. Only `"WKB"` columns can be read as
    /// geometry columns.
    pub encoding: GeoParquetColumnEncoding,

    /// The geometry types of all geometries, or an empty array if they are not known.
    ///
    /// Required by GeoParquet but omitted by some files in the wild, so a
    /// missing value is read as an empty list.
    #[serde(default)]
    pub geometry_types: Vec<String>,

    /// CRS of the geometries as a string identifier or a PROJJSON object.
    ///
    /// `None` means the key is absent, which GeoParquet defines as OGC:CRS84.
    /// `Some(Value::Null)` is an explicit `null` and means the CRS is unknown.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub crs: Option<Value>,

    /// Winding order of exterior ring of polygons. If present must be `"counterclockwise"`;
    /// interior rings are wound in opposite order. If absent, no assertions are made regarding the
    /// winding order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,

    /// Name of the coordinate system for the edges. Must be one of `"planar"` or `"spherical"`.
    /// The default value is `"planar"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<String>,

    /// Bounding Box of the geometries in the file, formatted according to RFC 7946, section 5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    /// Coordinate epoch in case of a dynamic CRS, expressed as a decimal year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<f64>,
}

/// Deserialize a present value (including `null`) as `Some`
///
/// Combined with `#[serde(default)]` this keeps an absent key distinct from
/// an explicit `null`.
fn deserialize_present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl GeoParquetMetadata {
    /// Construct a [`GeoParquetMetadata`] from a JSON string
    pub fn try_new(metadata: &str) -> Result<Self> {
        serde_json::from_str(metadata).map_err(|e| DataFusionError::Plan(e.to_string()))
    }

    /// Serialize as the JSON stored under the `geo` key
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DataFusionError::External(Box::new(e)))
    }

    /// Read the metadata stored under the `geo` key of schema metadata, if any
    pub fn try_from_schema_metadata(metadata: &HashMap<String, String>) -> Result<Option<Self>> {
        metadata
            .get(GEOPARQUET_METADATA_KEY)
            .map(|value| Self::try_new(value))
            .transpose()
    }

    /// Describe the geometry columns of a schema
    ///
    /// Returns `None` if the schema has no geometry or geography columns. The
    /// first geometry column is the primary column.
    pub fn try_from_schema(schema: &Schema) -> Result<Option<Self>> {
        let geometry_columns = schema.geometry_columns()?;
        let Some(primary) = geometry_columns.first() else {
            return Ok(None);
        };

        let mut out = Self {
            primary_column: primary.name.clone(),
            ..Default::default()
        };
        for column in &geometry_columns {
            out.columns.insert(
                column.name.clone(),
                GeoParquetColumnMetadata::try_from_sedona_type(&column.sedona_type)?,
            );
        }

        Ok(Some(out))
    }

    /// Tag the columns this metadata describes with their geometry type
    ///
    /// Columns named in the metadata but not present in the schema are
    /// ignored, since a reader may project them away. Other fields and the
    /// schema metadata are kept as is.
    pub fn apply_to_schema(&self, schema: &Schema) -> Result<Schema> {
        let fields = schema
            .fields()
            .iter()
            .map(|field| match self.columns.get(field.name()) {
                Some(column_metadata) => column_metadata.to_storage_field(field),
                None => Ok(field.as_ref().clone()),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Schema::new_with_metadata(fields, schema.metadata().clone()))
    }

    /// Store this metadata in the schema metadata under the `geo` key
    pub fn add_to_schema(&self, schema: &Schema) -> Result<Schema> {
        let mut metadata = schema.metadata().clone();
        metadata.insert(GEOPARQUET_METADATA_KEY.to_string(), self.to_json_string()?);
        Ok(schema.clone().with_metadata(metadata))
    }

    /// Update a GeoParquetMetadata from another file's metadata
    ///
    /// This will expand the bounding box of each geometry column to include the bounding box
    /// defined in the other file's GeoParquet metadata
    pub fn try_update(&mut self, other: &GeoParquetMetadata) -> Result<()> {
        self.try_compatible_with(other)?;
        for (column_name, column_meta) in self.columns.iter_mut() {
            let Some(other_column_meta) = other.columns.get(column_name) else {
                continue;
            };

            column_meta.bbox = match (column_meta.bounding_box(), other_column_meta.bounding_box())
            {
                (Some(mut bbox), Some(other_bbox)) => {
                    bbox.update(&other_bbox);
                    Some(vec![bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax])
                }
                _ => None,
            };

            if column_meta.geometry_types.is_empty() || other_column_meta.geometry_types.is_empty()
            {
                column_meta.geometry_types.clear();
            } else {
                for item in &other_column_meta.geometry_types {
                    if !column_meta.geometry_types.contains(item) {
                        column_meta.geometry_types.push(item.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Assert that this metadata is compatible with another metadata instance, erroring if not
    ///
    /// CRSes are compared after resolving them to identifiers, so `"EPSG:4326"`
    /// and a PROJJSON object with the id `EPSG:4326` are compatible.
    pub fn try_compatible_with(&self, other: &GeoParquetMetadata) -> Result<()> {
        if self.version.as_str() != other.version.as_str() {
            return plan_err!("Different GeoParquet versions");
        }

        if self.primary_column.as_str() != other.primary_column.as_str() {
            return plan_err!("Different GeoParquet primary columns");
        }

        for (key, left) in &self.columns {
            let Some(right) = other.columns.get(key) else {
                return plan_err!("Other GeoParquet metadata missing column {key}");
            };

            if left.encoding != right.encoding {
                return plan_err!("Different GeoParquet encodings for column {key}");
            }

            if left.crs()? != right.crs()? {
                return plan_err!("Different GeoParquet CRS for column {key}");
            }
        }

        Ok(())
    }
}

impl GeoParquetColumnMetadata {
    /// Describe a geometry or geography type
    pub fn try_from_sedona_type(sedona_type: &SedonaType) -> Result<Self> {
        let (edges, crs) = match sedona_type {
            SedonaType::Wkb(edges, crs) | SedonaType::WkbView(edges, crs) => (edges, crs),
            SedonaType::Arrow(_) => {
                return plan_err!("Can't write GeoParquet metadata for type {sedona_type}")
            }
        };

        Ok(Self {
            encoding: GeoParquetColumnEncoding::WKB,
            crs: Some(crs.as_ref().map(|crs| crs.to_json()).unwrap_or(Value::Null)),
            edges: match edges {
                Edges::Planar => None,
                Edges::Spherical => Some("spherical".to_string()),
            },
            ..Default::default()
        })
    }

    /// The CRS tag of this column
    ///
    /// An absent `crs` is OGC:CRS84 and an explicit `null` is no CRS.
    pub fn crs(&self) -> Result<Crs> {
        match &self.crs {
            None => Ok(lnglat()),
            Some(value) => deserialize_crs_from_json(value),
        }
    }

    pub fn edges(&self) -> Result<Edges> {
        match self.edges.as_deref() {
            None | Some("planar") => Ok(Edges::Planar),
            Some("spherical") => Ok(Edges::Spherical),
            Some(other) => plan_err!("Unsupported GeoParquet edges value '{other}'"),
        }
    }

    /// The geometry type of a column with the given storage type
    pub fn sedona_type(&self, storage_type: &DataType) -> Result<SedonaType> {
        if self.encoding != GeoParquetColumnEncoding::WKB {
            return plan_err!("Unsupported GeoParquet encoding '{}'", self.encoding);
        }

        let edges = self.edges()?;
        let crs = self.crs()?;
        match storage_type {
            DataType::Binary => Ok(SedonaType::Wkb(edges, crs)),
            DataType::BinaryView => Ok(SedonaType::WkbView(edges, crs)),
            other => plan_err!("Unsupported storage type {other} for GeoParquet WKB column"),
        }
    }

    fn to_storage_field(&self, field: &Field) -> Result<Field> {
        let sedona_type = self.sedona_type(field.data_type())?;
        let storage = sedona_type.to_storage_field(field.name(), field.is_nullable())?;

        // Keep unrelated field metadata from the file
        let mut metadata = field.metadata().clone();
        metadata.extend(storage.metadata().clone());
        Ok(storage.with_metadata(metadata))
    }

    /// The `bbox` as `xmin, ymin, xmax, ymax`; 3D boxes are flattened to 2D
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self.bbox.as_deref() {
            Some([xmin, ymin, xmax, ymax]) => Some(BoundingBox::new(*xmin, *ymin, *xmax, *ymax)),
            Some([xmin, ymin, _zmin, xmax, ymax, _zmax]) => {
                Some(BoundingBox::new(*xmin, *ymin, *xmax, *ymax))
            }
            _ => None,
        }
    }
}
