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
use geo::CoordsIter;
use geo_traits::{
    to_geo::{ToGeoGeometry, ToGeoLineString, ToGeoPoint, ToGeoPolygon},
    GeometryCollectionTrait, GeometryTrait, GeometryType, LineStringTrait, MultiLineStringTrait,
    MultiPointTrait, MultiPolygonTrait, PolygonTrait,
};
use geo_types::{Geometry, GeometryCollection, MultiLineString, MultiPoint, MultiPolygon};
use sedona_common::SpatialError;
use wkb::reader::{read_wkb, Wkb};

use crate::bounding_box::BoundingBox;

/// Parse WKB bytes
///
/// Truncated payloads, unknown byte orders, and unknown type codes are
/// reported as [SpatialError::MalformedGeometry].
pub fn parse_wkb(bytes: &[u8]) -> Result<Wkb<'_>, SpatialError> {
    read_wkb(bytes).map_err(|err| SpatialError::MalformedGeometry(err.to_string()))
}

/// Decode WKB bytes into a [Geometry]
///
/// Returns `Ok(None)` for empty geometries.
pub fn geometry_from_wkb(bytes: &[u8]) -> Result<Option<Geometry<f64>>, SpatialError> {
    geometry_from_wkb_item(&parse_wkb(bytes)?)
}

/// Convert parsed WKB into a [Geometry]
///
/// Returns `Ok(None)` for empty geometries. Empty members of multi-part
/// geometries and collections are dropped, so a geometry is only empty if
/// every part is. Non-finite coordinates are malformed: every coordinate of
/// a non-empty geometry must be finite.
pub fn geometry_from_wkb_item(wkb: &Wkb) -> Result<Option<Geometry<f64>>, SpatialError> {
    let Some(geom) = non_empty_parts(wkb) else {
        return Ok(None);
    };

    if geom
        .coords_iter()
        .any(|coord| !coord.x.is_finite() || !coord.y.is_finite())
    {
        return Err(SpatialError::MalformedGeometry(
            "Geometry contains a non-finite coordinate".to_string(),
        ));
    }

    if BoundingBox::from_geometry(&geom).is_none() {
        return Ok(None);
    }

    Ok(Some(geom))
}

/// Convert to a [Geometry] without its empty parts, or `None` if nothing is left
fn non_empty_parts(geom: &impl GeometryTrait<T = f64>) -> Option<Geometry<f64>> {
    match geom.as_type() {
        GeometryType::Point(point) => point.try_to_point().map(Geometry::Point),
        GeometryType::LineString(line_string) => (line_string.num_coords() > 0)
            .then(|| Geometry::LineString(line_string.to_line_string())),
        GeometryType::Polygon(polygon) => {
            polygon_is_non_empty(polygon).then(|| Geometry::Polygon(polygon.to_polygon()))
        }
        GeometryType::MultiPoint(multi_point) => {
            let points = multi_point
                .points()
                .filter_map(|point| point.try_to_point())
                .collect::<Vec<_>>();
            (!points.is_empty()).then(|| Geometry::MultiPoint(MultiPoint(points)))
        }
        GeometryType::MultiLineString(multi_line_string) => {
            let line_strings = multi_line_string
                .line_strings()
                .filter(|line_string| line_string.num_coords() > 0)
                .map(|line_string| line_string.to_line_string())
                .collect::<Vec<_>>();
            (!line_strings.is_empty())
                .then(|| Geometry::MultiLineString(MultiLineString(line_strings)))
        }
        GeometryType::MultiPolygon(multi_polygon) => {
            let polygons = multi_polygon
                .polygons()
                .filter(|polygon| polygon_is_non_empty(polygon))
                .map(|polygon| polygon.to_polygon())
                .collect::<Vec<_>>();
            (!polygons.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon(polygons)))
        }
        GeometryType::GeometryCollection(collection) => {
            let parts = collection
                .geometries()
                .filter_map(|child| non_empty_parts(&child))
                .collect::<Vec<_>>();
            (!parts.is_empty())
                .then(|| Geometry::GeometryCollection(GeometryCollection(parts)))
        }
        _ => geom.try_to_geometry(),
    }
}

fn polygon_is_non_empty(polygon: &impl PolygonTrait<T = f64>) -> bool {
    polygon
        .exterior()
        .is_some_and(|exterior| exterior.num_coords() > 0)
}
