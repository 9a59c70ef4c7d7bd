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
use std::{fmt::Debug, io::Write, sync::Arc};

use geo_traits::{
    CoordTrait, Dimensions, GeometryCollectionTrait, GeometryTrait, GeometryType,
    LineStringTrait, MultiLineStringTrait, MultiPointTrait, MultiPolygonTrait, PointTrait,
    PolygonTrait,
};

use crate::error::SedonaGeometryError;

/// A coordinate transform between two coordinate reference systems
pub trait CrsTransform: Debug + Send + Sync {
    /// Transform a single (x, y) coordinate in place
    fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError>;

    /// Transform a single (x, y, z) coordinate in place
    ///
    /// The default transforms x and y and leaves z unchanged.
    fn transform_coord_3d(&self, coord: &mut (f64, f64, f64)) -> Result<(), SedonaGeometryError> {
        let mut xy = (coord.0, coord.1);
        self.transform_coord(&mut xy)?;
        coord.0 = xy.0;
        coord.1 = xy.1;
        Ok(())
    }
}

/// A provider of [CrsTransform]s
///
/// Engines are looked up by the canonical `authority:code` of the source
/// and target CRS. Returning `Ok(None)` means the engine has no path
/// between the two.
pub trait CrsEngine: Debug + Send + Sync {
    fn get_transform_crs_to_crs(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Option<Arc<dyn CrsTransform>>, SedonaGeometryError>;
}

/// Apply a [CrsTransform] to every coordinate of a geometry, writing ISO WKB
///
/// The geometry type, dimension, part counts, and vertex order of the input
/// are kept. Z values go through [CrsTransform::transform_coord_3d] and M
/// values are copied unchanged. Output is little endian.
pub fn transform(
    geom: &impl GeometryTrait<T = f64>,
    trans: &dyn CrsTransform,
    buf: &mut impl Write,
) -> Result<(), SedonaGeometryError> {
    let dim = geom.dim();
    match geom.as_type() {
        GeometryType::Point(point) => write_point(point, trans, buf),
        GeometryType::LineString(line_string) => write_line_string(line_string, trans, buf),
        GeometryType::Polygon(polygon) => write_polygon(polygon, trans, buf),
        GeometryType::MultiPoint(multi_point) => {
            write_header(buf, 4, dim)?;
            write_count(buf, multi_point.num_points())?;
            for point in multi_point.points() {
                write_point(&point, trans, buf)?;
            }
            Ok(())
        }
        GeometryType::MultiLineString(multi_line_string) => {
            write_header(buf, 5, dim)?;
            write_count(buf, multi_line_string.num_line_strings())?;
            for line_string in multi_line_string.line_strings() {
                write_line_string(&line_string, trans, buf)?;
            }
            Ok(())
        }
        GeometryType::MultiPolygon(multi_polygon) => {
            write_header(buf, 6, dim)?;
            write_count(buf, multi_polygon.num_polygons())?;
            for polygon in multi_polygon.polygons() {
                write_polygon(&polygon, trans, buf)?;
            }
            Ok(())
        }
        GeometryType::GeometryCollection(collection) => {
            write_header(buf, 7, dim)?;
            write_count(buf, collection.num_geometries())?;
            for child in collection.geometries() {
                transform(&child, trans, buf)?;
            }
            Ok(())
        }
        _ => Err(SedonaGeometryError::Invalid(
            "Can't transform a geometry type without a WKB encoding".to_string(),
        )),
    }
}

fn write_point(
    point: &impl PointTrait<T = f64>,
    trans: &dyn CrsTransform,
    buf: &mut impl Write,
) -> Result<(), SedonaGeometryError> {
    let dim = point.dim();
    write_header(buf, 1, dim)?;
    match point.coord() {
        Some(coord) => write_coord(&coord, dim, trans, buf),
        None => {
            for _ in 0..dim.size() {
                buf.write_all(&f64::NAN.to_le_bytes())?;
            }
            Ok(())
        }
    }
}

fn write_line_string(
    line_string: &impl LineStringTrait<T = f64>,
    trans: &dyn CrsTransform,
    buf: &mut impl Write,
) -> Result<(), SedonaGeometryError> {
    let dim = line_string.dim();
    write_header(buf, 2, dim)?;
    write_coords(line_string, dim, trans, buf)
}

fn write_polygon(
    polygon: &impl PolygonTrait<T = f64>,
    trans: &dyn CrsTransform,
    buf: &mut impl Write,
) -> Result<(), SedonaGeometryError> {
    let dim = polygon.dim();
    write_header(buf, 3, dim)?;
    let exterior = polygon.exterior();
    write_count(buf, exterior.is_some() as usize + polygon.num_interiors())?;
    if let Some(exterior) = exterior {
        write_coords(&exterior, dim, trans, buf)?;
    }
    for interior in polygon.interiors() {
        write_coords(&interior, dim, trans, buf)?;
    }
    Ok(())
}

fn write_coords(
    line_string: &impl LineStringTrait<T = f64>,
    dim: Dimensions,
    trans: &dyn CrsTransform,
    buf: &mut impl Write,
) -> Result<(), SedonaGeometryError> {
    write_count(buf, line_string.num_coords())?;
    for coord in line_string.coords() {
        write_coord(&coord, dim, trans, buf)?;
    }
    Ok(())
}

fn write_coord(
    coord: &impl CoordTrait<T = f64>,
    dim: Dimensions,
    trans: &dyn CrsTransform,
    buf: &mut impl Write,
) -> Result<(), SedonaGeometryError> {
    let (x, y) = (coord.x(), coord.y());
    let ordinate = |n: usize| coord.nth(n).unwrap_or(f64::NAN);

    match dim {
        Dimensions::Xy => {
            let mut xy = (x, y);
            trans.transform_coord(&mut xy)?;
            check_finite(x, y, xy.0, xy.1)?;
            write_ordinates(buf, &[xy.0, xy.1])
        }
        Dimensions::Xyz => {
            let mut xyz = (x, y, ordinate(2));
            trans.transform_coord_3d(&mut xyz)?;
            check_finite(x, y, xyz.0, xyz.1)?;
            write_ordinates(buf, &[xyz.0, xyz.1, xyz.2])
        }
        Dimensions::Xym => {
            let mut xy = (x, y);
            trans.transform_coord(&mut xy)?;
            check_finite(x, y, xy.0, xy.1)?;
            write_ordinates(buf, &[xy.0, xy.1, ordinate(2)])
        }
        Dimensions::Xyzm => {
            let mut xyz = (x, y, ordinate(2));
            trans.transform_coord_3d(&mut xyz)?;
            check_finite(x, y, xyz.0, xyz.1)?;
            write_ordinates(buf, &[xyz.0, xyz.1, xyz.2, ordinate(3)])
        }
        Dimensions::Unknown(n) => Err(SedonaGeometryError::Invalid(format!(
            "Can't transform coordinates with {n} unknown dimensions"
        ))),
    }
}

fn check_finite(x: f64, y: f64, out_x: f64, out_y: f64) -> Result<(), SedonaGeometryError> {
    if out_x.is_finite() && out_y.is_finite() {
        Ok(())
    } else {
        Err(SedonaGeometryError::Invalid(format!(
            "Transform produced a non-finite coordinate from ({x}, {y})"
        )))
    }
}

fn write_header(
    buf: &mut impl Write,
    geometry_type: u32,
    dim: Dimensions,
) -> Result<(), SedonaGeometryError> {
    let offset = match dim {
        Dimensions::Xy => 0,
        Dimensions::Xyz => 1000,
        Dimensions::Xym => 2000,
        Dimensions::Xyzm => 3000,
        Dimensions::Unknown(n) => {
            return Err(SedonaGeometryError::Invalid(format!(
                "Can't write WKB with {n} unknown dimensions"
            )))
        }
    };

    buf.write_all(&[0x01])?;
    buf.write_all(&(geometry_type + offset).to_le_bytes())?;
    Ok(())
}

fn write_count(buf: &mut impl Write, count: usize) -> Result<(), SedonaGeometryError> {
    let count = u32::try_from(count)
        .map_err(|_| SedonaGeometryError::Invalid(format!("Too many WKB parts: {count}")))?;
    buf.write_all(&count.to_le_bytes())?;
    Ok(())
}

fn write_ordinates(buf: &mut impl Write, values: &[f64]) -> Result<(), SedonaGeometryError> {
    for value in values {
        buf.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;
    use wkb::reader::read_wkb;
    use wkt::Wkt;

    use crate::wkb_factory::wkb_from_geometry;

    use super::*;

    #[derive(Debug)]
    struct Shift {
        dx: f64,
    }

    impl CrsTransform for Shift {
        fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
            coord.0 += self.dx;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Lift {}

    impl CrsTransform for Lift {
        fn transform_coord(&self, _coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
            Ok(())
        }

        fn transform_coord_3d(
            &self,
            coord: &mut (f64, f64, f64),
        ) -> Result<(), SedonaGeometryError> {
            coord.2 += 100.0;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Explode {}

    impl CrsTransform for Explode {
        fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
            coord.1 = f64::NAN;
            Ok(())
        }
    }

    fn wkb(value: &str) -> Vec<u8> {
        wkb_from_geometry(&Wkt::<f64>::from_str(value).unwrap()).unwrap()
    }

    fn transform_wkt(value: &str, trans: &dyn CrsTransform) -> Vec<u8> {
        let input = wkb(value);
        let mut out = Vec::new();
        transform(&read_wkb(&input).unwrap(), trans, &mut out).unwrap();
        out
    }

    #[rstest]
    #[case("POINT (1 2)", "POINT (11 2)")]
    #[case("POINT Z (1 2 3)", "POINT Z (11 2 3)")]
    #[case("POINT M (1 2 4)", "POINT M (11 2 4)")]
    #[case("LINESTRING ZM (0 0 1 2, 1 1 3 4)", "LINESTRING ZM (10 0 1 2, 11 1 3 4)")]
    #[case(
        "POLYGON ((0 0, 1 0, 1 1, 0 0), (0.1 0.1, 0.2 0.1, 0.2 0.2, 0.1 0.1))",
        "POLYGON ((10 0, 11 0, 11 1, 10 0), (10.1 0.1, 10.2 0.1, 10.2 0.2, 10.1 0.1))"
    )]
    #[case("MULTIPOINT Z ((0 0 5), (1 1 6))", "MULTIPOINT Z ((10 0 5), (11 1 6))")]
    #[case("MULTILINESTRING ((0 0, 1 1), (2 2, 3 3))", "MULTILINESTRING ((10 0, 11 1), (12 2, 13 3))")]
    #[case(
        "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))",
        "MULTIPOLYGON (((10 0, 11 0, 11 1, 10 0)), ((15 5, 16 5, 16 6, 15 5)))"
    )]
    #[case(
        "GEOMETRYCOLLECTION (POINT (0 0), LINESTRING (0 0, 1 1))",
        "GEOMETRYCOLLECTION (POINT (10 0), LINESTRING (10 0, 11 1))"
    )]
    #[case("POLYGON EMPTY", "POLYGON EMPTY")]
    fn preserves_structure(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(transform_wkt(input, &Shift { dx: 10.0 }), wkb(expected));
    }

    #[test]
    fn keeps_dimension() {
        let out = transform_wkt("POINT Z (1 2 3)", &Shift { dx: 0.0 });
        assert_eq!(out.len(), 29);
        assert_eq!(&out[1..5], &1001u32.to_le_bytes());

        let out = transform_wkt("LINESTRING ZM (0 0 1 2, 1 1 3 4)", &Shift { dx: 0.0 });
        assert_eq!(&out[1..5], &3002u32.to_le_bytes());
    }

    #[test]
    fn z_uses_3d_transform() {
        assert_eq!(
            transform_wkt("LINESTRING ZM (0 0 1 2, 1 1 3 4)", &Lift {}),
            wkb("LINESTRING ZM (0 0 101 2, 1 1 103 4)")
        );
        // No z, nothing to lift
        assert_eq!(
            transform_wkt("POINT M (1 2 3)", &Lift {}),
            wkb("POINT M (1 2 3)")
        );
    }

    #[test]
    fn rejects_non_finite_output() {
        let input = wkb("POINT (1 2)");
        let mut out = Vec::new();
        let err = transform(&read_wkb(&input).unwrap(), &Explode {}, &mut out).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }
}
