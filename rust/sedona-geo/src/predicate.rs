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

//! Spatial predicate evaluation over decoded geometries
//!
//! Every function here is pure and assumes CRS compatibility was already
//! established while binding. Empty geometries are passed as `None`.
use geo::{
    Closest, ClosestPoint, CoordsIter, Distance, Euclidean, Haversine, Intersects, Relate,
};
use geo_types::{Geometry, Point};
use sedona_geometry::{bounding_box::BoundingBox, spatial_relation::SpatialRelationType};

/// Evaluate a DE-9IM relation between two (possibly empty) geometries
///
/// An empty geometry shares no point with anything, so every relation
/// involving one is false except `Disjoint` and `Equals(empty, empty)`.
pub fn evaluate_relation(
    relation: SpatialRelationType,
    a: Option<&Geometry<f64>>,
    b: Option<&Geometry<f64>>,
) -> bool {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (None, None) => {
            return matches!(
                relation,
                SpatialRelationType::Equals | SpatialRelationType::Disjoint
            )
        }
        _ => return relation == SpatialRelationType::Disjoint,
    };

    if relation.requires_bbox_intersection() && !bounds_intersect(a, b) {
        return false;
    }

    match relation {
        SpatialRelationType::Intersects => a.intersects(b),
        SpatialRelationType::Disjoint => !bounds_intersect(a, b) || !a.intersects(b),
        SpatialRelationType::Contains => a.relate(b).is_contains(),
        SpatialRelationType::Within => a.relate(b).is_within(),
        SpatialRelationType::Covers => a.relate(b).is_covers(),
        SpatialRelationType::CoveredBy => a.relate(b).is_coveredby(),
        SpatialRelationType::Touches => a.relate(b).is_touches(),
        SpatialRelationType::Crosses => a.relate(b).is_crosses(),
        SpatialRelationType::Overlaps => a.relate(b).is_overlaps(),
        SpatialRelationType::Equals => a.relate(b).is_equal_topo(),
    }
}

fn bounds_intersect(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    match (BoundingBox::from_geometry(a), BoundingBox::from_geometry(b)) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    }
}

/// Minimum planar distance in the units of the CRS
///
/// Returns `None` if either geometry is empty.
pub fn planar_distance(a: Option<&Geometry<f64>>, b: Option<&Geometry<f64>>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Euclidean.distance(a, b)),
        _ => None,
    }
}

/// Great-circle distance in meters between lon/lat geometries
///
/// Exact (Haversine) between points and approximate for non-point inputs:
/// the closest pair of points is located in planar lon/lat space and only
/// that pair is measured with Haversine, so the result can exceed the true
/// great-circle minimum. It is always the distance between a point of `a`
/// and a point of `b`. Returns `None` if either geometry is empty.
pub fn spheroid_distance(a: Option<&Geometry<f64>>, b: Option<&Geometry<f64>>) -> Option<f64> {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return None,
    };

    if let (Geometry::Point(a), Geometry::Point(b)) = (a, b) {
        return Some(Haversine.distance(*a, *b));
    }

    if a.intersects(b) {
        return Some(0.0);
    }

    let one_way = |from: &Geometry<f64>, to: &Geometry<f64>| {
        from.coords_iter()
            .filter_map(|coord| {
                let point = Point::from(coord);
                match to.closest_point(&point) {
                    Closest::Intersection(closest) | Closest::SinglePoint(closest) => {
                        Some(Haversine.distance(point, closest))
                    }
                    Closest::Indeterminate => None,
                }
            })
            .fold(f64::INFINITY, f64::min)
    };

    let distance = one_way(a, b).min(one_way(b, a));
    distance.is_finite().then_some(distance)
}

/// The distance used to rank neighbors in a KNN search
pub fn knn_distance(
    a: Option<&Geometry<f64>>,
    b: Option<&Geometry<f64>>,
    use_spheroid: bool,
) -> Option<f64> {
    if use_spheroid {
        spheroid_distance(a, b)
    } else {
        planar_distance(a, b)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;
    use wkt::TryFromWkt;

    use super::*;

    // Empty geometries decode to None
    fn geom(wkt: &str) -> Option<Geometry<f64>> {
        if wkt.contains("EMPTY") {
            return None;
        }
        Some(Geometry::try_from_wkt_str(wkt).unwrap())
    }

    const SQUARE: &str = "POLYGON ((0 0, 2 0, 2 2, 0 2, 0 0))";

    #[rstest]
    #[case(SpatialRelationType::Intersects, "POINT (1 1)", SQUARE, true)]
    #[case(SpatialRelationType::Intersects, "POINT (3 3)", SQUARE, false)]
    #[case(SpatialRelationType::Intersects, "POINT (2 1)", SQUARE, true)]
    #[case(SpatialRelationType::Within, "POINT (1 1)", SQUARE, true)]
    #[case(SpatialRelationType::Within, "POINT (2 1)", SQUARE, false)]
    #[case(SpatialRelationType::CoveredBy, "POINT (2 1)", SQUARE, true)]
    #[case(SpatialRelationType::Contains, SQUARE, "POINT (1 1)", true)]
    #[case(SpatialRelationType::Contains, SQUARE, "POINT (2 1)", false)]
    #[case(SpatialRelationType::Covers, SQUARE, "POINT (2 1)", true)]
    #[case(SpatialRelationType::Touches, "POINT (2 1)", SQUARE, true)]
    #[case(SpatialRelationType::Touches, "POINT (1 1)", SQUARE, false)]
    #[case(SpatialRelationType::Crosses, "LINESTRING (-1 1, 3 1)", SQUARE, true)]
    #[case(SpatialRelationType::Crosses, "LINESTRING (0.5 1, 1.5 1)", SQUARE, false)]
    #[case(
        SpatialRelationType::Overlaps,
        "POLYGON ((1 1, 3 1, 3 3, 1 3, 1 1))",
        SQUARE,
        true
    )]
    #[case(
        SpatialRelationType::Overlaps,
        "POLYGON ((0.5 0.5, 1 0.5, 1 1, 0.5 0.5))",
        SQUARE,
        false
    )]
    #[case(
        SpatialRelationType::Equals,
        "POLYGON ((2 2, 0 2, 0 0, 2 0, 2 2))",
        SQUARE,
        true
    )]
    #[case(SpatialRelationType::Equals, "POINT (1 1)", SQUARE, false)]
    #[case(SpatialRelationType::Disjoint, "POINT (3 3)", SQUARE, true)]
    #[case(SpatialRelationType::Disjoint, "POINT (1 1)", SQUARE, false)]
    fn relations(
        #[case] relation: SpatialRelationType,
        #[case] lhs: &str,
        #[case] rhs: &str,
        #[case] expected: bool,
    ) {
        let lhs = geom(lhs);
        let rhs = geom(rhs);
        assert_eq!(
            evaluate_relation(relation, lhs.as_ref(), rhs.as_ref()),
            expected
        );
        assert_eq!(
            evaluate_relation(relation.invert(), rhs.as_ref(), lhs.as_ref()),
            expected,
            "inverted {relation}"
        );
    }

    #[rstest]
    fn empty_inputs(#[values("POINT EMPTY", "POLYGON EMPTY")] empty: &str) {
        let empty = geom(empty);
        let square = geom(SQUARE);
        for relation in SpatialRelationType::ALL {
            let expected = relation == SpatialRelationType::Disjoint;
            assert_eq!(evaluate_relation(relation, empty.as_ref(), square.as_ref()), expected);
            assert_eq!(evaluate_relation(relation, square.as_ref(), empty.as_ref()), expected);
        }

        assert!(evaluate_relation(SpatialRelationType::Equals, None, None));
        assert!(!evaluate_relation(SpatialRelationType::Intersects, None, None));
        assert_eq!(planar_distance(empty.as_ref(), square.as_ref()), None);
        assert_eq!(spheroid_distance(square.as_ref(), empty.as_ref()), None);
    }

    #[test]
    fn degenerate_inputs() {
        // Self-intersecting bow tie ring
        let bow_tie = geom("POLYGON ((0 0, 2 2, 2 0, 0 2, 0 0))");
        let point = geom("POINT (10 10)");
        assert!(!evaluate_relation(
            SpatialRelationType::Intersects,
            bow_tie.as_ref(),
            point.as_ref()
        ));
        assert!(evaluate_relation(
            SpatialRelationType::Intersects,
            bow_tie.as_ref(),
            geom("POINT (0 0)").as_ref()
        ));

        // Single points
        let point = geom("POINT (1 1)");
        assert!(evaluate_relation(
            SpatialRelationType::Equals,
            point.as_ref(),
            point.as_ref()
        ));
        assert!(evaluate_relation(
            SpatialRelationType::Within,
            point.as_ref(),
            point.as_ref()
        ));
    }

    #[test]
    fn distances() {
        let a = geom("POINT (0 0)");
        let b = geom("POINT (3 4)");
        assert_eq!(planar_distance(a.as_ref(), b.as_ref()), Some(5.0));
        assert_eq!(
            planar_distance(geom("POINT (1 1)").as_ref(), geom(SQUARE).as_ref()),
            Some(0.0)
        );
        assert_eq!(
            planar_distance(geom("POINT (5 1)").as_ref(), geom(SQUARE).as_ref()),
            Some(3.0)
        );

        // One degree of longitude along the equator
        let spheroid =
            spheroid_distance(geom("POINT (0 0)").as_ref(), geom("POINT (1 0)").as_ref()).unwrap();
        assert_relative_eq!(spheroid, 111_195.0, max_relative = 1e-3);

        let to_line = spheroid_distance(
            geom("POINT (0 1)").as_ref(),
            geom("LINESTRING (-1 0, 1 0)").as_ref(),
        )
        .unwrap();
        assert_relative_eq!(to_line, 111_195.0, max_relative = 1e-3);

        assert_eq!(
            knn_distance(geom("POINT (1 1)").as_ref(), geom(SQUARE).as_ref(), true),
            Some(0.0)
        );
        assert_eq!(knn_distance(a.as_ref(), b.as_ref(), false), Some(5.0));
    }
}
