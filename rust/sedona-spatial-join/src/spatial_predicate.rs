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
use datafusion_common::{plan_err, Result, ScalarValue};
use sedona_geometry::spatial_relation::SpatialRelationType;

/// Spatial predicate is the join condition of a spatial join. It can be a distance predicate,
/// a relation predicate, or a KNN predicate.
///
/// Each variant names the geometry column of the left and right inputs it is evaluated on.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialPredicate {
    Distance(DistancePredicate),
    Relation(RelationPredicate),
    KNearestNeighbors(KNNPredicate),
}

impl SpatialPredicate {
    /// Build a predicate from a call to a spatial function in a join condition
    ///
    /// `args` are the literal arguments following the two geometry arguments:
    /// the distance for `ST_DWithin()`, `k` and optionally `use_spheroid` for
    /// `ST_KNN()`, and nothing for the relation predicates.
    pub fn try_from_function(
        name: &str,
        left: &str,
        right: &str,
        args: &[ScalarValue],
    ) -> Result<Self> {
        if let Some(relation_type) = SpatialRelationType::from_name(name) {
            if !args.is_empty() {
                return plan_err!("{name}() join condition takes exactly two geometry arguments");
            }
            return Ok(Self::Relation(RelationPredicate::new(left, right, relation_type)));
        }

        match name.to_lowercase().as_str() {
            "st_dwithin" => {
                let [distance] = args else {
                    return plan_err!("ST_DWithin() join condition requires a distance literal");
                };
                let distance = distance_bound("ST_DWithin()", distance)?;
                Ok(Self::Distance(DistancePredicate::new(left, right, distance)))
            }
            "st_knn" => {
                let (k, use_spheroid) = match args {
                    [k] => (k, None),
                    [k, use_spheroid] => (k, Some(use_spheroid)),
                    _ => return plan_err!("ST_KNN() join condition requires a literal k"),
                };
                let k = match literal_f64(k)? {
                    Some(k) if k >= 0.0 && k.fract() == 0.0 && k <= u32::MAX as f64 => k as u32,
                    other => {
                        return plan_err!("ST_KNN() k must be a non-negative integer but got {other:?}")
                    }
                };
                let use_spheroid = match use_spheroid {
                    None | Some(ScalarValue::Null) | Some(ScalarValue::Boolean(None)) => false,
                    Some(ScalarValue::Boolean(Some(value))) => *value,
                    Some(other) => {
                        return plan_err!("ST_KNN() use_spheroid must be a boolean but got {other}")
                    }
                };
                Ok(Self::KNearestNeighbors(KNNPredicate::new(
                    left,
                    right,
                    k,
                    use_spheroid,
                )))
            }
            _ => plan_err!("{name}() can't be used as a spatial join condition"),
        }
    }

    /// Build a predicate from `ST_Distance(left, right) <op> distance`
    ///
    /// `op` is `"<="` or `"<"`. A strict bound is represented by the largest
    /// inclusive bound below it, so both forms refine with the same check.
    pub fn try_from_distance_comparison(
        op: &str,
        left: &str,
        right: &str,
        distance: &ScalarValue,
    ) -> Result<Self> {
        let bound = distance_bound("ST_Distance()", distance)?;
        let distance = match op {
            "<=" => bound,
            "<" if bound == 0.0 => {
                return plan_err!("ST_Distance() < 0 can never be satisfied");
            }
            "<" => bound.next_down(),
            _ => return plan_err!("Unsupported distance comparison '{op}'"),
        };

        Ok(Self::Distance(DistancePredicate::new(left, right, distance)))
    }

    /// The geometry column of the left input
    pub fn left(&self) -> &str {
        match self {
            SpatialPredicate::Distance(predicate) => &predicate.left,
            SpatialPredicate::Relation(predicate) => &predicate.left,
            SpatialPredicate::KNearestNeighbors(predicate) => &predicate.left,
        }
    }

    /// The geometry column of the right input
    pub fn right(&self) -> &str {
        match self {
            SpatialPredicate::Distance(predicate) => &predicate.right,
            SpatialPredicate::Relation(predicate) => &predicate.right,
            SpatialPredicate::KNearestNeighbors(predicate) => &predicate.right,
        }
    }
}

fn distance_bound(context: &str, value: &ScalarValue) -> Result<f64> {
    let Some(distance) = literal_f64(value)? else {
        return plan_err!("{context} distance must not be NULL");
    };
    if distance.is_nan() || distance < 0.0 {
        return plan_err!("{context} distance must be a non-negative number but got {distance}");
    }

    Ok(distance)
}

fn literal_f64(value: &ScalarValue) -> Result<Option<f64>> {
    if value.is_null() {
        return Ok(None);
    }

    match value.cast_to(&arrow_schema::DataType::Float64)? {
        ScalarValue::Float64(value) => Ok(value),
        other => plan_err!("Expected a numeric literal but got {other}"),
    }
}

impl std::fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpatialPredicate::Distance(predicate) => write!(f, "{predicate}"),
            SpatialPredicate::Relation(predicate) => write!(f, "{predicate}"),
            SpatialPredicate::KNearestNeighbors(predicate) => write!(f, "{predicate}"),
        }
    }
}

/// Distance-based spatial join predicate.
///
/// This predicate represents a spatial join condition based on distance between geometries.
/// It is used to find pairs of geometries from left and right tables where the distance
/// between them is at most a specified threshold.
///
/// # Example SQL
/// ```sql
/// SELECT * FROM left_table l JOIN right_table r
/// ON ST_DWithin(l.geom, r.geom, 100.0)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DistancePredicate {
    /// The geometry column of the left input
    pub left: String,
    /// The geometry column of the right input
    pub right: String,
    /// The distance threshold in units of the shared CRS
    pub distance: f64,
}

impl DistancePredicate {
    pub fn new(left: &str, right: &str, distance: f64) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            distance,
        }
    }
}

impl std::fmt::Display for DistancePredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ST_DWithin({}, {}, {})",
            self.left, self.right, self.distance
        )
    }
}

/// Spatial relation predicate for topological relationships.
///
/// This predicate represents a spatial join condition based on topological relationships
/// between geometries, such as intersects, contains, within, etc. It follows the
/// DE-9IM (Dimensionally Extended 9-Intersection Model) spatial relations.
///
/// # Example SQL
/// ```sql
/// SELECT * FROM buildings b JOIN parcels p
/// ON ST_Intersects(b.geometry, p.geometry)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RelationPredicate {
    /// The geometry column of the left input
    pub left: String,
    /// The geometry column of the right input
    pub right: String,
    /// The spatial relation type.
    pub relation_type: SpatialRelationType,
}

impl RelationPredicate {
    pub fn new(left: &str, right: &str, relation_type: SpatialRelationType) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            relation_type,
        }
    }
}

impl std::fmt::Display for RelationPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ST_{}({}, {})",
            self.relation_type, self.left, self.right
        )
    }
}

/// K-Nearest Neighbors (KNN) spatial join predicate.
///
/// This predicate represents a spatial join that finds the k nearest neighbors
/// from the right side (object) table for each geometry in the left side (query) table.
///
/// # Algorithm
/// For each geometry in the left (query) side:
/// 1. Find k candidates from the R-tree and compute their exact distances
/// 2. Search again with the query envelope expanded by the k-th distance
/// 3. Order every candidate by (distance, right row position) and keep the first k
///
/// Spheroid distances are haversine distances in meters between lon/lat
/// coordinates and are computed by scanning every right row.
#[derive(Debug, Clone, PartialEq)]
pub struct KNNPredicate {
    /// The geometry column of the left (query) input
    pub left: String,
    /// The geometry column of the right (object) input
    pub right: String,
    /// The number of nearest neighbors to find (literal value).
    pub k: u32,
    /// Whether to use spheroid distance calculation or planar distance (literal value).
    pub use_spheroid: bool,
}

impl KNNPredicate {
    pub fn new(left: &str, right: &str, k: u32, use_spheroid: bool) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            k,
            use_spheroid,
        }
    }
}

impl std::fmt::Display for KNNPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ST_KNN({}, {}, {}, {})",
            self.left, self.right, self.k, self.use_spheroid
        )
    }
}
