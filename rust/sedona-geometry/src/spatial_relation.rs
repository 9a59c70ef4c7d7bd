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

/// Type of spatial relation predicate.
///
/// These are the named DE-9IM predicates understood by the predicate
/// evaluator and the spatial join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialRelationType {
    Intersects,
    Contains,
    Within,
    Covers,
    CoveredBy,
    Touches,
    Crosses,
    Overlaps,
    Equals,
    Disjoint,
}

impl SpatialRelationType {
    /// Every relation, in a stable order
    pub const ALL: [SpatialRelationType; 10] = [
        SpatialRelationType::Intersects,
        SpatialRelationType::Contains,
        SpatialRelationType::Within,
        SpatialRelationType::Covers,
        SpatialRelationType::CoveredBy,
        SpatialRelationType::Touches,
        SpatialRelationType::Crosses,
        SpatialRelationType::Overlaps,
        SpatialRelationType::Equals,
        SpatialRelationType::Disjoint,
    ];

    /// Look up a relation by SQL function name (e.g., `"ST_Intersects"`)
    ///
    /// Matching is case-insensitive. Returns `None` for names that are not
    /// relation predicates.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "st_intersects" => Some(SpatialRelationType::Intersects),
            "st_contains" => Some(SpatialRelationType::Contains),
            "st_within" => Some(SpatialRelationType::Within),
            "st_covers" => Some(SpatialRelationType::Covers),
            "st_coveredby" | "st_covered_by" => Some(SpatialRelationType::CoveredBy),
            "st_touches" => Some(SpatialRelationType::Touches),
            "st_crosses" => Some(SpatialRelationType::Crosses),
            "st_overlaps" => Some(SpatialRelationType::Overlaps),
            "st_equals" => Some(SpatialRelationType::Equals),
            "st_disjoint" => Some(SpatialRelationType::Disjoint),
            _ => None,
        }
    }

    /// The SQL function name implementing this relation
    pub fn function_name(&self) -> &'static str {
        match self {
            SpatialRelationType::Intersects => "st_intersects",
            SpatialRelationType::Contains => "st_contains",
            SpatialRelationType::Within => "st_within",
            SpatialRelationType::Covers => "st_covers",
            SpatialRelationType::CoveredBy => "st_coveredby",
            SpatialRelationType::Touches => "st_touches",
            SpatialRelationType::Crosses => "st_crosses",
            SpatialRelationType::Overlaps => "st_overlaps",
            SpatialRelationType::Equals => "st_equals",
            SpatialRelationType::Disjoint => "st_disjoint",
        }
    }

    /// The relation with its arguments swapped
    ///
    /// `relation(a, b)` holds exactly when `relation.invert()(b, a)` holds.
    pub fn invert(&self) -> Self {
        match self {
            SpatialRelationType::Covers => SpatialRelationType::CoveredBy,
            SpatialRelationType::CoveredBy => SpatialRelationType::Covers,
            SpatialRelationType::Contains => SpatialRelationType::Within,
            SpatialRelationType::Within => SpatialRelationType::Contains,
            symmetric => *symmetric,
        }
    }

    /// Whether a match implies that the bounding boxes intersect
    ///
    /// Index-assisted joins can only be used for these relations.
    pub fn requires_bbox_intersection(&self) -> bool {
        !matches!(self, SpatialRelationType::Disjoint)
    }
}

impl std::fmt::Display for SpatialRelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.function_name();
        write!(f, "{}", name.strip_prefix("st_").unwrap_or(name))
    }
}
