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
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, Documentation};
use sedona_expr::scalar_udf::SedonaScalarUDF;
use sedona_geometry::spatial_relation::SpatialRelationType;

/// Stubs for every relation predicate
///
/// Kernels are provided by the predicate evaluator crate and merged into the
/// function set when a context is built.
pub fn predicate_stub_udfs() -> Vec<SedonaScalarUDF> {
    SpatialRelationType::ALL
        .iter()
        .map(predicate_stub_udf)
        .collect()
}

/// ST_Intersects() scalar UDF stub
pub fn st_intersects_udf() -> SedonaScalarUDF {
    predicate_stub_udf(&SpatialRelationType::Intersects)
}

/// ST_Contains() scalar UDF stub
pub fn st_contains_udf() -> SedonaScalarUDF {
    predicate_stub_udf(&SpatialRelationType::Contains)
}

/// ST_Within() scalar UDF stub
pub fn st_within_udf() -> SedonaScalarUDF {
    predicate_stub_udf(&SpatialRelationType::Within)
}

pub fn predicate_stub_udf(relation: &SpatialRelationType) -> SedonaScalarUDF {
    let udf = SedonaScalarUDF::new_stub(relation.function_name(), Some(predicate_doc(relation)));
    match relation {
        SpatialRelationType::CoveredBy => udf.with_aliases(vec!["st_covered_by".to_string()]),
        _ => udf,
    }
}

fn predicate_doc(relation: &SpatialRelationType) -> Documentation {
    let description = match relation {
        SpatialRelationType::Intersects => "Return true if geomA and geomB share any point.",
        SpatialRelationType::Contains => {
            "Return true if no point of geomB lies outside geomA and their interiors intersect."
        }
        SpatialRelationType::Within => {
            "Return true if no point of geomA lies outside geomB and their interiors intersect."
        }
        SpatialRelationType::Covers => "Return true if no point of geomB lies outside geomA.",
        SpatialRelationType::CoveredBy => "Return true if no point of geomA lies outside geomB.",
        SpatialRelationType::Touches => {
            "Return true if geomA and geomB share a boundary point but their interiors do not intersect."
        }
        SpatialRelationType::Crosses => {
            "Return true if geomA and geomB share some but not all interior points and the intersection has lower dimension."
        }
        SpatialRelationType::Overlaps => {
            "Return true if geomA and geomB have the same dimension and share some but not all points."
        }
        SpatialRelationType::Equals => "Return true if geomA and geomB are topologically equal.",
        SpatialRelationType::Disjoint => "Return true if geomA and geomB share no point.",
    };

    let display_name = match relation {
        SpatialRelationType::Intersects => "ST_Intersects",
        SpatialRelationType::Contains => "ST_Contains",
        SpatialRelationType::Within => "ST_Within",
        SpatialRelationType::Covers => "ST_Covers",
        SpatialRelationType::CoveredBy => "ST_CoveredBy",
        SpatialRelationType::Touches => "ST_Touches",
        SpatialRelationType::Crosses => "ST_Crosses",
        SpatialRelationType::Overlaps => "ST_Overlaps",
        SpatialRelationType::Equals => "ST_Equals",
        SpatialRelationType::Disjoint => "ST_Disjoint",
    };
    Documentation::builder(
        DOC_SECTION_OTHER,
        description,
        format!("{display_name} (geomA: Geometry, geomB: Geometry)"),
    )
    .with_argument("geomA", "geometry: Input geometry or geography")
    .with_argument("geomB", "geometry: Input geometry or geography")
    .with_sql_example(format!(
        "SELECT {display_name}(ST_GeomFromWKT('POINT (0.25 0.25)'), ST_GeomFromWKT('POLYGON ((0 0, 1 0, 0 1, 0 0))'))"
    ))
    .build()
}

#[cfg(test)]
mod tests {
    use sedona_crs::CrsRegistry;
    use sedona_schema::datatypes::WKB_GEOMETRY;

    use super::*;

    #[test]
    fn udf_metadata() {
        let udf = st_intersects_udf();
        assert_eq!(udf.name(), "st_intersects");
        assert!(udf.documentation().is_some());

        let names = predicate_stub_udfs()
            .iter()
            .map(|udf| udf.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&"st_coveredby".to_string()));
    }

    #[test]
    fn stub_has_no_kernels() {
        let udf = st_contains_udf();
        assert!(udf.kernels().is_empty());
        let err = udf
            .bind(&CrsRegistry::standard(), &[WKB_GEOMETRY, WKB_GEOMETRY], &[None, None])
            .unwrap_err();
        assert!(err.message().contains("No kernel matching arguments"));
    }
}
