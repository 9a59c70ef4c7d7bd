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

/// ST_Distance() scalar UDF stub
pub fn st_distance_udf() -> SedonaScalarUDF {
    SedonaScalarUDF::new_stub(
        "st_distance",
        Some(
            Documentation::builder(
                DOC_SECTION_OTHER,
                "Return the minimum distance between geomA and geomB: planar in the units of their CRS for geometries or meters for geographies.",
                "ST_Distance (geomA: Geometry, geomB: Geometry)",
            )
            .with_argument("geomA", "geometry: Input geometry")
            .with_argument("geomB", "geometry: Input geometry")
            .with_sql_example(
                "SELECT ST_Distance(ST_GeomFromWKT('POINT (0 0)'), ST_GeomFromWKT('POINT (3 4)'))",
            )
            .build(),
        ),
    )
}

/// ST_DWithin() scalar UDF stub
pub fn st_dwithin_udf() -> SedonaScalarUDF {
    SedonaScalarUDF::new_stub(
        "st_dwithin",
        Some(
            Documentation::builder(
                DOC_SECTION_OTHER,
                "Return true if geomA and geomB are within distance of each other.",
                "ST_DWithin (geomA: Geometry, geomB: Geometry, distance: Double)",
            )
            .with_argument("geomA", "geometry: Input geometry")
            .with_argument("geomB", "geometry: Input geometry")
            .with_argument("distance", "double: Distance in the units of the CRS")
            .with_sql_example(
                "SELECT ST_DWithin(ST_GeomFromWKT('POINT (0 0)'), ST_GeomFromWKT('POINT (3 4)'), 5.0)",
            )
            .build(),
        ),
    )
}
