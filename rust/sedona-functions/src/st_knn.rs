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

use std::sync::Arc;

use arrow_schema::DataType;
use datafusion_common::plan_err;
use datafusion_expr::{scalar_doc_sections::DOC_SECTION_OTHER, Documentation, Volatility};
use sedona_expr::scalar_udf::{SedonaScalarUDF, SimpleSedonaScalarKernel};
use sedona_schema::{datatypes::SedonaType, matchers::ArgMatcher};

/// ST_KNN() scalar UDF stub
///
/// This is a stub function that defines the signature and documentation for ST_KNN
/// but does not contain an actual implementation. The k-nearest neighbors search
/// is carried out by the spatial join when ST_KNN() appears as a join condition.
/// Binding still applies the CRS compatibility rule to the two geometries.
pub fn st_knn_udf() -> SedonaScalarUDF {
    let stub_impl = SimpleSedonaScalarKernel::new_ref(
        ArgMatcher::new(
            vec![
                ArgMatcher::is_geometry_or_geography(),
                ArgMatcher::is_geometry_or_geography(),
                ArgMatcher::is_integer(),
                ArgMatcher::optional(ArgMatcher::is_boolean()),
            ],
            SedonaType::Arrow(DataType::Boolean),
        ),
        Arc::new(|_arg_types, _args| plan_err!("Can't execute ST_KNN() outside a spatial join")),
    );
    SedonaScalarUDF::new(
        "st_knn",
        stub_impl,
        Volatility::Immutable,
        Some(st_knn_doc()),
    )
}

fn st_knn_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Join condition matching each left geometry with its k nearest right geometries.",
        "ST_KNN (left: Geometry, right: Geometry, k: Integer [, use_spheroid: Boolean])",
    )
    .with_argument("left", "geometry: Probe side geometry")
    .with_argument("right", "geometry: Geometry searched for neighbors")
    .with_argument("k", "integer: Number of neighbors to return")
    .with_argument(
        "use_spheroid",
        "boolean (optional): Use great-circle distance on lon/lat coordinates",
    )
    .with_sql_example(
        "SELECT * FROM a JOIN b ON ST_KNN(a.geom, b.geom, 3, false)".to_string(),
    )
    .build()
}
