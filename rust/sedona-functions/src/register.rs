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

use sedona_crs::CrsRegistry;
use sedona_expr::function_set::FunctionSet;

/// Export the set of functions defined in this crate
///
/// Functions that resolve CRS identifiers use the global registry.
pub fn default_function_set() -> FunctionSet {
    function_set_with_registry(CrsRegistry::global())
}

/// Export the set of functions defined in this crate using `registry`
///
/// Relation and distance predicates are registered without kernels.
pub fn function_set_with_registry(registry: Arc<CrsRegistry>) -> FunctionSet {
    let mut function_set = FunctionSet::new();

    macro_rules! register_scalar_udfs {
        ($function_set:expr, $($udf:expr),* $(,)?) => {
            $(
                $function_set.insert_scalar_udf($udf());
            )*
        };
    }

    macro_rules! register_registry_udfs {
        ($function_set:expr, $registry:expr, $($udf:expr),* $(,)?) => {
            $(
                $function_set.insert_scalar_udf($udf($registry.clone()));
            )*
        };
    }

    register_scalar_udfs!(
        function_set,
        crate::distance::st_distance_udf,
        crate::distance::st_dwithin_udf,
        crate::st_astext::st_astext_udf,
        crate::st_geomfromwkt::st_geogfromwkt_udf,
        crate::st_knn::st_knn_udf,
        crate::st_srid::st_crs_udf,
        crate::st_srid::st_srid_udf,
    );

    register_registry_udfs!(
        function_set,
        registry,
        crate::st_geomfromwkt::st_geomfromwkt_with_registry_udf,
        crate::st_setsrid::st_set_crs_with_registry_udf,
        crate::st_setsrid::st_set_srid_with_registry_udf,
        crate::st_transform::st_transform_with_registry_udf,
    );

    for udf in crate::predicates::predicate_stub_udfs() {
        function_set.insert_scalar_udf(udf);
    }

    function_set
}
