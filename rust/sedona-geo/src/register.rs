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
use datafusion_common::Result;
use sedona_expr::function_set::FunctionSet;
use sedona_expr::scalar_udf::{IntoScalarKernelRefs, ScalarKernelRef};
use sedona_geometry::spatial_relation::SpatialRelationType;

macro_rules! define_scalar_kernels {
    ($($name:expr => $impl:expr),* $(,)?) => {
        vec![
            $(
                ($name, $impl().into_scalar_kernel_refs()),
            )*
        ]
    };
}

/// Kernels provided by this crate keyed by the function they implement
pub fn scalar_kernels() -> Vec<(&'static str, Vec<ScalarKernelRef>)> {
    let mut kernels = define_scalar_kernels!(
        "st_distance" => crate::st_distance::st_distance_impl,
        "st_distance" => crate::st_distance::st_distance_geography_impl,
        "st_dwithin" => crate::st_dwithin::st_dwithin_impl,
        "st_dwithin" => crate::st_dwithin::st_dwithin_geography_impl,
    );

    for relation in SpatialRelationType::ALL {
        kernels.push((
            relation.function_name(),
            crate::st_predicates::st_relation_impl(relation).into_scalar_kernel_refs(),
        ));
    }

    kernels
}

/// Add this crate's kernels to the functions declared in `function_set`
///
/// Every function must already be declared (usually as a stub).
pub fn register_kernels(function_set: &mut FunctionSet) -> Result<()> {
    for (name, kernels) in scalar_kernels() {
        function_set.add_scalar_udf_kernels(name, kernels)?;
    }

    Ok(())
}
