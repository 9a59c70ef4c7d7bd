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

use arrow_array::builder::Float64Builder;
use arrow_schema::DataType;
use datafusion_common::error::Result;
use datafusion_expr::ColumnarValue;
use geo_types::Geometry;
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel};
use sedona_functions::executor::WkbExecutor;
use sedona_geometry::decode::geometry_from_wkb_item;
use sedona_schema::{
    datatypes::SedonaType,
    matchers::{ArgMatcher, TypeMatcher},
};
use wkb::reader::Wkb;

use crate::predicate::{planar_distance, spheroid_distance};

/// How distances between two arguments are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DistanceMetric {
    /// Euclidean distance in the units of the CRS (geometry arguments)
    Planar,
    /// Meters along the WGS84 surface (geography arguments)
    Spheroid,
}

impl DistanceMetric {
    pub(crate) fn arg_matcher(&self) -> Arc<dyn TypeMatcher + Send + Sync> {
        match self {
            DistanceMetric::Planar => ArgMatcher::is_geometry(),
            DistanceMetric::Spheroid => ArgMatcher::is_geography(),
        }
    }

    fn measure(&self, a: Option<&Geometry<f64>>, b: Option<&Geometry<f64>>) -> Option<f64> {
        match self {
            DistanceMetric::Planar => planar_distance(a, b),
            DistanceMetric::Spheroid => spheroid_distance(a, b),
        }
    }

    /// Distance between two decoded WKB items; `None` if either is empty
    pub(crate) fn distance(&self, a: &Wkb, b: &Wkb) -> Result<Option<f64>> {
        let a = geometry_from_wkb_item(a)?;
        let b = geometry_from_wkb_item(b)?;
        Ok(self.measure(a.as_ref(), b.as_ref()))
    }
}

/// ST_Distance() for geometries using [geo::Euclidean] distance
///
/// Distances involving an empty geometry are NULL.
pub fn st_distance_impl() -> ScalarKernelRef {
    Arc::new(STDistance {
        metric: DistanceMetric::Planar,
    })
}

/// ST_Distance() for geographies in meters
pub fn st_distance_geography_impl() -> ScalarKernelRef {
    Arc::new(STDistance {
        metric: DistanceMetric::Spheroid,
    })
}

#[derive(Debug)]
struct STDistance {
    metric: DistanceMetric,
}

impl SedonaScalarKernel for STDistance {
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        let matcher = ArgMatcher::new(
            vec![self.metric.arg_matcher(), self.metric.arg_matcher()],
            SedonaType::Arrow(DataType::Float64),
        );

        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = WkbExecutor::new(arg_types, args);
        let mut builder = Float64Builder::with_capacity(executor.num_iterations());
        executor.execute_wkb_wkb_void(|maybe_wkb0, maybe_wkb1| {
            match (maybe_wkb0, maybe_wkb1) {
                (Some(wkb0), Some(wkb1)) => {
                    builder.append_option(self.metric.distance(wkb0, wkb1)?);
                }
                _ => builder.append_null(),
            }

            Ok(())
        })?;

        executor.finish(Arc::new(builder.finish()))
    }
}
