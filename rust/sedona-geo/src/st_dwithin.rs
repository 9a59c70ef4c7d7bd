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

use arrow_array::{builder::BooleanBuilder, Array};
use arrow_schema::DataType;
use datafusion_common::{cast::as_float64_array, error::Result};
use datafusion_expr::ColumnarValue;
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel};
use sedona_functions::executor::WkbExecutor;
use sedona_schema::{datatypes::SedonaType, matchers::ArgMatcher};

use crate::st_distance::DistanceMetric;

/// ST_DWithin() for geometries: planar distance in CRS units
pub fn st_dwithin_impl() -> ScalarKernelRef {
    Arc::new(STDWithin {
        metric: DistanceMetric::Planar,
    })
}

/// ST_DWithin() for geographies: distance in meters
pub fn st_dwithin_geography_impl() -> ScalarKernelRef {
    Arc::new(STDWithin {
        metric: DistanceMetric::Spheroid,
    })
}

#[derive(Debug)]
struct STDWithin {
    metric: DistanceMetric,
}

impl SedonaScalarKernel for STDWithin {
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        let matcher = ArgMatcher::new(
            vec![
                self.metric.arg_matcher(),
                self.metric.arg_matcher(),
                ArgMatcher::is_numeric(),
            ],
            SedonaType::Arrow(DataType::Boolean),
        );

        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = WkbExecutor::new(arg_types, args);

        // The bound may be a literal or vary per row
        let bounds = args[2]
            .cast_to(&DataType::Float64, None)?
            .into_array(executor.num_iterations())?;
        let bounds = as_float64_array(&bounds)?;

        let mut builder = BooleanBuilder::with_capacity(executor.num_iterations());
        let mut row = 0;
        executor.execute_wkb_wkb_void(|maybe_wkb0, maybe_wkb1| {
            let bound = bounds.is_valid(row).then(|| bounds.value(row));
            row += 1;

            match (maybe_wkb0, maybe_wkb1, bound) {
                (Some(wkb0), Some(wkb1), Some(bound)) => {
                    // An empty argument is never within any distance
                    let within = self
                        .metric
                        .distance(wkb0, wkb1)?
                        .is_some_and(|distance| distance <= bound);
                    builder.append_value(within);
                }
                _ => builder.append_null(),
            }

            Ok(())
        })?;

        executor.finish(Arc::new(builder.finish()))
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{create_array, ArrayRef};
    use datafusion_common::scalar::ScalarValue;
    use rstest::rstest;
    use sedona_expr::scalar_udf::SedonaScalarUDF;
    use sedona_schema::datatypes::{WKB_GEOGRAPHY, WKB_GEOMETRY, WKB_VIEW_GEOMETRY};
    use sedona_testing::{
        compare::assert_array_equal, create::create_array as create_wkb_array,
        create::create_scalar, testers::ScalarUdfTester,
    };

    use super::*;

    fn udf() -> SedonaScalarUDF {
        let mut udf = SedonaScalarUDF::from_kernel("st_dwithin", st_dwithin_impl());
        udf.add_kernels(st_dwithin_geography_impl());
        udf
    }

    #[rstest]
    fn literal_bound(
        #[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY)] left_type: SedonaType,
        #[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY)] right_type: SedonaType,
    ) {
        let tester = ScalarUdfTester::new(
            udf(),
            vec![
                left_type.clone(),
                right_type.clone(),
                SedonaType::Arrow(DataType::Float64),
            ],
        );
        tester.assert_return_type(DataType::Boolean);

        let origin = create_scalar(Some("POINT (0 0)"), &left_type);
        let point = create_scalar(Some("POINT (3 4)"), &right_type);
        let empty = create_scalar(Some("POINT EMPTY"), &right_type);

        for (lhs, rhs, bound, expected) in [
            (&origin, &point, Some(5.0), Some(true)),
            (&origin, &point, Some(4.999), Some(false)),
            (&origin, &point, Some(-1.0), Some(false)),
            (&origin, &empty, Some(5.0), Some(false)),
            (&origin, &point, None, None),
        ] {
            let result = tester
                .invoke_scalar_scalar_scalar(lhs.clone(), rhs.clone(), ScalarValue::Float64(bound))
                .unwrap();
            assert_eq!(result, ScalarValue::Boolean(expected), "{bound:?}");
        }

        let result = tester
            .invoke_scalar_scalar_scalar(ScalarValue::Null, point, ScalarValue::Float64(Some(5.0)))
            .unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn per_row_bound() {
        let tester = ScalarUdfTester::new(
            udf(),
            vec![WKB_GEOMETRY, WKB_GEOMETRY, SedonaType::Arrow(DataType::Int32)],
        );

        let lhs = create_wkb_array(
            &[Some("POINT (0 0)"), Some("POINT (0 0)"), Some("POINT (0 0)")],
            &WKB_GEOMETRY,
        );
        let rhs = create_wkb_array(
            &[Some("POINT (0 2)"), Some("POINT (0 2)"), Some("POINT (0 2)")],
            &WKB_GEOMETRY,
        );
        let bounds: ArrayRef = create_array!(Int32, [Some(1), Some(2), None]);

        let expected: ArrayRef = create_array!(Boolean, [Some(false), Some(true), None]);
        let result = tester.invoke_arrays(vec![lhs, rhs, bounds]).unwrap();
        assert_array_equal(&result, &expected);
    }

    #[test]
    fn geography_meters() {
        let tester = ScalarUdfTester::new(
            udf(),
            vec![
                WKB_GEOGRAPHY,
                WKB_GEOGRAPHY,
                SedonaType::Arrow(DataType::Float64),
            ],
        );

        let lhs = create_scalar(Some("POINT (0 0)"), &WKB_GEOGRAPHY);
        let rhs = create_scalar(Some("POINT (0 1)"), &WKB_GEOGRAPHY);
        let near = tester
            .invoke_scalar_scalar_scalar(lhs.clone(), rhs.clone(), ScalarValue::Float64(Some(112_000.0)))
            .unwrap();
        assert_eq!(near, ScalarValue::Boolean(Some(true)));

        let far = tester
            .invoke_scalar_scalar_scalar(lhs, rhs, ScalarValue::Float64(Some(100_000.0)))
            .unwrap();
        assert_eq!(far, ScalarValue::Boolean(Some(false)));
    }
}
