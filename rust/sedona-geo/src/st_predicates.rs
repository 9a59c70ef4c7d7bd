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

use arrow_array::builder::BooleanBuilder;
use arrow_schema::DataType;
use datafusion_common::error::Result;
use datafusion_expr::ColumnarValue;
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel};
use sedona_functions::executor::WkbExecutor;
use sedona_geometry::{decode::geometry_from_wkb_item, spatial_relation::SpatialRelationType};
use sedona_schema::{datatypes::SedonaType, matchers::ArgMatcher};

use crate::predicate::evaluate_relation;

/// Relation predicate kernel (e.g., ST_Intersects()) evaluated with geo
pub fn st_relation_impl(relation: SpatialRelationType) -> ScalarKernelRef {
    Arc::new(STRelation { relation })
}

#[derive(Debug)]
struct STRelation {
    relation: SpatialRelationType,
}

impl SedonaScalarKernel for STRelation {
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_geometry(), ArgMatcher::is_geometry()],
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
        let mut builder = BooleanBuilder::with_capacity(executor.num_iterations());
        executor.execute_wkb_wkb_void(|maybe_wkb0, maybe_wkb1| {
            match (maybe_wkb0, maybe_wkb1) {
                (Some(wkb0), Some(wkb1)) => {
                    let geom0 = geometry_from_wkb_item(wkb0)?;
                    let geom1 = geometry_from_wkb_item(wkb1)?;
                    builder.append_value(evaluate_relation(
                        self.relation,
                        geom0.as_ref(),
                        geom1.as_ref(),
                    ));
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
    use sedona_common::SpatialError;
    use sedona_expr::scalar_udf::SedonaScalarUDF;
    use sedona_schema::crs::{lnglat, CrsIdentifier};
    use sedona_schema::datatypes::{WKB_GEOGRAPHY, WKB_GEOMETRY, WKB_VIEW_GEOMETRY};
    use sedona_testing::{
        compare::assert_array_equal, create::create_array as create_geo_array,
        testers::ScalarUdfTester,
    };

    use super::*;

    fn udf(relation: SpatialRelationType) -> SedonaScalarUDF {
        SedonaScalarUDF::from_kernel(relation.function_name(), st_relation_impl(relation))
    }

    #[rstest]
    fn intersects(
        #[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY)] left_type: SedonaType,
        #[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY)] right_type: SedonaType,
    ) {
        let tester = ScalarUdfTester::new(
            udf(SpatialRelationType::Intersects),
            vec![left_type.clone(), right_type.clone()],
        );
        tester.assert_return_type(DataType::Boolean);

        let result = tester
            .invoke_scalar_scalar("POINT (0.25 0.25)", "POLYGON ((0 0, 1 0, 0 1, 0 0))")
            .unwrap();
        tester.assert_scalar_result_equals(result, ScalarValue::Boolean(Some(true)));

        let result = tester
            .invoke_scalar_scalar(ScalarValue::Null, "POINT (0 0)")
            .unwrap();
        assert!(result.is_null());

        let lhs = create_geo_array(
            &[Some("POINT (0.25 0.25)"), Some("POINT (10 10)"), None, Some("POINT EMPTY")],
            &left_type,
        );
        let rhs = create_geo_array(
            &[
                Some("POLYGON ((0 0, 1 0, 0 1, 0 0))"),
                Some("POLYGON ((0 0, 1 0, 0 1, 0 0))"),
                Some("POINT (0 0)"),
                Some("POINT (0 0)"),
            ],
            &right_type,
        );
        let expected: ArrayRef = create_array!(Boolean, [Some(true), Some(false), None, Some(false)]);
        assert_array_equal(&tester.invoke_arrays(vec![lhs, rhs]).unwrap(), &expected);
    }

    #[rstest]
    #[case(SpatialRelationType::Contains, false)]
    #[case(SpatialRelationType::Within, true)]
    #[case(SpatialRelationType::Covers, false)]
    #[case(SpatialRelationType::CoveredBy, true)]
    #[case(SpatialRelationType::Touches, false)]
    #[case(SpatialRelationType::Crosses, false)]
    #[case(SpatialRelationType::Overlaps, false)]
    #[case(SpatialRelationType::Equals, false)]
    #[case(SpatialRelationType::Disjoint, false)]
    fn point_in_polygon(#[case] relation: SpatialRelationType, #[case] expected: bool) {
        let tester = ScalarUdfTester::new(udf(relation), vec![WKB_GEOMETRY, WKB_GEOMETRY]);
        let result = tester
            .invoke_scalar_scalar("POINT (0.25 0.25)", "POLYGON ((0 0, 1 0, 0 1, 0 0))")
            .unwrap();
        assert_eq!(result, ScalarValue::Boolean(Some(expected)));
    }

    #[test]
    fn mismatched_crs() {
        let tester = ScalarUdfTester::new(
            udf(SpatialRelationType::Intersects),
            vec![
                WKB_GEOMETRY.with_crs(Some(CrsIdentifier::epsg(3857))).unwrap(),
                WKB_GEOMETRY.with_crs(Some(CrsIdentifier::epsg(4326))).unwrap(),
            ],
        );
        let err = tester.return_type().unwrap_err();
        let spatial_err = SpatialError::find(&err).unwrap();
        assert_eq!(
            spatial_err,
            &SpatialError::MismatchedCrs("epsg:3857".to_string(), "epsg:4326".to_string())
        );
        assert_eq!(spatial_err.category(), "type_coercion");
        assert!(err
            .to_string()
            .contains("Mismatched CRS arguments: epsg:3857 vs epsg:4326"));

        // ogc:crs84 and epsg:4326 are distinct in the standard registry
        let tester = ScalarUdfTester::new(
            udf(SpatialRelationType::Intersects),
            vec![
                WKB_GEOMETRY.with_crs(lnglat()).unwrap(),
                WKB_GEOMETRY.with_crs(Some(CrsIdentifier::epsg(4326))).unwrap(),
            ],
        );
        assert!(tester.return_type().is_err());
    }

    #[test]
    fn compatible_crs() {
        let epsg_4326 = WKB_GEOMETRY.with_crs(Some(CrsIdentifier::epsg(4326))).unwrap();
        let tester = ScalarUdfTester::new(
            udf(SpatialRelationType::Contains),
            vec![epsg_4326.clone(), epsg_4326],
        );
        tester.assert_return_type(DataType::Boolean);

        // Untagged arguments bind against tagged ones
        let tester = ScalarUdfTester::new(
            udf(SpatialRelationType::Contains),
            vec![WKB_GEOMETRY.with_crs(Some(CrsIdentifier::epsg(4326))).unwrap(), WKB_GEOMETRY],
        );
        tester.assert_return_type(DataType::Boolean);
    }

    #[test]
    fn malformed_geometry() {
        let tester = ScalarUdfTester::new(
            udf(SpatialRelationType::Intersects),
            vec![WKB_GEOMETRY, WKB_GEOMETRY],
        );
        let err = tester
            .invoke_scalar_scalar(ScalarValue::Binary(Some(vec![0x01, 0x01])), "POINT (0 0)")
            .unwrap_err();
        assert!(matches!(
            SpatialError::find(&err),
            Some(SpatialError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn geography_not_supported() {
        let tester = ScalarUdfTester::new(
            udf(SpatialRelationType::Intersects),
            vec![WKB_GEOGRAPHY, WKB_GEOGRAPHY],
        );
        assert!(tester.return_type().is_err());
    }
}
