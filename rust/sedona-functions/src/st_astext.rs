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

use arrow_array::builder::StringBuilder;
use arrow_schema::DataType;
use datafusion_common::{exec_datafusion_err, Result};
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility,
};
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel, SedonaScalarUDF};
use sedona_schema::{datatypes::SedonaType, matchers::ArgMatcher};

use crate::executor::WkbExecutor;

/// ST_AsText() scalar UDF implementation
///
/// Renders geometries as Well-Known Text using GeoRust's wkt crate.
pub fn st_astext_udf() -> SedonaScalarUDF {
    SedonaScalarUDF::new(
        "st_astext",
        vec![Arc::new(STAsText {}) as ScalarKernelRef],
        Volatility::Immutable,
        Some(st_astext_doc()),
    )
    .with_aliases(vec!["st_aswkt".to_string()])
}

fn st_astext_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return the Well-Known Text (WKT) representation of a geometry or geography.",
        "ST_AsText (geom: Geometry)",
    )
    .with_argument("geom", "geometry: Input geometry or geography")
    .with_sql_example("SELECT ST_AsText(ST_GeomFromWKT('POINT (1 2)'))".to_string())
    .build()
}

#[derive(Debug)]
struct STAsText {}

impl SedonaScalarKernel for STAsText {
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_geometry_or_geography()],
            SedonaType::Arrow(DataType::Utf8),
        );
        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = WkbExecutor::new(arg_types, args);
        let mut builder = StringBuilder::with_capacity(
            executor.num_iterations(),
            executor.num_iterations() * 32,
        );

        executor.execute_wkb_void(|maybe_item| {
            match maybe_item {
                Some(item) => {
                    wkt::to_wkt::write_geometry(&mut builder, &item)
                        .map_err(|err| exec_datafusion_err!("WKT write error: {err}"))?;
                    builder.append_value("");
                }
                None => builder.append_null(),
            }
            Ok(())
        })?;

        executor.finish(Arc::new(builder.finish()))
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{create_array, ArrayRef};
    use datafusion_common::ScalarValue;
    use rstest::rstest;
    use sedona_schema::crs::CrsIdentifier;
    use sedona_schema::datatypes::{WKB_GEOGRAPHY, WKB_GEOMETRY, WKB_VIEW_GEOMETRY};
    use sedona_testing::{compare::assert_array_equal, testers::ScalarUdfTester};

    use super::*;

    #[test]
    fn udf_metadata() {
        let udf = st_astext_udf();
        assert_eq!(udf.name(), "st_astext");
        assert!(udf.documentation().is_some());
    }

    #[rstest]
    fn as_text(#[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY, WKB_GEOGRAPHY)] sedona_type: SedonaType) {
        let tester = ScalarUdfTester::new(st_astext_udf(), vec![sedona_type]);
        tester.assert_return_type(DataType::Utf8);

        let result = tester.invoke_wkb_scalar(Some("POINT (1 2)")).unwrap();
        assert_eq!(result, ScalarValue::Utf8(Some("POINT(1 2)".to_string())));

        let result = tester.invoke_wkb_scalar(None).unwrap();
        assert_eq!(result, ScalarValue::Utf8(None));

        let expected: ArrayRef = create_array!(
            Utf8,
            [
                Some("LINESTRING(0 0,1 1)"),
                None,
                Some("POLYGON((0 0,1 0,1 1,0 0))")
            ]
        );
        let result = tester
            .invoke_wkb_array(vec![
                Some("LINESTRING (0 0, 1 1)"),
                None,
                Some("POLYGON ((0 0, 1 0, 1 1, 0 0))"),
            ])
            .unwrap();
        assert_array_equal(&result, &expected);
    }

    #[test]
    fn crs_does_not_change_text() {
        let tester = ScalarUdfTester::new(
            st_astext_udf(),
            vec![WKB_GEOMETRY.with_crs(Some(CrsIdentifier::epsg(4326))).unwrap()],
        );
        let result = tester.invoke_wkb_scalar(Some("POINT (-74.006 40.7128)")).unwrap();
        assert_eq!(
            result,
            ScalarValue::Utf8(Some("POINT(-74.006 40.7128)".to_string()))
        );
    }

    #[test]
    fn malformed_input() {
        let tester = ScalarUdfTester::new(st_astext_udf(), vec![WKB_GEOMETRY]);
        let err = tester
            .invoke_scalar(ScalarValue::Binary(Some(vec![0x01, 0xff])))
            .unwrap_err();
        assert!(matches!(
            sedona_common::SpatialError::find(&err),
            Some(sedona_common::SpatialError::MalformedGeometry(_))
        ));
    }
}
