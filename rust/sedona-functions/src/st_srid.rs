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

use arrow_array::builder::{StringBuilder, UInt32Builder};
use arrow_schema::DataType;
use datafusion_common::Result;
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility,
};
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel, SedonaScalarUDF};
use sedona_schema::{datatypes::SedonaType, matchers::ArgMatcher};

use crate::executor::WkbExecutor;

/// ST_SRID() scalar UDF implementation
///
/// Returns the EPSG code of the argument's CRS, or 0 if the argument has no
/// CRS or a CRS outside the EPSG authority.
pub fn st_srid_udf() -> SedonaScalarUDF {
    SedonaScalarUDF::new(
        "st_srid",
        vec![Arc::new(STSRID {}) as ScalarKernelRef],
        Volatility::Immutable,
        Some(st_srid_doc()),
    )
}

/// ST_CRS() scalar UDF implementation
///
/// Returns the canonical `authority:code` of the argument's CRS or NULL.
pub fn st_crs_udf() -> SedonaScalarUDF {
    SedonaScalarUDF::new(
        "st_crs",
        vec![Arc::new(STCRS {}) as ScalarKernelRef],
        Volatility::Immutable,
        Some(st_crs_doc()),
    )
}

fn st_srid_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return the spatial reference system identifier (SRID) of the geometry.",
        "ST_SRID (geom: Geometry)",
    )
    .with_argument("geom", "geometry: Input geometry or geography")
    .with_sql_example("SELECT ST_SRID(ST_GeomFromWKT('POINT (0 1)', 4326))".to_string())
    .build()
}

fn st_crs_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Return the coordinate reference system (CRS) of the geometry.",
        "ST_CRS (geom: Geometry)",
    )
    .with_argument("geom", "geometry: Input geometry or geography")
    .with_sql_example("SELECT ST_CRS(ST_GeomFromWKT('POINT (0 1)', 4326))".to_string())
    .build()
}

#[derive(Debug)]
struct STSRID {}

impl SedonaScalarKernel for STSRID {
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_geometry_or_geography()],
            SedonaType::Arrow(DataType::UInt32),
        );

        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = WkbExecutor::new(arg_types, args);
        let mut builder = UInt32Builder::with_capacity(executor.num_iterations());
        let srid = match arg_types[0].crs() {
            Some(Some(crs)) => crs.srid().unwrap_or(0),
            _ => 0,
        };

        executor.execute_binary_void(|maybe_bytes| {
            match maybe_bytes {
                Some(_) => builder.append_value(srid),
                None => builder.append_null(),
            }
            Ok(())
        })?;

        executor.finish(Arc::new(builder.finish()))
    }
}

#[derive(Debug)]
struct STCRS {}

impl SedonaScalarKernel for STCRS {
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
        let mut builder = StringBuilder::with_capacity(executor.num_iterations(), 0);
        let crs_string = match arg_types[0].crs() {
            Some(Some(crs)) => Some(crs.to_string()),
            _ => None,
        };

        executor.execute_binary_void(|maybe_bytes| {
            match (maybe_bytes, &crs_string) {
                (Some(_), Some(crs_string)) => builder.append_value(crs_string),
                _ => builder.append_null(),
            }
            Ok(())
        })?;

        executor.finish(Arc::new(builder.finish()))
    }
}

#[cfg(test)]
mod test {
    use arrow_array::{create_array, ArrayRef};
    use datafusion_common::ScalarValue;
    use rstest::rstest;
    use sedona_schema::crs::{lnglat, CrsIdentifier};
    use sedona_schema::datatypes::{WKB_GEOGRAPHY, WKB_GEOMETRY, WKB_VIEW_GEOMETRY};
    use sedona_testing::{compare::assert_array_equal, testers::ScalarUdfTester};

    use super::*;

    #[test]
    fn udf_metadata() {
        let udf = st_srid_udf();
        assert_eq!(udf.name(), "st_srid");
        assert!(udf.documentation().is_some());

        let udf = st_crs_udf();
        assert_eq!(udf.name(), "st_crs");
        assert!(udf.documentation().is_some());
    }

    #[rstest]
    fn srid(#[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY, WKB_GEOGRAPHY)] base: SedonaType) {
        let tester = ScalarUdfTester::new(st_srid_udf(), vec![base.clone()]);
        tester.assert_return_type(DataType::UInt32);

        let expected: ArrayRef = create_array!(UInt32, [None, Some(0)]);
        let result = tester.invoke_wkb_array(vec![None, Some("POINT (0 1)")]).unwrap();
        assert_array_equal(&result, &expected);

        let tester = ScalarUdfTester::new(
            st_srid_udf(),
            vec![base.with_crs(Some(CrsIdentifier::epsg(3857))).unwrap()],
        );
        let expected: ArrayRef = create_array!(UInt32, [None, Some(3857)]);
        let result = tester.invoke_wkb_array(vec![None, Some("POINT (0 1)")]).unwrap();
        assert_array_equal(&result, &expected);

        // A CRS outside the EPSG authority has no SRID
        let tester = ScalarUdfTester::new(st_srid_udf(), vec![base.with_crs(lnglat()).unwrap()]);
        let result = tester.invoke_wkb_scalar(Some("POINT (0 1)")).unwrap();
        assert_eq!(result, ScalarValue::UInt32(Some(0)));
    }

    #[rstest]
    fn crs(#[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY)] base: SedonaType) {
        let tester = ScalarUdfTester::new(st_crs_udf(), vec![base.clone()]);
        tester.assert_return_type(DataType::Utf8);
        let result = tester.invoke_wkb_scalar(Some("POINT (0 1)")).unwrap();
        assert_eq!(result, ScalarValue::Utf8(None));

        let tester = ScalarUdfTester::new(
            st_crs_udf(),
            vec![base.with_crs(Some(CrsIdentifier::epsg(4326))).unwrap()],
        );
        let expected: ArrayRef = create_array!(Utf8, [Some("epsg:4326"), None]);
        let result = tester.invoke_wkb_array(vec![Some("POINT (0 1)"), None]).unwrap();
        assert_array_equal(&result, &expected);

        let tester = ScalarUdfTester::new(st_crs_udf(), vec![base.with_crs(lnglat()).unwrap()]);
        let result = tester.invoke_wkb_scalar(Some("POINT (0 1)")).unwrap();
        assert_eq!(result, ScalarValue::Utf8(Some("ogc:crs84".to_string())));
    }

    #[test]
    fn non_geometry_input() {
        let tester = ScalarUdfTester::new(st_srid_udf(), vec![SedonaType::Arrow(DataType::Int32)]);
        assert!(tester.return_type().is_err());
    }
}
