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
use std::{str::FromStr, sync::Arc};

use arrow_array::builder::BinaryBuilder;
use arrow_schema::DataType;
use datafusion_common::cast::as_string_view_array;
use datafusion_common::error::Result;
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility,
};
use sedona_common::SpatialError;
use sedona_crs::CrsRegistry;
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel, SedonaScalarUDF};
use sedona_geometry::wkb_factory::{write_wkb_geometry, WKB_MIN_PROBABLE_BYTES};
use sedona_schema::{
    datatypes::{SedonaType, WKB_GEOGRAPHY, WKB_GEOMETRY},
    matchers::ArgMatcher,
};
use wkt::Wkt;

use crate::executor::WkbExecutor;
use crate::st_setsrid::SRIDifiedKernel;

/// ST_GeomFromWKT() UDF implementation
///
/// An implementation of WKT reading using GeoRust's wkt crate. The optional
/// second argument assigns a CRS using the global [CrsRegistry].
pub fn st_geomfromwkt_udf() -> SedonaScalarUDF {
    st_geomfromwkt_with_registry_udf(CrsRegistry::global())
}

/// ST_GeomFromWKT() resolving the optional SRID argument with `registry`
pub fn st_geomfromwkt_with_registry_udf(registry: Arc<CrsRegistry>) -> SedonaScalarUDF {
    let kernel: ScalarKernelRef = Arc::new(STGeoFromWKT {
        out_type: WKB_GEOMETRY,
    });
    let sridified_kernel: ScalarKernelRef = Arc::new(SRIDifiedKernel::new(kernel.clone(), registry));

    let udf = SedonaScalarUDF::new(
        "st_geomfromwkt",
        vec![kernel, sridified_kernel],
        Volatility::Immutable,
        Some(st_geomfromwkt_doc()),
    );
    udf.with_aliases(vec![
        "st_geomfromtext".to_string(),
        "st_geometryfromtext".to_string(),
    ])
}

/// ST_GeogFromWKT() UDF implementation
///
/// Same as [st_geomfromwkt_udf] but producing spherical-edged geographies.
pub fn st_geogfromwkt_udf() -> SedonaScalarUDF {
    let udf = SedonaScalarUDF::new(
        "st_geogfromwkt",
        vec![Arc::new(STGeoFromWKT {
            out_type: WKB_GEOGRAPHY,
        }) as ScalarKernelRef],
        Volatility::Immutable,
        None,
    );
    udf.with_aliases(vec!["st_geogfromtext".to_string()])
}

fn st_geomfromwkt_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Construct a Geometry from Well-Known Text (WKT).",
        "ST_GeomFromWKT (wkt: String [, srid: Integer])",
    )
    .with_argument("wkt", "string: Well-Known Text representation of the geometry")
    .with_argument(
        "srid",
        "integer or string (optional): SRID or CRS identifier of the result",
    )
    .with_sql_example("SELECT ST_GeomFromWKT('POINT (-74.006 40.7128)', 4326)".to_string())
    .build()
}

#[derive(Debug)]
struct STGeoFromWKT {
    out_type: SedonaType,
}

impl SedonaScalarKernel for STGeoFromWKT {
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        let matcher = ArgMatcher::new(vec![ArgMatcher::is_string()], self.out_type.clone());
        matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        let executor = WkbExecutor::new(arg_types, args);
        let arg_array = args[0]
            .cast_to(&DataType::Utf8View, None)?
            .to_array(executor.num_iterations())?;

        let mut builder = BinaryBuilder::with_capacity(
            executor.num_iterations(),
            WKB_MIN_PROBABLE_BYTES * executor.num_iterations(),
        );

        for item in as_string_view_array(&arg_array)? {
            if let Some(wkt_str) = item {
                invoke_scalar(wkt_str, &mut builder)?;
                builder.append_value(b"");
            } else {
                builder.append_null();
            }
        }

        executor.finish(Arc::new(builder.finish()))
    }
}

fn invoke_scalar(wkt_str: &str, builder: &mut BinaryBuilder) -> Result<()> {
    let geometry: Wkt<f64> = Wkt::from_str(wkt_str)
        .map_err(|err| SpatialError::MalformedGeometry(format!("WKT parse error: {err}")))?;
    write_wkb_geometry(builder, &geometry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use arrow_array::{ArrayRef, StringArray};
    use datafusion_common::ScalarValue;
    use rstest::rstest;
    use sedona_schema::crs::CrsIdentifier;
    use sedona_testing::{
        compare::assert_array_equal, create::create_array, testers::ScalarUdfTester,
    };

    use super::*;

    fn utf8() -> SedonaType {
        SedonaType::Arrow(DataType::Utf8)
    }

    #[test]
    fn udf_metadata() {
        let udf = st_geomfromwkt_udf();
        assert_eq!(udf.name(), "st_geomfromwkt");
        assert_eq!(
            udf.aliases(),
            &["st_geomfromtext".to_string(), "st_geometryfromtext".to_string()]
        );
        assert!(udf.documentation().is_some());
    }

    #[rstest]
    fn from_wkt(
        #[values(DataType::Utf8, DataType::Utf8View, DataType::LargeUtf8)] data_type: DataType,
    ) {
        let tester = ScalarUdfTester::new(
            st_geomfromwkt_udf(),
            vec![SedonaType::Arrow(data_type.clone())],
        );
        tester.assert_return_type(WKB_GEOMETRY);

        let result = tester.invoke_scalar("POINT (1 2)").unwrap();
        tester.assert_scalar_result_equals(result, "POINT (1 2)");

        let input = ScalarValue::Utf8(None).cast_to(&data_type).unwrap();
        let result = tester.invoke_scalar(input).unwrap();
        assert!(result.is_null());

        let wkt = vec![Some("POINT (1 2)"), None, Some("LINESTRING (0 0, 1 1)")];
        let input: ArrayRef = Arc::new(StringArray::from(wkt.clone()));
        let input = ColumnarValue::Array(input)
            .cast_to(&data_type, None)
            .unwrap()
            .to_array(wkt.len())
            .unwrap();
        let result = tester.invoke_array(input).unwrap();
        assert_array_equal(&result, &create_array(&wkt, &WKB_GEOMETRY));
    }

    #[test]
    fn malformed_wkt() {
        let tester = ScalarUdfTester::new(st_geomfromwkt_udf(), vec![utf8()]);
        let err = tester.invoke_scalar("POINT (1").unwrap_err();
        assert!(matches!(
            SpatialError::find(&err),
            Some(SpatialError::MalformedGeometry(_))
        ));
    }

    #[rstest]
    #[case(ScalarValue::Int64(Some(4326)), Some(CrsIdentifier::epsg(4326)))]
    #[case(ScalarValue::Utf8(Some("EPSG:3857".to_string())), Some(CrsIdentifier::epsg(3857)))]
    #[case(ScalarValue::Utf8(Some("OGC:CRS84".to_string())), Some(CrsIdentifier::new("ogc", "crs84")))]
    #[case(ScalarValue::Int64(Some(0)), None)]
    fn from_wkt_with_srid(#[case] srid: ScalarValue, #[case] expected_crs: Option<CrsIdentifier>) {
        let tester = ScalarUdfTester::new(
            st_geomfromwkt_udf(),
            vec![utf8(), SedonaType::Arrow(srid.data_type())],
        );
        let return_type = tester
            .return_type_with_scalars(&[None, Some(srid.clone())])
            .unwrap();
        assert_eq!(return_type, WKB_GEOMETRY.with_crs(expected_crs).unwrap());

        let result = tester.invoke_scalar_scalar("POINT (1 2)", srid).unwrap();
        tester.assert_scalar_result_equals(result, "POINT (1 2)");
    }

    #[test]
    fn srid_must_be_literal_and_known() {
        let tester = ScalarUdfTester::new(
            st_geomfromwkt_udf(),
            vec![utf8(), SedonaType::Arrow(DataType::Int64)],
        );
        assert!(tester.return_type().is_err());

        let err = tester
            .return_type_with_scalars(&[None, Some(ScalarValue::Int64(Some(999999)))])
            .unwrap_err();
        assert_eq!(
            SpatialError::find(&err),
            Some(&SpatialError::UnknownCrs("epsg:999999".to_string()))
        );
    }

    #[test]
    fn null_srid() {
        let tester = ScalarUdfTester::new(
            st_geomfromwkt_udf(),
            vec![utf8(), SedonaType::Arrow(DataType::Int64)],
        );
        let result = tester
            .invoke_scalar_scalar("POINT (1 2)", ScalarValue::Int64(None))
            .unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn geography() {
        let tester = ScalarUdfTester::new(st_geogfromwkt_udf(), vec![utf8()]);
        tester.assert_return_type(WKB_GEOGRAPHY);
        let result = tester.invoke_scalar("POINT (1 2)").unwrap();
        tester.assert_scalar_result_equals(result, "POINT (1 2)");
    }
}
