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

use arrow_array::new_null_array;
use arrow_schema::DataType;
use datafusion_common::{error::Result, plan_err, ScalarValue};
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility,
};
use sedona_common::sedona_internal_err;
use sedona_crs::CrsRegistry;
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel, SedonaScalarUDF};
use sedona_schema::{
    crs::Crs,
    datatypes::SedonaType,
    matchers::{ArgMatcher, TypeMatcher},
};

/// ST_SetSRID() scalar UDF implementation
///
/// Identifiers are resolved with the global [CrsRegistry]. See
/// [st_set_srid_with_registry_udf] to use a specific registry.
pub fn st_set_srid_udf() -> SedonaScalarUDF {
    st_set_srid_with_registry_udf(CrsRegistry::global())
}

/// ST_SetCRS() scalar UDF implementation
///
/// Identifiers are resolved with the global [CrsRegistry]. See
/// [st_set_crs_with_registry_udf] to use a specific registry.
pub fn st_set_crs_udf() -> SedonaScalarUDF {
    st_set_crs_with_registry_udf(CrsRegistry::global())
}

/// ST_SetSRID() resolving identifiers with `registry`
pub fn st_set_srid_with_registry_udf(registry: Arc<CrsRegistry>) -> SedonaScalarUDF {
    SedonaScalarUDF::new(
        "st_setsrid",
        vec![Arc::new(STSetCRS {
            registry,
            identifier_matcher: ArgMatcher::is_integer(),
            function_name: "ST_SetSRID",
        }) as ScalarKernelRef],
        Volatility::Immutable,
        Some(set_srid_doc()),
    )
}

/// ST_SetCRS() resolving identifiers with `registry`
pub fn st_set_crs_with_registry_udf(registry: Arc<CrsRegistry>) -> SedonaScalarUDF {
    SedonaScalarUDF::new(
        "st_setcrs",
        vec![Arc::new(STSetCRS {
            registry,
            identifier_matcher: ArgMatcher::is_string(),
            function_name: "ST_SetCRS",
        }) as ScalarKernelRef],
        Volatility::Immutable,
        Some(set_crs_doc()),
    )
}

fn set_srid_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Sets the spatial reference system identifier (SRID) of the geometry without changing its coordinates.",
        "ST_SetSRID (geom: Geometry, srid: Integer)",
    )
    .with_argument("geom", "geometry: Input geometry or geography")
    .with_argument("srid", "srid: EPSG code to set (e.g., 4326), or 0 to remove the CRS")
    .with_sql_example("SELECT ST_SetSRID(ST_GeomFromWKT('POINT (-64.363049 45.091501)'), 4326)".to_string())
    .build()
}

fn set_crs_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Set CRS information for a geometry or geography without changing its coordinates.",
        "ST_SetCRS (geom: Geometry, crs: String)",
    )
    .with_argument("geom", "geometry: Input geometry or geography")
    .with_argument(
        "crs",
        "string: Coordinate reference system identifier (e.g., 'OGC:CRS84')",
    )
    .with_sql_example(
        "SELECT ST_SetCRS(ST_GeomFromWKT('POINT (-64.363049 45.091501)'), 'OGC:CRS84')".to_string(),
    )
    .build()
}

#[derive(Debug)]
struct STSetCRS {
    registry: Arc<CrsRegistry>,
    identifier_matcher: Arc<dyn TypeMatcher + Send + Sync>,
    function_name: &'static str,
}

impl SedonaScalarKernel for STSetCRS {
    fn return_type_from_args_and_scalars(
        &self,
        args: &[SedonaType],
        scalar_args: &[Option<&ScalarValue>],
    ) -> Result<Option<SedonaType>> {
        if args.len() != 2
            || !ArgMatcher::is_geometry_or_geography().match_type(&args[0])
            || !self.identifier_matcher.match_type(&args[1])
        {
            return Ok(None);
        }

        let Some(scalar_crs) = scalar_args[1] else {
            return plan_err!(
                "{}() requires a literal CRS argument",
                self.function_name
            );
        };

        let new_crs = resolve_scalar_crs(&self.registry, scalar_crs)?;
        Ok(Some(args[0].with_crs(new_crs)?))
    }

    fn invoke_batch_from_args(
        &self,
        _arg_types: &[SedonaType],
        args: &[ColumnarValue],
        return_type: &SedonaType,
        num_rows: usize,
    ) -> Result<ColumnarValue> {
        match &args[1] {
            // NULL identifier: propagate NULL per SQL NULL semantics
            ColumnarValue::Scalar(scalar) if scalar.is_null() => {
                null_result(&args[0], return_type, num_rows)
            }
            ColumnarValue::Scalar(_) => Ok(args[0].clone()),
            ColumnarValue::Array(_) => plan_err!(
                "{}() requires a literal CRS argument",
                self.function_name
            ),
        }
    }

    fn return_type(&self, _args: &[SedonaType]) -> Result<Option<SedonaType>> {
        sedona_internal_err!(
            "Should not be called because return_type_from_args_and_scalars() is implemented"
        )
    }

    fn invoke_batch(
        &self,
        _arg_types: &[SedonaType],
        _args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        sedona_internal_err!("Should not be called because invoke_batch_from_args() is implemented")
    }
}

/// Resolve a literal SRID or CRS argument to a tag
///
/// Integers are SRIDs (0 means no CRS). A NULL literal yields no CRS.
pub(crate) fn resolve_scalar_crs(registry: &CrsRegistry, scalar_crs: &ScalarValue) -> Result<Crs> {
    match scalar_crs.cast_to(&DataType::Utf8)? {
        ScalarValue::Utf8(Some(identifier)) => registry.resolve_crs(&identifier),
        ScalarValue::Utf8(None) => Ok(None),
        _ => sedona_internal_err!("Unexpected return type of cast to string"),
    }
}

fn null_result(
    item_arg: &ColumnarValue,
    return_type: &SedonaType,
    num_rows: usize,
) -> Result<ColumnarValue> {
    let storage_type = return_type.storage_type();
    match item_arg {
        ColumnarValue::Array(_) => Ok(ColumnarValue::Array(new_null_array(&storage_type, num_rows))),
        ColumnarValue::Scalar(_) => Ok(ColumnarValue::Scalar(ScalarValue::try_from(storage_type)?)),
    }
}

/// [SedonaScalarKernel] wrapper that handles the SRID argument for constructors like ST_GeomFromWKT
///
/// The wrapped kernel sees every argument except the trailing SRID, which must
/// be a literal and is resolved with the registry.
#[derive(Debug)]
pub(crate) struct SRIDifiedKernel {
    inner: ScalarKernelRef,
    registry: Arc<CrsRegistry>,
}

impl SRIDifiedKernel {
    pub(crate) fn new(inner: ScalarKernelRef, registry: Arc<CrsRegistry>) -> Self {
        Self { inner, registry }
    }
}

impl SedonaScalarKernel for SRIDifiedKernel {
    fn return_type_from_args_and_scalars(
        &self,
        args: &[SedonaType],
        scalar_args: &[Option<&ScalarValue>],
    ) -> Result<Option<SedonaType>> {
        // [arg0, arg1, ..., crs_arg];
        //  ^^^^^^^^^^^^^^^
        //     orig_args
        let orig_args_len = match (args.len(), scalar_args.len()) {
            (0, 0) => return Ok(None),
            (l1, l2) if l1 == l2 => l1 - 1,
            _ => return sedona_internal_err!("Arg types and arg values have different lengths"),
        };

        let crs_type = &args[orig_args_len];
        if !ArgMatcher::is_integer().match_type(crs_type) && !ArgMatcher::is_string().match_type(crs_type) {
            return Ok(None);
        }

        // If the inner kernel doesn't match, the trailing argument isn't an SRID either
        let Some(inner_result) = self
            .inner
            .return_type_from_args_and_scalars(&args[..orig_args_len], &scalar_args[..orig_args_len])?
        else {
            return Ok(None);
        };

        if !inner_result.is_geometry_or_geography() {
            return sedona_internal_err!("Return type must be Wkb or WkbView");
        }

        let Some(scalar_crs) = scalar_args[orig_args_len] else {
            return plan_err!("SRID argument must be a literal");
        };

        let new_crs = resolve_scalar_crs(&self.registry, scalar_crs)?;
        Ok(Some(inner_result.with_crs(new_crs)?))
    }

    fn invoke_batch_from_args(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
        return_type: &SedonaType,
        num_rows: usize,
    ) -> Result<ColumnarValue> {
        let orig_args_len = arg_types.len() - 1;

        // Invoke the inner kernel first so that parse errors surface even when
        // the SRID is NULL
        let result = self
            .inner
            .invoke_batch(&arg_types[..orig_args_len], &args[..orig_args_len])?;

        match &args[orig_args_len] {
            ColumnarValue::Scalar(scalar) if scalar.is_null() => {
                null_result(&result, return_type, num_rows)
            }
            ColumnarValue::Scalar(_) => Ok(result),
            ColumnarValue::Array(_) => plan_err!("SRID argument must be a literal"),
        }
    }

    fn invoke_batch(
        &self,
        _arg_types: &[SedonaType],
        _args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        sedona_internal_err!("Should not be called because invoke_batch_from_args() is implemented")
    }

    fn return_type(&self, _args: &[SedonaType]) -> Result<Option<SedonaType>> {
        sedona_internal_err!(
            "Should not be called because return_type_from_args_and_scalars() is implemented"
        )
    }
}
