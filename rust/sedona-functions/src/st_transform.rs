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

use arrow_array::{
    builder::{BinaryBuilder, BinaryViewBuilder},
    new_null_array, ArrayRef,
};
use arrow_schema::DataType;
use datafusion_common::{plan_err, Result, ScalarValue};
use datafusion_expr::{
    scalar_doc_sections::DOC_SECTION_OTHER, ColumnarValue, Documentation, Volatility,
};
use sedona_common::{sedona_internal_err, SpatialError};
use sedona_crs::{CrsRegistry, TransformPipeline};
use sedona_expr::scalar_udf::{ScalarKernelRef, SedonaScalarKernel, SedonaScalarUDF};
use sedona_geometry::{
    decode::parse_wkb, transform::transform, wkb_factory::WKB_MIN_PROBABLE_BYTES,
};
use sedona_schema::{
    datatypes::SedonaType,
    matchers::{ArgMatcher, TypeMatcher},
};

use crate::executor::WkbExecutor;

/// ST_Transform() scalar UDF implementation
///
/// Transforms are resolved with the global [CrsRegistry]. See
/// [st_transform_with_registry_udf] to use a specific registry.
pub fn st_transform_udf() -> SedonaScalarUDF {
    st_transform_with_registry_udf(CrsRegistry::global())
}

/// ST_Transform() resolving CRSes and pipelines with `registry`
///
/// Rows that can't be transformed become NULL. See
/// [st_transform_with_options_udf] to fail instead.
pub fn st_transform_with_registry_udf(registry: Arc<CrsRegistry>) -> SedonaScalarUDF {
    st_transform_with_options_udf(registry, false)
}

/// ST_Transform() with a choice of row fault handling
///
/// With `strict_mode` a malformed geometry or a coordinate that can't be
/// transformed fails the whole batch. Otherwise the row is NULL and the
/// fault is logged.
pub fn st_transform_with_options_udf(
    registry: Arc<CrsRegistry>,
    strict_mode: bool,
) -> SedonaScalarUDF {
    SedonaScalarUDF::new(
        "st_transform",
        vec![Arc::new(STTransform {
            registry,
            strict_mode,
        }) as ScalarKernelRef],
        Volatility::Immutable,
        Some(st_transform_doc()),
    )
}

fn st_transform_doc() -> Documentation {
    Documentation::builder(
        DOC_SECTION_OTHER,
        "Transform the coordinates of a geometry from its CRS (or an explicit source CRS) to a target CRS.",
        "ST_Transform (geom: Geometry, to: String)",
    )
    .with_argument("geom", "geometry: Input geometry with a declared CRS")
    .with_argument(
        "from",
        "string or integer (optional): Source CRS, overriding the CRS of geom",
    )
    .with_argument("to", "string or integer: Target CRS (e.g., 'EPSG:4326' or 3857)")
    .with_sql_example(
        "SELECT ST_Transform(ST_GeomFromWKT('POINT (-74.006 40.7128)', 4326), 'EPSG:3857')"
            .to_string(),
    )
    .build()
}

#[derive(Debug)]
struct STTransform {
    registry: Arc<CrsRegistry>,
    strict_mode: bool,
}

/// What a bound ST_Transform call will do to each value
#[derive(Debug)]
enum STTransformImpl {
    /// Source and target are the same CRS; values pass through byte for byte
    NoOp,
    /// The target CRS literal was NULL
    OutputIsAllNull,
    Transform(TransformPipeline),
}

impl STTransformImpl {
    fn try_from_types_and_scalar_args(
        registry: &CrsRegistry,
        arg_types: &[SedonaType],
        scalar_args: &[Option<&ScalarValue>],
    ) -> Result<Option<(Self, SedonaType)>> {
        let (source, to_index) = if Self::is_transform_to(arg_types) {
            let source = match arg_types[0].crs() {
                Some(Some(crs)) => crs.clone(),
                _ => return Err(SpatialError::NoDeclaredCrs.into()),
            };
            (source, 1)
        } else if Self::is_transform_from_to(arg_types) {
            let Some(from) = Self::parse_crs_from_scalar_arg(scalar_args[1])? else {
                return Ok(Some((Self::OutputIsAllNull, arg_types[0].with_crs(None)?)));
            };
            (registry.resolve(&from)?.id().clone(), 2)
        } else {
            return Ok(None);
        };

        let Some(target) = Self::parse_crs_from_scalar_arg(scalar_args[to_index])? else {
            return Ok(Some((Self::OutputIsAllNull, arg_types[0].with_crs(None)?)));
        };

        let target = registry.resolve(&target)?.id().clone();
        let return_type = arg_types[0].with_crs(Some(target.clone()))?;
        let pipeline = registry.transform_pipeline(&source, &target)?;
        log::debug!("ST_Transform() from {} to {}", pipeline.source(), pipeline.target());

        if pipeline.is_identity() {
            Ok(Some((Self::NoOp, return_type)))
        } else {
            Ok(Some((Self::Transform(pipeline), return_type)))
        }
    }

    fn crs_matcher() -> Arc<dyn TypeMatcher + Send + Sync> {
        ArgMatcher::or(vec![ArgMatcher::is_integer(), ArgMatcher::is_string()])
    }

    fn is_transform_to(arg_types: &[SedonaType]) -> bool {
        let matcher = ArgMatcher::new(
            vec![ArgMatcher::is_geometry(), Self::crs_matcher()],
            // The actual type is computed separately
            SedonaType::Arrow(DataType::Null),
        );

        arg_types.len() == 2 && matcher.matches(arg_types)
    }

    fn is_transform_from_to(arg_types: &[SedonaType]) -> bool {
        let matcher = ArgMatcher::new(
            vec![
                ArgMatcher::is_geometry(),
                Self::crs_matcher(),
                Self::crs_matcher(),
            ],
            // The actual type is computed separately
            SedonaType::Arrow(DataType::Null),
        );

        arg_types.len() == 3 && matcher.matches(arg_types)
    }

    fn parse_crs_from_scalar_arg(scalar_arg: Option<&ScalarValue>) -> Result<Option<String>> {
        let Some(scalar_arg) = scalar_arg else {
            return plan_err!("ST_Transform() requires literal CRS arguments");
        };

        match scalar_arg.cast_to(&DataType::Utf8)? {
            ScalarValue::Utf8(maybe_crs) => Ok(maybe_crs),
            _ => sedona_internal_err!("Expected scalar cast to utf8 to be a ScalarValue::Utf8"),
        }
    }
}

impl SedonaScalarKernel for STTransform {
    fn return_type_from_args_and_scalars(
        &self,
        args: &[SedonaType],
        scalar_args: &[Option<&ScalarValue>],
    ) -> Result<Option<SedonaType>> {
        Ok(
            STTransformImpl::try_from_types_and_scalar_args(&self.registry, args, scalar_args)?
                .map(|(_, return_type)| return_type),
        )
    }

    fn invoke_batch_from_args(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
        return_type: &SedonaType,
        num_rows: usize,
    ) -> Result<ColumnarValue> {
        let scalar_args = args
            .iter()
            .map(|arg| match arg {
                ColumnarValue::Array(_) => None,
                ColumnarValue::Scalar(scalar_value) => Some(scalar_value),
            })
            .collect::<Vec<_>>();

        let Some((transform_impl, _)) =
            STTransformImpl::try_from_types_and_scalar_args(&self.registry, arg_types, &scalar_args)?
        else {
            return sedona_internal_err!("ST_Transform invoked with incompatible arguments");
        };

        match transform_impl {
            STTransformImpl::NoOp => Ok(args[0].clone()),
            STTransformImpl::OutputIsAllNull => {
                let storage_type = return_type.storage_type();
                match &args[0] {
                    ColumnarValue::Array(_) => {
                        Ok(ColumnarValue::Array(new_null_array(&storage_type, num_rows)))
                    }
                    ColumnarValue::Scalar(_) => {
                        Ok(ColumnarValue::Scalar(ScalarValue::try_from(storage_type)?))
                    }
                }
            }
            STTransformImpl::Transform(pipeline) => {
                invoke_transform(&arg_types[..1], &args[..1], &pipeline, self.strict_mode)
            }
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

fn invoke_transform(
    arg_types: &[SedonaType],
    args: &[ColumnarValue],
    pipeline: &TransformPipeline,
    strict_mode: bool,
) -> Result<ColumnarValue> {
    let executor = WkbExecutor::new(arg_types, args);
    let num_rows = executor.num_iterations();

    let out: ArrayRef = match arg_types[0] {
        SedonaType::WkbView(_, _) => {
            let mut builder = BinaryViewBuilder::with_capacity(num_rows);
            transform_rows(&executor, pipeline, strict_mode, |value| {
                builder.append_option(value)
            })?;
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder =
                BinaryBuilder::with_capacity(num_rows, WKB_MIN_PROBABLE_BYTES * num_rows);
            transform_rows(&executor, pipeline, strict_mode, |value| {
                builder.append_option(value)
            })?;
            Arc::new(builder.finish())
        }
    };

    executor.finish(out)
}

/// Transform every row, passing each output value (or NULL) to `append`
fn transform_rows(
    executor: &WkbExecutor<'_, '_>,
    pipeline: &TransformPipeline,
    strict_mode: bool,
    mut append: impl FnMut(Option<&[u8]>),
) -> Result<()> {
    let mut buf = Vec::with_capacity(WKB_MIN_PROBABLE_BYTES);
    let mut row = 0;
    let mut num_faults = 0;

    executor.execute_binary_void(|maybe_bytes| {
        match maybe_bytes {
            Some(bytes) => {
                buf.clear();
                match transform_wkb(bytes, pipeline, &mut buf) {
                    Ok(()) => append(Some(buf.as_slice())),
                    Err(err) if strict_mode => return Err(err.into()),
                    Err(err) => {
                        log::warn!("ST_Transform() skipping row {row}: {err}");
                        num_faults += 1;
                        append(None);
                    }
                }
            }
            None => append(None),
        }

        row += 1;
        Ok(())
    })?;

    if num_faults > 0 {
        log::warn!(
            "ST_Transform() from {} to {} set {num_faults} of {row} rows to NULL",
            pipeline.source(),
            pipeline.target()
        );
    }

    Ok(())
}

/// Transform one WKB value, writing the result to `out`
///
/// Geometry type and dimensions are kept; only coordinate values change.
fn transform_wkb(
    bytes: &[u8],
    pipeline: &TransformPipeline,
    out: &mut Vec<u8>,
) -> std::result::Result<(), SpatialError> {
    let wkb = parse_wkb(bytes)?;
    transform(&wkb, pipeline, out).map_err(|err| SpatialError::MalformedGeometry(err.to_string()))
}
