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

use arrow_array::{Array, ArrayRef};
use arrow_schema::DataType;
use datafusion_common::{Result, ScalarValue};
use datafusion_expr::ColumnarValue;
use sedona_crs::CrsRegistry;
use sedona_expr::scalar_udf::{BoundScalarUDF, SedonaScalarUDF};
use sedona_schema::datatypes::{SedonaType, WKB_GEOMETRY, WKB_VIEW_GEOMETRY};

use crate::create::{create_array, create_scalar};

/// Values that can be converted to a literal argument of a given type
///
/// Strings passed for geometry arguments are interpreted as WKT.
pub trait Literal {
    fn to_scalar_value(&self, sedona_type: &SedonaType) -> Result<ScalarValue>;
}

impl Literal for &str {
    fn to_scalar_value(&self, sedona_type: &SedonaType) -> Result<ScalarValue> {
        if sedona_type.is_geometry_or_geography() {
            Ok(create_scalar(Some(*self), sedona_type))
        } else {
            ScalarValue::Utf8(Some(self.to_string())).cast_to(&sedona_type.storage_type())
        }
    }
}

impl Literal for ScalarValue {
    fn to_scalar_value(&self, sedona_type: &SedonaType) -> Result<ScalarValue> {
        if self.data_type() == sedona_type.storage_type() {
            Ok(self.clone())
        } else {
            self.cast_to(&sedona_type.storage_type())
        }
    }
}

impl Literal for i64 {
    fn to_scalar_value(&self, sedona_type: &SedonaType) -> Result<ScalarValue> {
        ScalarValue::Int64(Some(*self)).to_scalar_value(sedona_type)
    }
}

impl Literal for f64 {
    fn to_scalar_value(&self, sedona_type: &SedonaType) -> Result<ScalarValue> {
        ScalarValue::Float64(Some(*self)).to_scalar_value(sedona_type)
    }
}

/// Test helper for [SedonaScalarUDF]s
///
/// Binds the function against a fixed list of argument types and invokes it
/// with scalars or arrays. Scalar arguments are visible to the kernel at bind
/// time as they would be for SQL literals.
pub struct ScalarUdfTester {
    udf: SedonaScalarUDF,
    arg_types: Vec<SedonaType>,
    registry: Arc<CrsRegistry>,
}

impl ScalarUdfTester {
    pub fn new(udf: SedonaScalarUDF, arg_types: Vec<SedonaType>) -> Self {
        Self {
            udf,
            arg_types,
            registry: Arc::new(CrsRegistry::standard()),
        }
    }

    pub fn with_registry(mut self, registry: Arc<CrsRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn arg_types(&self) -> &[SedonaType] {
        &self.arg_types
    }

    /// Bind with no literal arguments
    pub fn return_type(&self) -> Result<SedonaType> {
        let scalars = vec![None; self.arg_types.len()];
        Ok(self.bind(&scalars)?.return_type().clone())
    }

    /// Bind with some literal arguments
    pub fn return_type_with_scalars(&self, scalars: &[Option<ScalarValue>]) -> Result<SedonaType> {
        Ok(self.bind(scalars)?.return_type().clone())
    }

    pub fn assert_return_type(&self, expected: impl Into<SedonaType>) {
        assert_eq!(self.return_type().unwrap(), expected.into());
    }

    /// Invoke with a single geometry argument given as WKT
    pub fn invoke_wkb_scalar(&self, wkt_value: Option<&str>) -> Result<ScalarValue> {
        let scalar = create_scalar(wkt_value, &self.arg_types[0]);
        self.invoke_scalar(scalar)
    }

    /// Invoke with a single geometry array given as WKT
    pub fn invoke_wkb_array(&self, wkt_values: Vec<Option<&str>>) -> Result<ArrayRef> {
        self.invoke_array(create_array(&wkt_values, &self.arg_types[0]))
    }

    /// Invoke with a geometry array (as WKT) and a literal second argument
    pub fn invoke_wkb_array_scalar(
        &self,
        wkt_values: Vec<Option<&str>>,
        arg1: impl Literal,
    ) -> Result<ArrayRef> {
        let array = create_array(&wkt_values, &self.arg_types[0]);
        let scalar = arg1.to_scalar_value(&self.arg_types[1])?;
        let result = self.invoke(vec![
            ColumnarValue::Array(array),
            ColumnarValue::Scalar(scalar),
        ])?;
        expect_array(result)
    }

    pub fn invoke_scalar(&self, arg: impl Literal) -> Result<ScalarValue> {
        let scalar = arg.to_scalar_value(&self.arg_types[0])?;
        expect_scalar(self.invoke(vec![ColumnarValue::Scalar(scalar)])?)
    }

    pub fn invoke_scalar_scalar(&self, arg0: impl Literal, arg1: impl Literal) -> Result<ScalarValue> {
        let args = vec![
            ColumnarValue::Scalar(arg0.to_scalar_value(&self.arg_types[0])?),
            ColumnarValue::Scalar(arg1.to_scalar_value(&self.arg_types[1])?),
        ];
        expect_scalar(self.invoke(args)?)
    }

    pub fn invoke_scalar_scalar_scalar(
        &self,
        arg0: impl Literal,
        arg1: impl Literal,
        arg2: impl Literal,
    ) -> Result<ScalarValue> {
        let args = vec![
            ColumnarValue::Scalar(arg0.to_scalar_value(&self.arg_types[0])?),
            ColumnarValue::Scalar(arg1.to_scalar_value(&self.arg_types[1])?),
            ColumnarValue::Scalar(arg2.to_scalar_value(&self.arg_types[2])?),
        ];
        expect_scalar(self.invoke(args)?)
    }

    pub fn invoke_array(&self, array: ArrayRef) -> Result<ArrayRef> {
        self.invoke_arrays(vec![array])
    }

    pub fn invoke_arrays(&self, arrays: Vec<ArrayRef>) -> Result<ArrayRef> {
        let args = arrays.into_iter().map(ColumnarValue::Array).collect();
        expect_array(self.invoke(args)?)
    }

    /// Bind (with any scalar arguments as literals) and invoke
    pub fn invoke(&self, args: Vec<ColumnarValue>) -> Result<ColumnarValue> {
        let scalars = args
            .iter()
            .map(|arg| match arg {
                ColumnarValue::Scalar(scalar) => Some(scalar.clone()),
                ColumnarValue::Array(_) => None,
            })
            .collect::<Vec<_>>();
        let num_rows = args
            .iter()
            .find_map(|arg| match arg {
                ColumnarValue::Array(array) => Some(array.len()),
                ColumnarValue::Scalar(_) => None,
            })
            .unwrap_or(1);

        self.bind(&scalars)?.invoke(&args, num_rows)
    }

    /// Compare a scalar result to an expected literal
    ///
    /// Strings are interpreted as WKT when the result is a binary value.
    pub fn assert_scalar_result_equals(&self, actual: ScalarValue, expected: impl Literal) {
        let result_type = match actual.data_type() {
            DataType::Binary => WKB_GEOMETRY,
            DataType::BinaryView => WKB_VIEW_GEOMETRY,
            other => SedonaType::Arrow(other),
        };
        let expected = expected.to_scalar_value(&result_type).unwrap();
        assert_eq!(actual, expected);
    }

    fn bind(&self, scalars: &[Option<ScalarValue>]) -> Result<BoundScalarUDF> {
        let scalar_refs = scalars.iter().map(|s| s.as_ref()).collect::<Vec<_>>();
        self.udf.bind(&self.registry, &self.arg_types, &scalar_refs)
    }
}

fn expect_scalar(value: ColumnarValue) -> Result<ScalarValue> {
    match value {
        ColumnarValue::Scalar(scalar) => Ok(scalar),
        ColumnarValue::Array(array) if array.len() == 1 => ScalarValue::try_from_array(&array, 0),
        ColumnarValue::Array(array) => panic!("Expected a scalar result but got {array:?}"),
    }
}

fn expect_array(value: ColumnarValue) -> Result<ArrayRef> {
    match value {
        ColumnarValue::Array(array) => Ok(array),
        ColumnarValue::Scalar(scalar) => panic!("Expected an array result but got {scalar:?}"),
    }
}

#[cfg(test)]
mod tests {
    use sedona_expr::scalar_udf::SimpleSedonaScalarKernel;
    use sedona_schema::matchers::ArgMatcher;

    use super::*;

    fn identity_udf() -> SedonaScalarUDF {
        SedonaScalarUDF::from_kernel(
            "identity",
            SimpleSedonaScalarKernel::new_ref(
                ArgMatcher::new(vec![ArgMatcher::is_geometry()], WKB_GEOMETRY),
                Arc::new(|_, args| Ok(args[0].clone())),
            ),
        )
    }

    #[test]
    fn tester_round_trip() {
        let tester = ScalarUdfTester::new(identity_udf(), vec![WKB_GEOMETRY]);
        tester.assert_return_type(WKB_GEOMETRY);

        let result = tester.invoke_wkb_scalar(Some("POINT (0 1)")).unwrap();
        tester.assert_scalar_result_equals(result, "POINT (0 1)");

        let result = tester.invoke_wkb_array(vec![Some("POINT (0 1)"), None]).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.null_count(), 1);
    }

    #[test]
    fn literals() {
        let utf8 = SedonaType::Arrow(DataType::Utf8);
        assert_eq!(
            "abc".to_scalar_value(&utf8).unwrap(),
            ScalarValue::Utf8(Some("abc".to_string()))
        );

        let int32 = SedonaType::Arrow(DataType::Int32);
        assert_eq!(4326i64.to_scalar_value(&int32).unwrap(), ScalarValue::Int32(Some(4326)));
    }

    #[test]
    fn tester_bind_error() {
        let tester = ScalarUdfTester::new(identity_udf(), vec![SedonaType::Arrow(DataType::Int32)]);
        assert!(tester.return_type().is_err());
    }
}
