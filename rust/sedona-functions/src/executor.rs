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
use std::iter::{repeat_n, zip};

use arrow_array::{Array, ArrayRef};
use arrow_schema::DataType;
use datafusion_common::{
    cast::{as_binary_array, as_binary_view_array},
    Result, ScalarValue,
};
use datafusion_expr::ColumnarValue;
use sedona_common::sedona_internal_err;
use sedona_geometry::decode::parse_wkb;
use sedona_schema::datatypes::SedonaType;
use wkb::reader::Wkb;

/// Helper for writing functions that iterate over WKB arguments
///
/// Arguments may be any mix of arrays and scalars; scalars are repeated
/// for every row. If every argument is a scalar the result is a scalar.
pub struct WkbExecutor<'a, 'b> {
    arg_types: &'a [SedonaType],
    args: &'b [ColumnarValue],
    num_iterations: usize,
}

type BinaryIter<'c> = Box<dyn Iterator<Item = Option<&'c [u8]>> + 'c>;

impl<'a, 'b> WkbExecutor<'a, 'b> {
    pub fn new(arg_types: &'a [SedonaType], args: &'b [ColumnarValue]) -> Self {
        let num_iterations = args
            .iter()
            .find_map(|arg| match arg {
                ColumnarValue::Array(array) => Some(array.len()),
                ColumnarValue::Scalar(_) => None,
            })
            .unwrap_or(1);

        Self {
            arg_types,
            args,
            num_iterations,
        }
    }

    /// The number of rows that will be produced
    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    pub fn arg_types(&self) -> &[SedonaType] {
        self.arg_types
    }

    /// Iterate over the raw bytes of the first argument
    pub fn execute_binary_void<F: FnMut(Option<&[u8]>) -> Result<()>>(&self, mut func: F) -> Result<()> {
        for item in self.binary_iter(0)? {
            func(item)?;
        }

        Ok(())
    }

    /// Iterate over the first argument as parsed WKB
    ///
    /// Unparseable payloads fail with a malformed geometry error.
    pub fn execute_wkb_void<F: FnMut(Option<Wkb>) -> Result<()>>(&self, mut func: F) -> Result<()> {
        for item in self.binary_iter(0)? {
            match item {
                Some(bytes) => func(Some(parse_wkb(bytes)?))?,
                None => func(None)?,
            }
        }

        Ok(())
    }

    /// Iterate over the first two arguments as parsed WKB
    pub fn execute_wkb_wkb_void<F: FnMut(Option<&Wkb>, Option<&Wkb>) -> Result<()>>(
        &self,
        mut func: F,
    ) -> Result<()> {
        for (item0, item1) in zip(self.binary_iter(0)?, self.binary_iter(1)?) {
            let wkb0 = item0.map(parse_wkb).transpose()?;
            let wkb1 = item1.map(parse_wkb).transpose()?;
            func(wkb0.as_ref(), wkb1.as_ref())?;
        }

        Ok(())
    }

    /// Wrap the output of an iteration
    ///
    /// Returns a scalar if every argument was a scalar.
    pub fn finish(&self, out: ArrayRef) -> Result<ColumnarValue> {
        if self
            .args
            .iter()
            .all(|arg| matches!(arg, ColumnarValue::Scalar(_)))
        {
            Ok(ColumnarValue::Scalar(ScalarValue::try_from_array(&out, 0)?))
        } else {
            Ok(ColumnarValue::Array(out))
        }
    }

    fn binary_iter(&self, i: usize) -> Result<BinaryIter<'b>> {
        let Some(arg) = self.args.get(i) else {
            return sedona_internal_err!("WkbExecutor: missing argument {i}");
        };

        match arg {
            ColumnarValue::Array(array) => match array.data_type() {
                DataType::Binary => Ok(Box::new(as_binary_array(array)?.iter())),
                DataType::BinaryView => Ok(Box::new(as_binary_view_array(array)?.iter())),
                DataType::Null => Ok(Box::new(repeat_n(None, array.len()))),
                other => sedona_internal_err!("WkbExecutor: unexpected storage type {other}"),
            },
            ColumnarValue::Scalar(scalar) => match scalar {
                ScalarValue::Binary(value)
                | ScalarValue::BinaryView(value)
                | ScalarValue::LargeBinary(value) => {
                    Ok(Box::new(repeat_n(value.as_deref(), self.num_iterations)))
                }
                ScalarValue::Null => Ok(Box::new(repeat_n(None, self.num_iterations))),
                other => sedona_internal_err!(
                    "WkbExecutor: unexpected scalar type {}",
                    other.data_type()
                ),
            },
        }
    }
}
