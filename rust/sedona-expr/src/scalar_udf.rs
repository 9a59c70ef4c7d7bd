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
use std::{fmt::Debug, sync::Arc};

use datafusion_common::{not_impl_err, plan_err, Result, ScalarValue};
use datafusion_expr::{ColumnarValue, Documentation, Volatility};
use sedona_common::sedona_internal_err;
use sedona_crs::CrsRegistry;
use sedona_schema::{crs::Crs, datatypes::SedonaType, matchers::ArgMatcher};

use crate::crs_rule::check_crs_compatibility;

/// Shorthand for a [SedonaScalarKernel] reference
pub type ScalarKernelRef = Arc<dyn SedonaScalarKernel + Send + Sync>;

/// Signature of a closure-based kernel implementation
pub type SedonaScalarKernelFn =
    Arc<dyn Fn(&[SedonaType], &[ColumnarValue]) -> Result<ColumnarValue> + Send + Sync>;

/// A kernel implementing a scalar function for a set of argument types
///
/// Kernels compute their return type from the argument types (and any
/// literal arguments) at planning time and transform batches of values at
/// execution time.
pub trait SedonaScalarKernel: Debug {
    /// Calculate a return type given input types
    ///
    /// Returns `Some(return_type)` if this kernel applies to the input types
    /// or `None` otherwise.
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>>;

    /// Calculate a return type given input types and literal arguments
    ///
    /// Kernels whose output type depends on an argument value (e.g., the CRS
    /// passed to ST_SetSRID()) override this method; literal arguments are
    /// `Some` and column arguments are `None`.
    fn return_type_from_args_and_scalars(
        &self,
        args: &[SedonaType],
        _scalar_args: &[Option<&ScalarValue>],
    ) -> Result<Option<SedonaType>> {
        self.return_type(args)
    }

    /// Compute a batch of results
    fn invoke_batch(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue>;

    /// Compute a batch of results with access to the resolved return type
    fn invoke_batch_from_args(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
        _return_type: &SedonaType,
        _num_rows: usize,
    ) -> Result<ColumnarValue> {
        self.invoke_batch(arg_types, args)
    }
}

/// Helper to resolve an iterable of kernels
pub trait IntoScalarKernelRefs {
    fn into_scalar_kernel_refs(self) -> Vec<ScalarKernelRef>;
}

impl IntoScalarKernelRefs for ScalarKernelRef {
    fn into_scalar_kernel_refs(self) -> Vec<ScalarKernelRef> {
        vec![self]
    }
}

impl IntoScalarKernelRefs for Vec<ScalarKernelRef> {
    fn into_scalar_kernel_refs(self) -> Vec<ScalarKernelRef> {
        self
    }
}

/// A kernel defined by an [ArgMatcher] and a closure
#[derive(Debug)]
pub struct SimpleSedonaScalarKernel {
    matcher: ArgMatcher,
    fun: SimpleKernelFn,
}

struct SimpleKernelFn(SedonaScalarKernelFn);

impl Debug for SimpleKernelFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SimpleKernelFn")
    }
}

impl SimpleSedonaScalarKernel {
    pub fn new_ref(matcher: ArgMatcher, fun: SedonaScalarKernelFn) -> ScalarKernelRef {
        Arc::new(Self {
            matcher,
            fun: SimpleKernelFn(fun),
        })
    }
}

impl SedonaScalarKernel for SimpleSedonaScalarKernel {
    fn return_type(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        self.matcher.match_args(args)
    }

    fn invoke_batch(
        &self,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<ColumnarValue> {
        (self.fun.0)(arg_types, args)
    }
}

/// Top-level scalar user-defined function
///
/// Dispatches to the most recently added kernel that accepts the argument
/// types. Binding a call site applies the CRS compatibility rule before any
/// kernel is consulted, so every function taking two geometries rejects
/// mismatched CRSes without reading data.
#[derive(Debug, Clone)]
pub struct SedonaScalarUDF {
    name: String,
    kernels: Vec<ScalarKernelRef>,
    volatility: Volatility,
    documentation: Option<Documentation>,
    aliases: Vec<String>,
}

impl SedonaScalarUDF {
    /// Create a new SedonaScalarUDF
    pub fn new(
        name: &str,
        kernels: impl IntoScalarKernelRefs,
        volatility: Volatility,
        documentation: Option<Documentation>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kernels: kernels.into_scalar_kernel_refs(),
            volatility,
            documentation,
            aliases: vec![],
        }
    }

    /// Create a new immutable SedonaScalarUDF from a single kernel
    pub fn from_kernel(name: &str, kernel: ScalarKernelRef) -> Self {
        Self::new(name, kernel, Volatility::Immutable, None)
    }

    /// Create a function whose kernels are provided by another crate
    ///
    /// Binding a stub without kernels fails with a "not implemented" error.
    pub fn new_stub(name: &str, documentation: Option<Documentation>) -> Self {
        Self::new(name, Vec::<ScalarKernelRef>::new(), Volatility::Immutable, documentation)
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn volatility(&self) -> Volatility {
        self.volatility
    }

    pub fn documentation(&self) -> Option<&Documentation> {
        self.documentation.as_ref()
    }

    /// Add a new kernel
    ///
    /// Because kernels are resolved in reverse order, the new kernel will take
    /// precedence over any previously added kernels that apply to the same types.
    pub fn add_kernels(&mut self, kernels: impl IntoScalarKernelRefs) {
        self.kernels.extend(kernels.into_scalar_kernel_refs());
    }

    pub fn kernels(&self) -> &[ScalarKernelRef] {
        &self.kernels
    }

    /// Resolve a call site at planning time
    ///
    /// Applies the CRS compatibility rule to the argument types, then selects
    /// a kernel and computes the return type. No data is read.
    pub fn bind(
        &self,
        registry: &CrsRegistry,
        arg_types: &[SedonaType],
        scalar_args: &[Option<&ScalarValue>],
    ) -> Result<BoundScalarUDF> {
        if scalar_args.len() != arg_types.len() {
            return sedona_internal_err!(
                "{}: expected {} scalar argument slots but got {}",
                self.name,
                arg_types.len(),
                scalar_args.len()
            );
        }

        let args_crs = check_crs_compatibility(registry, arg_types)?;

        for kernel in self.kernels.iter().rev() {
            if let Some(return_type) =
                kernel.return_type_from_args_and_scalars(arg_types, scalar_args)?
            {
                return Ok(BoundScalarUDF {
                    name: self.name.clone(),
                    kernel: Arc::clone(kernel),
                    arg_types: arg_types.to_vec(),
                    return_type,
                    args_crs,
                });
            }
        }

        not_impl_err!("{}({:?}): No kernel matching arguments", self.name, arg_types)
    }
}

/// A scalar function resolved against concrete argument types
#[derive(Debug, Clone)]
pub struct BoundScalarUDF {
    name: String,
    kernel: ScalarKernelRef,
    arg_types: Vec<SedonaType>,
    return_type: SedonaType,
    args_crs: Crs,
}

impl BoundScalarUDF {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg_types(&self) -> &[SedonaType] {
        &self.arg_types
    }

    pub fn return_type(&self) -> &SedonaType {
        &self.return_type
    }

    /// The CRS shared by the geometry arguments
    ///
    /// `None` if there were no geometry arguments, if they were all untagged,
    /// or if tagged and untagged arguments were mixed.
    pub fn args_crs(&self) -> &Crs {
        &self.args_crs
    }

    /// Compute a batch of results
    pub fn invoke(&self, args: &[ColumnarValue], num_rows: usize) -> Result<ColumnarValue> {
        if args.len() != self.arg_types.len() {
            return plan_err!(
                "{}: expected {} arguments but got {}",
                self.name,
                self.arg_types.len(),
                args.len()
            );
        }

        self.kernel
            .invoke_batch_from_args(&self.arg_types, args, &self.return_type, num_rows)
    }
}
