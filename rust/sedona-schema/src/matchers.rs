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

use arrow_schema::DataType;
use datafusion_common::Result;

use crate::datatypes::{Edges, SedonaType};

/// Helper to match arguments and compute return types
#[derive(Debug)]
pub struct ArgMatcher {
    matchers: Vec<Arc<dyn TypeMatcher + Send + Sync>>,
    out_type: SedonaType,
}

impl ArgMatcher {
    /// Create a new ArgMatcher
    pub fn new(matchers: Vec<Arc<dyn TypeMatcher + Send + Sync>>, out_type: SedonaType) -> Self {
        Self { matchers, out_type }
    }

    /// Calculate a return type given input types
    ///
    /// Returns `Some(physical_type)` if this kernel applies to the input types or
    /// `None` otherwise.
    pub fn match_args(&self, args: &[SedonaType]) -> Result<Option<SedonaType>> {
        if self.matches(args) {
            Ok(Some(self.out_type.clone()))
        } else {
            Ok(None)
        }
    }

    /// Check for an input type match
    ///
    /// Optional matchers may only appear at the end of the matcher list.
    pub fn matches(&self, args: &[SedonaType]) -> bool {
        if args.len() > self.matchers.len() {
            return false;
        }

        let mut arg_iter = args.iter();
        for matcher in &self.matchers {
            match arg_iter.next() {
                Some(arg) => {
                    if !matcher.match_type(arg) {
                        return false;
                    }
                }
                None => {
                    if !matcher.optional() {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Matches any argument
    pub fn is_any() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsAny {})
    }

    /// Matches any geometry argument regardless of CRS
    pub fn is_geometry() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsGeometryOrGeography {
            edges: Some(Edges::Planar),
        })
    }

    /// Matches any geography argument regardless of CRS
    pub fn is_geography() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsGeometryOrGeography {
            edges: Some(Edges::Spherical),
        })
    }

    pub fn is_geometry_or_geography() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsGeometryOrGeography { edges: None })
    }

    /// Matches a string, including a null literal
    pub fn is_string() -> Arc<dyn TypeMatcher + Send + Sync> {
        Self::is_any_of(&[
            DataType::Utf8,
            DataType::Utf8View,
            DataType::LargeUtf8,
            DataType::Null,
        ])
    }

    /// Matches an integer, including a null literal
    pub fn is_integer() -> Arc<dyn TypeMatcher + Send + Sync> {
        Self::is_any_of(&[
            DataType::Int8,
            DataType::Int16,
            DataType::Int32,
            DataType::Int64,
            DataType::UInt8,
            DataType::UInt16,
            DataType::UInt32,
            DataType::UInt64,
            DataType::Null,
        ])
    }

    /// Matches an integer or float, including a null literal
    pub fn is_numeric() -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsNumeric {})
    }

    pub fn is_boolean() -> Arc<dyn TypeMatcher + Send + Sync> {
        Self::is_any_of(&[DataType::Boolean, DataType::Null])
    }

    /// Matches any of the supplied matchers
    pub fn or(
        matchers: Vec<Arc<dyn TypeMatcher + Send + Sync>>,
    ) -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(OrMatcher { matchers })
    }

    /// Wraps a matcher so that the argument may be omitted
    pub fn optional(
        matcher: Arc<dyn TypeMatcher + Send + Sync>,
    ) -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(OptionalMatcher { inner: matcher })
    }

    fn is_any_of(data_types: &[DataType]) -> Arc<dyn TypeMatcher + Send + Sync> {
        Arc::new(IsAnyOf {
            data_types: data_types.to_vec(),
        })
    }
}

/// Predicate over a single argument type
pub trait TypeMatcher: Debug {
    /// Returns true if this matcher matches a type
    fn match_type(&self, arg: &SedonaType) -> bool;

    /// Returns true if the argument may be omitted
    fn optional(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct IsAny {}

impl TypeMatcher for IsAny {
    fn match_type(&self, _arg: &SedonaType) -> bool {
        true
    }
}

#[derive(Debug)]
struct IsGeometryOrGeography {
    edges: Option<Edges>,
}

impl TypeMatcher for IsGeometryOrGeography {
    fn match_type(&self, arg: &SedonaType) -> bool {
        match (arg.edges(), self.edges) {
            (Some(_), None) => true,
            (Some(arg_edges), Some(edges)) => arg_edges == edges,
            (None, _) => false,
        }
    }
}

#[derive(Debug)]
struct IsAnyOf {
    data_types: Vec<DataType>,
}

impl TypeMatcher for IsAnyOf {
    fn match_type(&self, arg: &SedonaType) -> bool {
        match arg {
            SedonaType::Arrow(data_type) => self.data_types.contains(data_type),
            _ => false,
        }
    }
}

#[derive(Debug)]
struct IsNumeric {}

impl TypeMatcher for IsNumeric {
    fn match_type(&self, arg: &SedonaType) -> bool {
        match arg {
            SedonaType::Arrow(data_type) => {
                data_type.is_numeric() || matches!(data_type, DataType::Null)
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
struct OrMatcher {
    matchers: Vec<Arc<dyn TypeMatcher + Send + Sync>>,
}

impl TypeMatcher for OrMatcher {
    fn match_type(&self, arg: &SedonaType) -> bool {
        self.matchers.iter().any(|m| m.match_type(arg))
    }
}

#[derive(Debug)]
struct OptionalMatcher {
    inner: Arc<dyn TypeMatcher + Send + Sync>,
}

impl TypeMatcher for OptionalMatcher {
    fn match_type(&self, arg: &SedonaType) -> bool {
        self.inner.match_type(arg)
    }

    fn optional(&self) -> bool {
        true
    }
}
