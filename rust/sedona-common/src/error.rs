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
use datafusion_common::DataFusionError;
use thiserror::Error;

/// Error category for failures caused by incompatible argument types
pub const CATEGORY_TYPE_COERCION: &str = "type_coercion";

/// Error category for failures resolving or transforming between CRSes
pub const CATEGORY_CRS: &str = "crs";

/// Error category for failures decoding geometry payloads
pub const CATEGORY_GEOMETRY: &str = "geometry";

/// Typed spatial errors
///
/// These are carried through DataFusion's error type as
/// [DataFusionError::External] so that they can travel through the same
/// `Result` as every other failure. Use [SpatialError::find] to recover the
/// typed value from a [DataFusionError].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    /// The CRS identifier could not be parsed or is not registered
    #[error("Unknown CRS: '{0}'")]
    UnknownCrs(String),

    /// A transform was requested for a geometry that carries no CRS
    #[error("Can't transform a geometry with no declared CRS")]
    NoDeclaredCrs,

    /// Both CRSes are known but no path exists between them
    #[error("No transform path from {from} to {to}")]
    NoTransformPath { from: String, to: String },

    /// Two geometry arguments of one call site carry different CRSes
    #[error("Mismatched CRS arguments: {0} vs {1}")]
    MismatchedCrs(String, String),

    /// A geometry payload failed to decode
    #[error("Malformed geometry: {0}")]
    MalformedGeometry(String),
}

impl SpatialError {
    /// The category reported alongside the message
    pub fn category(&self) -> &'static str {
        match self {
            SpatialError::MismatchedCrs(_, _) => CATEGORY_TYPE_COERCION,
            SpatialError::UnknownCrs(_)
            | SpatialError::NoDeclaredCrs
            | SpatialError::NoTransformPath { .. } => CATEGORY_CRS,
            SpatialError::MalformedGeometry(_) => CATEGORY_GEOMETRY,
        }
    }

    /// Whether this error is raised while planning (before any row is read)
    ///
    /// Everything except [SpatialError::MalformedGeometry] is a planning error.
    pub fn is_planning(&self) -> bool {
        !matches!(self, SpatialError::MalformedGeometry(_))
    }

    /// A suggestion for the user on how to resolve the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SpatialError::MismatchedCrs(_, _) => {
                Some("Use ST_Transform() or ST_SetSRID() to ensure arguments are compatible.")
            }
            SpatialError::NoDeclaredCrs => {
                Some("Use ST_SetSRID() or ST_SetCRS() to declare the CRS of the input")
            }
            SpatialError::UnknownCrs(_) => {
                Some("Use an identifier of the form 'authority:code' (e.g., 'EPSG:4326')")
            }
            SpatialError::NoTransformPath { .. } | SpatialError::MalformedGeometry(_) => None,
        }
    }

    /// Find a [SpatialError] carried by a [DataFusionError]
    ///
    /// Looks through context and shared wrappers added while the error
    /// propagated.
    pub fn find(err: &DataFusionError) -> Option<&SpatialError> {
        match err {
            DataFusionError::External(inner) => inner.downcast_ref::<SpatialError>(),
            DataFusionError::Context(_, inner) => Self::find(inner),
            DataFusionError::Shared(inner) => Self::find(inner),
            _ => None,
        }
    }
}

impl From<SpatialError> for DataFusionError {
    fn from(value: SpatialError) -> Self {
        DataFusionError::External(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn mismatched_crs() {
        let err = SpatialError::MismatchedCrs("epsg:3857".to_string(), "epsg:4326".to_string());
        assert_eq!(
            err.to_string(),
            "Mismatched CRS arguments: epsg:3857 vs epsg:4326"
        );
        assert_eq!(err.category(), "type_coercion");
        assert!(err.is_planning());

        let hint = err.hint().unwrap();
        assert!(hint.contains("ST_Transform"));
        assert!(hint.contains("ST_SetSRID"));
    }

    #[test]
    fn categories() {
        assert_eq!(SpatialError::NoDeclaredCrs.category(), CATEGORY_CRS);
        assert_eq!(
            SpatialError::UnknownCrs("foofy".to_string()).category(),
            CATEGORY_CRS
        );
        let malformed = SpatialError::MalformedGeometry("truncated".to_string());
        assert_eq!(malformed.category(), CATEGORY_GEOMETRY);
        assert!(!malformed.is_planning());
        assert!(malformed.hint().is_none());
    }

    #[test]
    fn find_through_wrappers() {
        let err: DataFusionError = SpatialError::NoDeclaredCrs.into();
        assert_eq!(SpatialError::find(&err), Some(&SpatialError::NoDeclaredCrs));
        assert!(err.to_string().contains("no declared CRS"));

        let err = DataFusionError::Context("while planning".to_string(), Box::new(err));
        assert_eq!(SpatialError::find(&err), Some(&SpatialError::NoDeclaredCrs));

        let err = DataFusionError::Shared(Arc::new(err));
        assert_eq!(SpatialError::find(&err), Some(&SpatialError::NoDeclaredCrs));

        let err = DataFusionError::Plan("something else".to_string());
        assert!(SpatialError::find(&err).is_none());
    }
}
