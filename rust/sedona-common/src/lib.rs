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
pub mod cancellation;
pub mod error;
pub mod option;

pub use cancellation::CancellationFlag;
pub use error::SpatialError;
pub use option::{BuildSidePreference, SpatialJoinOptions};

#[doc(hidden)]
pub use datafusion_common as __datafusion_common;

/// Create an internal [DataFusionError](datafusion_common::DataFusionError)
///
/// Internal errors indicate a bug in Sedona rather than a user error and
/// point users at the issue tracker.
#[macro_export]
macro_rules! sedona_internal_datafusion_err {
    ($($args:tt)*) => {
        $crate::__datafusion_common::DataFusionError::Internal(format!(
            "{}\nThis issue was likely caused by a bug in SedonaDB's code. \
             Please help us to resolve this by filing a bug report in our issue tracker: \
             https://github.com/apache/sedona-db/issues",
            format!($($args)*)
        ))
    };
}

/// Return an internal error wrapped in `Err`
#[macro_export]
macro_rules! sedona_internal_err {
    ($($args:tt)*) => {
        Err($crate::sedona_internal_datafusion_err!($($args)*))
    };
}

#[cfg(test)]
mod tests {
    use datafusion_common::{DataFusionError, Result};

    #[test]
    fn internal_err() {
        let value = 5;
        let err: Result<()> = sedona_internal_err!("unexpected value {value}");
        match err.unwrap_err() {
            DataFusionError::Internal(message) => {
                assert!(message.starts_with("unexpected value 5"));
                assert!(message.contains("bug report"));
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
