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

/// Errors raised by geometry utilities that do not depend on DataFusion
#[derive(Debug, Error)]
pub enum SedonaGeometryError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl From<SedonaGeometryError> for DataFusionError {
    fn from(value: SedonaGeometryError) -> Self {
        DataFusionError::Execution(value.to_string())
    }
}
