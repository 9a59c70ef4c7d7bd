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
use std::{collections::HashMap, fmt::Display, str::FromStr};

use datafusion_common::{DataFusionError, Result};

/// Default number of output rows per emitted batch
pub const DEFAULT_TARGET_BATCH_SIZE: usize = 8192;

/// Prefix for spatial join keys in string-based configuration
pub const SPATIAL_JOIN_OPTION_PREFIX: &str = "spatial_join.";

/// Which input of a spatial join is indexed
///
/// For KNN joins the object (right) side is always indexed and this
/// preference is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildSidePreference {
    /// Index the side with fewer rows when statistics are available
    #[default]
    Auto,
    Left,
    Right,
}

impl FromStr for BuildSidePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!(
                "Invalid build side '{other}': expected 'auto', 'left', or 'right'"
            )),
        }
    }
}

impl Display for BuildSidePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Configuration options for spatial join
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialJoinOptions {
    /// Fail the whole join on the first malformed geometry instead of
    /// skipping the offending row and recording a fault
    pub strict_mode: bool,

    /// Maximum number of rows in each output batch
    pub target_batch_size: usize,

    /// Maximum number of probe batches processed concurrently
    pub parallelism: usize,

    /// Which side is indexed
    pub build_side: BuildSidePreference,
}

impl Default for SpatialJoinOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            target_batch_size: DEFAULT_TARGET_BATCH_SIZE,
            parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            build_side: BuildSidePreference::Auto,
        }
    }
}

impl SpatialJoinOptions {
    /// Set a single option from its string form
    ///
    /// Recognized keys:
    /// - `"strict_mode"`: `"true"` or `"false"`
    /// - `"target_batch_size"`: positive integer
    /// - `"parallelism"`: positive integer
    /// - `"build_side"`: `"auto"`, `"left"`, or `"right"`
    ///
    /// Keys may carry the `spatial_join.` prefix. Returns `Ok(false)` for
    /// unrecognized keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        let key = key.strip_prefix(SPATIAL_JOIN_OPTION_PREFIX).unwrap_or(key);
        match key {
            "strict_mode" => {
                self.strict_mode = value.to_lowercase().parse().map_err(|_| {
                    DataFusionError::Configuration(format!(
                        "Invalid strict_mode value '{value}': expected 'true' or 'false'"
                    ))
                })?;
            }
            "target_batch_size" => {
                self.target_batch_size = parse_positive(key, value)?;
            }
            "parallelism" => {
                self.parallelism = parse_positive(key, value)?;
            }
            "build_side" => {
                self.build_side = value.parse().map_err(DataFusionError::Configuration)?;
            }
            _ => return Ok(false),
        }

        Ok(true)
    }

    /// Build options from a map of string key/value pairs
    ///
    /// Unrecognized keys are an error here because a map passed in whole is
    /// expected to contain only spatial join options.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut out = Self::default();
        for (key, value) in options {
            if !out.set(key, value)? {
                return Err(DataFusionError::Configuration(format!(
                    "Unknown spatial join option '{key}'"
                )));
            }
        }

        Ok(out)
    }

    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    pub fn with_target_batch_size(mut self, target_batch_size: usize) -> Self {
        self.target_batch_size = target_batch_size.max(1);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_build_side(mut self, build_side: BuildSidePreference) -> Self {
        self.build_side = build_side;
        self
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(DataFusionError::Configuration(format!(
            "Invalid {key} value '{value}': expected a positive integer"
        ))),
    }
}
