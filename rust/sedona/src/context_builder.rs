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

use std::{collections::HashMap, sync::Arc};

use datafusion_common::{DataFusionError, Result};
use sedona_common::{option::SPATIAL_JOIN_OPTION_PREFIX, CancellationFlag, SpatialJoinOptions};
use sedona_crs::CrsRegistry;

use crate::context::SedonaContext;

/// Option key declaring CRS equivalences as `alias=target[,alias=target...]`
pub const CRS_EQUIVALENCES_OPTION: &str = "crs_equivalences";

/// Builder for constructing a [`SedonaContext`]
///
/// This builder centralizes the choice of CRS registry and spatial join
/// options so that the same logic can be reused by every entry point.
///
/// # Examples
///
/// ```rust,no_run
/// # fn example() -> datafusion_common::Result<()> {
/// use sedona::context_builder::SedonaContextBuilder;
/// use sedona_common::SpatialJoinOptions;
///
/// let ctx = SedonaContextBuilder::new()
///     .with_spatial_join_options(SpatialJoinOptions::default().with_strict_mode(true))
///     .with_crs_equivalence("OGC:CRS84", "EPSG:4326")
///     .build()?;
/// # Ok(())
/// # }
/// ```
///
/// String-based configuration:
///
/// ```rust,no_run
/// # fn example() -> datafusion_common::Result<()> {
/// use std::collections::HashMap;
/// use sedona::context_builder::SedonaContextBuilder;
///
/// let mut opts = HashMap::new();
/// opts.insert("spatial_join.parallelism".to_string(), "4".to_string());
/// opts.insert("crs_equivalences".to_string(), "OGC:CRS84=EPSG:4326".to_string());
///
/// let ctx = SedonaContextBuilder::from_options(&opts)?.build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SedonaContextBuilder {
    registry: Option<Arc<CrsRegistry>>,
    equivalences: Vec<(String, String)>,
    options: SpatialJoinOptions,
    cancellation: CancellationFlag,
}

impl SedonaContextBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - the global CRS registry
    /// - default [SpatialJoinOptions]
    /// - a fresh cancellation flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from string-based key-value options.
    ///
    /// Recognized keys:
    /// - `"spatial_join.<option>"`: any option accepted by
    ///   [SpatialJoinOptions::set]. Unknown options under this prefix are an
    ///   error.
    /// - `"crs_equivalences"`: comma-separated `alias=target` pairs
    ///
    /// Other keys are ignored.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Self::new();

        for (key, value) in options {
            if key.starts_with(SPATIAL_JOIN_OPTION_PREFIX) {
                if !builder.options.set(key, value)? {
                    return Err(DataFusionError::Configuration(format!(
                        "Unknown spatial join option '{key}'"
                    )));
                }
            }
        }

        if let Some(equivalences) = options.get(CRS_EQUIVALENCES_OPTION) {
            for pair in equivalences.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let Some((alias, target)) = pair.split_once('=') else {
                    return Err(DataFusionError::Configuration(format!(
                        "Invalid CRS equivalence '{pair}': expected 'alias=target'"
                    )));
                };
                builder = builder.with_crs_equivalence(alias.trim(), target.trim());
            }
        }

        Ok(builder)
    }

    /// Use `registry` instead of the global registry
    pub fn with_registry(mut self, registry: Arc<CrsRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Declare `alias` to be the same CRS as `target`
    ///
    /// Equivalences are applied on top of the built-in catalog when the
    /// context is built. They can't be combined with
    /// [with_registry](Self::with_registry): declare them on the custom
    /// registry instead.
    pub fn with_crs_equivalence(mut self, alias: &str, target: &str) -> Self {
        self.equivalences
            .push((alias.to_string(), target.to_string()));
        self
    }

    pub fn with_spatial_join_options(mut self, options: SpatialJoinOptions) -> Self {
        self.options = options;
        self
    }

    /// Share `cancellation` with the context
    ///
    /// Cancelling the flag stops in-flight operations of the context at the
    /// next batch boundary.
    pub fn with_cancellation_flag(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Build the [`CrsRegistry`] from the current configuration.
    pub fn build_registry(&self) -> Result<Arc<CrsRegistry>> {
        match (&self.registry, self.equivalences.is_empty()) {
            (Some(registry), true) => Ok(registry.clone()),
            (Some(_), false) => Err(DataFusionError::Configuration(
                "CRS equivalences can't be combined with a custom CRS registry".to_string(),
            )),
            (None, true) => Ok(CrsRegistry::global()),
            (None, false) => {
                let mut builder = CrsRegistry::builder();
                for (alias, target) in &self.equivalences {
                    builder = builder.with_equivalence(alias, target)?;
                }
                Ok(Arc::new(builder.build()))
            }
        }
    }

    /// Build a [`SedonaContext`] from the current configuration.
    ///
    /// Functions that resolve CRS identifiers are bound to the registry of
    /// the new context. In strict mode ST_Transform fails on the first row
    /// it can't transform instead of returning NULL for it.
    pub fn build(self) -> Result<SedonaContext> {
        let registry = self.build_registry()?;
        let mut functions = sedona_functions::register::function_set_with_registry(registry.clone());
        if self.options.strict_mode {
            functions.insert_scalar_udf(
                sedona_functions::st_transform::st_transform_with_options_udf(
                    registry.clone(),
                    true,
                ),
            );
        }
        sedona_geo::register::register_kernels(&mut functions)?;

        log::debug!(
            "Built SedonaContext with {} functions and {:?}",
            functions.scalar_udfs().count(),
            self.options
        );
        Ok(SedonaContext::new_with_parts(
            registry,
            functions,
            self.options,
            self.cancellation,
        ))
    }
}
