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
use std::collections::HashMap;

use datafusion_common::{plan_err, Result};

use crate::scalar_udf::{IntoScalarKernelRefs, SedonaScalarUDF};

/// A collection of functions keyed by (lowercase) name
///
/// Aliases resolve to the function they were declared on. Function sets from
/// several crates are merged into one so that a crate providing faster or
/// more complete kernels can add them to a function defined elsewhere.
#[derive(Debug, Clone, Default)]
pub struct FunctionSet {
    scalar_udfs: HashMap<String, SedonaScalarUDF>,
    aliases: HashMap<String, String>,
}

impl FunctionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over all functions (aliases are not repeated)
    pub fn scalar_udfs(&self) -> impl Iterator<Item = &SedonaScalarUDF> {
        self.scalar_udfs.values()
    }

    /// Look up a function by name or alias
    pub fn scalar_udf(&self, name: &str) -> Option<&SedonaScalarUDF> {
        let name = name.to_lowercase();
        let resolved = self.aliases.get(&name).unwrap_or(&name);
        self.scalar_udfs.get(resolved)
    }

    fn scalar_udf_mut(&mut self, name: &str) -> Option<&mut SedonaScalarUDF> {
        let name = name.to_lowercase();
        let resolved = self.aliases.get(&name).cloned().unwrap_or(name);
        self.scalar_udfs.get_mut(&resolved)
    }

    /// Insert a function, returning any function it replaced
    pub fn insert_scalar_udf(&mut self, udf: SedonaScalarUDF) -> Option<SedonaScalarUDF> {
        let name = udf.name().to_lowercase();
        for alias in udf.aliases() {
            self.aliases.insert(alias.to_lowercase(), name.clone());
        }

        self.scalar_udfs.insert(name, udf)
    }

    /// Add kernels to an existing function
    pub fn add_scalar_udf_kernels(
        &mut self,
        name: &str,
        kernels: impl IntoScalarKernelRefs,
    ) -> Result<&SedonaScalarUDF> {
        match self.scalar_udf_mut(name) {
            Some(udf) => {
                udf.add_kernels(kernels);
                Ok(udf)
            }
            None => plan_err!("Can't add kernels to unknown function '{name}'"),
        }
    }

    /// Merge another set into this one
    ///
    /// Functions that exist in both sets keep this set's kernels with the
    /// other set's kernels added (and therefore preferred).
    pub fn merge(&mut self, other: FunctionSet) {
        for (name, udf) in other.scalar_udfs {
            match self.scalar_udfs.get_mut(&name) {
                Some(existing) => existing.add_kernels(udf.kernels().to_vec()),
                None => {
                    self.insert_scalar_udf(udf);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::DataType;
    use datafusion_common::ScalarValue;
    use sedona_crs::CrsRegistry;
    use sedona_schema::{datatypes::SedonaType, matchers::ArgMatcher};

    use crate::scalar_udf::SimpleSedonaScalarKernel;

    use super::*;

    fn constant_udf(name: &str, value: i32) -> SedonaScalarUDF {
        SedonaScalarUDF::from_kernel(
            name,
            SimpleSedonaScalarKernel::new_ref(
                ArgMatcher::new(vec![], SedonaType::Arrow(DataType::Int32)),
                Arc::new(move |_, _| Ok(ScalarValue::Int32(Some(value)).into())),
            ),
        )
    }

    #[test]
    fn insert_and_lookup() {
        let mut functions = FunctionSet::new();
        assert!(functions.scalar_udf("foofy").is_none());

        let udf = constant_udf("foofy", 1).with_aliases(vec!["ST_Foofy".to_string()]);
        assert!(functions.insert_scalar_udf(udf).is_none());
        assert_eq!(functions.scalar_udfs().count(), 1);
        assert_eq!(functions.scalar_udf("foofy").unwrap().name(), "foofy");
        assert_eq!(functions.scalar_udf("FOOFY").unwrap().name(), "foofy");
        assert_eq!(functions.scalar_udf("st_foofy").unwrap().name(), "foofy");

        assert!(functions
            .insert_scalar_udf(constant_udf("foofy", 2))
            .is_some());
    }

    #[test]
    fn add_kernels_and_merge() {
        let registry = CrsRegistry::standard();
        let mut functions = FunctionSet::new();
        functions.insert_scalar_udf(SedonaScalarUDF::new_stub("foofy", None));
        assert!(functions
            .scalar_udf("foofy")
            .unwrap()
            .bind(&registry, &[], &[])
            .is_err());

        let mut other = FunctionSet::new();
        other.insert_scalar_udf(constant_udf("foofy", 1));
        other.insert_scalar_udf(constant_udf("barfy", 2));
        functions.merge(other);

        assert_eq!(functions.scalar_udfs().count(), 2);
        let bound = functions
            .scalar_udf("foofy")
            .unwrap()
            .bind(&registry, &[], &[])
            .unwrap();
        assert_eq!(bound.return_type(), &SedonaType::Arrow(DataType::Int32));

        functions
            .add_scalar_udf_kernels("barfy", constant_udf("x", 3).kernels().to_vec())
            .unwrap();
        assert_eq!(functions.scalar_udf("barfy").unwrap().kernels().len(), 2);
        assert!(functions
            .add_scalar_udf_kernels("not_a_function", Vec::new())
            .is_err());
    }
}
