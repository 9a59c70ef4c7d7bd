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
use arrow_schema::Schema;
use datafusion_common::{plan_err, Result};

use crate::{crs::Crs, datatypes::SedonaType};

/// A geometry or geography column of a schema with its resolved type
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryColumn {
    pub name: String,
    pub index: usize,
    pub sedona_type: SedonaType,
}

impl GeometryColumn {
    pub fn crs(&self) -> &Crs {
        // Only spatial types are ever stored in a GeometryColumn
        self.sedona_type.crs().unwrap_or(&None)
    }

    /// `<name>: <encoding> <crs|none>`
    pub fn describe(&self) -> String {
        format!("{}: {}", self.name, self.sedona_type.describe())
    }
}

/// Extension methods for Arrow schemas carrying geometry columns
pub trait SedonaSchema {
    /// The [SedonaType] of every field
    fn sedona_types(&self) -> Result<Vec<SedonaType>>;

    /// All geometry or geography columns in field order
    fn geometry_columns(&self) -> Result<Vec<GeometryColumn>>;

    /// Look up a geometry column by name
    fn geometry_column(&self, name: &str) -> Result<GeometryColumn>;
}

impl SedonaSchema for Schema {
    fn sedona_types(&self) -> Result<Vec<SedonaType>> {
        self.fields()
            .iter()
            .map(|field| SedonaType::from_storage_field(field))
            .collect()
    }

    fn geometry_columns(&self) -> Result<Vec<GeometryColumn>> {
        let mut columns = Vec::new();
        for (index, field) in self.fields().iter().enumerate() {
            let sedona_type = SedonaType::from_storage_field(field)?;
            if sedona_type.is_geometry_or_geography() {
                columns.push(GeometryColumn {
                    name: field.name().clone(),
                    index,
                    sedona_type,
                });
            }
        }

        Ok(columns)
    }

    fn geometry_column(&self, name: &str) -> Result<GeometryColumn> {
        let index = self.index_of(name)?;
        let sedona_type = SedonaType::from_storage_field(self.field(index))?;
        if !sedona_type.is_geometry_or_geography() {
            return plan_err!("Column '{name}' is not a geometry column ({sedona_type})");
        }

        Ok(GeometryColumn {
            name: name.to_string(),
            index,
            sedona_type,
        })
    }
}
