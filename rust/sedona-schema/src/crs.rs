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
use std::{fmt::Display, str::FromStr};

use datafusion_common::{DataFusionError, Result};
use sedona_common::SpatialError;
use serde_json::Value;

/// Minimal PROJJSON for OGC:CRS84 (longitude/latitude on WGS 84)
pub const OGC_CRS84_PROJJSON: &str = r#"{
  "$schema": "https://proj.org/schemas/v0.7/projjson.schema.json",
  "type": "GeographicCRS",
  "name": "WGS 84 (CRS84)",
  "id": {"authority": "OGC", "code": "CRS84"}
}"#;

/// A coordinate reference system identifier in canonical form
///
/// The canonical form is `authority:code` with both parts lowercased, so
/// `EPSG:4326`, `epsg:4326`, and `4326` all produce the same value.
/// Identifiers are small and cheap to clone; they are the CRS tag carried by
/// every geometry type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrsIdentifier {
    authority: String,
    code: String,
}

/// The CRS tag of a geometry column; `None` means no declared CRS
pub type Crs = Option<CrsIdentifier>;

impl CrsIdentifier {
    pub fn new(authority: &str, code: &str) -> Self {
        Self {
            authority: authority.trim().to_lowercase(),
            code: code.trim().to_lowercase(),
        }
    }

    pub fn epsg(code: u32) -> Self {
        Self::new("epsg", &code.to_string())
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// The integer SRID if this is an EPSG identifier
    pub fn srid(&self) -> Option<u32> {
        if self.authority == "epsg" {
            self.code.parse().ok()
        } else {
            None
        }
    }

    /// Serialize as a JSON value suitable for column metadata
    pub fn to_json(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl Display for CrsIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl FromStr for CrsIdentifier {
    type Err = DataFusionError;

    /// Parse `authority:code`, a bare integer EPSG code, or an OGC URN
    /// (`urn:ogc:def:crs:EPSG::4326`)
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return match trimmed.parse::<u32>() {
                Ok(code) if code != 0 => Ok(Self::epsg(code)),
                _ => Err(SpatialError::UnknownCrs(s.to_string()).into()),
            };
        }

        let parts = trimmed.split(':').collect::<Vec<_>>();
        let (authority, code) = match parts.as_slice() {
            [authority, code] => (*authority, *code),
            ["urn" | "URN", "ogc" | "OGC", "def", "crs", authority, _version, code] => {
                (*authority, *code)
            }
            _ => return Err(SpatialError::UnknownCrs(s.to_string()).into()),
        };

        if !is_identifier_part(authority) || !is_identifier_part(code) {
            return Err(SpatialError::UnknownCrs(s.to_string()).into());
        }

        Ok(Self::new(authority, code))
    }
}

fn is_identifier_part(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parse a user-supplied CRS string
///
/// Empty strings and `"0"` mean "no CRS". Strings beginning with `{` are
/// parsed as PROJJSON and must carry an `id` member.
pub fn deserialize_crs(value: &str) -> Result<Crs> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return Ok(None);
    }

    if trimmed.starts_with('{') || trimmed.starts_with('"') {
        let json: Value = serde_json::from_str(trimmed)
            .map_err(|_| SpatialError::UnknownCrs(value.to_string()))?;
        return deserialize_crs_from_json(&json);
    }

    CrsIdentifier::from_str(trimmed).map(Some)
}

/// Parse a CRS from its JSON representation in column or file metadata
///
/// Accepts `null`, a string, an integer EPSG code, or a PROJJSON object
/// with an `id` member.
pub fn deserialize_crs_from_json(value: &Value) -> Result<Crs> {
    match value {
        Value::Null => Ok(None),
        Value::String(string_value) => deserialize_crs(string_value),
        Value::Number(number) => match number.as_u64() {
            Some(0) => Ok(None),
            Some(code) if code <= u32::MAX as u64 => Ok(Some(CrsIdentifier::epsg(code as u32))),
            _ => Err(SpatialError::UnknownCrs(value.to_string()).into()),
        },
        Value::Object(map) => {
            let id = map.get("id").and_then(|id| id.as_object());
            let authority = id
                .and_then(|id| id.get("authority"))
                .and_then(|authority| authority.as_str());
            let code = id.and_then(|id| id.get("code")).and_then(|code| match code {
                Value::String(code) => Some(code.clone()),
                Value::Number(code) => Some(code.to_string()),
                _ => None,
            });

            match (authority, code) {
                (Some(authority), Some(code))
                    if is_identifier_part(authority) && is_identifier_part(&code) =>
                {
                    Ok(Some(CrsIdentifier::new(authority, &code)))
                }
                _ => Err(SpatialError::UnknownCrs(value.to_string()).into()),
            }
        }
        _ => Err(SpatialError::UnknownCrs(value.to_string()).into()),
    }
}

/// The CRS assumed by GeoParquet when a column declares none
pub fn lnglat() -> Crs {
    Some(CrsIdentifier::new("ogc", "crs84"))
}

/// Display a CRS tag, using `none` for the absent tag
pub fn crs_display(crs: &Crs) -> String {
    match crs {
        Some(crs) => crs.to_string(),
        None => "none".to_string(),
    }
}
