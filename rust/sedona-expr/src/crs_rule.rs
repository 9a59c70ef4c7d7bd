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
use datafusion_common::Result;
use sedona_common::SpatialError;
use sedona_crs::CrsRegistry;
use sedona_schema::{
    crs::{Crs, CrsIdentifier},
    datatypes::SedonaType,
};

/// Check that all geometry arguments of a call site agree on a CRS
///
/// Non-spatial arguments are ignored. Two tagged arguments must canonicalize
/// to the same CRS or this fails with [SpatialError::MismatchedCrs], naming
/// the first disagreeing pair in argument order. Untagged arguments are
/// compatible with anything; if any geometry argument is untagged the shared
/// CRS is `None` because the result cannot claim a CRS its inputs did not all
/// declare.
///
/// Returns the canonical shared CRS.
pub fn check_crs_compatibility(registry: &CrsRegistry, arg_types: &[SedonaType]) -> Result<Crs> {
    let mut declared: Option<&CrsIdentifier> = None;
    let mut any_untagged = false;

    for crs in arg_types.iter().filter_map(|arg_type| arg_type.crs()) {
        match (crs, declared) {
            (None, _) => any_untagged = true,
            (Some(id), None) => declared = Some(id),
            (Some(id), Some(first)) => {
                if !registry.same_crs(first, id) {
                    return Err(SpatialError::MismatchedCrs(first.to_string(), id.to_string()).into());
                }
            }
        }
    }

    match declared {
        Some(id) if any_untagged => {
            log::debug!("Mixing untagged geometry arguments with {id}; result is untagged");
            Ok(None)
        }
        Some(id) => Ok(Some(registry.canonical_id(id))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;
    use rstest::rstest;
    use sedona_crs::CrsRegistryBuilder;
    use sedona_schema::datatypes::{WKB_GEOGRAPHY, WKB_GEOMETRY, WKB_VIEW_GEOMETRY};

    use super::*;

    fn geometry(code: u32) -> SedonaType {
        WKB_GEOMETRY
            .with_crs(Some(CrsIdentifier::epsg(code)))
            .unwrap()
    }

    #[test]
    fn no_geometry_args() {
        let registry = CrsRegistry::standard();
        let args = [
            SedonaType::Arrow(DataType::Int32),
            SedonaType::Arrow(DataType::Utf8),
        ];
        assert_eq!(check_crs_compatibility(&registry, &args).unwrap(), None);
        assert_eq!(check_crs_compatibility(&registry, &[]).unwrap(), None);
    }

    #[test]
    fn matching_crs() {
        let registry = CrsRegistry::standard();
        let view_4326 = WKB_VIEW_GEOMETRY
            .with_crs(Some(CrsIdentifier::epsg(4326)))
            .unwrap();
        let args = [
            geometry(4326),
            SedonaType::Arrow(DataType::Float64),
            view_4326,
        ];
        assert_eq!(
            check_crs_compatibility(&registry, &args).unwrap(),
            Some(CrsIdentifier::epsg(4326))
        );
    }

    #[rstest]
    #[case(3857, 4326, "epsg:3857", "epsg:4326")]
    #[case(4326, 3857, "epsg:4326", "epsg:3857")]
    #[case(4326, 4269, "epsg:4326", "epsg:4269")]
    fn mismatched_crs(
        #[case] lhs: u32,
        #[case] rhs: u32,
        #[case] lhs_label: &str,
        #[case] rhs_label: &str,
    ) {
        let registry = CrsRegistry::standard();
        let err = check_crs_compatibility(&registry, &[geometry(lhs), geometry(rhs)]).unwrap_err();
        let spatial_err = SpatialError::find(&err).unwrap();
        assert_eq!(
            spatial_err,
            &SpatialError::MismatchedCrs(lhs_label.to_string(), rhs_label.to_string())
        );
        assert_eq!(spatial_err.category(), "type_coercion");
        assert!(spatial_err.hint().unwrap().contains("ST_Transform"));
    }

    #[test]
    fn untagged_args() {
        let registry = CrsRegistry::standard();
        assert_eq!(
            check_crs_compatibility(&registry, &[WKB_GEOMETRY, WKB_GEOMETRY]).unwrap(),
            None
        );
        assert_eq!(
            check_crs_compatibility(&registry, &[geometry(3857), WKB_GEOMETRY]).unwrap(),
            None
        );
        assert_eq!(
            check_crs_compatibility(&registry, &[WKB_GEOMETRY, geometry(3857)]).unwrap(),
            None
        );

        // An untagged argument does not excuse two disagreeing tags
        assert!(check_crs_compatibility(
            &registry,
            &[geometry(3857), WKB_GEOMETRY, geometry(4326)]
        )
        .is_err());
    }

    #[test]
    fn geography_args() {
        let registry = CrsRegistry::standard();
        let geog = WKB_GEOGRAPHY
            .with_crs(Some(CrsIdentifier::epsg(4326)))
            .unwrap();
        assert_eq!(
            check_crs_compatibility(&registry, &[geog.clone(), geog]).unwrap(),
            Some(CrsIdentifier::epsg(4326))
        );
    }

    #[test]
    fn declared_equivalence() {
        let ogc_crs84 = CrsIdentifier::new("OGC", "CRS84");
        let args = [
            geometry(4326),
            WKB_GEOMETRY.with_crs(Some(ogc_crs84.clone())).unwrap(),
        ];

        let registry = CrsRegistry::standard();
        assert!(check_crs_compatibility(&registry, &args).is_err());

        let registry = CrsRegistryBuilder::standard()
            .with_equivalence("EPSG:4326", "OGC:CRS84")
            .unwrap()
            .build();
        assert_eq!(
            check_crs_compatibility(&registry, &args).unwrap(),
            Some(ogc_crs84)
        );
    }

    #[test]
    fn unregistered_crs_compares_syntactically() {
        let registry = CrsRegistry::standard();
        let custom = WKB_GEOMETRY
            .with_crs(Some(CrsIdentifier::new("custom", "1")))
            .unwrap();
        assert_eq!(
            check_crs_compatibility(&registry, &[custom.clone(), custom.clone()]).unwrap(),
            Some(CrsIdentifier::new("custom", "1"))
        );
        assert!(check_crs_compatibility(&registry, &[custom, geometry(4326)]).is_err());
    }
}
