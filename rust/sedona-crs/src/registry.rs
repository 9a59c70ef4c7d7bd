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
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use datafusion_common::{plan_err, DataFusionError, Result};
use sedona_common::SpatialError;
use sedona_geometry::transform::CrsEngine;
use sedona_schema::crs::{deserialize_crs, Crs, CrsIdentifier};

use crate::{
    pipeline::TransformPipeline,
    proj4::{is_geographic_definition, Proj4Transform},
};

/// Round trip tolerance for CRSes in degrees
pub const GEOGRAPHIC_TOLERANCE: f64 = 1e-8;

/// Round trip tolerance for CRSes in metres
pub const PROJECTED_TOLERANCE: f64 = 1e-3;

const DATUM_WGS84: &str = "WGS84";

const LNGLAT_WGS84: &str = "+proj=longlat +ellps=WGS84";

const LNGLAT_GRS80: &str = "+proj=longlat +ellps=GRS80";

const WEB_MERCATOR: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m";

/// Upper bound on alias chain length
const MAX_ALIAS_DEPTH: usize = 32;

/// A registered coordinate reference system
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCrs {
    id: CrsIdentifier,
    name: String,
    datum: String,
    definition: Option<String>,
}

impl CanonicalCrs {
    /// Create a CRS definition
    ///
    /// `definition` is a PROJ.4 string. A definition of `None` registers a
    /// CRS whose coordinates can only be transformed by a configured
    /// [CrsEngine].
    pub fn new(id: CrsIdentifier, name: &str, datum: &str, definition: Option<&str>) -> Self {
        Self {
            id,
            name: name.to_string(),
            datum: datum.to_string(),
            definition: definition.map(str::to_string),
        }
    }

    pub fn id(&self) -> &CrsIdentifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datum(&self) -> &str {
        &self.datum
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    pub fn is_geographic(&self) -> bool {
        self.definition().is_some_and(is_geographic_definition)
    }

    /// Tolerance of a round trip through this CRS, in its own units
    pub fn tolerance(&self) -> f64 {
        if self.is_geographic() {
            GEOGRAPHIC_TOLERANCE
        } else {
            PROJECTED_TOLERANCE
        }
    }
}

/// Catalog of known CRSes and the transforms between them
///
/// Resolution and pipeline construction are pure functions of the registry
/// contents, so a registry may be shared freely between threads.
#[derive(Debug)]
pub struct CrsRegistry {
    entries: HashMap<CrsIdentifier, CanonicalCrs>,
    aliases: HashMap<CrsIdentifier, CrsIdentifier>,
    engine: Option<Arc<dyn CrsEngine>>,
}

impl Default for CrsRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl CrsRegistry {
    /// The registry with the built-in catalog and no aliases
    pub fn standard() -> Self {
        let entries = standard_catalog()
            .into_iter()
            .map(|crs| (crs.id.clone(), crs))
            .collect();

        Self {
            entries,
            aliases: HashMap::new(),
            engine: None,
        }
    }

    pub fn builder() -> CrsRegistryBuilder {
        CrsRegistryBuilder::standard()
    }

    /// The process-wide registry
    ///
    /// Uses the built-in catalog unless [configure_global_crs_registry] was
    /// called first.
    pub fn global() -> Arc<CrsRegistry> {
        global_registry_cell()
            .get_or_init(|| Arc::new(CrsRegistry::standard()))
            .clone()
    }

    /// Resolve a user-supplied identifier to a registered CRS
    ///
    /// Aliases resolve to the CRS they were declared equivalent to. An
    /// identifier meaning "no CRS" (e.g., `"0"`) does not resolve.
    pub fn resolve(&self, identifier: &str) -> Result<&CanonicalCrs> {
        match deserialize_crs(identifier)? {
            Some(id) => self.lookup(&id),
            None => Err(SpatialError::UnknownCrs(identifier.to_string()).into()),
        }
    }

    /// Resolve a user-supplied identifier to a CRS tag
    ///
    /// Unlike [CrsRegistry::resolve], identifiers meaning "no CRS" resolve
    /// to `None`.
    pub fn resolve_crs(&self, identifier: &str) -> Result<Crs> {
        match deserialize_crs(identifier)? {
            Some(id) => Ok(Some(self.lookup(&id)?.id.clone())),
            None => Ok(None),
        }
    }

    /// Look up a parsed identifier
    pub fn lookup(&self, id: &CrsIdentifier) -> Result<&CanonicalCrs> {
        let canonical = self.canonical_id(id);
        self.entries
            .get(&canonical)
            .ok_or_else(|| SpatialError::UnknownCrs(id.to_string()).into())
    }

    pub fn is_registered(&self, id: &CrsIdentifier) -> bool {
        self.entries.contains_key(&self.canonical_id(id))
    }

    /// Follow declared equivalences to the representative identifier
    ///
    /// Unregistered identifiers without aliases are returned unchanged.
    pub fn canonical_id(&self, id: &CrsIdentifier) -> CrsIdentifier {
        let mut current = id;
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.aliases.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }

        current.clone()
    }

    pub fn canonical_crs(&self, crs: &Crs) -> Crs {
        crs.as_ref().map(|id| self.canonical_id(id))
    }

    /// Whether two identifiers refer to the same CRS after canonicalization
    pub fn same_crs(&self, lhs: &CrsIdentifier, rhs: &CrsIdentifier) -> bool {
        lhs == rhs || self.canonical_id(lhs) == self.canonical_id(rhs)
    }

    /// Construct the transform from one CRS to another
    ///
    /// A configured engine is asked first. Otherwise CRSes on the same datum
    /// are connected through their PROJ.4 definitions. Fails with
    /// [SpatialError::UnknownCrs] if either CRS is not registered and
    /// [SpatialError::NoTransformPath] if nothing can connect them.
    pub fn transform_pipeline(
        &self,
        from: &CrsIdentifier,
        to: &CrsIdentifier,
    ) -> Result<TransformPipeline> {
        let source = self.lookup(from)?;
        let target = self.lookup(to)?;

        if source.id == target.id {
            return Ok(TransformPipeline::identity(
                source.id.clone(),
                target.id.clone(),
                target.tolerance(),
            ));
        }

        if let Some(engine) = &self.engine {
            let maybe_transform = engine
                .get_transform_crs_to_crs(&source.id.to_string(), &target.id.to_string())
                .map_err(|err| DataFusionError::External(Box::new(err)))?;
            if let Some(transform) = maybe_transform {
                log::debug!("Using CRS engine for {} -> {}", source.id, target.id);
                return Ok(TransformPipeline::new(
                    source.id.clone(),
                    target.id.clone(),
                    transform,
                    target.tolerance(),
                ));
            }
        }

        let no_path = || -> DataFusionError {
            SpatialError::NoTransformPath {
                from: source.id.to_string(),
                to: target.id.to_string(),
            }
            .into()
        };

        if source.datum != target.datum {
            return Err(no_path());
        }

        match (source.definition(), target.definition()) {
            (Some(from), Some(to)) if from == to => Ok(TransformPipeline::identity(
                source.id.clone(),
                target.id.clone(),
                target.tolerance(),
            )),
            (Some(from), Some(to)) => {
                let transform = Proj4Transform::try_new(from, to)
                    .map_err(|err| DataFusionError::External(Box::new(err)))?;
                Ok(TransformPipeline::new(
                    source.id.clone(),
                    target.id.clone(),
                    Arc::new(transform),
                    target.tolerance(),
                ))
            }
            _ => Err(no_path()),
        }
    }
}

/// Builder for a [CrsRegistry] with additional definitions and aliases
#[derive(Debug)]
pub struct CrsRegistryBuilder {
    registry: CrsRegistry,
}

impl CrsRegistryBuilder {
    /// Start from the built-in catalog
    pub fn standard() -> Self {
        Self {
            registry: CrsRegistry::standard(),
        }
    }

    /// Start from an empty catalog
    pub fn empty() -> Self {
        Self {
            registry: CrsRegistry {
                entries: HashMap::new(),
                aliases: HashMap::new(),
                engine: None,
            },
        }
    }

    /// Register (or replace) a CRS definition
    pub fn with_crs(mut self, crs: CanonicalCrs) -> Self {
        self.registry.entries.insert(crs.id.clone(), crs);
        self
    }

    /// Declare `alias` to be the same CRS as `target`
    ///
    /// After this declaration geometries tagged with either identifier are
    /// compatible and `alias` resolves to `target`'s definition. The target
    /// must already be registered.
    pub fn with_equivalence(mut self, alias: &str, target: &str) -> Result<Self> {
        let (Some(alias_id), Some(target_id)) = (deserialize_crs(alias)?, deserialize_crs(target)?)
        else {
            return plan_err!("Can't declare an equivalence involving an empty CRS");
        };

        let target_canonical = self.registry.lookup(&target_id)?.id.clone();
        let alias_canonical = self.registry.canonical_id(&alias_id);
        if alias_canonical != target_canonical {
            self.registry.entries.remove(&alias_canonical);
            self.registry
                .aliases
                .insert(alias_canonical, target_canonical);
        }

        Ok(self)
    }

    /// Use an external engine for pairs of CRSes it supports
    pub fn with_engine(mut self, engine: Arc<dyn CrsEngine>) -> Self {
        self.registry.engine = Some(engine);
        self
    }

    pub fn build(self) -> CrsRegistry {
        self.registry
    }
}

fn global_registry_cell() -> &'static OnceLock<Arc<CrsRegistry>> {
    static GLOBAL_REGISTRY: OnceLock<Arc<CrsRegistry>> = OnceLock::new();
    &GLOBAL_REGISTRY
}

/// Configure the global CRS registry
///
/// Provides an opportunity for a calling application to register additional
/// CRSes, aliases, or an external engine before the first use of
/// [CrsRegistry::global]. Returns an error if the global registry was
/// already initialized.
pub fn configure_global_crs_registry(registry: CrsRegistry) -> Result<()> {
    global_registry_cell()
        .set(Arc::new(registry))
        .map_err(|_| DataFusionError::Configuration("Global CRS registry already set".to_string()))
}

fn standard_catalog() -> Vec<CanonicalCrs> {
    let mut catalog = vec![
        CanonicalCrs::new(
            CrsIdentifier::new("ogc", "crs84"),
            "WGS 84 (CRS84)",
            DATUM_WGS84,
            Some(LNGLAT_WGS84),
        ),
        CanonicalCrs::new(
            CrsIdentifier::epsg(4326),
            "WGS 84",
            DATUM_WGS84,
            Some(LNGLAT_WGS84),
        ),
        CanonicalCrs::new(
            CrsIdentifier::epsg(3857),
            "WGS 84 / Pseudo-Mercator",
            DATUM_WGS84,
            Some(WEB_MERCATOR),
        ),
        CanonicalCrs::new(
            CrsIdentifier::epsg(4269),
            "NAD83",
            "NAD83",
            Some(LNGLAT_GRS80),
        ),
        CanonicalCrs::new(
            CrsIdentifier::epsg(4258),
            "ETRS89",
            "ETRS89",
            Some(LNGLAT_GRS80),
        ),
    ];

    for zone in 1..=60 {
        let north = format!("+proj=utm +zone={zone} +ellps=WGS84 +units=m");
        catalog.push(CanonicalCrs::new(
            CrsIdentifier::epsg(32600 + zone),
            &format!("WGS 84 / UTM zone {zone}N"),
            DATUM_WGS84,
            Some(&north),
        ));
        catalog.push(CanonicalCrs::new(
            CrsIdentifier::epsg(32700 + zone),
            &format!("WGS 84 / UTM zone {zone}S"),
            DATUM_WGS84,
            Some(&format!("{north} +south")),
        ));
    }

    catalog
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use sedona_geometry::{error::SedonaGeometryError, transform::CrsTransform};

    use super::*;

    fn assert_spatial_error(err: DataFusionError, expected: &SpatialError) {
        assert_eq!(SpatialError::find(&err), Some(expected), "{err}");
    }

    #[test]
    fn resolve() {
        let registry = CrsRegistry::standard();
        let crs = registry.resolve("EPSG:4326").unwrap();
        assert_eq!(crs.id(), &CrsIdentifier::epsg(4326));
        assert_eq!(crs.name(), "WGS 84");
        assert!(crs.is_geographic());

        assert_eq!(
            registry.resolve("32618").unwrap().name(),
            "WGS 84 / UTM zone 18N"
        );
        assert_eq!(
            registry.resolve("OGC:CRS84").unwrap().id().to_string(),
            "ogc:crs84"
        );

        let err = registry.resolve("EPSG:999999").unwrap_err();
        assert_spatial_error(err, &SpatialError::UnknownCrs("epsg:999999".to_string()));
        assert!(registry.resolve("foofy").is_err());
        assert!(registry.resolve("0").is_err());
    }

    #[test]
    fn resolve_crs() {
        let registry = CrsRegistry::standard();
        assert_eq!(registry.resolve_crs("0").unwrap(), None);
        assert_eq!(
            registry.resolve_crs("3857").unwrap(),
            Some(CrsIdentifier::epsg(3857))
        );
        assert!(registry.resolve_crs("ESRI:102003").is_err());
    }

    #[test]
    fn lnglat_crses_are_distinct_by_default() {
        let registry = CrsRegistry::standard();
        let crs84 = CrsIdentifier::new("ogc", "crs84");
        let epsg4326 = CrsIdentifier::epsg(4326);
        assert!(!registry.same_crs(&crs84, &epsg4326));

        // ...but they share a definition, so the transform between them is exact
        let pipeline = registry.transform_pipeline(&crs84, &epsg4326).unwrap();
        assert!(pipeline.is_identity());
        assert_eq!(pipeline.source(), &crs84);
        assert_eq!(pipeline.target(), &epsg4326);
        assert_eq!(pipeline.apply(-74.006, 40.7128).unwrap(), (-74.006, 40.7128));
    }

    #[test]
    fn definitions() {
        let registry = CrsRegistry::standard();
        let utm = registry.resolve("EPSG:32718").unwrap();
        assert_eq!(
            utm.definition(),
            Some("+proj=utm +zone=18 +ellps=WGS84 +units=m +south")
        );
        assert!(!utm.is_geographic());
        assert!(registry.resolve("EPSG:4269").unwrap().is_geographic());
    }

    #[test]
    fn equivalence() {
        let registry = CrsRegistry::builder()
            .with_equivalence("OGC:CRS84", "EPSG:4326")
            .unwrap()
            .build();
        let crs84 = CrsIdentifier::new("ogc", "crs84");
        let epsg4326 = CrsIdentifier::epsg(4326);

        assert!(registry.same_crs(&crs84, &epsg4326));
        assert_eq!(registry.canonical_id(&crs84), epsg4326);
        assert_eq!(registry.resolve("OGC:CRS84").unwrap().id(), &epsg4326);
        assert!(registry
            .transform_pipeline(&crs84, &epsg4326)
            .unwrap()
            .is_identity());

        // Declaring the reverse equivalence is a no-op rather than a cycle
        let registry = CrsRegistry::builder()
            .with_equivalence("OGC:CRS84", "EPSG:4326")
            .unwrap()
            .with_equivalence("EPSG:4326", "OGC:CRS84")
            .unwrap()
            .build();
        assert_eq!(registry.canonical_id(&epsg4326), epsg4326);

        // Unregistered aliases are allowed, unregistered targets are not
        let registry = CrsRegistry::builder()
            .with_equivalence("wgs84:lnglat", "EPSG:4326")
            .unwrap()
            .build();
        assert_eq!(
            registry.resolve("WGS84:lnglat").unwrap().id(),
            &CrsIdentifier::epsg(4326)
        );
        assert!(CrsRegistry::builder()
            .with_equivalence("EPSG:4326", "ESRI:102003")
            .is_err());
        assert!(CrsRegistry::builder().with_equivalence("0", "EPSG:4326").is_err());
    }

    #[test]
    fn transform_pipeline() {
        let registry = CrsRegistry::standard();
        let from = CrsIdentifier::epsg(3857);
        let to = CrsIdentifier::epsg(4326);

        let pipeline = registry.transform_pipeline(&from, &to).unwrap();
        let (lon, lat) = pipeline.apply(-8238310.24, 4969803.34).unwrap();
        assert_relative_eq!(lon, -74.006, epsilon = 1e-3);
        assert!(lat > 40.6 && lat < 40.8);

        let back = registry.transform_pipeline(&to, &from).unwrap();
        let (x, y) = back.apply(lon, lat).unwrap();
        assert_relative_eq!(x, -8238310.24, epsilon = back.tolerance());
        assert_relative_eq!(y, 4969803.34, epsilon = back.tolerance());

        // UTM to Web Mercator goes through geographic coordinates
        let utm = CrsIdentifier::epsg(32618);
        let pipeline = registry.transform_pipeline(&utm, &from).unwrap();
        let (x, _) = pipeline.apply(500000.0, 0.0).unwrap();
        assert_relative_eq!(x, -75f64.to_radians() * 6378137.0, epsilon = 1e-3);

        // Southern zones use a false northing
        let south = CrsIdentifier::epsg(32718);
        let pipeline = registry.transform_pipeline(&to, &south).unwrap();
        let (x, y) = pipeline.apply(-75.0, -0.0001).unwrap();
        assert_relative_eq!(x, 500000.0, epsilon = 1e-3);
        assert!(y < 10000000.0 && y > 9999900.0);

        assert!(registry
            .transform_pipeline(&utm, &utm)
            .unwrap()
            .is_identity());
    }

    #[test]
    fn transform_pipeline_errors() {
        let registry = CrsRegistry::standard();
        let err = registry
            .transform_pipeline(&CrsIdentifier::epsg(4269), &CrsIdentifier::epsg(4326))
            .unwrap_err();
        assert_spatial_error(
            err,
            &SpatialError::NoTransformPath {
                from: "epsg:4269".to_string(),
                to: "epsg:4326".to_string(),
            },
        );

        let err = registry
            .transform_pipeline(&CrsIdentifier::epsg(4326), &CrsIdentifier::epsg(1))
            .unwrap_err();
        assert_spatial_error(err, &SpatialError::UnknownCrs("epsg:1".to_string()));

        let local = CanonicalCrs::new(
            CrsIdentifier::new("local", "site"),
            "Site grid",
            DATUM_WGS84,
            None,
        );
        let registry = CrsRegistry::builder().with_crs(local).build();
        let err = registry
            .transform_pipeline(
                &CrsIdentifier::new("local", "site"),
                &CrsIdentifier::epsg(4326),
            )
            .unwrap_err();
        assert!(matches!(
            SpatialError::find(&err),
            Some(SpatialError::NoTransformPath { .. })
        ));
    }

    #[derive(Debug)]
    struct DatumShift {}

    impl CrsTransform for DatumShift {
        fn transform_coord(&self, coord: &mut (f64, f64)) -> Result<(), SedonaGeometryError> {
            coord.0 += 1e-5;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct NadEngine {}

    impl CrsEngine for NadEngine {
        fn get_transform_crs_to_crs(
            &self,
            from: &str,
            to: &str,
        ) -> Result<Option<Arc<dyn CrsTransform>>, SedonaGeometryError> {
            if from == "epsg:4269" && to == "epsg:4326" {
                Ok(Some(Arc::new(DatumShift {})))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn engine_fallback() {
        let registry = CrsRegistry::builder()
            .with_engine(Arc::new(NadEngine {}))
            .build();
        let pipeline = registry
            .transform_pipeline(&CrsIdentifier::epsg(4269), &CrsIdentifier::epsg(4326))
            .unwrap();
        assert_eq!(pipeline.apply(0.0, 0.0).unwrap(), (1e-5, 0.0));

        // Pairs the engine doesn't handle use the catalog definitions
        assert!(registry
            .transform_pipeline(&CrsIdentifier::epsg(4326), &CrsIdentifier::epsg(3857))
            .is_ok());
    }

    #[test]
    fn empty_builder() {
        let registry = CrsRegistryBuilder::empty().build();
        assert!(!registry.is_registered(&CrsIdentifier::epsg(4326)));
        assert!(registry.resolve("EPSG:4326").is_err());
    }

    #[test]
    fn global() {
        let registry = CrsRegistry::global();
        assert!(registry.is_registered(&CrsIdentifier::epsg(3857)));
        assert!(Arc::ptr_eq(&registry, &CrsRegistry::global()));
    }
}
