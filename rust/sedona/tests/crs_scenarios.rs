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

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, Int32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use datafusion_common::ScalarValue;
use datafusion_expr::ColumnarValue;
use rstest::rstest;
use sedona::{SedonaContext, SedonaContextBuilder, SpatialTable};
use sedona_common::{error::CATEGORY_TYPE_COERCION, SpatialError};
use sedona_geometry::spatial_relation::SpatialRelationType;
use sedona_schema::{
    crs::CrsIdentifier,
    datatypes::{SedonaType, WKB_GEOMETRY},
    schema::SedonaSchema,
};
use sedona_spatial_join::{
    spatial_predicate::RelationPredicate, JoinState, SpatialPredicate,
};
use sedona_testing::{
    compare::assert_wkb_array_approx_equal,
    create::{create_array, create_array_value},
};

const NYC_3857: &str = "POINT (-8238310.24 4969803.34)";
const NYC_4326: &str = "POINT (-74.00600003910364 40.71097350035226)";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tagged(code: u32) -> SedonaType {
    WKB_GEOMETRY
        .with_crs(Some(CrsIdentifier::epsg(code)))
        .unwrap()
}

fn table(sedona_type: &SedonaType, ids: &[i32], wkts: &[Option<&str>]) -> SpatialTable {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        sedona_type.to_storage_field("geom", true).unwrap(),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int32Array::from(ids.to_vec())),
            create_array(wkts, sedona_type),
        ],
    )
    .unwrap();
    (schema, vec![batch])
}

fn points_3857() -> SpatialTable {
    table(&tagged(3857), &[1], &[Some(NYC_3857)])
}

fn polygons_4326() -> SpatialTable {
    table(
        &tagged(4326),
        &[10, 11],
        &[
            Some("MULTIPOLYGON (((10 10, 11 10, 11 11, 10 11, 10 10)))"),
            Some("MULTIPOLYGON (((-74.3 40.5, -73.7 40.5, -73.7 40.9, -74.3 40.9, -74.3 40.5)))"),
        ],
    )
}

fn intersects() -> SpatialPredicate {
    SpatialPredicate::Relation(RelationPredicate::new(
        "geom",
        "geom",
        SpatialRelationType::Intersects,
    ))
}

fn array(value: ColumnarValue) -> ArrayRef {
    match value {
        ColumnarValue::Array(array) => array,
        ColumnarValue::Scalar(scalar) => scalar.to_array().unwrap(),
    }
}

#[tokio::test]
async fn mismatched_crs_join_fails_at_planning() {
    init_logging();
    let ctx = SedonaContext::new().unwrap();

    let err = ctx
        .spatial_join(points_3857(), polygons_4326(), intersects())
        .await
        .unwrap_err();

    assert_eq!(
        SpatialError::find(&err),
        Some(&SpatialError::MismatchedCrs(
            "epsg:3857".to_string(),
            "epsg:4326".to_string()
        ))
    );
    let spatial_err = SpatialError::find(&err).unwrap();
    assert!(spatial_err.is_planning());
    assert_eq!(spatial_err.category(), CATEGORY_TYPE_COERCION);
    assert!(spatial_err.hint().unwrap().contains("ST_Transform"));
    assert!(err
        .to_string()
        .contains("Mismatched CRS arguments: epsg:3857 vs epsg:4326"));
}

#[tokio::test]
async fn transformed_points_join_polygons() {
    init_logging();
    let ctx = SedonaContext::new().unwrap();

    let points = ctx
        .map_column(
            &points_3857(),
            "geom",
            "st_transform",
            &[ScalarValue::from("EPSG:4326")],
        )
        .unwrap();
    assert_eq!(
        points.0.geometry_column("geom").unwrap().sedona_type,
        tagged(4326)
    );
    assert_wkb_array_approx_equal(
        points.1[0].column(1),
        &create_array(&[Some(NYC_4326)], &WKB_GEOMETRY),
        1e-6,
    );

    let result = ctx
        .spatial_join(points, polygons_4326(), intersects())
        .await
        .unwrap();
    let batch = result.concat().unwrap();
    assert_eq!(batch.num_rows(), 1);
    let polygon_ids = batch
        .column(2)
        .as_any()
        .downcast_ref::<Int32Array>()
        .unwrap();
    assert_eq!(polygon_ids.value(0), 11);
    assert!(result.faults.is_empty());
}

#[test]
fn untagged_column_has_no_crs() {
    let ctx = SedonaContext::new().unwrap();

    // A GeoParquet file whose geometry column records a null CRS
    let file_schema = Schema::new(vec![Field::new("geom", DataType::Binary, true)])
        .with_metadata(
            [(
                "geo".to_string(),
                r#"{"version": "1.1.0", "primary_column": "geom",
                    "columns": {"geom": {"encoding": "WKB", "geometry_types": [], "crs": null}}}"#
                    .to_string(),
            )]
            .into(),
        );
    let schema = ctx.schema_from_geoparquet(&file_schema).unwrap();
    assert_eq!(
        ctx.describe_schema(&schema).unwrap(),
        vec!["geom: wkb none".to_string()]
    );

    let batch = RecordBatch::try_new(
        Arc::new(schema.clone()),
        vec![create_array(&[Some("POINT (1 2)")], &WKB_GEOMETRY)],
    )
    .unwrap();
    let table = (Arc::new(schema), vec![batch]);

    for args in [
        vec![ScalarValue::from("EPSG:4326")],
        vec![ScalarValue::Int64(Some(3857))],
    ] {
        let err = ctx
            .map_column(&table, "geom", "st_transform", &args)
            .unwrap_err();
        assert_eq!(SpatialError::find(&err), Some(&SpatialError::NoDeclaredCrs));
    }

    // An explicit source CRS makes the transform possible
    let (transformed, _) = ctx
        .map_column(
            &table,
            "geom",
            "st_transform",
            &[ScalarValue::from("EPSG:4326"), ScalarValue::from("EPSG:3857")],
        )
        .unwrap();
    assert_eq!(
        transformed.geometry_column("geom").unwrap().sedona_type,
        tagged(3857)
    );
}

#[rstest]
#[case("st_setsrid", ScalarValue::Int64(Some(4326)))]
#[case("st_setcrs", ScalarValue::from("EPSG:4326"))]
#[case("st_setcrs", ScalarValue::from("epsg:4326"))]
fn set_srid_only_changes_the_tag(#[case] function: &str, #[case] identifier: ScalarValue) {
    let ctx = SedonaContext::new().unwrap();
    let input = create_array(
        &[Some("POINT (1 2)"), None, Some("LINESTRING (0 0, 1 1)")],
        &WKB_GEOMETRY,
    );

    let (once_type, once) = ctx
        .invoke_function(
            function,
            &[WKB_GEOMETRY, SedonaType::Arrow(identifier.data_type())],
            &[
                ColumnarValue::Array(input.clone()),
                ColumnarValue::Scalar(identifier.clone()),
            ],
        )
        .unwrap();
    assert_eq!(once_type, tagged(4326));
    let once = array(once);
    assert_eq!(&once, &input);

    let (twice_type, twice) = ctx
        .invoke_function(
            function,
            &[once_type, SedonaType::Arrow(identifier.data_type())],
            &[ColumnarValue::Array(once.clone()), ColumnarValue::Scalar(identifier)],
        )
        .unwrap();
    assert_eq!(twice_type, tagged(4326));
    assert_eq!(&array(twice), &once);
}

#[test]
fn set_srid_unknown_identifier() {
    let ctx = SedonaContext::new().unwrap();
    let err = ctx
        .invoke_function(
            "st_setsrid",
            &[WKB_GEOMETRY, SedonaType::Arrow(DataType::Int64)],
            &[
                create_array_value(&[Some("POINT (1 2)")], &WKB_GEOMETRY),
                ColumnarValue::Scalar(ScalarValue::Int64(Some(999999))),
            ],
        )
        .unwrap_err();
    assert!(matches!(
        SpatialError::find(&err),
        Some(SpatialError::UnknownCrs(_))
    ));
}

#[rstest]
#[case(3857, 1e-6)]
#[case(32618, 1e-6)]
fn transform_round_trip(#[case] through: u32, #[case] tolerance: f64) {
    let ctx = SedonaContext::new().unwrap();
    let wkts = [
        Some("POINT (-74.006 40.7128)"),
        None,
        Some("LINESTRING (-74.1 40.6, -73.9 40.8)"),
        Some("POLYGON ((-74.3 40.5, -73.7 40.5, -73.7 40.9, -74.3 40.9, -74.3 40.5))"),
    ];
    let original = table(&tagged(4326), &[0, 1, 2, 3], &wkts);

    let there = ctx
        .map_column(
            &original,
            "geom",
            "st_transform",
            &[ScalarValue::Int64(Some(through as i64))],
        )
        .unwrap();
    assert_eq!(
        there.0.geometry_column("geom").unwrap().sedona_type,
        tagged(through)
    );

    let back = ctx
        .map_column(&there, "geom", "st_transform", &[ScalarValue::from("EPSG:4326")])
        .unwrap();
    assert_eq!(
        back.0.geometry_column("geom").unwrap().sedona_type,
        tagged(4326)
    );
    assert_wkb_array_approx_equal(back.1[0].column(1), original.1[0].column(1), tolerance);
}

#[test]
fn transform_without_path() {
    let ctx = SedonaContext::new().unwrap();
    let original = table(&tagged(4326), &[0], &[Some("POINT (-74 40)")]);
    let err = ctx
        .map_column(&original, "geom", "st_transform", &[ScalarValue::from("EPSG:4269")])
        .unwrap_err();
    assert_eq!(
        SpatialError::find(&err),
        Some(&SpatialError::NoTransformPath {
            from: "epsg:4326".to_string(),
            to: "epsg:4269".to_string()
        })
    );
}

#[test]
fn identity_transform_is_exact() {
    let ctx = SedonaContext::new().unwrap();
    let original = table(
        &tagged(3857),
        &[0, 1],
        &[Some(NYC_3857), Some("LINESTRING (0.1 0.2, 0.30000000000000004 1e-300)")],
    );

    let (schema, batches) = ctx
        .map_column(&original, "geom", "st_transform", &[ScalarValue::from("epsg:3857")])
        .unwrap();
    assert_eq!(schema.geometry_column("geom").unwrap().sedona_type, tagged(3857));
    assert_eq!(batches[0].column(1), original.1[0].column(1));
}

#[test]
fn srid_and_crs_report_tags() {
    let ctx = SedonaContext::new().unwrap();
    let geoms = create_array_value(&[Some("POINT (1 2)"), None], &WKB_GEOMETRY);

    let (_, srid) = ctx
        .invoke_function("st_srid", &[tagged(32618)], &[geoms.clone()])
        .unwrap();
    let srid = array(srid);
    assert_eq!(srid.len(), 2);
    assert!(srid.is_null(1));

    let (_, untagged_srid) = ctx
        .invoke_function("st_srid", &[WKB_GEOMETRY], &[geoms.clone()])
        .unwrap();
    assert_eq!(
        ScalarValue::try_from_array(&array(untagged_srid), 0).unwrap(),
        ScalarValue::UInt32(Some(0))
    );

    let (_, crs) = ctx
        .invoke_function("st_crs", &[tagged(3857)], &[geoms])
        .unwrap();
    assert_eq!(
        ScalarValue::try_from_array(&array(crs), 0).unwrap(),
        ScalarValue::from("epsg:3857")
    );
}

#[tokio::test]
async fn equivalences_from_options() {
    init_logging();
    let options = [
        (
            "crs_equivalences".to_string(),
            "OGC:CRS84=EPSG:4326".to_string(),
        ),
        ("spatial_join.parallelism".to_string(), "2".to_string()),
    ]
    .into();
    let ctx = SedonaContextBuilder::from_options(&options)
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(ctx.options().parallelism, 2);

    let crs84 = WKB_GEOMETRY
        .with_crs(Some(CrsIdentifier::new("ogc", "crs84")))
        .unwrap();
    let points = table(&crs84, &[1], &[Some(NYC_4326)]);
    let result = ctx
        .spatial_join(points.clone(), polygons_4326(), intersects())
        .await
        .unwrap();
    assert_eq!(result.num_rows(), 1);

    // Without the declaration the two identifiers are different CRSes
    let err = SedonaContext::new()
        .unwrap()
        .spatial_join(points, polygons_4326(), intersects())
        .await
        .unwrap_err();
    assert!(matches!(
        SpatialError::find(&err),
        Some(SpatialError::MismatchedCrs(_, _))
    ));
}

#[tokio::test]
async fn cancelled_context_stops_join() {
    let ctx = SedonaContext::new().unwrap();
    ctx.cancellation_flag().cancel();

    let points = table(&tagged(4326), &[1], &[Some(NYC_4326)]);
    let left = sedona_spatial_join::JoinInput::new(points.0.clone(), Some(1));
    let right = sedona_spatial_join::JoinInput::new(polygons_4326().0, Some(2));
    let plan = ctx.plan_spatial_join(&left, &right, intersects()).unwrap();

    let exec = sedona_spatial_join::SpatialJoinExec::new(plan)
        .with_cancellation_flag(ctx.cancellation_flag().clone());
    let err = exec
        .execute(points.1, polygons_4326().1)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cancelled"));
    assert!(matches!(exec.state(), JoinState::Aborted(_)));
}
