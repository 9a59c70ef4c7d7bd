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

use arrow_array::{Array, RecordBatch};
use arrow_schema::{Schema, SchemaRef};
use datafusion_common::{plan_err, Result, ScalarValue};
use datafusion_expr::ColumnarValue;
use sedona_common::{CancellationFlag, SpatialJoinOptions};
use sedona_crs::CrsRegistry;
use sedona_expr::{function_set::FunctionSet, scalar_udf::BoundScalarUDF};
use sedona_geoparquet::GeoParquetMetadata;
use sedona_schema::{datatypes::SedonaType, schema::SedonaSchema};
use sedona_spatial_join::{
    JoinInput, SpatialJoinExec, SpatialJoinPlan, SpatialJoinPlanner, SpatialJoinResult,
    SpatialPredicate,
};

use crate::context_builder::SedonaContextBuilder;

/// A schema and the batches of one in-memory table
pub type SpatialTable = (SchemaRef, Vec<RecordBatch>);

/// Entry point for CRS-aware spatial operations
///
/// A context ties together the [CrsRegistry] used to resolve identifiers and
/// check compatibility, the set of spatial functions, and the options used
/// for spatial joins. Everything in it is read-only after construction, so a
/// context can be shared between threads.
#[derive(Debug)]
pub struct SedonaContext {
    registry: Arc<CrsRegistry>,
    functions: FunctionSet,
    options: SpatialJoinOptions,
    cancellation: CancellationFlag,
}

impl SedonaContext {
    /// A context with the global registry and default options
    pub fn new() -> Result<Self> {
        SedonaContextBuilder::new().build()
    }

    pub(crate) fn new_with_parts(
        registry: Arc<CrsRegistry>,
        functions: FunctionSet,
        options: SpatialJoinOptions,
        cancellation: CancellationFlag,
    ) -> Self {
        Self {
            registry,
            functions,
            options,
            cancellation,
        }
    }

    pub fn registry(&self) -> &Arc<CrsRegistry> {
        &self.registry
    }

    pub fn functions(&self) -> &FunctionSet {
        &self.functions
    }

    pub fn options(&self) -> &SpatialJoinOptions {
        &self.options
    }

    /// The flag checked between batches by every operation of this context
    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// One `<column>: <encoding> <crs>` line per geometry column
    pub fn describe_schema(&self, schema: &Schema) -> Result<Vec<String>> {
        Ok(schema
            .geometry_columns()?
            .iter()
            .map(|column| column.describe())
            .collect())
    }

    /// Resolve a function call against argument types
    ///
    /// This is the planning step: the CRS compatibility rule and all
    /// identifier resolution happen here, before any rows are seen.
    pub fn bind_function(
        &self,
        name: &str,
        arg_types: &[SedonaType],
        scalar_args: &[Option<&ScalarValue>],
    ) -> Result<BoundScalarUDF> {
        let Some(udf) = self.functions.scalar_udf(name) else {
            return plan_err!("Unknown function '{name}'");
        };

        udf.bind(&self.registry, arg_types, scalar_args)
    }

    /// Bind and invoke a function in one step
    ///
    /// Scalar arguments are treated as literals when binding. Returns the
    /// result type along with the result.
    pub fn invoke_function(
        &self,
        name: &str,
        arg_types: &[SedonaType],
        args: &[ColumnarValue],
    ) -> Result<(SedonaType, ColumnarValue)> {
        let scalar_args = args
            .iter()
            .map(|arg| match arg {
                ColumnarValue::Scalar(scalar) => Some(scalar),
                ColumnarValue::Array(_) => None,
            })
            .collect::<Vec<_>>();
        let bound = self.bind_function(name, arg_types, &scalar_args)?;

        let num_rows = args
            .iter()
            .find_map(|arg| match arg {
                ColumnarValue::Array(array) => Some(array.len()),
                ColumnarValue::Scalar(_) => None,
            })
            .unwrap_or(1);
        let result = bound.invoke(args, num_rows)?;
        Ok((bound.return_type().clone(), result))
    }

    /// Replace `column` of a table with `function(column, literal_args...)`
    ///
    /// The call is bound once against the column type, so CRS errors are
    /// reported before any batch is processed. The flag returned by
    /// [Self::cancellation_flag] is checked between batches.
    pub fn map_column(
        &self,
        table: &SpatialTable,
        column: &str,
        function: &str,
        literal_args: &[ScalarValue],
    ) -> Result<SpatialTable> {
        let (schema, batches) = table;
        let Some((index, field)) = schema.column_with_name(column) else {
            return plan_err!("Column '{column}' not found");
        };

        let mut arg_types = vec![SedonaType::from_storage_field(field)?];
        arg_types.extend(
            literal_args
                .iter()
                .map(|arg| SedonaType::Arrow(arg.data_type())),
        );
        let mut scalar_args = vec![None];
        scalar_args.extend(literal_args.iter().map(Some));
        let bound = self.bind_function(function, &arg_types, &scalar_args)?;

        let mut fields = schema.fields().iter().cloned().collect::<Vec<_>>();
        fields[index] = Arc::new(
            bound
                .return_type()
                .to_storage_field(column, field.is_nullable())?,
        );
        let out_schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

        let mut out_batches = Vec::with_capacity(batches.len());
        for batch in batches {
            self.cancellation.check()?;

            let mut args = vec![ColumnarValue::Array(batch.column(index).clone())];
            args.extend(literal_args.iter().cloned().map(ColumnarValue::Scalar));
            let result = bound
                .invoke(&args, batch.num_rows())?
                .into_array(batch.num_rows())?;

            let mut columns = batch.columns().to_vec();
            columns[index] = result;
            out_batches.push(RecordBatch::try_new(out_schema.clone(), columns)?);
        }

        log::debug!(
            "Applied {}({column}) to {} batches",
            bound.name(),
            out_batches.len()
        );
        Ok((out_schema, out_batches))
    }

    /// Plan a spatial join with this context's registry and options
    pub fn plan_spatial_join(
        &self,
        left: &JoinInput,
        right: &JoinInput,
        predicate: SpatialPredicate,
    ) -> Result<SpatialJoinPlan> {
        SpatialJoinPlanner::new(self.registry.clone(), self.options.clone())
            .plan(left, right, predicate)
    }

    /// Plan a join whose condition is a predicate function call
    ///
    /// For example `("st_dwithin", "geom", "geom", [10.0])` for
    /// `ST_DWithin(left.geom, right.geom, 10.0)`. Function aliases are
    /// resolved through the function set.
    pub fn plan_spatial_join_call(
        &self,
        function: &str,
        left: &JoinInput,
        left_column: &str,
        right: &JoinInput,
        right_column: &str,
        literal_args: &[ScalarValue],
    ) -> Result<SpatialJoinPlan> {
        let name = self
            .functions
            .scalar_udf(function)
            .map(|udf| udf.name().to_string())
            .unwrap_or_else(|| function.to_lowercase());
        let predicate =
            SpatialPredicate::try_from_function(&name, left_column, right_column, literal_args)?;
        self.plan_spatial_join(left, right, predicate)
    }

    /// Run a planned join
    pub async fn execute_spatial_join(
        &self,
        plan: SpatialJoinPlan,
        left: Vec<RecordBatch>,
        right: Vec<RecordBatch>,
    ) -> Result<SpatialJoinResult> {
        let exec = SpatialJoinExec::new(plan).with_cancellation_flag(self.cancellation.clone());
        exec.execute(left, right).await
    }

    /// Plan and run a join of two in-memory tables
    pub async fn spatial_join(
        &self,
        left: SpatialTable,
        right: SpatialTable,
        predicate: SpatialPredicate,
    ) -> Result<SpatialJoinResult> {
        let left_input = JoinInput::new(left.0.clone(), Some(num_rows(&left.1)));
        let right_input = JoinInput::new(right.0.clone(), Some(num_rows(&right.1)));
        let plan = self.plan_spatial_join(&left_input, &right_input, predicate)?;
        log::debug!("{}", plan.describe());
        self.execute_spatial_join(plan, left.1, right.1).await
    }

    /// The schema of a table read from a GeoParquet file
    ///
    /// Binary columns described by the file's `geo` metadata become geometry
    /// columns tagged with the CRS recorded for them. Without `geo` metadata
    /// the schema is returned unchanged and no column has a CRS.
    pub fn schema_from_geoparquet(&self, file_schema: &Schema) -> Result<Schema> {
        match GeoParquetMetadata::try_from_schema_metadata(file_schema.metadata())? {
            Some(metadata) => metadata.apply_to_schema(file_schema),
            None => Ok(file_schema.clone()),
        }
    }

    /// The schema to write a table with geometry columns as GeoParquet
    ///
    /// The CRS of each geometry column is recorded in the `geo` metadata.
    pub fn schema_for_geoparquet(&self, schema: &Schema) -> Result<Schema> {
        match GeoParquetMetadata::try_from_schema(schema)? {
            Some(metadata) => metadata.add_to_schema(schema),
            None => Ok(schema.clone()),
        }
    }
}

fn num_rows(batches: &[RecordBatch]) -> usize {
    batches.iter().map(|batch| batch.num_rows()).sum()
}

#[cfg(test)]
mod tests {
    use arrow_schema::{DataType, Field};
    use rstest::rstest;
    use sedona_common::SpatialError;
    use sedona_schema::crs::CrsIdentifier;
    use sedona_schema::datatypes::{WKB_GEOMETRY, WKB_VIEW_GEOMETRY};
    use sedona_testing::create::{create_array, create_array_value};

    use super::*;

    fn tagged(code: u32) -> SedonaType {
        WKB_GEOMETRY
            .with_crs(Some(CrsIdentifier::epsg(code)))
            .unwrap()
    }

    #[test]
    fn functions_have_kernels() {
        let ctx = SedonaContext::new().unwrap();
        for name in [
            "st_setsrid",
            "st_setcrs",
            "st_transform",
            "st_srid",
            "st_crs",
            "st_geomfromwkt",
            "st_astext",
            "st_intersects",
            "st_contains",
            "st_within",
            "st_distance",
            "st_dwithin",
        ] {
            assert!(ctx.functions().scalar_udf(name).is_some(), "{name}");
        }

        // Predicates are bound to their geo kernels
        let bound = ctx
            .bind_function("ST_Intersects", &[WKB_GEOMETRY, WKB_GEOMETRY], &[None, None])
            .unwrap();
        assert_eq!(bound.return_type(), &SedonaType::Arrow(DataType::Boolean));
    }

    #[test]
    fn unknown_function() {
        let ctx = SedonaContext::new().unwrap();
        let err = ctx.bind_function("st_nothing", &[], &[]).unwrap_err();
        assert!(err.to_string().contains("Unknown function 'st_nothing'"));
    }

    #[test]
    fn bind_mismatched_crs() {
        let ctx = SedonaContext::new().unwrap();
        let err = ctx
            .bind_function("st_intersects", &[tagged(3857), tagged(4326)], &[None, None])
            .unwrap_err();
        assert!(matches!(
            SpatialError::find(&err),
            Some(SpatialError::MismatchedCrs(_, _))
        ));
    }

    #[test]
    fn invoke_function() {
        let ctx = SedonaContext::new().unwrap();
        let (return_type, result) = ctx
            .invoke_function(
                "st_setsrid",
                &[WKB_GEOMETRY, SedonaType::Arrow(DataType::Int64)],
                &[
                    create_array_value(&[Some("POINT (1 2)"), None], &WKB_GEOMETRY),
                    ColumnarValue::Scalar(ScalarValue::Int64(Some(4326))),
                ],
            )
            .unwrap();
        assert_eq!(return_type, tagged(4326));
        match result {
            ColumnarValue::Array(array) => assert_eq!(array.len(), 2),
            ColumnarValue::Scalar(_) => panic!("expected array"),
        }
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn transform_fault_mode(#[case] strict_mode: bool) {
        let ctx = SedonaContextBuilder::new()
            .with_spatial_join_options(SpatialJoinOptions::default().with_strict_mode(strict_mode))
            .build()
            .unwrap();
        let truncated: &[u8] = &[0x01, 0x01, 0x00];
        let args = [
            ColumnarValue::Array(Arc::new(arrow_array::BinaryArray::from(vec![Some(
                truncated,
            )]))),
            ColumnarValue::Scalar(ScalarValue::Utf8(Some("EPSG:3857".to_string()))),
        ];
        let arg_types = [tagged(4326), SedonaType::Arrow(DataType::Utf8)];
        let result = ctx.invoke_function("st_transform", &arg_types, &args);

        if strict_mode {
            let err = result.unwrap_err();
            assert!(matches!(
                SpatialError::find(&err),
                Some(SpatialError::MalformedGeometry(_))
            ));
        } else {
            let (return_type, ColumnarValue::Array(array)) = result.unwrap() else {
                panic!("expected array");
            };
            assert_eq!(return_type, tagged(3857));
            assert!(array.is_null(0));
        }
    }

    #[rstest]
    fn describe_schema(#[values(WKB_GEOMETRY, WKB_VIEW_GEOMETRY)] sedona_type: SedonaType) {
        let ctx = SedonaContext::new().unwrap();
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            sedona_type.to_storage_field("untagged", true).unwrap(),
            sedona_type
                .with_crs(Some(CrsIdentifier::epsg(3857)))
                .unwrap()
                .to_storage_field("tagged", true)
                .unwrap(),
        ]);

        let encoding = sedona_type.encoding_name();
        assert_eq!(
            ctx.describe_schema(&schema).unwrap(),
            vec![
                format!("untagged: {encoding} none"),
                format!("tagged: {encoding} epsg:3857")
            ]
        );
    }

    fn point_table(sedona_type: &SedonaType, wkts: &[Option<&str>]) -> SpatialTable {
        let schema = Arc::new(Schema::new(vec![sedona_type
            .to_storage_field("geom", true)
            .unwrap()]));
        let batch = RecordBatch::try_new(schema.clone(), vec![create_array(wkts, sedona_type)])
            .unwrap();
        (schema, vec![batch.clone(), batch])
    }

    #[test]
    fn map_column() {
        let ctx = SedonaContext::new().unwrap();
        let table = point_table(&WKB_GEOMETRY, &[Some("POINT (1 2)"), None]);
        let (schema, batches) = ctx
            .map_column(&table, "geom", "st_setsrid", &[ScalarValue::Int64(Some(32618))])
            .unwrap();

        assert_eq!(schema.geometry_column("geom").unwrap().sedona_type, tagged(32618));
        assert_eq!(batches.len(), 2);
        // Only the tag changes
        assert_eq!(batches[0].column(0), table.1[0].column(0));
    }

    #[test]
    fn map_column_errors() {
        let ctx = SedonaContext::new().unwrap();
        let table = point_table(&WKB_GEOMETRY, &[Some("POINT (1 2)")]);

        let err = ctx
            .map_column(&table, "geom", "st_transform", &[ScalarValue::from("EPSG:3857")])
            .unwrap_err();
        assert!(matches!(
            SpatialError::find(&err),
            Some(SpatialError::NoDeclaredCrs)
        ));

        assert!(ctx
            .map_column(&table, "not_a_column", "st_astext", &[])
            .is_err());
    }

    #[test]
    fn map_column_cancelled() {
        let ctx = SedonaContextBuilder::new().build().unwrap();
        ctx.cancellation_flag().cancel();
        let table = point_table(&WKB_GEOMETRY, &[Some("POINT (1 2)")]);
        let err = ctx
            .map_column(&table, "geom", "st_astext", &[])
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn plan_spatial_join_call() {
        let ctx = SedonaContext::new().unwrap();
        let (schema, _) = point_table(&tagged(4326), &[]);
        let input = JoinInput::new(schema, None);

        let plan = ctx
            .plan_spatial_join_call(
                "ST_DWithin",
                &input,
                "geom",
                &input,
                "geom",
                &[ScalarValue::Float64(Some(1.5))],
            )
            .unwrap();
        assert_eq!(
            plan.describe(),
            "SpatialJoin: ST_DWithin(geom, geom, 1.5) strategy=IndexedDistance(1.5) build_side=left crs=epsg:4326"
        );

        assert!(ctx
            .plan_spatial_join_call("st_astext", &input, "geom", &input, "geom", &[])
            .is_err());
    }

    #[test]
    fn geoparquet_schema_round_trip() {
        let ctx = SedonaContext::new().unwrap();
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            tagged(3857).to_storage_field("geom", true).unwrap(),
        ]);

        let written = ctx.schema_for_geoparquet(&schema).unwrap();
        assert!(written.metadata().contains_key("geo"));

        // Parquet writers store the plain storage type
        let file_schema = Schema::new_with_metadata(
            vec![
                Field::new("id", DataType::Int32, false),
                Field::new("geom", DataType::Binary, true),
            ],
            written.metadata().clone(),
        );
        let read = ctx.schema_from_geoparquet(&file_schema).unwrap();
        assert_eq!(read.geometry_column("geom").unwrap().sedona_type, tagged(3857));

        // Without metadata nothing is a geometry
        let plain = Schema::new(vec![Field::new("geom", DataType::Binary, true)]);
        assert!(ctx
            .schema_from_geoparquet(&plain)
            .unwrap()
            .geometry_columns()
            .unwrap()
            .is_empty());
    }
}
