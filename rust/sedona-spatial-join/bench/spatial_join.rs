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

//! Indexed spatial join of random polygons against random points

use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sedona_common::SpatialJoinOptions;
use sedona_crs::CrsRegistry;
use sedona_geometry::spatial_relation::SpatialRelationType;
use sedona_spatial_join::{
    spatial_predicate::{DistancePredicate, RelationPredicate},
    JoinInput, SpatialJoinExec, SpatialJoinPlanner, SpatialPredicate,
};
use sedona_testing::datagen::{RandomGeometryType, RandomPartitionedDataBuilder};

const ROWS_PER_BATCH: usize = 1024;
const NUM_BATCHES: usize = 16;

fn bench_spatial_join(c: &mut Criterion) {
    let (polygon_schema, polygons) = RandomPartitionedDataBuilder::new()
        .seed(1)
        .batches_per_partition(NUM_BATCHES)
        .rows_per_batch(ROWS_PER_BATCH)
        .geometry_type(RandomGeometryType::Polygon)
        .size_range((0.5, 2.0))
        .build()
        .expect("failed to generate polygons");
    let (point_schema, points) = RandomPartitionedDataBuilder::new()
        .seed(2)
        .batches_per_partition(NUM_BATCHES)
        .rows_per_batch(ROWS_PER_BATCH)
        .build()
        .expect("failed to generate points");
    let polygons = polygons.into_iter().flatten().collect::<Vec<_>>();
    let points = points.into_iter().flatten().collect::<Vec<_>>();

    let predicates = [
        (
            "intersects",
            SpatialPredicate::Relation(RelationPredicate::new(
                "geometry",
                "geometry",
                SpatialRelationType::Intersects,
            )),
        ),
        (
            "dwithin",
            SpatialPredicate::Distance(DistancePredicate::new("geometry", "geometry", 1.0)),
        ),
    ];

    let runtime = tokio::runtime::Runtime::new().expect("failed to create runtime");
    let mut group = c.benchmark_group("spatial_join");
    group.throughput(Throughput::Elements((ROWS_PER_BATCH * NUM_BATCHES) as u64));

    for (name, predicate) in predicates {
        for parallelism in [1, 4] {
            let options = SpatialJoinOptions {
                parallelism,
                ..Default::default()
            };
            let planner = SpatialJoinPlanner::new(Arc::new(CrsRegistry::standard()), options);
            let plan = planner
                .plan(
                    &JoinInput::new(polygon_schema.clone(), None),
                    &JoinInput::new(point_schema.clone(), None),
                    predicate.clone(),
                )
                .expect("failed to plan join");

            group.bench_with_input(BenchmarkId::new(name, parallelism), &plan, |b, plan| {
                b.to_async(&runtime).iter(|| async {
                    let exec = SpatialJoinExec::new(plan.clone());
                    let result = exec
                        .execute(polygons.clone(), points.clone())
                        .await
                        .expect("join failed");
                    black_box(result.num_rows());
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_spatial_join);
criterion_main!(benches);
