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

//! Execution of a planned spatial join
//!
//! The build input is decoded and packed into a [SpatialIndex] on a blocking
//! thread. Probe batches are then processed independently with up to
//! `parallelism` batches in flight. Output batches keep the probe batch
//! order, so the result of a join doesn't depend on scheduling.

use std::sync::Arc;

use arrow_array::{RecordBatch, UInt32Array};
use arrow_schema::SchemaRef;
use datafusion_common::{exec_err, DataFusionError, JoinSide, Result};
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use sedona_common::CancellationFlag;
use sedona_schema::schema::GeometryColumn;

use crate::{
    evaluated_batch::{EvaluatedBatch, RowFault},
    index::{SpatialIndex, SpatialIndexBuilder},
    metrics::SpatialJoinMetrics,
    planner::{JoinState, SpatialJoinPlan},
    utils::join_utils::build_batch_from_indices,
};

/// Executes one [SpatialJoinPlan]
///
/// A join runs at most once. Its state moves from `StrategyChosen` to
/// `Executing` and finally to `Done`, or to `Aborted` if decoding fails in
/// strict mode, a worker fails, or the join is cancelled.
#[derive(Debug)]
pub struct SpatialJoinExec {
    plan: SpatialJoinPlan,
    state: Mutex<crate::planner::JoinStateMachine>,
    metrics: SpatialJoinMetrics,
    cancellation: CancellationFlag,
}

impl SpatialJoinExec {
    pub fn new(plan: SpatialJoinPlan) -> Self {
        let state = Mutex::new(plan.state.clone());
        Self {
            plan,
            state,
            metrics: SpatialJoinMetrics::default(),
            cancellation: CancellationFlag::new(),
        }
    }

    /// Use a flag shared with the caller to cancel the join
    pub fn with_cancellation_flag(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn plan(&self) -> &SpatialJoinPlan {
        &self.plan
    }

    pub fn state(&self) -> JoinState {
        self.state.lock().state().clone()
    }

    pub fn state_history(&self) -> Vec<JoinState> {
        self.state.lock().history().to_vec()
    }

    pub fn metrics(&self) -> &SpatialJoinMetrics {
        &self.metrics
    }

    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Join `left` against `right`
    ///
    /// Batches must match the schemas the join was planned with.
    pub async fn execute(
        &self,
        left: Vec<RecordBatch>,
        right: Vec<RecordBatch>,
    ) -> Result<SpatialJoinResult> {
        {
            let mut state = self.state.lock();
            if state.state() != &JoinState::StrategyChosen {
                return exec_err!("Spatial join can't be executed in state {}", state.state());
            }
            state.advance(JoinState::Executing)?;
        }

        match self.execute_inner(left, right).await {
            Ok(result) => {
                self.state.lock().advance(JoinState::Done)?;
                log::debug!("Spatial join {} finished: {}", self.plan.predicate, self.metrics);
                Ok(result)
            }
            Err(err) => {
                log::debug!("Spatial join {} aborted: {err}", self.plan.predicate);
                self.state
                    .lock()
                    .advance(JoinState::Aborted(err.to_string()))?;
                Err(err)
            }
        }
    }

    async fn execute_inner(
        &self,
        left: Vec<RecordBatch>,
        right: Vec<RecordBatch>,
    ) -> Result<SpatialJoinResult> {
        let (build_batches, probe_batches) = match self.plan.build_side {
            JoinSide::Left => (left, right),
            _ => (right, left),
        };

        let index = Arc::new(self.build_index(build_batches).await?);

        let worker = ProbeWorker {
            schema: self.plan.output_schema.clone(),
            column: self.plan.build_probe_columns().1.clone(),
            build_side: self.plan.build_side,
            probe_side: self.plan.probe_side(),
            strict_mode: self.plan.options.strict_mode,
            target_batch_size: self.plan.options.target_batch_size.max(1),
            metrics: self.metrics.clone(),
        };

        let parallelism = self.plan.options.parallelism.max(1);
        let outputs: Vec<ProbeOutput> = futures::stream::iter(probe_batches.into_iter().enumerate())
            .map(|(batch_index, batch)| {
                let index = Arc::clone(&index);
                let worker = worker.clone();
                let cancellation = self.cancellation.clone();
                async move {
                    cancellation.check()?;
                    tokio::task::spawn_blocking(move || worker.probe(&index, batch_index, batch))
                        .await
                        .map_err(|e| DataFusionError::External(Box::new(e)))?
                }
            })
            .buffered(parallelism)
            .try_collect()
            .await?;

        let mut faults = index.faults().to_vec();
        let mut batches = Vec::new();
        for output in outputs {
            batches.extend(output.batches);
            faults.extend(output.faults);
        }

        Ok(SpatialJoinResult {
            schema: self.plan.output_schema.clone(),
            batches,
            faults,
            metrics: self.metrics.clone(),
        })
    }

    async fn build_index(&self, batches: Vec<RecordBatch>) -> Result<SpatialIndex> {
        let mut builder = SpatialIndexBuilder::new(&self.plan, self.metrics.clone());
        let cancellation = self.cancellation.clone();
        tokio::task::spawn_blocking(move || {
            for batch in batches {
                cancellation.check()?;
                builder.add_batch(batch)?;
            }
            builder.finish()
        })
        .await
        .map_err(|e| DataFusionError::External(Box::new(e)))?
    }
}

/// Everything a probe task needs, cloned into each task
#[derive(Debug, Clone)]
struct ProbeWorker {
    schema: SchemaRef,
    column: GeometryColumn,
    build_side: JoinSide,
    probe_side: JoinSide,
    strict_mode: bool,
    target_batch_size: usize,
    metrics: SpatialJoinMetrics,
}

struct ProbeOutput {
    batches: Vec<RecordBatch>,
    faults: Vec<RowFault>,
}

impl ProbeWorker {
    fn probe(&self, index: &SpatialIndex, batch_index: usize, batch: RecordBatch) -> Result<ProbeOutput> {
        self.metrics.probe_input_batches.add(1);
        self.metrics.probe_input_rows.add(batch.num_rows());

        let evaluated = EvaluatedBatch::try_new(
            batch,
            &self.column,
            self.probe_side,
            batch_index,
            self.strict_mode,
        )?;
        self.metrics.row_faults.add(evaluated.faults.len());

        let mut batches = Vec::new();
        let mut build_rows = Vec::new();
        let mut build_indices = Vec::new();
        let mut probe_indices = Vec::new();
        for (row, (geometry, rect)) in evaluated
            .geometries
            .iter()
            .zip(&evaluated.rects)
            .enumerate()
        {
            build_rows.clear();
            let result = index.query(geometry, rect.as_ref(), &mut build_rows)?;
            self.metrics.join_result_candidates.add(result.candidate_count);
            self.metrics.join_result_count.add(result.count);

            for build_row in &build_rows {
                build_indices.push(*build_row);
                probe_indices.push(row as u32);
                if build_indices.len() >= self.target_batch_size {
                    batches.push(self.flush(
                        index,
                        &evaluated.batch,
                        &mut build_indices,
                        &mut probe_indices,
                    )?);
                }
            }
        }

        if !build_indices.is_empty() {
            batches.push(self.flush(
                index,
                &evaluated.batch,
                &mut build_indices,
                &mut probe_indices,
            )?);
        }

        Ok(ProbeOutput {
            batches,
            faults: evaluated.faults,
        })
    }

    fn flush(
        &self,
        index: &SpatialIndex,
        probe_batch: &RecordBatch,
        build_indices: &mut Vec<u32>,
        probe_indices: &mut Vec<u32>,
    ) -> Result<RecordBatch> {
        let build_indices = UInt32Array::from(std::mem::take(build_indices));
        let probe_indices = UInt32Array::from(std::mem::take(probe_indices));
        let batch = build_batch_from_indices(
            &self.schema,
            index.batch(),
            probe_batch,
            &build_indices,
            &probe_indices,
            self.build_side,
        )?;

        self.metrics.output_batches.add(1);
        self.metrics.output_rows.add(batch.num_rows());
        Ok(batch)
    }
}

/// Output of a completed spatial join
#[derive(Debug, Clone)]
pub struct SpatialJoinResult {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
    /// Rows of either input skipped because their geometry was malformed
    pub faults: Vec<RowFault>,
    pub metrics: SpatialJoinMetrics,
}

impl SpatialJoinResult {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// All output rows as a single batch
    pub fn concat(&self) -> Result<RecordBatch> {
        Ok(arrow::compute::concat_batches(&self.schema, &self.batches)?)
    }
}
