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

//! Planning for spatial joins
//!
//! Planning checks that the two geometry columns agree on a CRS, chooses an
//! execution strategy for the predicate, and decides which input is indexed.
//! It only looks at schemas and row counts, so every failure here happens
//! before a single row is read.

use std::sync::Arc;

use arrow_schema::{Schema, SchemaRef};
use datafusion_common::{plan_err, JoinSide, Result};
use sedona_common::{sedona_internal_err, BuildSidePreference, SpatialError, SpatialJoinOptions};
use sedona_crs::CrsRegistry;
use sedona_expr::crs_rule::check_crs_compatibility;
use sedona_geometry::spatial_relation::SpatialRelationType;
use sedona_schema::{
    crs::Crs,
    schema::{GeometryColumn, SedonaSchema},
};

use crate::spatial_predicate::SpatialPredicate;

/// Lifecycle of a spatial join
///
/// `Planning -> CrsChecked -> StrategyChosen -> Executing -> Done`, with
/// `Planning -> Rejected` when the inputs can't be joined and
/// `Executing -> Aborted` when execution fails or is cancelled.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinState {
    Planning,
    CrsChecked,
    StrategyChosen,
    Executing,
    Done,
    Rejected(SpatialError),
    Aborted(String),
}

impl JoinState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JoinState::Done | JoinState::Rejected(_) | JoinState::Aborted(_)
        )
    }

    fn can_advance_to(&self, next: &JoinState) -> bool {
        matches!(
            (self, next),
            (JoinState::Planning, JoinState::CrsChecked)
                | (JoinState::Planning, JoinState::Rejected(_))
                | (JoinState::CrsChecked, JoinState::StrategyChosen)
                | (JoinState::StrategyChosen, JoinState::Executing)
                | (JoinState::Executing, JoinState::Done)
                | (JoinState::Executing, JoinState::Aborted(_))
        )
    }
}

impl std::fmt::Display for JoinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinState::Planning => write!(f, "Planning"),
            JoinState::CrsChecked => write!(f, "CrsChecked"),
            JoinState::StrategyChosen => write!(f, "StrategyChosen"),
            JoinState::Executing => write!(f, "Executing"),
            JoinState::Done => write!(f, "Done"),
            JoinState::Rejected(err) => write!(f, "Rejected({err})"),
            JoinState::Aborted(reason) => write!(f, "Aborted({reason})"),
        }
    }
}

/// Tracks the [JoinState] of one join and every state it passed through
#[derive(Debug, Clone)]
pub struct JoinStateMachine {
    history: Vec<JoinState>,
}

impl Default for JoinStateMachine {
    fn default() -> Self {
        Self {
            history: vec![JoinState::Planning],
        }
    }
}

impl JoinStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &JoinState {
        // history is never empty
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[JoinState] {
        &self.history
    }

    /// Move to `next`, failing if the transition is not allowed
    pub fn advance(&mut self, next: JoinState) -> Result<()> {
        if !self.state().can_advance_to(&next) {
            return sedona_internal_err!(
                "Invalid spatial join state transition from {} to {next}",
                self.state()
            );
        }

        log::debug!("Spatial join state: {} -> {next}", self.state());
        self.history.push(next);
        Ok(())
    }
}

/// How the matching pairs of a join are found
///
/// Relations are stored with the build side as their first argument, i.e.,
/// a pair matches when `relation(build, probe)` holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinStrategy {
    /// Probe an R-tree over the build side and refine candidates with the exact relation
    IndexedRelation(SpatialRelationType),
    /// Probe with envelopes expanded by the distance and refine with the exact distance
    IndexedDistance(f64),
    /// Find the k nearest build rows of every probe row
    KNearestNeighbors { k: u32, use_spheroid: bool },
    /// Evaluate every pair (relations that may hold for disjoint envelopes)
    NestedLoop(SpatialRelationType),
}

impl std::fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinStrategy::IndexedRelation(relation) => write!(f, "IndexedRelation({relation})"),
            JoinStrategy::IndexedDistance(distance) => write!(f, "IndexedDistance({distance})"),
            JoinStrategy::KNearestNeighbors { k, use_spheroid } => {
                write!(f, "KNearestNeighbors(k={k}, use_spheroid={use_spheroid})")
            }
            JoinStrategy::NestedLoop(relation) => write!(f, "NestedLoop({relation})"),
        }
    }
}

/// One input of a join as seen by the planner
#[derive(Debug, Clone)]
pub struct JoinInput {
    pub schema: SchemaRef,
    /// Row count if known (used to choose the build side)
    pub num_rows: Option<usize>,
}

impl JoinInput {
    pub fn new(schema: SchemaRef, num_rows: Option<usize>) -> Self {
        Self { schema, num_rows }
    }
}

/// The result of planning a spatial join
#[derive(Debug, Clone)]
pub struct SpatialJoinPlan {
    pub predicate: SpatialPredicate,
    pub strategy: JoinStrategy,
    /// The indexed input (the other input is probed)
    pub build_side: JoinSide,
    pub left_column: GeometryColumn,
    pub right_column: GeometryColumn,
    pub left_schema: SchemaRef,
    pub right_schema: SchemaRef,
    /// Left fields followed by right fields
    pub output_schema: SchemaRef,
    /// The CRS shared by both geometry columns
    pub crs: Crs,
    pub options: SpatialJoinOptions,
    pub state: JoinStateMachine,
}

impl SpatialJoinPlan {
    pub fn probe_side(&self) -> JoinSide {
        match self.build_side {
            JoinSide::Left => JoinSide::Right,
            _ => JoinSide::Left,
        }
    }

    /// `(build column, probe column)`
    pub fn build_probe_columns(&self) -> (&GeometryColumn, &GeometryColumn) {
        match self.build_side {
            JoinSide::Left => (&self.left_column, &self.right_column),
            _ => (&self.right_column, &self.left_column),
        }
    }

    /// One line summary, e.g., for EXPLAIN-style output
    pub fn describe(&self) -> String {
        format!(
            "SpatialJoin: {} strategy={} build_side={} crs={}",
            self.predicate,
            self.strategy,
            self.build_side,
            sedona_schema::crs::crs_display(&self.crs)
        )
    }
}

/// Plans spatial joins against a CRS registry
#[derive(Debug, Clone)]
pub struct SpatialJoinPlanner {
    registry: Arc<CrsRegistry>,
    options: SpatialJoinOptions,
}

impl SpatialJoinPlanner {
    pub fn new(registry: Arc<CrsRegistry>, options: SpatialJoinOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &SpatialJoinOptions {
        &self.options
    }

    /// Plan a join of `left` and `right` on `predicate`
    pub fn plan(
        &self,
        left: &JoinInput,
        right: &JoinInput,
        predicate: SpatialPredicate,
    ) -> Result<SpatialJoinPlan> {
        let mut state = JoinStateMachine::new();

        let left_column = left.schema.geometry_column(predicate.left())?;
        let right_column = right.schema.geometry_column(predicate.right())?;
        Self::check_column_types(&predicate, &left_column, &right_column)?;

        let crs = match check_crs_compatibility(
            &self.registry,
            &[left_column.sedona_type.clone(), right_column.sedona_type.clone()],
        ) {
            Ok(crs) => crs,
            Err(err) => {
                if let Some(spatial_err) = SpatialError::find(&err) {
                    state.advance(JoinState::Rejected(spatial_err.clone()))?;
                    log::debug!("Spatial join {predicate} rejected: {spatial_err}");
                }
                return Err(err);
            }
        };
        state.advance(JoinState::CrsChecked)?;

        let build_side = self.choose_build_side(left, right, &predicate);
        let strategy = Self::choose_strategy(&predicate, build_side);
        state.advance(JoinState::StrategyChosen)?;

        log::debug!(
            "Planned spatial join {predicate}: strategy {strategy}, build side {build_side}"
        );

        let fields = left
            .schema
            .fields()
            .iter()
            .chain(right.schema.fields().iter())
            .cloned()
            .collect::<Vec<_>>();

        Ok(SpatialJoinPlan {
            predicate,
            strategy,
            build_side,
            left_column,
            right_column,
            left_schema: left.schema.clone(),
            right_schema: right.schema.clone(),
            output_schema: Arc::new(Schema::new(fields)),
            crs,
            options: self.options.clone(),
            state,
        })
    }

    fn check_column_types(
        predicate: &SpatialPredicate,
        left: &GeometryColumn,
        right: &GeometryColumn,
    ) -> Result<()> {
        if matches!(predicate, SpatialPredicate::KNearestNeighbors(_)) {
            return Ok(());
        }

        for column in [left, right] {
            if column.sedona_type.edges() != Some(sedona_schema::datatypes::Edges::Planar) {
                return plan_err!(
                    "{predicate} join condition is not supported for geography column '{}'",
                    column.name
                );
            }
        }

        Ok(())
    }

    fn choose_build_side(
        &self,
        left: &JoinInput,
        right: &JoinInput,
        predicate: &SpatialPredicate,
    ) -> JoinSide {
        // The object side of a KNN join is always the indexed one
        if matches!(predicate, SpatialPredicate::KNearestNeighbors(_)) {
            return JoinSide::Right;
        }

        match self.options.build_side {
            BuildSidePreference::Left => JoinSide::Left,
            BuildSidePreference::Right => JoinSide::Right,
            BuildSidePreference::Auto => match (left.num_rows, right.num_rows) {
                (Some(l), Some(r)) if l > r => JoinSide::Right,
                _ => JoinSide::Left,
            },
        }
    }

    fn choose_strategy(predicate: &SpatialPredicate, build_side: JoinSide) -> JoinStrategy {
        match predicate {
            SpatialPredicate::Relation(relation) => {
                // Refinement evaluates relation(build, probe)
                let relation_type = if build_side == JoinSide::Left {
                    relation.relation_type
                } else {
                    relation.relation_type.invert()
                };

                if relation_type.requires_bbox_intersection() {
                    JoinStrategy::IndexedRelation(relation_type)
                } else {
                    JoinStrategy::NestedLoop(relation_type)
                }
            }
            SpatialPredicate::Distance(distance) => JoinStrategy::IndexedDistance(distance.distance),
            SpatialPredicate::KNearestNeighbors(knn) => JoinStrategy::KNearestNeighbors {
                k: knn.k,
                use_spheroid: knn.use_spheroid,
            },
        }
    }
}
