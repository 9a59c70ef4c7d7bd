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
use geo::BoundingRect;
use geo_types::{Geometry, Rect};

/// Axis-aligned 2D bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// The bounds of a geometry, or `None` for an empty geometry
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        geom.bounding_rect().map(Self::from)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Grow the box by `distance` in every direction
    pub fn expand(&self, distance: f64) -> Self {
        Self::new(
            self.xmin - distance,
            self.ymin - distance,
            self.xmax + distance,
            self.ymax + distance,
        )
    }

    /// Grow the box to include another box
    pub fn update(&mut self, other: &Self) {
        self.xmin = self.xmin.min(other.xmin);
        self.ymin = self.ymin.min(other.ymin);
        self.xmax = self.xmax.max(other.xmax);
        self.ymax = self.ymax.max(other.ymax);
    }

    /// Closed-interval intersection test
    pub fn intersects(&self, other: &Self) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.xmin <= other.xmin
            && self.ymin <= other.ymin
            && self.xmax >= other.xmax
            && self.ymax >= other.ymax
    }

    /// Minimum Euclidean distance between two boxes (zero if they intersect)
    ///
    /// This is a lower bound for the distance between any geometries the
    /// boxes contain.
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = (other.xmin - self.xmax).max(self.xmin - other.xmax).max(0.0);
        let dy = (other.ymin - self.ymax).max(self.ymin - other.ymax).max(0.0);
        dx.hypot(dy)
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(value: Rect<f64>) -> Self {
        Self::new(value.min().x, value.min().y, value.max().x, value.max().y)
    }
}
