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
use arrow_array::{Array, ArrayRef, BinaryArray, BinaryViewArray};
use arrow_schema::DataType;
use datafusion_common::ScalarValue;
use datafusion_expr::ColumnarValue;
use geo_types::Geometry;
use sedona_geometry::decode::geometry_from_wkb;

/// Assert two [ColumnarValue]s are equal
///
/// Panics with a readable message if the values differ in kind or content.
pub fn assert_value_equal(actual: &ColumnarValue, expected: &ColumnarValue) {
    match (actual, expected) {
        (ColumnarValue::Array(actual), ColumnarValue::Array(expected)) => {
            assert_array_equal(actual, expected)
        }
        (ColumnarValue::Scalar(actual), ColumnarValue::Scalar(expected)) => {
            assert_scalar_equal(actual, expected)
        }
        (ColumnarValue::Array(_), ColumnarValue::Scalar(_)) => {
            panic!("ColumnarValues not equal: actual is Array, expected Scalar")
        }
        (ColumnarValue::Scalar(_), ColumnarValue::Array(_)) => {
            panic!("ColumnarValues not equal: actual is Scalar, expected Array")
        }
    }
}

/// Assert two [ArrayRef]s are equal
pub fn assert_array_equal(actual: &ArrayRef, expected: &ArrayRef) {
    assert_eq!(
        actual.data_type(),
        expected.data_type(),
        "Array data types not equal"
    );
    assert_eq!(actual.len(), expected.len(), "Array lengths not equal");
    assert_eq!(actual, expected);
}

/// Assert two [ScalarValue]s are equal
pub fn assert_scalar_equal(actual: &ScalarValue, expected: &ScalarValue) {
    assert_eq!(actual, expected);
}

/// Assert two WKB arrays hold geometries that agree within a tolerance
///
/// Geometries must have the same structure (type, part counts, vertex
/// counts); each coordinate may differ by at most `tolerance`.
pub fn assert_wkb_array_approx_equal(actual: &ArrayRef, expected: &ArrayRef, tolerance: f64) {
    let actual_items = wkb_items(actual);
    let expected_items = wkb_items(expected);
    assert_eq!(actual_items.len(), expected_items.len(), "Array lengths not equal");

    for (i, (actual_item, expected_item)) in actual_items.iter().zip(&expected_items).enumerate() {
        match (actual_item, expected_item) {
            (None, None) => {}
            (Some(actual_bytes), Some(expected_bytes)) => {
                let actual_geom = geometry_from_wkb(actual_bytes).unwrap();
                let expected_geom = geometry_from_wkb(expected_bytes).unwrap();
                assert_geometry_approx_equal(actual_geom, expected_geom, tolerance, i);
            }
            _ => panic!("Null mismatch at index {i}"),
        }
    }
}

fn assert_geometry_approx_equal(
    actual: Option<Geometry<f64>>,
    expected: Option<Geometry<f64>>,
    tolerance: f64,
    index: usize,
) {
    use geo::CoordsIter;

    let (Some(actual), Some(expected)) = (&actual, &expected) else {
        assert_eq!(actual, expected, "Empty mismatch at index {index}");
        return;
    };

    assert_eq!(
        std::mem::discriminant(actual),
        std::mem::discriminant(expected),
        "Geometry type mismatch at index {index}"
    );

    let actual_coords = actual.coords_iter().collect::<Vec<_>>();
    let expected_coords = expected.coords_iter().collect::<Vec<_>>();
    assert_eq!(
        actual_coords.len(),
        expected_coords.len(),
        "Coordinate count mismatch at index {index}"
    );

    for (a, e) in actual_coords.iter().zip(&expected_coords) {
        assert!(
            (a.x - e.x).abs() <= tolerance && (a.y - e.y).abs() <= tolerance,
            "Coordinate mismatch at index {index}: {a:?} vs {e:?} (tolerance {tolerance})"
        );
    }
}

fn wkb_items(array: &ArrayRef) -> Vec<Option<Vec<u8>>> {
    match array.data_type() {
        DataType::Binary => array
            .as_any()
            .downcast_ref::<BinaryArray>()
            .unwrap()
            .iter()
            .map(|item| item.map(|bytes| bytes.to_vec()))
            .collect(),
        DataType::BinaryView => array
            .as_any()
            .downcast_ref::<BinaryViewArray>()
            .unwrap()
            .iter()
            .map(|item| item.map(|bytes| bytes.to_vec()))
            .collect(),
        other => panic!("Expected a WKB array but got {other}"),
    }
}
