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
use std::io::Write;

use geo_traits::GeometryTrait;
use wkb::{
    writer::{write_geometry, WriteOptions},
    Endianness,
};

use crate::error::SedonaGeometryError;

/// Size of a 2D WKB point, used as a capacity hint for binary builders
pub const WKB_MIN_PROBABLE_BYTES: usize = 21;

/// Write any geometry as little endian ISO WKB
pub fn write_wkb_geometry(
    buf: &mut impl Write,
    geom: &impl GeometryTrait<T = f64>,
) -> Result<(), SedonaGeometryError> {
    write_geometry(
        buf,
        geom,
        &WriteOptions {
            endianness: Endianness::LittleEndian,
        },
    )
    .map_err(|err| SedonaGeometryError::Invalid(format!("WKB write error: {err}")))
}

/// Encode any geometry as little endian ISO WKB
pub fn wkb_from_geometry(
    geom: &impl GeometryTrait<T = f64>,
) -> Result<Vec<u8>, SedonaGeometryError> {
    let mut out = Vec::with_capacity(WKB_MIN_PROBABLE_BYTES);
    write_wkb_geometry(&mut out, geom)?;
    Ok(out)
}

/// Encode a 2D point as WKB without going through a geometry type
pub fn wkb_point(x: f64, y: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(WKB_MIN_PROBABLE_BYTES);
    out.push(0x01);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use geo_types::{point, Geometry};

    use super::*;

    #[test]
    fn point_bytes() {
        let expected = wkb_from_geometry(&Geometry::Point(point!(x: 1.5, y: -2.0))).unwrap();
        assert_eq!(wkb_point(1.5, -2.0), expected);
        assert_eq!(expected.len(), WKB_MIN_PROBABLE_BYTES);
    }

    #[test]
    fn write_to_buffer() {
        let mut buf = vec![0xff];
        write_wkb_geometry(&mut buf, &Geometry::Point(point!(x: 0.0, y: 0.0))).unwrap();
        assert_eq!(buf.len(), 1 + WKB_MIN_PROBABLE_BYTES);
        assert_eq!(&buf[1..], wkb_point(0.0, 0.0).as_slice());
    }
}
