//! Little-endian WKB encoding of rectangular tile footprints.

use raster_common::{BoundingBox, RasterError, RasterResult};

const WKB_LITTLE_ENDIAN: u8 = 1;
const WKB_POLYGON: u32 = 3;

/// Encode `bbox` as a closed five-point polygon.
pub fn encode_bbox(bbox: &BoundingBox) -> Vec<u8> {
    let ring = [
        (bbox.min_x, bbox.min_y),
        (bbox.max_x, bbox.min_y),
        (bbox.max_x, bbox.max_y),
        (bbox.min_x, bbox.max_y),
        (bbox.min_x, bbox.min_y),
    ];

    let mut out = Vec::with_capacity(1 + 4 + 4 + 4 + ring.len() * 16);
    out.push(WKB_LITTLE_ENDIAN);
    out.extend_from_slice(&WKB_POLYGON.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(ring.len() as u32).to_le_bytes());
    for (x, y) in ring {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}

/// MBR of a WKB polygon (either byte order).
pub fn decode_mbr(data: &[u8]) -> RasterResult<BoundingBox> {
    let mut reader = WkbReader { data, pos: 0, little: true };
    let order = reader.byte()?;
    reader.little = match order {
        0 => false,
        1 => true,
        other => return Err(RasterError::store(format!("bad WKB byte order {}", other))),
    };
    let kind = reader.u32()?;
    if kind != WKB_POLYGON {
        return Err(RasterError::store(format!("expected WKB polygon, found type {}", kind)));
    }

    let rings = reader.u32()?;
    let mut bbox: Option<BoundingBox> = None;
    for _ in 0..rings {
        let points = reader.u32()?;
        for _ in 0..points {
            let x = reader.f64()?;
            let y = reader.f64()?;
            let point = BoundingBox::new(x, y, x, y);
            bbox = Some(match bbox {
                Some(b) => b.union(&point),
                None => point,
            });
        }
    }
    bbox.ok_or_else(|| RasterError::store("empty WKB polygon"))
}

struct WkbReader<'a> {
    data: &'a [u8],
    pos: usize,
    little: bool,
}

impl WkbReader<'_> {
    fn take<const N: usize>(&mut self) -> RasterResult<[u8; N]> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| RasterError::store("truncated WKB geometry"))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn byte(&mut self) -> RasterResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> RasterResult<u32> {
        let b = self.take::<4>()?;
        Ok(if self.little { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) })
    }

    fn f64(&mut self) -> RasterResult<f64> {
        let b = self.take::<8>()?;
        Ok(if self.little { f64::from_le_bytes(b) } else { f64::from_be_bytes(b) })
    }
}
