use std::fmt;

use crate::Coordinate;

/// Precision used by LocationIQ / OSRM `geometries=polyline` responses.
pub const POLYLINE_PRECISION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolylineError {
    InvalidByte { offset: usize },
    Truncated { offset: usize },
    Overflow { offset: usize },
}

impl fmt::Display for PolylineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidByte { offset } => write!(f, "invalid polyline byte at offset {offset}"),
            Self::Truncated { offset } => write!(f, "polyline truncated at offset {offset}"),
            Self::Overflow { offset } => write!(f, "polyline value overflows at offset {offset}"),
        }
    }
}

impl std::error::Error for PolylineError {}

/// Decodes an encoded polyline into a coordinate path.
pub fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<Coordinate>, PolylineError> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut path = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;

    while index < bytes.len() {
        let start = index;
        let (dlat, next) = decode_value(bytes, index)?;
        let (dlon, next) = decode_value(bytes, next)?;
        index = next;
        lat = lat
            .checked_add(dlat)
            .ok_or(PolylineError::Overflow { offset: start })?;
        lon = lon
            .checked_add(dlon)
            .ok_or(PolylineError::Overflow { offset: start })?;
        path.push(Coordinate::new(lat as f64 / factor, lon as f64 / factor));
    }

    Ok(path)
}

fn decode_value(bytes: &[u8], mut index: usize) -> Result<(i64, usize), PolylineError> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes
            .get(index)
            .ok_or(PolylineError::Truncated { offset: index })?;
        if !(63..127).contains(&byte) {
            return Err(PolylineError::InvalidByte { offset: index });
        }
        if shift > 60 {
            return Err(PolylineError::Overflow { offset: index });
        }
        let chunk = i64::from(byte - 63);
        index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    let value = if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Ok((value, index))
}
