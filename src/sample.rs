//! Accelerometer samples and burst decoding

use std::fmt;
use std::str::FromStr;

use crate::error::{AcquisitionError, Result};
use crate::registers::SAMPLE_BYTES;

/// Scale for the default +/-2g, 10-bit format (3.9 mg/LSB)
const G_PER_LSB: f32 = 0.0039;

/// Convert a raw axis value to g
pub fn raw_to_g(raw: i16) -> f32 {
    raw as f32 * G_PER_LSB
}

/// One of the three measurement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Map a control command code (X=0, Y=1, Z=2) to an axis
    pub fn from_code(code: u32) -> Option<Axis> {
        match code {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }

    /// Control command code for this axis
    pub fn code(self) -> u32 {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(name)
    }
}

impl FromStr for Axis {
    type Err = AcquisitionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(AcquisitionError::InvalidAxis(other.to_string())),
        }
    }
}

/// A single acceleration reading (raw values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Sample {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Raw value of one axis
    pub fn axis(&self, axis: Axis) -> i16 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Convert raw values to g (default +/-2g format)
    pub fn to_g(&self) -> (f32, f32, f32) {
        (raw_to_g(self.x), raw_to_g(self.y), raw_to_g(self.z))
    }

    /// One axis in g
    pub fn axis_g(&self, axis: Axis) -> f32 {
        raw_to_g(self.axis(axis))
    }

    /// Encode as it appears on the bus: X, Y, Z little-endian
    pub fn to_bytes(&self) -> [u8; SAMPLE_BYTES] {
        let [x0, x1] = self.x.to_le_bytes();
        let [y0, y1] = self.y.to_le_bytes();
        let [z0, z1] = self.z.to_le_bytes();
        [x0, x1, y0, y1, z0, z1]
    }
}

/// Decode a data burst into samples
///
/// Each sample occupies six bytes: X, Y and Z as little-endian signed 16-bit
/// values. A burst whose length is not a multiple of six is rejected whole.
pub fn decode_burst(burst: &[u8]) -> Result<Vec<Sample>> {
    if burst.len() % SAMPLE_BYTES != 0 {
        return Err(AcquisitionError::Protocol { len: burst.len() });
    }

    Ok(burst
        .chunks_exact(SAMPLE_BYTES)
        .map(|chunk| Sample {
            x: i16::from_le_bytes([chunk[0], chunk[1]]),
            y: i16::from_le_bytes([chunk[2], chunk[3]]),
            z: i16::from_le_bytes([chunk[4], chunk[5]]),
        })
        .collect())
}
