// Numeric conventions shared by the frame reader and writer
//
// A point is four stored values: x, y, z and a status word. The status word
// packs the residual in its low byte and one bit per observing camera from
// bit 8 upwards; 0xFFFF marks an invalid point.

use crate::core::constants::*;
use crate::core::error::Result;
use crate::core::format::Point;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

/// How point values are stored, derived from the sign of the scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointFormat {
    pub is_float: bool,
    /// Magnitude of the scale factor.
    pub scale: f64,
}

impl PointFormat {
    pub fn from_scale_factor(scale_factor: f32) -> Self {
        Self {
            is_float: scale_factor < 0.0,
            scale: f64::from(scale_factor.abs()),
        }
    }

    /// Bytes per stored value.
    pub fn width(&self) -> usize {
        if self.is_float {
            4
        } else {
            2
        }
    }

    pub fn record_size(&self) -> usize {
        4 * self.width()
    }

    fn camera_bits(&self) -> u32 {
        // bit 16 only exists in a float word; bit 15 is the sign of an i16 word
        if self.is_float {
            CAMERA_BITS
        } else {
            CAMERA_BITS - 2
        }
    }

    /// `raw` holds exactly one point record.
    pub(crate) fn decode(&self, raw: &[u8]) -> Point {
        let (coords, word) = if self.is_float {
            let value = |i: usize| LittleEndian::read_f32(&raw[i * 4..]);
            (
                [value(0), value(1), value(2)].map(f64::from),
                float_status_word(value(3)),
            )
        } else {
            let value = |i: usize| LittleEndian::read_i16(&raw[i * 2..]);
            (
                [value(0), value(1), value(2)].map(|v| f64::from(v) * self.scale),
                u32::from(LittleEndian::read_u16(&raw[6..])),
            )
        };

        let [x, y, z] = coords;
        match unpack_status(word, self.scale) {
            Some((residual, cameras)) => Point::new(x, y, z, residual, cameras),
            None => Point::invalid(x, y, z),
        }
    }

    pub fn encode(&self, point: &Point, out: &mut Vec<u8>) -> Result<()> {
        let word = self.pack_status(point);
        if self.is_float {
            for coord in point.coords() {
                out.write_f32::<LittleEndian>(coord as f32)?;
            }
            let status = word.map_or(-1.0, |w| w as f32);
            out.write_f32::<LittleEndian>(status)?;
        } else {
            for coord in point.coords() {
                out.write_i16::<LittleEndian>(quantize(coord / self.scale))?;
            }
            let status = word.map_or(-1, |w| w as u16 as i16);
            out.write_i16::<LittleEndian>(status)?;
        }
        Ok(())
    }

    /// Status word for a valid point, `None` for an invalid one.
    pub fn pack_status(&self, point: &Point) -> Option<u32> {
        if !point.is_valid() {
            return None;
        }
        let residual = ((point.residual / self.scale) as u32).min(RESIDUAL_MASK);
        let cameras = point.cameras.clamp(0, self.camera_bits() as i32) as u32;
        let mask = ((1u32 << cameras) - 1) << CAMERA_SHIFT;
        let word = mask | residual;
        if word == u32::from(INVALID_POINT) {
            // keep clear of the sentinel
            return Some(word - 1);
        }
        Some(word)
    }
}

/// Residual and camera count from a status word; `None` for the sentinel.
pub fn unpack_status(word: u32, scale: f64) -> Option<(f64, i32)> {
    if word == u32::from(INVALID_POINT) {
        return None;
    }
    let residual = f64::from(word & RESIDUAL_MASK) * scale;
    let cameras = (word >> CAMERA_SHIFT) & ((1 << CAMERA_BITS) - 1);
    Some((residual, cameras.count_ones() as i32))
}

/// Negative float words are read as 16-bit two's complement.
pub fn float_status_word(raw: f32) -> u32 {
    let word = raw as i32;
    if word < 0 {
        u32::from(word as i16 as u16)
    } else {
        word as u32
    }
}

fn quantize(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Storage type of analog samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogFormat {
    Float,
    Signed,
    Unsigned,
}

impl AnalogFormat {
    pub fn width(self) -> usize {
        match self {
            AnalogFormat::Float => 4,
            AnalogFormat::Signed | AnalogFormat::Unsigned => 2,
        }
    }

    /// `raw` holds at least one sample.
    pub(crate) fn decode(self, raw: &[u8]) -> f64 {
        match self {
            AnalogFormat::Float => f64::from(LittleEndian::read_f32(raw)),
            AnalogFormat::Signed => f64::from(LittleEndian::read_i16(raw)),
            AnalogFormat::Unsigned => f64::from(LittleEndian::read_u16(raw)),
        }
    }

    pub fn encode(self, value: f64, out: &mut Vec<u8>) -> Result<()> {
        match self {
            AnalogFormat::Float => out.write_f32::<LittleEndian>(value as f32)?,
            AnalogFormat::Signed => out.write_i16::<LittleEndian>(quantize(value))?,
            AnalogFormat::Unsigned => {
                out.write_u16::<LittleEndian>(value.round().clamp(0.0, f64::from(u16::MAX)) as u16)?
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_status() {
        assert_eq!(unpack_status(0xFFFF, 1.0), None);
        // residual byte 4, cameras on bits 8, 10 and 15
        let word = 0x0004 | (1 << 8) | (1 << 10) | (1 << 15);
        assert_eq!(unpack_status(word, 0.5), Some((2.0, 3)));
        assert_eq!(unpack_status(0x1FF00, 1.0), Some((0.0, 9)));
    }

    #[test]
    fn test_float_status_word() {
        assert_eq!(float_status_word(-1.0), 0xFFFF);
        assert_eq!(float_status_word(772.0), 772);
        assert_eq!(float_status_word(-2.0), 0xFFFE);
    }

    #[test]
    fn test_pack_camera_mask() {
        let format = PointFormat::from_scale_factor(-1.0);
        let word = format.pack_status(&Point::new(0.0, 0.0, 0.0, 2.0, 3)).unwrap();
        assert_eq!(word & 0xFF, 2);
        assert_eq!((word >> 8).count_ones(), 3);
        assert_eq!(format.pack_status(&Point::invalid(0.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_integer_mode_keeps_word_positive() {
        let format = PointFormat::from_scale_factor(1.0);
        let word = format.pack_status(&Point::new(0.0, 0.0, 0.0, 300.0, 12)).unwrap();
        assert_eq!(word, 0x7FFF);
        assert!((word as u16 as i16) >= 0);
        assert_eq!(unpack_status(word, 1.0), Some((255.0, 7)));
    }

    #[test]
    fn test_float_mode_avoids_sentinel() {
        let format = PointFormat::from_scale_factor(-1.0);
        let word = format.pack_status(&Point::new(0.0, 0.0, 0.0, 255.0, 8)).unwrap();
        assert_eq!(word, 0xFFFE);
        assert_eq!(unpack_status(word, 1.0), Some((254.0, 8)));
    }

    #[test]
    fn test_integer_point_decode() {
        let format = PointFormat::from_scale_factor(2.0);
        let mut raw = Vec::new();
        for v in [10i16, 20, 30, 0x0301] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let point = format.decode(&raw);
        assert_eq!(point.coords(), [20.0, 40.0, 60.0]);
        assert_eq!(point.residual, 2.0);
        assert_eq!(point.cameras, 2);
    }

    #[test]
    fn test_invalid_integer_point() {
        let format = PointFormat::from_scale_factor(0.1);
        let mut raw = Vec::new();
        format.encode(&Point::invalid(1.0, 2.0, 3.0), &mut raw).unwrap();
        assert_eq!(&raw[6..8], &[0xFF, 0xFF]);
        let point = format.decode(&raw);
        assert_eq!(point.residual, -1.0);
        assert_eq!(point.cameras, -1);
    }

    #[test]
    fn test_analog_formats() {
        let mut out = Vec::new();
        AnalogFormat::Signed.encode(-12.4, &mut out).unwrap();
        AnalogFormat::Unsigned.encode(40000.0, &mut out).unwrap();
        AnalogFormat::Float.encode(0.25, &mut out).unwrap();
        assert_eq!(AnalogFormat::Signed.decode(&out[0..2]), -12.0);
        assert_eq!(AnalogFormat::Unsigned.decode(&out[2..4]), 40000.0);
        assert_eq!(AnalogFormat::Float.decode(&out[4..8]), 0.25);
    }
}
