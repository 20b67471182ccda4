// Fixed 512-byte C3D header record

use crate::core::constants::*;
use crate::core::error::{C3dError, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

/// Stock capture metadata stored in the first block of every C3D file.
///
/// The same facts (point count, frame rate, scale factor) are repeated in the
/// parameter directory; [`MetadataStore::check_metadata`] keeps the two in step.
///
/// [`MetadataStore::check_metadata`]: crate::MetadataStore::check_metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderRecord {
    /// 1-based block index of the parameter directory.
    pub parameter_block: u8,
    pub point_count: u16,
    /// Analog values per point frame (channels x subsamples).
    pub analog_count: u16,
    pub first_frame: u16,
    pub last_frame: u16,
    pub max_gap: u16,
    /// Negative means float coordinates; otherwise the integer multiplier.
    pub scale_factor: f32,
    /// 1-based block index of the first data block.
    pub data_block: u16,
    pub sample_per_frame: u16,
    pub frame_rate: f32,
    pub long_event_labels: bool,
    pub label_block: u16,
}

impl Default for HeaderRecord {
    fn default() -> Self {
        Self {
            parameter_block: 2,
            point_count: 50,
            analog_count: 0,
            first_frame: 1,
            last_frame: 1,
            max_gap: 0,
            scale_factor: -1.0,
            data_block: 3,
            sample_per_frame: 0,
            frame_rate: 60.0,
            long_event_labels: false,
            label_block: 0,
        }
    }
}

impl HeaderRecord {
    pub fn read(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = bytes[1];
        if magic != MAGIC {
            return Err(C3dError::InvalidMagic {
                expected: MAGIC,
                got: magic,
            });
        }

        Ok(Self {
            parameter_block: bytes[0],
            point_count: LittleEndian::read_u16(&bytes[2..4]),
            analog_count: LittleEndian::read_u16(&bytes[4..6]),
            first_frame: LittleEndian::read_u16(&bytes[6..8]),
            last_frame: LittleEndian::read_u16(&bytes[8..10]),
            max_gap: LittleEndian::read_u16(&bytes[10..12]),
            scale_factor: LittleEndian::read_f32(&bytes[12..16]),
            data_block: LittleEndian::read_u16(&bytes[16..18]),
            sample_per_frame: LittleEndian::read_u16(&bytes[18..20]),
            frame_rate: LittleEndian::read_f32(&bytes[20..24]),
            // 24..294 reserved
            long_event_labels: LittleEndian::read_u16(&bytes[294..296]) != 0,
            label_block: LittleEndian::read_u16(&bytes[296..298]),
            // 298..512 reserved
        })
    }

    /// Seek to the start of `handle` and parse one header block.
    pub fn read_from<R: Read + Seek>(handle: &mut R) -> Result<Self> {
        handle.seek(SeekFrom::Start(0))?;
        let mut block = [0u8; HEADER_SIZE];
        handle.read_exact(&mut block)?;
        Self::read(&block)
    }

    /// Reserved regions are always written as zeros.
    pub fn write(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.parameter_block;
        out[1] = MAGIC;
        LittleEndian::write_u16(&mut out[2..4], self.point_count);
        LittleEndian::write_u16(&mut out[4..6], self.analog_count);
        LittleEndian::write_u16(&mut out[6..8], self.first_frame);
        LittleEndian::write_u16(&mut out[8..10], self.last_frame);
        LittleEndian::write_u16(&mut out[10..12], self.max_gap);
        LittleEndian::write_f32(&mut out[12..16], self.scale_factor);
        LittleEndian::write_u16(&mut out[16..18], self.data_block);
        LittleEndian::write_u16(&mut out[18..20], self.sample_per_frame);
        LittleEndian::write_f32(&mut out[20..24], self.frame_rate);
        let flag = if self.long_event_labels { LONG_EVENT_LABELS } else { 0 };
        LittleEndian::write_u16(&mut out[294..296], flag);
        LittleEndian::write_u16(&mut out[296..298], self.label_block);
        out
    }

    pub fn is_float(&self) -> bool {
        self.scale_factor < 0.0
    }
}

impl fmt::Display for HeaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  parameter_block: {}", self.parameter_block)?;
        writeln!(f, "      point_count: {}", self.point_count)?;
        writeln!(f, "     analog_count: {}", self.analog_count)?;
        writeln!(f, "      first_frame: {}", self.first_frame)?;
        writeln!(f, "       last_frame: {}", self.last_frame)?;
        writeln!(f, "          max_gap: {}", self.max_gap)?;
        writeln!(f, "     scale_factor: {}", self.scale_factor)?;
        writeln!(f, "       data_block: {}", self.data_block)?;
        writeln!(f, " sample_per_frame: {}", self.sample_per_frame)?;
        writeln!(f, "       frame_rate: {}", self.frame_rate)?;
        writeln!(f, "long_event_labels: {}", self.long_event_labels)?;
        write!(f, "      label_block: {}", self.label_block)
    }
}
