// Format constants for C3D

use std::fmt;

/// Every major file region is aligned to this many bytes.
pub const BLOCK_SIZE: usize = 512;

pub const HEADER_SIZE: usize = BLOCK_SIZE;

// Header byte 1
pub const MAGIC: u8 = 0x50;

// Written at header offset 294 when long event labels are enabled
pub const LONG_EVENT_LABELS: u16 = 0x3039;

// Directory preamble: reserved(u8) reserved(u8) blocks(u8) processor(u8)
pub const PREAMBLE_SIZE: usize = 4;

// Element width marking character data
pub const CHAR_ELEMENT: i8 = -1;

// Point status word layout
pub const INVALID_POINT: u16 = 0xFFFF;
pub const RESIDUAL_MASK: u32 = 0xFF;
pub const CAMERA_SHIFT: u32 = 8;
pub const CAMERA_BITS: u32 = 9;

// Processor codes
pub const PROCESSOR_INTEL: u8 = 84;
pub const PROCESSOR_DEC: u8 = 85;
pub const PROCESSOR_MIPS: u8 = 86;

/// Byte-order convention tag stored in the directory preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    Intel,
    Dec,
    Mips,
    Unknown(u8),
}

impl Processor {
    pub fn from_u8(val: u8) -> Self {
        match val {
            PROCESSOR_INTEL => Processor::Intel,
            PROCESSOR_DEC => Processor::Dec,
            PROCESSOR_MIPS => Processor::Mips,
            other => Processor::Unknown(other),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Processor::Intel => PROCESSOR_INTEL,
            Processor::Dec => PROCESSOR_DEC,
            Processor::Mips => PROCESSOR_MIPS,
            Processor::Unknown(id) => id,
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Processor::Intel => write!(f, "Intel ({})", PROCESSOR_INTEL),
            Processor::Dec => write!(f, "DEC ({})", PROCESSOR_DEC),
            Processor::Mips => write!(f, "MIPS ({})", PROCESSOR_MIPS),
            Processor::Unknown(id) => write!(f, "unknown ({})", id),
        }
    }
}

/// Number of whole blocks needed to hold `bytes`.
pub fn blocks_for(bytes: usize) -> usize {
    bytes.div_ceil(BLOCK_SIZE)
}

/// Byte offset of a 1-based block index.
pub fn block_offset(block: usize) -> u64 {
    (block.saturating_sub(1) * BLOCK_SIZE) as u64
}
