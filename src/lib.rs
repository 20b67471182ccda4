// C3D motion-capture codec
// Main library entry point

pub mod core;
pub mod utils;

// Re-export main types
pub use crate::core::constants::Processor;
pub use crate::core::directory::ParameterDirectory;
pub use crate::core::error::{C3dError, Result};
pub use crate::core::format::{AnalogBlock, Frame, Point};
pub use crate::core::group::Group;
pub use crate::core::header::HeaderRecord;
pub use crate::core::metadata::{Entry, MetadataStore, MissingParameter};
pub use crate::core::packing::{AnalogFormat, PointFormat};
pub use crate::core::parameter::{Element, ParamArray, ParamValue, Parameter};
pub use crate::core::reader::{C3dReader, Frames};
pub use crate::core::writer::{C3dWriter, WriterConfig};
pub use crate::utils::conf_helper::load_writer_config;
