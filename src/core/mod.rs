pub mod constants;
pub mod directory;
pub mod error;
pub mod format;
pub mod group;
pub mod header;
pub mod metadata;
pub mod packing;
pub mod parameter;
pub mod reader;
pub mod writer;
