use crate::core::error::Result;
use crate::core::writer::WriterConfig;
use std::fs;
use std::path::Path;
use tracing::info;

/// Load writer settings from a JSON file; absent keys keep their defaults.
pub fn load_writer_config<P: AsRef<Path>>(path: P) -> Result<WriterConfig> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let config = WriterConfig::from_json(&data)?;

    info!(
        "Writer config loaded from {}: {} Hz, scale {}",
        path.display(),
        config.point_frame_rate,
        config.point_scale_factor
    );
    Ok(config)
}
