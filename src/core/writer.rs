// C3D writer: buffers frames, derives metadata, serializes the file

use crate::core::constants::BLOCK_SIZE;
use crate::core::error::{C3dError, Result};
use crate::core::format::{AnalogBlock, Point};
use crate::core::metadata::MetadataStore;
use crate::core::packing::{AnalogFormat, PointFormat};
use crate::core::parameter::Parameter;
use serde::{Deserialize, Serialize};
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

const MAX_FRAMES: usize = u16::MAX as usize;

/// Settings applied to every file a [`C3dWriter`] produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub point_frame_rate: f32,
    /// Analog samples per second; must equal point rate x subsamples per frame.
    pub analog_frame_rate: f32,
    /// Negative stores float coordinates, otherwise scaled 16-bit integers.
    pub point_scale_factor: f32,
    pub point_units: String,
    pub gen_scale: f32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            point_frame_rate: 480.0,
            analog_frame_rate: 0.0,
            point_scale_factor: -1.0,
            point_units: "mm  ".to_string(),
            gen_scale: 1.0,
        }
    }
}

impl WriterConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct C3dWriter {
    config: WriterConfig,
    frames: Vec<(Vec<Point>, AnalogBlock)>,
}

impl C3dWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn add_frame(&mut self, points: Vec<Point>, analog: AnalogBlock) {
        self.frames.push((points, analog));
    }

    pub fn add_frames<I>(&mut self, frames: I)
    where
        I: IntoIterator<Item = (Vec<Point>, AnalogBlock)>,
    {
        self.frames.extend(frames);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Derive the POINT, ANALOG and TRIAL groups and a matching header.
    ///
    /// Shapes come from the first buffered frame; every other frame must agree.
    pub fn build_metadata(&self) -> Result<MetadataStore> {
        let (points, analog) = self
            .frames
            .first()
            .ok_or_else(|| C3dError::Format("no frames buffered".to_string()))?;
        for (i, (p, a)) in self.frames.iter().enumerate() {
            if p.len() != points.len() || a.channels != analog.channels || a.len() != analog.len() {
                return Err(C3dError::Format(format!(
                    "frame {} shape differs from the first frame",
                    i
                )));
            }
        }

        let point_count = count(points.len(), "point")?;
        let channels = count(analog.channels, "analog channel")?;
        let analog_count = u16::try_from(analog.len())
            .map_err(|_| C3dError::Format(format!("{} analog values per frame", analog.len())))?;
        let frame_count = self.frames.len().min(MAX_FRAMES) as u16;
        let config = &self.config;

        let mut meta = MetadataStore::default();

        let point = meta.add_group(1, "POINT", "POINT group")?;
        point.add_param(Parameter::from_scalar("USED", "Number of 3d markers", u16::from(point_count)));
        point.add_param(Parameter::from_scalar("FRAMES", "frame count", frame_count));
        point.add_param(Parameter::from_scalar("DATA_START", "data block number", 0u16));
        point.add_param(Parameter::from_scalar("SCALE", "3d scale factor", config.point_scale_factor));
        point.add_param(Parameter::from_scalar("RATE", "3d data capture rate", config.point_frame_rate));
        point.add_param(Parameter::from_text("X_SCREEN", "X_SCREEN parameter", "+X")?);
        point.add_param(Parameter::from_text("Y_SCREEN", "Y_SCREEN parameter", "+Z")?);
        point.add_param(Parameter::from_text("UNITS", "3d data units", &config.point_units)?);
        let labels: Vec<String> = (0..point_count).map(|i| format!("M{:03}", i)).collect();
        point.add_param(Parameter::from_text_array("LABELS", "labels", 5, &labels)?);
        let blanks = vec![""; point_count as usize];
        point.add_param(Parameter::from_text_array("DESCRIPTIONS", "descriptions", 16, &blanks)?);

        let group = meta.add_group(2, "ANALOG", "ANALOG group")?;
        group.add_param(Parameter::from_scalar("USED", "analog channel count", u16::from(channels)));
        group.add_param(Parameter::from_scalar("RATE", "analog frame rate", config.analog_frame_rate));
        group.add_param(Parameter::from_scalar("GEN_SCALE", "analog general scale factor", config.gen_scale));
        // Empty calibration: readers fall back to unit scale and zero offset.
        group.add_param(Parameter::from_array::<f32>("SCALE", "analog channel scale factors", vec![0], &[])?);
        group.add_param(Parameter::from_array::<i16>("OFFSET", "analog channel offsets", vec![0], &[])?);
        let labels: Vec<String> = (0..channels).map(|i| format!("A{:03}", i)).collect();
        group.add_param(Parameter::from_text_array("LABELS", "analog labels", 5, &labels)?);
        let blanks = vec![""; channels as usize];
        group.add_param(Parameter::from_text_array("DESCRIPTIONS", "analog descriptions", 16, &blanks)?);

        let trial = meta.add_group(3, "TRIAL", "TRIAL group")?;
        trial.add_param(Parameter::new(
            "ACTUAL_START_FIELD",
            "actual start frame",
            2,
            vec![2],
            1u32.to_le_bytes().to_vec(),
        )?);
        trial.add_param(Parameter::new(
            "ACTUAL_END_FIELD",
            "actual end frame",
            2,
            vec![2],
            u32::from(frame_count).to_le_bytes().to_vec(),
        )?);

        let blocks = meta.parameter_blocks();
        let data_block = u16::try_from(2 + blocks)
            .map_err(|_| C3dError::Format(format!("directory needs {} blocks", blocks)))?;
        meta.directory
            .group_by_name_mut("POINT")
            .ok_or_else(|| C3dError::NotFound("POINT".to_string()))?
            .add_param(Parameter::from_scalar("DATA_START", "data block number", data_block));

        let header = &mut meta.header;
        header.parameter_block = 2;
        header.data_block = data_block;
        header.frame_rate = config.point_frame_rate;
        header.first_frame = 1;
        header.last_frame = frame_count;
        header.point_count = u16::from(point_count);
        header.analog_count = analog_count;
        header.scale_factor = config.point_scale_factor;

        meta.check_metadata()?;
        Ok(meta)
    }

    /// Write header, directory and frames from the start of `handle`.
    ///
    /// Does nothing when no frames are buffered. The handle is left open.
    pub fn write<W: Write + Seek>(&self, handle: &mut W) -> Result<()> {
        if self.frames.is_empty() {
            debug!("No frames buffered, nothing written");
            return Ok(());
        }

        let meta = self.build_metadata()?;
        let point_format = PointFormat::from_scale_factor(meta.header.scale_factor);
        let analog_format = if point_format.is_float {
            AnalogFormat::Float
        } else {
            AnalogFormat::Signed
        };

        handle.seek(SeekFrom::Start(0))?;
        handle.write_all(&meta.header.write())?;
        meta.directory.write_to(handle)?;
        debug!(
            "Wrote metadata: {} directory blocks, data at block {}",
            meta.parameter_blocks(),
            meta.header.data_block
        );

        let mut buf = Vec::new();
        for (points, analog) in &self.frames {
            buf.clear();
            for point in points {
                point_format.encode(point, &mut buf)?;
            }
            for value in &analog.values {
                analog_format.encode(*value, &mut buf)?;
            }
            handle.write_all(&buf)?;
        }

        let extra = (handle.stream_position()? % BLOCK_SIZE as u64) as usize;
        if extra != 0 {
            handle.write_all(&vec![0u8; BLOCK_SIZE - extra])?;
        }
        debug!("Wrote {} frames", self.frames.len());
        Ok(())
    }
}

// Label and description parameters carry the count as a dimension byte.
fn count(n: usize, what: &str) -> Result<u8> {
    u8::try_from(n).map_err(|_| C3dError::Format(format!("{} {}s exceed 255", n, what)))
}
