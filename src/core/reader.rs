// C3D reader: metadata on open, frames streamed on demand

use crate::core::constants::block_offset;
use crate::core::directory::ParameterDirectory;
use crate::core::error::{C3dError, Result};
use crate::core::format::{AnalogBlock, Frame};
use crate::core::header::HeaderRecord;
use crate::core::metadata::{MetadataStore, MissingParameter};
use crate::core::packing::{AnalogFormat, PointFormat};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Reads metadata and frames from a seekable C3D stream.
///
/// The reader never closes the handle; [`into_inner`](Self::into_inner) gives it back.
pub struct C3dReader<R> {
    handle: R,
    metadata: MetadataStore,
    warnings: Vec<MissingParameter>,
}

impl C3dReader<BufReader<File>> {
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> C3dReader<R> {
    /// Parse the header and parameter directory, then check them against each other.
    pub fn open(mut handle: R) -> Result<Self> {
        let header = HeaderRecord::read_from(&mut handle)?;
        if header.parameter_block == 0 {
            return Err(C3dError::Format("parameter block index is 0".to_string()));
        }

        handle.seek(SeekFrom::Start(block_offset(header.parameter_block as usize)))?;
        let directory = ParameterDirectory::read_from(&mut handle)?;
        debug!(
            "Opened C3D: {} points, {} analog values, {} groups",
            header.point_count,
            header.analog_count,
            directory.len()
        );

        let metadata = MetadataStore::new(header, directory);
        let warnings = metadata.check_metadata()?;

        Ok(Self {
            handle,
            metadata,
            warnings,
        })
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn header(&self) -> &HeaderRecord {
        &self.metadata.header
    }

    /// Missing parameters reported when the file was opened.
    pub fn warnings(&self) -> &[MissingParameter] {
        &self.warnings
    }

    pub fn into_inner(self) -> R {
        self.handle
    }

    /// Seek to the data section and stream frames from the first to the last frame number.
    pub fn frames(&mut self) -> Result<Frames<'_, R>> {
        let layout = FrameLayout::from_metadata(&self.metadata)?;
        let start = block_offset(self.metadata.header.data_block as usize);
        self.handle.seek(SeekFrom::Start(start))?;
        debug!("Reading frames {}..={} from offset {}", layout.first, layout.last, start);
        Ok(Frames::new(&mut self.handle, layout))
    }
}

/// Per-frame decoding rules derived once from the metadata.
#[derive(Debug, Clone)]
struct FrameLayout {
    points: usize,
    point_format: PointFormat,
    analog_values: usize,
    channels: usize,
    analog_format: AnalogFormat,
    offsets: Vec<f64>,
    scales: Vec<f64>,
    gen_scale: f64,
    first: i64,
    last: i64,
}

impl FrameLayout {
    fn from_metadata(meta: &MetadataStore) -> Result<Self> {
        let point_format = PointFormat::from_scale_factor(meta.scale_factor()?);
        let analog_values = meta.header.analog_count as usize;
        let channels = match meta.analog_channels()? as usize {
            0 => analog_values,
            n => n,
        };

        let unsigned = match meta.parameter("ANALOG:FORMAT") {
            Some(param) => param.as_string()?.trim().eq_ignore_ascii_case("UNSIGNED"),
            None => false,
        };
        let analog_format = if point_format.is_float {
            AnalogFormat::Float
        } else if unsigned {
            AnalogFormat::Unsigned
        } else {
            AnalogFormat::Signed
        };

        // Calibration shorter than the channel count falls back to identity.
        let mut offsets: Vec<f64> = meta
            .parameter("ANALOG:OFFSET")
            .map(|p| p.values::<i16>().into_iter().map(f64::from).collect())
            .unwrap_or_default();
        offsets.resize(channels, 0.0);
        let mut scales: Vec<f64> = meta
            .parameter("ANALOG:SCALE")
            .map(|p| p.values::<f32>().into_iter().map(f64::from).collect())
            .unwrap_or_default();
        scales.resize(channels, 1.0);

        Ok(Self {
            points: meta.header.point_count as usize,
            point_format,
            analog_values,
            channels,
            analog_format,
            offsets,
            scales,
            gen_scale: f64::from(meta.get_or::<f32>("ANALOG:GEN_SCALE", 1.0)?),
            first: i64::from(meta.first_frame()?),
            last: i64::from(meta.last_frame()?),
        })
    }
}

/// Single-pass frame stream over the data section.
///
/// As an [`Iterator`] every frame is a fresh copy. [`advance`](Self::advance)
/// instead lends the internal buffer, which the next call overwrites.
pub struct Frames<'a, R> {
    handle: &'a mut R,
    layout: FrameLayout,
    next: i64,
    raw: Vec<u8>,
    frame: Frame,
    done: bool,
}

impl<'a, R: Read> Frames<'a, R> {
    fn new(handle: &'a mut R, layout: FrameLayout) -> Self {
        let frame = Frame {
            number: 0,
            points: Vec::with_capacity(layout.points),
            analog: AnalogBlock::new(layout.channels, Vec::with_capacity(layout.analog_values)),
        };
        Self {
            handle,
            next: layout.first,
            layout,
            raw: Vec::new(),
            frame,
            done: false,
        }
    }

    pub fn remaining(&self) -> usize {
        if self.done {
            return 0;
        }
        (self.layout.last - self.next + 1).max(0) as usize
    }

    /// Decode the next frame into the reused buffer.
    pub fn advance(&mut self) -> Option<Result<&Frame>> {
        if self.done || self.next > self.layout.last {
            return None;
        }
        match self.read_next() {
            Ok(()) => Some(Ok(&self.frame)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    fn read_next(&mut self) -> Result<()> {
        let layout = &self.layout;
        self.frame.number = self.next as i32;
        self.next += 1;

        let record = layout.point_format.record_size();
        self.raw.resize(layout.points * record, 0);
        self.handle.read_exact(&mut self.raw)?;
        self.frame.points.clear();
        self.frame
            .points
            .extend(self.raw.chunks_exact(record).map(|r| layout.point_format.decode(r)));

        self.frame.analog.channels = layout.channels;
        self.frame.analog.values.clear();
        if layout.analog_values > 0 {
            let width = layout.analog_format.width();
            self.raw.resize(layout.analog_values * width, 0);
            self.handle.read_exact(&mut self.raw)?;
            for (i, raw) in self.raw.chunks_exact(width).enumerate() {
                let k = i % layout.channels;
                let value = layout.analog_format.decode(raw);
                self.frame
                    .analog
                    .values
                    .push((value - layout.offsets[k]) * layout.scales[k] * layout.gen_scale);
            }
        }
        Ok(())
    }
}

impl<'a, R: Read> Iterator for Frames<'a, R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().map(|frame| frame.cloned())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::BLOCK_SIZE;
    use crate::core::group::Group;
    use crate::core::parameter::Parameter;
    use std::io::Cursor;

    /// Header + one directory block + `data`, with integer points at `scale`.
    fn synthesize(points: u16, analog: u16, scale: f32, extra: &[Parameter], data: &[u8]) -> Vec<u8> {
        let header = HeaderRecord {
            point_count: points,
            analog_count: analog,
            scale_factor: scale,
            frame_rate: 50.0,
            first_frame: 1,
            last_frame: 2,
            data_block: 3,
            ..HeaderRecord::default()
        };
        let mut dir = ParameterDirectory::new();
        let point = dir.add_group(1, "POINT", "").unwrap();
        point.add_param(Parameter::from_scalar("USED", "", points));
        point.add_param(Parameter::from_scalar("SCALE", "", scale));
        point.add_param(Parameter::from_scalar("RATE", "", 50.0f32));
        point.add_param(Parameter::from_scalar("DATA_START", "", 3u16));
        let analog_group: &mut Group = dir.add_group(2, "ANALOG", "").unwrap();
        analog_group.add_param(Parameter::from_scalar("USED", "", analog.min(2)));
        analog_group.add_param(Parameter::from_scalar("RATE", "", 50.0f32 * f32::from(analog) / 2.0));
        for param in extra {
            analog_group.add_param(param.clone());
        }

        let mut bytes = header.write().to_vec();
        bytes.extend(dir.encode().unwrap());
        assert_eq!(bytes.len(), 2 * BLOCK_SIZE);
        bytes.extend_from_slice(data);
        bytes
    }

    fn words(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_integer_frames() {
        let data = words(&[10, 20, 30, 0x0102, -5, 0, 5, -1, 1, 2, 3, 0, 4, 5, 6, 0]);
        let bytes = synthesize(2, 0, 2.0, &[], &data);
        let mut reader = C3dReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.header().point_count, 2);

        let frames: Vec<Frame> = reader.frames().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].number, 1);
        let p = frames[0].points[0];
        assert_eq!(p.coords(), [20.0, 40.0, 60.0]);
        assert_eq!(p.residual, 4.0);
        assert_eq!(p.cameras, 1);
        let q = frames[0].points[1];
        assert_eq!(q.coords(), [-10.0, 0.0, 10.0]);
        assert_eq!((q.residual, q.cameras), (-1.0, -1));
        assert_eq!(frames[1].number, 2);
        assert_eq!(frames[1].points[1].coords(), [8.0, 10.0, 12.0]);
        assert!(frames[1].analog.is_empty());
    }

    #[test]
    fn test_analog_calibration() {
        // two channels, two subsamples, integer storage
        let extra = [
            Parameter::from_array("OFFSET", "", vec![1], &[10i16]).unwrap(),
            Parameter::from_array("SCALE", "", vec![2], &[0.5f32, 2.0]).unwrap(),
            Parameter::from_scalar("GEN_SCALE", "", 10.0f32),
        ];
        let mut data = words(&[0, 0, 0, 0, 12, 7, 14, 9]);
        data.extend(words(&[0, 0, 0, 0, 10, 0, 10, 0]));
        let bytes = synthesize(1, 4, 1.0, &extra, &data);
        let mut reader = C3dReader::open(Cursor::new(bytes)).unwrap();

        let mut frames = reader.frames().unwrap();
        let first = frames.advance().unwrap().unwrap();
        assert_eq!(first.analog.channels, 2);
        assert_eq!(first.analog.subsamples(), 2);
        // channel 0: (raw - 10) * 0.5 * 10, channel 1: (raw - 0) * 2 * 10
        assert_eq!(first.analog.values, vec![10.0, 140.0, 20.0, 180.0]);
        let second = frames.advance().unwrap().unwrap();
        assert_eq!(second.analog.values, vec![0.0, 0.0, 0.0, 0.0]);
        assert!(frames.advance().is_none());
    }

    #[test]
    fn test_unsigned_analog_format() {
        let extra = [Parameter::from_text("FORMAT", "", " unsigned ").unwrap()];
        let mut data = words(&[0, 0, 0, 0, -1, 2]);
        data.extend(words(&[0, 0, 0, 0, 0, 0]));
        let bytes = synthesize(1, 2, 1.0, &extra, &data);
        let mut reader = C3dReader::open(Cursor::new(bytes)).unwrap();
        let frame = reader.frames().unwrap().next().unwrap().unwrap();
        assert_eq!(frame.analog.values, vec![65535.0, 2.0]);
    }

    #[test]
    fn test_truncated_data() {
        let bytes = synthesize(1, 0, 1.0, &[], &words(&[1, 2, 3, 0]));
        let mut reader = C3dReader::open(Cursor::new(bytes)).unwrap();
        let mut frames = reader.frames().unwrap();
        assert!(frames.next().unwrap().is_ok());
        assert!(matches!(frames.next(), Some(Err(C3dError::Io(_)))));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = synthesize(1, 0, 1.0, &[], &[]);
        bytes[1] = 0;
        let err = C3dReader::open(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, C3dError::InvalidMagic { .. }));
    }

    #[test]
    fn test_mips_rejected() {
        let mut bytes = synthesize(1, 0, 1.0, &[], &[]);
        bytes[BLOCK_SIZE + 3] = 86;
        let err = C3dReader::open(Cursor::new(bytes)).err().unwrap();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_inconsistent_header_rejected() {
        let mut bytes = synthesize(1, 0, 1.0, &[], &[]);
        // header frame rate 25 vs POINT:RATE 50
        bytes[20..24].copy_from_slice(&25.0f32.to_le_bytes());
        let err = C3dReader::open(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, C3dError::InconsistentMetadata { field: "frame rate", .. }));
    }

    #[test]
    fn test_missing_labels_reported() {
        let bytes = synthesize(1, 0, 1.0, &[], &[]);
        let reader = C3dReader::open(Cursor::new(bytes)).unwrap();
        let keys: Vec<_> = reader.warnings().iter().map(|w| w.key).collect();
        assert!(keys.contains(&"POINT:LABELS"));
        assert!(!keys.contains(&"ANALOG:USED"));
    }
}
