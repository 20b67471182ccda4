// Example usage of the C3D reader and writer
//
// cargo run --example read_c3d -- path/to/trial.c3d
// Without a path a small trial is synthesized in memory first.

use anyhow::Context;
use c3d::{AnalogBlock, C3dReader, C3dWriter, Point, WriterConfig};
use std::io::Cursor;
use tracing::{debug, info, warn, Level};

fn synthesize() -> anyhow::Result<Vec<u8>> {
    let config = WriterConfig {
        point_frame_rate: 100.0,
        analog_frame_rate: 200.0,
        ..WriterConfig::default()
    };
    let mut writer = C3dWriter::new(config);
    for i in 0..5 {
        let t = f64::from(i) * 0.01;
        let points = vec![
            Point::new(100.0 * t, 0.0, 900.0, 0.8, 4),
            Point::invalid(0.0, 0.0, 0.0),
        ];
        // 1 channel x 2 subsamples
        let analog = AnalogBlock::new(1, vec![t, t + 0.005]);
        writer.add_frame(points, analog);
    }

    let mut cursor = Cursor::new(Vec::new());
    writer.write(&mut cursor)?;
    Ok(cursor.into_inner())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let bytes = match std::env::args().nth(1) {
        Some(path) => std::fs::read(&path).with_context(|| format!("reading {}", path))?,
        None => {
            info!("No file given, synthesizing a trial");
            synthesize()?
        }
    };

    let mut reader = C3dReader::open(Cursor::new(bytes))?;
    for missing in reader.warnings() {
        warn!("{}", missing);
    }

    let meta = reader.metadata();
    info!("Header:\n{}", serde_json::to_string_pretty(&meta.header)?);
    info!(
        "Frames {}..={} at {} Hz",
        meta.first_frame()?,
        meta.last_frame()?,
        meta.frame_rate()?
    );

    info!("Groups:");
    for group in meta.directory.groups() {
        info!("  [{}] {} ({} parameters)", group.id, group.name, group.len());
    }
    if let Ok(labels) = meta.point_labels() {
        info!("Point labels: {:?}", labels);
    }
    if let Ok(labels) = meta.analog_labels() {
        info!("Analog labels: {:?}", labels);
    }

    let mut frames = reader.frames()?;
    let mut total = 0;
    while let Some(frame) = frames.advance() {
        let frame = frame?;
        let valid = frame.points.iter().filter(|p| p.is_valid()).count();
        debug!(
            "  frame {}: {}/{} valid points, {} analog values",
            frame.number,
            valid,
            frame.points.len(),
            frame.analog.len()
        );
        total += 1;
    }
    info!("Total frames read: {}", total);

    Ok(())
}
