// Data structures for decoded C3D frames

use serde::{Deserialize, Serialize};

/// One reconstructed marker sample.
///
/// `residual` and `cameras` are both -1 when the point is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub residual: f64,
    pub cameras: i32,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64, residual: f64, cameras: i32) -> Self {
        Self {
            x,
            y,
            z,
            residual,
            cameras,
        }
    }

    pub fn invalid(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, -1.0, -1)
    }

    pub fn is_valid(&self) -> bool {
        self.residual > -1.0
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Analog samples of one point frame, stored subsample-major.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalogBlock {
    pub channels: usize,
    pub values: Vec<f64>,
}

impl AnalogBlock {
    pub fn new(channels: usize, values: Vec<f64>) -> Self {
        Self { channels, values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn subsamples(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.values.len() / self.channels
        }
    }

    pub fn sample(&self, subsample: usize, channel: usize) -> Option<f64> {
        if channel >= self.channels {
            return None;
        }
        self.values.get(subsample * self.channels + channel).copied()
    }

    pub fn row(&self, subsample: usize) -> Option<&[f64]> {
        let start = subsample * self.channels;
        self.values.get(start..start + self.channels)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    pub number: i32,
    pub points: Vec<Point>,
    pub analog: AnalogBlock,
}
