// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Online background distance model.
//!
//! The model maintains one running-mean distance per (ring, azimuth
//! bucket) cell, 64 rings by 600 buckets of 0.6 degrees each. In map-build
//! mode the decoder feeds every usable return into [`BackgroundModel::update`];
//! in subtract mode a previously built map is loaded and
//! [`BackgroundModel::classify`] splits returns into background and object
//! points.
//!
//! Persistence is delegated to a [`BackgroundCodec`] implementation so the
//! model is independent of any on-disk image format.

use crate::error::{Error, Result};
use crate::packet::LASER_COUNT;
use ndarray::Array2;

/// Azimuth buckets per rotation (0.6 degree bucket width)
pub const AZIMUTH_BUCKETS: usize = 600;

/// Bucket width in 0.01 degree units
const BUCKET_WIDTH: u16 = 60;

/// Distance tolerance for a return to match a stored background mean,
/// meters
const MATCH_TOLERANCE: f32 = 0.2;

/// Classification of a return against the background map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointClass {
    /// The return matches a stored background distance
    Background,
    /// The return does not match any nearby background distance
    Object,
}

/// Storage codec for background maps.
///
/// Implementations load and save the 64 x 600 mean-distance table; the
/// decoder calls `load` once at construction in subtract mode and `save`
/// once in map mode after enough scans have been accumulated.
pub trait BackgroundCodec {
    /// Load a previously saved map from `path`.
    fn load(&self, path: &str) -> Result<Array2<f32>>;

    /// Save the map to `path`.
    fn save(&self, path: &str, map: &Array2<f32>) -> Result<()>;
}

/// Per-(ring, bucket) running-mean distance map.
#[derive(Clone, Debug)]
pub struct BackgroundModel {
    mean: Array2<f32>,
    samples: Array2<u32>,
}

impl BackgroundModel {
    /// Create an empty model with all means at zero.
    pub fn new() -> Self {
        Self {
            mean: Array2::zeros((LASER_COUNT, AZIMUTH_BUCKETS)),
            samples: Array2::zeros((LASER_COUNT, AZIMUTH_BUCKETS)),
        }
    }

    /// Wrap a previously built map for classification.
    ///
    /// The map must be 64 x 600; anything else is a configuration error.
    pub fn from_map(mean: Array2<f32>) -> Result<Self> {
        if mean.dim() != (LASER_COUNT, AZIMUTH_BUCKETS) {
            return Err(Error::Config(format!(
                "background map is {:?}, expected ({}, {})",
                mean.dim(),
                LASER_COUNT,
                AZIMUTH_BUCKETS
            )));
        }
        Ok(Self {
            mean,
            samples: Array2::zeros((LASER_COUNT, AZIMUTH_BUCKETS)),
        })
    }

    /// Fold one sample into the running mean for its cell.
    pub fn update(&mut self, ring: usize, azimuth: u16, distance: f64) {
        let bucket = (azimuth / BUCKET_WIDTH) as usize;
        let n = self.samples[[ring, bucket]] + 1;
        self.samples[[ring, bucket]] = n;
        let mean = &mut self.mean[[ring, bucket]];
        if n == 1 {
            *mean = distance as f32;
        } else {
            *mean += (distance as f32 - *mean) / n as f32;
        }
    }

    /// Classify a return against the stored means.
    ///
    /// The bucket and its two neighbors are examined, clamped at the map
    /// edges rather than wrapped; a return within [`MATCH_TOLERANCE`] of
    /// any examined mean is background.
    pub fn classify(&self, ring: usize, azimuth: u16, distance: f64) -> PointClass {
        let bucket = (azimuth / BUCKET_WIDTH) as usize;
        let start = bucket.saturating_sub(1);
        let end = if bucket == AZIMUTH_BUCKETS - 1 {
            bucket
        } else {
            bucket + 1
        };
        for column in start..=end {
            if (self.mean[[ring, column]] - distance as f32).abs() < MATCH_TOLERANCE {
                return PointClass::Background;
            }
        }
        PointClass::Object
    }

    /// The mean-distance map, 64 rings by 600 buckets.
    pub fn map(&self) -> &Array2<f32> {
        &self.mean
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean_convergence() {
        let mut model = BackgroundModel::new();
        for _ in 0..10 {
            model.update(3, 1234, 7.5);
        }
        // 1234 / 60 = bucket 20
        assert!((model.map()[[3, 20]] - 7.5).abs() < 1e-5);
    }

    #[test]
    fn test_running_mean_mixed_samples() {
        let mut model = BackgroundModel::new();
        model.update(0, 0, 4.0);
        model.update(0, 0, 6.0);
        assert!((model.map()[[0, 0]] - 5.0).abs() < 1e-6);

        model.update(0, 0, 5.0);
        assert!((model.map()[[0, 0]] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_classify_within_tolerance() {
        let mut model = BackgroundModel::new();
        for _ in 0..5 {
            model.update(7, 6000, 10.0);
        }

        assert_eq!(model.classify(7, 6000, 10.1), PointClass::Background);
        assert_eq!(model.classify(7, 6000, 15.0), PointClass::Object);
        // Zero-mean cells match returns near zero, not 5m away.
        assert_eq!(model.classify(7, 30000, 10.0), PointClass::Object);
    }

    #[test]
    fn test_classify_checks_neighbor_buckets() {
        let mut model = BackgroundModel::new();
        // bucket 100 only
        model.update(1, 6000, 8.0);

        // Returns in buckets 99 and 101 still match through the neighbor
        // window; bucket 102 does not.
        assert_eq!(model.classify(1, 5940, 8.0), PointClass::Background);
        assert_eq!(model.classify(1, 6060, 8.0), PointClass::Background);
        assert_eq!(model.classify(1, 6120, 8.0), PointClass::Object);
    }

    #[test]
    fn test_classify_clamps_at_edges() {
        let mut model = BackgroundModel::new();
        model.update(0, 0, 3.0); // bucket 0
        model.update(0, 35990, 4.0); // bucket 599

        // Bucket 0 must not wrap around to 599 and vice versa.
        assert_eq!(model.classify(0, 0, 4.0), PointClass::Object);
        assert_eq!(model.classify(0, 35990, 3.0), PointClass::Object);
        assert_eq!(model.classify(0, 0, 3.0), PointClass::Background);
        assert_eq!(model.classify(0, 35990, 4.0), PointClass::Background);
    }

    #[test]
    fn test_from_map_validates_shape() {
        assert!(BackgroundModel::from_map(Array2::zeros((LASER_COUNT, AZIMUTH_BUCKETS))).is_ok());
        assert!(matches!(
            BackgroundModel::from_map(Array2::zeros((32, AZIMUTH_BUCKETS))),
            Err(Error::Config(_))
        ));
    }
}
