// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-channel angle calibration.
//!
//! Every laser channel carries a factory-calibrated elevation angle and an
//! azimuth offset. Both tables are fixed at construction and validated
//! against the sensor's channel count so that later per-ring lookups can
//! never index out of bounds.

use crate::error::{Error, Result};
use crate::packet::LASER_COUNT;

/// Per-channel elevation angles and azimuth offsets, in degrees.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    elevation: Vec<f64>,
    azimuth_offset: Vec<f64>,
}

impl Calibration {
    /// Create a calibration from per-channel angle tables.
    ///
    /// Both tables must have exactly [`LASER_COUNT`] entries, one per
    /// channel, indexed by ring number.
    pub fn new(elevation: Vec<f64>, azimuth_offset: Vec<f64>) -> Result<Calibration> {
        if elevation.len() != LASER_COUNT {
            return Err(Error::Config(format!(
                "elevation table has {} entries, expected {}",
                elevation.len(),
                LASER_COUNT
            )));
        }
        if azimuth_offset.len() != LASER_COUNT {
            return Err(Error::Config(format!(
                "azimuth offset table has {} entries, expected {}",
                azimuth_offset.len(),
                LASER_COUNT
            )));
        }
        Ok(Calibration {
            elevation,
            azimuth_offset,
        })
    }

    /// Parse the vendor calibration CSV.
    ///
    /// The format is a header line followed by one `laser_id,elevation,
    /// azimuth_offset` row per channel, laser ids counted from 1. Rows may
    /// appear in any order but every channel must be present exactly once.
    pub fn from_csv(text: &str) -> Result<Calibration> {
        let mut elevation = vec![f64::NAN; LASER_COUNT];
        let mut azimuth_offset = vec![f64::NAN; LASER_COUNT];
        let mut seen = [false; LASER_COUNT];

        for (number, line) in text.lines().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            let (id, elev, offset) = match (fields.next(), fields.next(), fields.next()) {
                (Some(id), Some(elev), Some(offset)) => (id, elev, offset),
                _ => {
                    return Err(Error::Config(format!(
                        "calibration line {}: expected 3 fields",
                        number + 1
                    )))
                }
            };
            let id: usize = id.trim().parse().map_err(|_| {
                Error::Config(format!("calibration line {}: bad laser id", number + 1))
            })?;
            if id < 1 || id > LASER_COUNT {
                return Err(Error::Config(format!(
                    "calibration line {}: laser id {} out of range",
                    number + 1,
                    id
                )));
            }
            if seen[id - 1] {
                return Err(Error::Config(format!(
                    "calibration line {}: duplicate laser id {}",
                    number + 1,
                    id
                )));
            }
            seen[id - 1] = true;
            elevation[id - 1] = elev.trim().parse().map_err(|_| {
                Error::Config(format!("calibration line {}: bad elevation", number + 1))
            })?;
            azimuth_offset[id - 1] = offset.trim().parse().map_err(|_| {
                Error::Config(format!("calibration line {}: bad azimuth offset", number + 1))
            })?;
        }

        if let Some(missing) = seen.iter().position(|present| !present) {
            return Err(Error::Config(format!(
                "calibration is missing laser id {}",
                missing + 1
            )));
        }

        Calibration::new(elevation, azimuth_offset)
    }

    /// Elevation angle for a ring, degrees.
    #[inline]
    pub fn elevation(&self, ring: usize) -> f64 {
        self.elevation[ring]
    }

    /// Azimuth offset for a ring, degrees.
    #[inline]
    pub fn azimuth_offset(&self, ring: usize) -> f64 {
        self.azimuth_offset[ring]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_lengths() {
        assert!(Calibration::new(vec![0.0; LASER_COUNT], vec![0.0; LASER_COUNT]).is_ok());
        assert!(matches!(
            Calibration::new(vec![0.0; 16], vec![0.0; LASER_COUNT]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Calibration::new(vec![0.0; LASER_COUNT], vec![0.0; LASER_COUNT + 1]),
            Err(Error::Config(_))
        ));
    }

    fn full_csv() -> String {
        let mut text = String::from("Laser id,Elevation,Azimuth\n");
        for id in 1..=LASER_COUNT {
            text.push_str(&format!("{},{},{}\n", id, id as f64 * 0.1, -1.5));
        }
        text
    }

    #[test]
    fn test_from_csv() {
        let calibration = Calibration::from_csv(&full_csv()).unwrap();
        assert!((calibration.elevation(0) - 0.1).abs() < 1e-12);
        assert!((calibration.elevation(63) - 6.4).abs() < 1e-12);
        assert!((calibration.azimuth_offset(31) + 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_csv_missing_row() {
        let mut text = String::from("Laser id,Elevation,Azimuth\n");
        for id in 1..LASER_COUNT {
            text.push_str(&format!("{},0.0,0.0\n", id));
        }
        assert!(matches!(
            Calibration::from_csv(&text),
            Err(Error::Config(msg)) if msg.contains("missing laser id 64")
        ));
    }

    #[test]
    fn test_from_csv_rejects_garbage() {
        let text = "Laser id,Elevation,Azimuth\n1,up,0.0\n";
        assert!(matches!(Calibration::from_csv(text), Err(Error::Config(_))));

        let text = "Laser id,Elevation,Azimuth\n0,0.0,0.0\n";
        assert!(matches!(Calibration::from_csv(text), Err(Error::Config(_))));

        let text = format!("Laser id,Elevation,Azimuth\n{}", "1,0.0,0.0\n".repeat(2));
        assert!(matches!(
            Calibration::from_csv(&text),
            Err(Error::Config(msg)) if msg.contains("duplicate")
        ));
    }
}
