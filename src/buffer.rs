// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point cloud buffers and per-scan rotation.
//!
//! Points are stored in a structure-of-arrays layout, one vector per
//! field, so consumers can hand any column straight to downstream
//! processing without first unpacking an array of structs.
//!
//! [`ScanPair`] holds the cloud being accumulated for the current rotation
//! together with the overflow cloud that collects points already belonging
//! to the next rotation. At a scan boundary the pair rotates: the overflow
//! contents become the current scan and the overflow is cleared, retaining
//! its allocation.

use itertools::izip;

/// One calibrated laser return.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointRecord {
    /// Cartesian coordinates in meters
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Calibrated reflectivity, 0-255
    pub intensity: u8,
    /// Measured distance in meters
    pub distance: f32,
    /// Laser channel index
    pub ring: u16,
    /// Offset-corrected azimuth in 0.01 degree units
    pub azimuth: f32,
    /// Return type tag, see [`crate::decoder::ReturnType`]
    pub return_type: u8,
    /// Absolute capture time, seconds since the UNIX epoch
    pub timestamp: f64,
}

/// Structure-of-arrays point cloud storage.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    intensity: Vec<u8>,
    distance: Vec<f32>,
    ring: Vec<u16>,
    azimuth: Vec<f32>,
    return_type: Vec<u8>,
    timestamp: Vec<f64>,
}

impl PointCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud with room for `capacity` points per column.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
            distance: Vec::with_capacity(capacity),
            ring: Vec::with_capacity(capacity),
            azimuth: Vec::with_capacity(capacity),
            return_type: Vec::with_capacity(capacity),
            timestamp: Vec::with_capacity(capacity),
        }
    }

    /// Append one point.
    #[inline]
    pub fn push(&mut self, point: PointRecord) {
        self.x.push(point.x);
        self.y.push(point.y);
        self.z.push(point.z);
        self.intensity.push(point.intensity);
        self.distance.push(point.distance);
        self.ring.push(point.ring);
        self.azimuth.push(point.azimuth);
        self.return_type.push(point.return_type);
        self.timestamp.push(point.timestamp);
    }

    /// Number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// True when the cloud holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Drop all points, retaining allocations.
    #[inline]
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.intensity.clear();
        self.distance.clear();
        self.ring.clear();
        self.azimuth.clear();
        self.return_type.clear();
        self.timestamp.clear();
    }

    /// X coordinates, meters.
    #[inline]
    pub fn x(&self) -> &[f32] {
        &self.x
    }

    /// Y coordinates, meters.
    #[inline]
    pub fn y(&self) -> &[f32] {
        &self.y
    }

    /// Z coordinates, meters.
    #[inline]
    pub fn z(&self) -> &[f32] {
        &self.z
    }

    /// Reflectivity values.
    #[inline]
    pub fn intensity(&self) -> &[u8] {
        &self.intensity
    }

    /// Measured distances, meters.
    #[inline]
    pub fn distance(&self) -> &[f32] {
        &self.distance
    }

    /// Laser channel indices.
    #[inline]
    pub fn ring(&self) -> &[u16] {
        &self.ring
    }

    /// Corrected azimuths, 0.01 degree units.
    #[inline]
    pub fn azimuth(&self) -> &[f32] {
        &self.azimuth
    }

    /// Return type tags.
    #[inline]
    pub fn return_type(&self) -> &[u8] {
        &self.return_type
    }

    /// Capture timestamps, seconds since the UNIX epoch.
    #[inline]
    pub fn timestamp(&self) -> &[f64] {
        &self.timestamp
    }

    /// Iterate over the cloud as [`PointRecord`]s.
    pub fn iter(&self) -> impl Iterator<Item = PointRecord> + '_ {
        izip!(
            &self.x,
            &self.y,
            &self.z,
            &self.intensity,
            &self.distance,
            &self.ring,
            &self.azimuth,
            &self.return_type,
            &self.timestamp
        )
        .map(
            |(&x, &y, &z, &intensity, &distance, &ring, &azimuth, &return_type, &timestamp)| {
                PointRecord {
                    x,
                    y,
                    z,
                    intensity,
                    distance,
                    ring,
                    azimuth,
                    return_type,
                    timestamp,
                }
            },
        )
    }
}

/// Current-scan cloud plus next-scan overflow cloud.
#[derive(Clone, Debug, Default)]
pub struct ScanPair {
    current: PointCloud,
    overflow: PointCloud,
}

impl ScanPair {
    /// Create a pair with the given per-cloud capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            current: PointCloud::with_capacity(capacity),
            overflow: PointCloud::with_capacity(capacity),
        }
    }

    /// Append a point to the current scan or the overflow cloud.
    #[inline]
    pub fn push(&mut self, point: PointRecord, overflow: bool) {
        if overflow {
            self.overflow.push(point);
        } else {
            self.current.push(point);
        }
    }

    /// Rotate at a scan boundary.
    ///
    /// The overflow contents become the current scan; the overflow cloud
    /// is cleared for the next rotation. O(1), no point data is copied.
    /// Any un-taken current scan is discarded here.
    pub fn rotate(&mut self) {
        std::mem::swap(&mut self.current, &mut self.overflow);
        self.overflow.clear();
    }

    /// The scan accumulated so far.
    #[inline]
    pub fn current(&self) -> &PointCloud {
        &self.current
    }

    /// Take ownership of the completed scan, leaving an empty cloud.
    pub fn take_current(&mut self) -> PointCloud {
        std::mem::take(&mut self.current)
    }
}
