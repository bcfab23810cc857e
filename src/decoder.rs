// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet-to-scan decoder.
//!
//! [`Decoder::unpack`] consumes one raw packet at a time: the packet is
//! parsed, each block's returns are converted into calibrated
//! [`PointRecord`]s, and an azimuth-phase comparison assigns every block
//! to the scan in progress or to the next rotation's overflow cloud.
//! Completed scans are handed to the caller through the `take_*`
//! accessors.
//!
//! Calls must arrive strictly in packet order; the decoder keeps no
//! reordering buffer. One decoder serves one sensor; callers needing
//! concurrency shard by sensor instance.

use crate::background::{BackgroundCodec, BackgroundModel, PointClass};
use crate::buffer::{PointCloud, PointRecord, ScanPair};
use crate::calibration::Calibration;
use crate::error::{Error, Result};
use crate::packet::{LASER_COUNT, Packet, RETURN_DUAL, RETURN_FIRST, RETURN_LAST};
use clap::ValueEnum;
use log::warn;
use std::fmt;

/// Laser firing delays within one block, microseconds, one entry per
/// channel, from the sensor timing datasheet.
const FIRING_OFFSET_US: [f64; LASER_COUNT] = [
    12.31, 14.37, 16.43, 18.49, 20.54, 22.6, 24.66, 26.71, //
    29.16, 31.22, 33.28, 35.34, 37.39, 39.45, 41.5, 43.56, //
    46.61, 48.67, 50.73, 52.78, 54.84, 56.9, 58.95, 61.01, //
    63.45, 65.52, 67.58, 69.63, 71.69, 73.74, 75.8, 77.86, //
    80.9, 82.97, 85.02, 87.08, 89.14, 91.19, 93.25, 95.3, //
    97.75, 99.82, 101.87, 103.93, 105.98, 108.04, 110.1, 112.15, //
    115.2, 117.26, 119.32, 121.38, 123.43, 125.49, 127.54, 129.6, //
    132.05, 134.11, 136.17, 138.22, 140.28, 142.34, 144.39, 146.45,
];

/// Base delay before the first block fires, microseconds
const BLOCK_OFFSET_BASE_US: f64 = 25.71;

/// Firing cycle duration per block, microseconds
const BLOCK_CYCLE_US: f64 = 500.0 / 3.0;

/// Returns at or below this distance are noise, meters
const MIN_DISTANCE: f64 = 0.2;

/// Returns beyond this distance are unusable, meters
const MAX_DISTANCE: f64 = 15.0;

/// Boundary-block count at which a map-build run persists the background
/// map
const MAP_SAVE_THRESHOLD: u32 = 40;

/// Expected points per rotation, used to size scan buffers
const POINTS_PER_SCAN: usize = 40_000;

/// Return type tag carried by each emitted point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnType {
    #[default]
    Unknown = 0,
    /// Single-return packet, sensor in first-return mode
    SingleFirst = 1,
    /// Single-return packet, sensor in last-return mode
    SingleLast = 2,
    /// First return of a dual-return pair
    DualFirst = 3,
    /// Last return of a dual-return pair
    DualLast = 4,
    /// Dual-return pair collapsed into one return
    DualOnly = 5,
}

/// Which return the sensor reports, or both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReturnMode {
    /// First return per firing
    #[default]
    First,
    /// Last return per firing
    Last,
    /// Both returns per firing, two blocks per azimuth
    Dual,
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReturnMode::First => write!(f, "first"),
            ReturnMode::Last => write!(f, "last"),
            ReturnMode::Dual => write!(f, "dual"),
        }
    }
}

/// Background handling mode for a decoder run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunMode {
    /// Decode only, no background model
    #[default]
    Normal,
    /// Build the background map from incoming returns
    Map,
    /// Classify returns against a previously built map
    Subtract,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunMode::Normal => write!(f, "normal"),
            RunMode::Map => write!(f, "map"),
            RunMode::Subtract => write!(f, "subtract"),
        }
    }
}

/// How dual-return block pairs are emitted.
///
/// The sensor protocol leaves room for emitting one point per firing or
/// one per return; which is correct depends on the deployment, so the
/// choice is explicit configuration rather than a hard-coded behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DualReturnPolicy {
    /// Emit only the first return of each pair
    #[default]
    First,
    /// Emit both returns when they differ by more than the configured
    /// distance threshold, otherwise collapse the pair into one return
    Both,
}

/// Construction-time decoder configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderConfig {
    /// Azimuth where a rotation starts and ends, degrees
    pub scan_phase: f32,
    /// Lower azimuth gating bound, degrees
    pub min_angle: f32,
    /// Upper azimuth gating bound, degrees
    pub max_angle: f32,
    /// Distance difference above which a dual-return pair counts as two
    /// distinct returns, meters
    pub dual_return_distance_threshold: f64,
    /// Return mode the sensor is expected to run in
    pub return_mode: ReturnMode,
    /// Background handling mode
    pub run_mode: RunMode,
    /// Dual-return emission policy
    pub dual_return_policy: DualReturnPolicy,
    /// Background map resource handed to the codec
    pub background_map_path: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            scan_phase: 0.0,
            min_angle: 0.0,
            max_angle: 360.0,
            dual_return_distance_threshold: 0.1,
            return_mode: ReturnMode::First,
            run_mode: RunMode::Normal,
            dual_return_policy: DualReturnPolicy::First,
            background_map_path: String::new(),
        }
    }
}

/// Streaming packet-to-scan decoder for one sensor.
pub struct Decoder {
    scan_phase: u16,
    min_angle: f32,
    max_angle: f32,
    dual_return_distance_threshold: f64,
    return_mode: ReturnMode,
    run_mode: RunMode,
    dual_return_policy: DualReturnPolicy,
    background_map_path: String,

    calibration: Calibration,
    codec: Option<Box<dyn BackgroundCodec>>,
    model: BackgroundModel,

    last_phase: i32,
    has_scanned: bool,
    scan_counter: u32,

    all: ScanPair,
    background: ScanPair,
    objects: ScanPair,
}

impl Decoder {
    /// Create a decoder.
    ///
    /// `codec` is required in map and subtract modes; in subtract mode the
    /// background map is loaded through it here.
    pub fn new(
        config: DecoderConfig,
        calibration: Calibration,
        codec: Option<Box<dyn BackgroundCodec>>,
    ) -> Result<Decoder> {
        if config.run_mode != RunMode::Normal && codec.is_none() {
            return Err(Error::Config(format!(
                "run mode {} requires a background map codec",
                config.run_mode
            )));
        }

        let model = match (&config.run_mode, &codec) {
            (RunMode::Subtract, Some(codec)) => {
                BackgroundModel::from_map(codec.load(&config.background_map_path)?)?
            }
            _ => BackgroundModel::new(),
        };

        Ok(Decoder {
            scan_phase: (config.scan_phase * 100.0) as u16,
            min_angle: config.min_angle,
            max_angle: config.max_angle,
            dual_return_distance_threshold: config.dual_return_distance_threshold,
            return_mode: config.return_mode,
            run_mode: config.run_mode,
            dual_return_policy: config.dual_return_policy,
            background_map_path: config.background_map_path,
            calibration,
            codec,
            model,
            last_phase: 0,
            has_scanned: false,
            scan_counter: 0,
            all: ScanPair::with_capacity(POINTS_PER_SCAN),
            background: ScanPair::with_capacity(POINTS_PER_SCAN),
            objects: ScanPair::with_capacity(POINTS_PER_SCAN),
        })
    }

    /// Process one raw packet.
    ///
    /// A malformed packet returns the parse error and leaves all decoder
    /// state untouched; the caller drops the packet and continues with the
    /// next one.
    pub fn unpack(&mut self, data: &[u8]) -> Result<()> {
        let packet = Packet::parse(data)?;

        if self.has_scanned {
            self.all.rotate();
            self.background.rotate();
            self.objects.rotate();
            self.has_scanned = false;
        }

        let dual_return = packet.return_mode == RETURN_DUAL;
        if !dual_return {
            let mismatch = (packet.return_mode == RETURN_FIRST
                && self.return_mode != ReturnMode::First)
                || (packet.return_mode == RETURN_LAST && self.return_mode != ReturnMode::Last);
            if mismatch {
                warn!(
                    "sensor return mode 0x{:02X} does not match configured mode {}",
                    packet.return_mode, self.return_mode
                );
            }
        }

        // Dual-return pairs two physical blocks per firing.
        let step = if dual_return { 2 } else { 1 };

        for block_id in (0..packet.blocks.len()).step_by(step) {
            let phase =
                (packet.blocks[block_id].azimuth as i32 - self.scan_phase as i32 + 36000) % 36000;
            if phase > self.last_phase && !self.has_scanned {
                self.convert(&packet, block_id, dual_return, false);
            } else {
                self.convert(&packet, block_id, dual_return, true);
                self.has_scanned = true;
                self.scan_counter += 1;
                if self.run_mode == RunMode::Map && self.scan_counter == MAP_SAVE_THRESHOLD {
                    if let Some(codec) = &self.codec {
                        codec.save(&self.background_map_path, self.model.map())?;
                    }
                }
            }
            self.last_phase = phase;
        }
        Ok(())
    }

    /// True when the last processed packet crossed a scan boundary and a
    /// completed scan is waiting to be taken.
    pub fn has_scanned(&self) -> bool {
        self.has_scanned
    }

    /// Number of boundary blocks observed so far.
    pub fn scan_count(&self) -> u32 {
        self.scan_counter
    }

    /// Take the completed scan. The next `unpack` call rotates the
    /// overflow points in; an un-taken scan is replaced silently.
    pub fn take_scan(&mut self) -> PointCloud {
        self.all.take_current()
    }

    /// Take the background-classified part of the completed scan
    /// (subtract mode only; empty otherwise).
    pub fn take_background(&mut self) -> PointCloud {
        self.background.take_current()
    }

    /// Take the object-classified part of the completed scan (subtract
    /// mode only; empty otherwise).
    pub fn take_objects(&mut self) -> PointCloud {
        self.objects.take_current()
    }

    /// The background model in its current state.
    pub fn background_model(&self) -> &BackgroundModel {
        &self.model
    }

    /// Convert one block (or dual-return block pair) into points.
    fn convert(&mut self, packet: &Packet, block_id: usize, dual_return: bool, overflow: bool) {
        if dual_return {
            self.convert_dual(packet, block_id, overflow);
            return;
        }
        let return_type = if packet.return_mode == RETURN_FIRST {
            ReturnType::SingleFirst
        } else {
            ReturnType::SingleLast
        };
        for ring in 0..packet.blocks[block_id].units.len() {
            self.emit(packet, block_id, ring, return_type, overflow);
        }
    }

    /// Convert a dual-return block pair.
    ///
    /// The ranging data of one firing spans two adjacent blocks sharing
    /// one azimuth; with the sensor's block numbering the first return
    /// sits in the first block of the pair.
    fn convert_dual(&mut self, packet: &Packet, block_id: usize, overflow: bool) {
        let first_id = block_id;
        let last_id = block_id + 1;
        let has_last = last_id < packet.blocks.len();

        for ring in 0..packet.blocks[first_id].units.len() {
            match self.dual_return_policy {
                DualReturnPolicy::First => {
                    self.emit(packet, first_id, ring, ReturnType::DualFirst, overflow);
                }
                DualReturnPolicy::Both => {
                    let first_distance = packet.blocks[first_id].units[ring].distance;
                    let split = has_last
                        && (packet.blocks[last_id].units[ring].distance - first_distance).abs()
                            > self.dual_return_distance_threshold;
                    if split {
                        self.emit(packet, first_id, ring, ReturnType::DualFirst, overflow);
                        self.emit(packet, last_id, ring, ReturnType::DualLast, overflow);
                    } else {
                        self.emit(packet, first_id, ring, ReturnType::DualOnly, overflow);
                    }
                }
            }
        }
    }

    /// Gate, classify, build and store one sample.
    fn emit(
        &mut self,
        packet: &Packet,
        block_id: usize,
        ring: usize,
        return_type: ReturnType,
        overflow: bool,
    ) {
        let block = &packet.blocks[block_id];
        let unit = block.units[ring];
        let corrected_azimuth =
            block.azimuth as f32 + (self.calibration.azimuth_offset(ring) as f32 * 100.0).round();
        if !self.usable(unit.distance, corrected_azimuth) {
            return;
        }

        let class = if self.run_mode == RunMode::Subtract {
            self.model.classify(ring, block.azimuth, unit.distance)
        } else {
            PointClass::Object
        };

        let point = self.build_point(packet, block_id, ring, return_type);
        self.all.push(point, overflow);
        if self.run_mode == RunMode::Subtract {
            match class {
                PointClass::Background => self.background.push(point, overflow),
                PointClass::Object => self.objects.push(point, overflow),
            }
        }
    }

    /// Whether a sample passes distance and azimuth-window gating.
    ///
    /// The window wraps when `min_angle > max_angle`: only corrected
    /// azimuths strictly inside the excluded (max, min) interval are
    /// dropped.
    fn usable(&self, distance: f64, corrected_azimuth: f32) -> bool {
        if distance <= MIN_DISTANCE || distance > MAX_DISTANCE {
            return false;
        }
        let min = self.min_angle * 100.0;
        let max = self.max_angle * 100.0;
        if self.min_angle > self.max_angle {
            !(corrected_azimuth < min && corrected_azimuth > max)
        } else {
            corrected_azimuth >= min && corrected_azimuth <= max
        }
    }

    /// Build one calibrated point from a (block, ring) sample.
    fn build_point(
        &mut self,
        packet: &Packet,
        block_id: usize,
        ring: usize,
        return_type: ReturnType,
    ) -> PointRecord {
        let block = &packet.blocks[block_id];
        let unit = block.units[ring];
        let dual_return = packet.return_mode == RETURN_DUAL;

        let elevation = self.calibration.elevation(ring).to_radians();
        let azimuth_angle = (self.calibration.azimuth_offset(ring)
            + block.azimuth as f64 / 100.0)
            .to_radians();
        let xy_distance = unit.distance * elevation.cos();

        // Paired dual-return blocks record one firing event and share one
        // block time offset.
        let block_offset = if dual_return {
            BLOCK_OFFSET_BASE_US + BLOCK_CYCLE_US * (block_id / 2) as f64
        } else {
            BLOCK_OFFSET_BASE_US + BLOCK_CYCLE_US * block_id as f64
        };
        let timestamp = packet.utc.unix_seconds() as f64
            + packet.usec as f64 / 1_000_000.0
            + (block_offset + FIRING_OFFSET_US[ring]) / 1_000_000.0;

        if self.run_mode == RunMode::Map {
            self.model.update(ring, block.azimuth, unit.distance);
        }

        PointRecord {
            x: (xy_distance * azimuth_angle.sin()) as f32,
            y: (xy_distance * azimuth_angle.cos()) as f32,
            z: (unit.distance * elevation.sin()) as f32,
            intensity: unit.intensity,
            distance: unit.distance as f32,
            ring: ring as u16,
            azimuth: block.azimuth as f32
                + (self.calibration.azimuth_offset(ring) as f32 * 100.0).round(),
            return_type: return_type as u8,
            timestamp,
        }
    }
}
