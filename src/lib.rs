// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hesai Pandar QT LiDAR packet decoder.
//!
//! This library turns the sensor's raw UDP payloads into calibrated,
//! timestamped point clouds, split into discrete 360 degree scans. An
//! optional background model classifies returns as static background or
//! foreground objects.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ raw packet   │ ──► │   Decoder    │ ──► │  PointCloud       │
//! │ bytes        │     │ (parse +     │     │  (completed scan, │
//! │ (caller I/O) │     │  segment)    │     │   caller-owned)   │
//! └──────────────┘     └──────┬───────┘     └───────────────────┘
//!                             │
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │  BackgroundModel    │
//!                  │  (map / subtract)   │
//!                  └─────────────────────┘
//! ```
//!
//! The caller owns packet acquisition and feeds buffers to
//! [`Decoder::unpack`] in arrival order. When a packet crosses the
//! configured scan phase the decoder reports a completed rotation and the
//! caller takes the finished cloud.
//!
//! # Modules
//!
//! - [`packet`]: Fixed binary packet layout and parser
//! - [`calibration`]: Per-channel elevation and azimuth offset tables
//! - [`buffer`]: Point cloud storage and per-scan rotation
//! - [`background`]: Online background distance model and storage codec
//! - [`decoder`]: Packet-to-scan decoder orchestration
//! - [`packet_source`]: Replay sources for tests and benchmarks
//!
//! # Example
//!
//! ```ignore
//! use pandarqt::{Calibration, Decoder, DecoderConfig};
//!
//! let calibration = Calibration::from_csv(&csv_text)?;
//! let mut decoder = Decoder::new(DecoderConfig::default(), calibration, None)?;
//!
//! loop {
//!     let len = socket.recv(&mut buf)?;
//!     if decoder.unpack(&buf[..len]).is_err() {
//!         continue; // malformed packet, drop and keep going
//!     }
//!     if decoder.has_scanned() {
//!         let scan = decoder.take_scan();
//!         // publish scan.x(), scan.y(), scan.z(), ...
//!     }
//! }
//! ```

pub mod background;
pub mod buffer;
pub mod calibration;
pub mod decoder;
pub mod error;
pub mod packet;
pub mod packet_source;

// Re-exports for convenience
pub use background::{BackgroundCodec, BackgroundModel, PointClass};
pub use buffer::{PointCloud, PointRecord, ScanPair};
pub use calibration::Calibration;
pub use decoder::{Decoder, DecoderConfig, DualReturnPolicy, ReturnMode, ReturnType, RunMode};
pub use error::{Error, Result};
pub use packet::Packet;
pub use packet_source::PacketSource;
