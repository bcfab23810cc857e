// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pandar QT packet layout and parser.
//!
//! # Packet Structure
//!
//! The sensor emits fixed-size UDP payloads, 1072 bytes with the trailing
//! UDP sequence number or 1068 bytes without it:
//!
//! - Header: 12 bytes (start-of-block marker, protocol version, laser and
//!   block counts, return mode, distance unit)
//! - Body: 4 blocks x (2-byte azimuth + 64 x 4-byte range units)
//! - Tail: reserved fields, motor speed, 4-byte microsecond counter,
//!   return mode flag, factory info, 6-byte UTC date-time, optional
//!   4-byte UDP sequence number
//!
//! [`Packet::parse`] is a pure function over the input buffer; a rejected
//! packet produces no partial output.

use crate::error::{Error, Result};

/// Start-of-block sentinel at the head of every packet (big-endian)
const START_OF_BLOCK: u16 = 0xEEFF;

/// Header size in bytes
const HEADER_SIZE: usize = 12;

/// Azimuth blocks per packet
pub const BLOCKS_PER_PACKET: usize = 4;

/// Laser channels per block
pub const LASER_COUNT: usize = 64;

/// Azimuth field size at the head of each block
const BLOCK_AZIMUTH_SIZE: usize = 2;

/// Bytes per range unit (2B range, 1B intensity, 1B confidence)
const UNIT_SIZE: usize = 4;

/// Reserved tail bytes, skipped
const RESERVED_SIZE: usize = 10;

/// Motor speed tail field, skipped
const ENGINE_VELOCITY_SIZE: usize = 2;

/// Microsecond-of-second counter size
const TIMESTAMP_SIZE: usize = 4;

/// Return mode flag size
const RETURN_MODE_SIZE: usize = 1;

/// Factory information size, skipped
const FACTORY_SIZE: usize = 1;

/// Total packet size including the trailing UDP sequence number
pub const PACKET_SIZE: usize = 1072;

/// Total packet size when the sensor omits the UDP sequence number
pub const PACKET_SIZE_WITHOUT_SEQ: usize = 1068;

/// Return mode flag value for first-return packets
pub const RETURN_FIRST: u8 = 0x33;

/// Return mode flag value for last-return packets
pub const RETURN_LAST: u8 = 0x38;

/// Return mode flag value for dual-return packets
pub const RETURN_DUAL: u8 = 0x39;

/// Parsed 12-byte packet header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Protocol major version
    pub protocol_major: u8,
    /// Protocol minor version
    pub protocol_minor: u8,
    /// Number of laser channels per block
    pub laser_count: u8,
    /// Number of azimuth blocks in this packet
    pub block_count: u8,
    /// Return mode code advertised in the header
    pub return_mode: u8,
    /// Distance unit in millimeters per range count
    pub dis_unit: u8,
}

/// One range sample from a single laser channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Unit {
    /// Measured distance in meters
    pub distance: f64,
    /// Calibrated reflectivity, 0-255
    pub intensity: u8,
    /// Return confidence, 0-255
    pub confidence: u8,
}

/// One azimuth-stamped group of per-channel samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    /// Horizontal angle in 0.01 degree units, 0-35999
    pub azimuth: u16,
    /// Range samples, one per laser channel
    pub units: Vec<Unit>,
}

/// Capture date-time from the packet tail, UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtcTime {
    pub year: i32,
    /// 1-based month
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl UtcTime {
    /// Seconds since the UNIX epoch for this capture time.
    ///
    /// A nonsensical date (e.g. month 0 from a zeroed packet) maps to 0
    /// rather than failing, matching the sensor's best-effort clock field.
    pub fn unix_seconds(&self) -> i64 {
        chrono::NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(self.hour, self.minute, self.second))
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0)
    }
}

/// Fully parsed sensor packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Packet {
    pub header: Header,
    /// Azimuth blocks, `header.block_count` entries
    pub blocks: Vec<Block>,
    /// Microsecond-of-second counter from the tail
    pub usec: u32,
    /// Return mode flag from the tail
    pub return_mode: u8,
    /// Capture date-time, UTC
    pub utc: UtcTime,
}

impl Packet {
    /// Parse a raw packet buffer.
    ///
    /// # Returns
    /// - `Err(Error::BadLength)` unless the buffer is exactly
    ///   [`PACKET_SIZE`] or [`PACKET_SIZE_WITHOUT_SEQ`] bytes
    /// - `Err(Error::BadMarker)` on a start-of-block mismatch
    /// - `Err(Error::BadLaserCount)` / `Err(Error::BadBlockCount)` when the
    ///   header counts exceed the fixed sensor capacities
    pub fn parse(data: &[u8]) -> Result<Packet> {
        if data.len() != PACKET_SIZE && data.len() != PACKET_SIZE_WITHOUT_SEQ {
            return Err(Error::BadLength(data.len()));
        }

        let sob = u16::from_be_bytes([data[0], data[1]]);
        if sob != START_OF_BLOCK {
            return Err(Error::BadMarker(sob));
        }

        let header = Header {
            protocol_major: data[2],
            protocol_minor: data[3],
            laser_count: data[6],
            block_count: data[7],
            return_mode: data[8],
            dis_unit: data[9],
        };

        if header.laser_count as usize > LASER_COUNT {
            return Err(Error::BadLaserCount(header.laser_count));
        }
        if header.block_count as usize > BLOCKS_PER_PACKET {
            return Err(Error::BadBlockCount(header.block_count));
        }

        let mut index = HEADER_SIZE;
        let mut blocks = Vec::with_capacity(header.block_count as usize);
        for _ in 0..header.block_count {
            let azimuth = u16::from_le_bytes([data[index], data[index + 1]]);
            index += BLOCK_AZIMUTH_SIZE;

            let mut units = Vec::with_capacity(header.laser_count as usize);
            for _ in 0..header.laser_count {
                let raw_range = u16::from_le_bytes([data[index], data[index + 1]]);
                units.push(Unit {
                    distance: raw_range as f64 * header.dis_unit as f64 / 1000.0,
                    intensity: data[index + 2],
                    confidence: data[index + 3],
                });
                index += UNIT_SIZE;
            }
            blocks.push(Block { azimuth, units });
        }

        index += RESERVED_SIZE;
        index += ENGINE_VELOCITY_SIZE;

        let usec = u32::from_le_bytes([
            data[index],
            data[index + 1],
            data[index + 2],
            data[index + 3],
        ]);
        index += TIMESTAMP_SIZE;

        let return_mode = data[index];
        index += RETURN_MODE_SIZE;
        index += FACTORY_SIZE;

        // The year field counts from 2000 but some firmware revisions ship
        // it already offset by a century; fold those back.
        let mut years_since_1900 = data[index] as i32 + 100;
        if years_since_1900 >= 200 {
            years_since_1900 -= 100;
        }
        let utc = UtcTime {
            year: 1900 + years_since_1900,
            month: data[index + 1] as u32,
            day: data[index + 2] as u32,
            hour: data[index + 3] as u32,
            minute: data[index + 4] as u32,
            second: data[index + 5] as u32,
        };

        Ok(Packet {
            header,
            blocks,
            usec,
            return_mode,
            utc,
        })
    }
}
