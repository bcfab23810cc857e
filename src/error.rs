// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common error type for decoder operations.
//!
//! Packet rejections are ordinary values, not panics: a malformed packet
//! yields an `Err` from [`crate::Packet::parse`] and leaves all decoder
//! state untouched, so the caller can drop the packet and continue.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for decoder operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error from a background map codec
    Io(std::io::Error),
    /// Packet length is neither of the two accepted sizes
    BadLength(usize),
    /// Header start-of-block marker mismatch
    BadMarker(u16),
    /// Header laser count exceeds the sensor's channel capacity
    BadLaserCount(u8),
    /// Header block count exceeds the per-packet block capacity
    BadBlockCount(u8),
    /// Invalid construction-time configuration
    Config(String),
    /// Shape error from ndarray operations
    Shape(ndarray::ShapeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::BadLength(len) => write!(f, "unexpected packet length: {} bytes", len),
            Error::BadMarker(sob) => write!(f, "bad start-of-block marker: 0x{:04X}", sob),
            Error::BadLaserCount(n) => write!(f, "laser count {} exceeds capacity", n),
            Error::BadBlockCount(n) => write!(f, "block count {} exceeds capacity", n),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::Shape(err) => write!(f, "shape error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err)
    }
}
