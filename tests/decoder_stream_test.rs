// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Integration tests driving the decoder with synthetic packet streams.
//!
//! The streams model a sensor spinning at a fixed azimuth step so every
//! rotation crosses the configured scan phase exactly once.

use ndarray::Array2;
use pandarqt::{
    packet::{BLOCKS_PER_PACKET, LASER_COUNT, PACKET_SIZE_WITHOUT_SEQ, RETURN_FIRST},
    packet_source::{PacketSource, TestSource},
    BackgroundCodec, Calibration, Decoder, DecoderConfig, Result, RunMode,
};
use std::cell::RefCell;
use std::rc::Rc;

/// 2500 raw counts at the 4mm distance unit = 10.0m
const RAW_10M: u16 = 2500;

/// Azimuth step between blocks, 0.01 degree units. One rotation is
/// exactly 72 blocks, 18 packets.
const AZIMUTH_STEP: u16 = 500;

/// Blocks per synthetic rotation
const BLOCKS_PER_TURN: usize = 36000 / AZIMUTH_STEP as usize;

/// Build a full-size single-return packet with one azimuth and raw range
/// per block.
fn packet_bytes(azimuths: [u16; BLOCKS_PER_PACKET], ranges: [u16; BLOCKS_PER_PACKET]) -> Vec<u8> {
    let mut data = vec![0u8; PACKET_SIZE_WITHOUT_SEQ];
    data[0] = 0xEE;
    data[1] = 0xFF;
    data[2] = 2;
    data[3] = 1;
    data[6] = LASER_COUNT as u8;
    data[7] = BLOCKS_PER_PACKET as u8;
    data[8] = RETURN_FIRST;
    data[9] = 4;

    let mut index = 12;
    for block in 0..BLOCKS_PER_PACKET {
        data[index..index + 2].copy_from_slice(&azimuths[block].to_le_bytes());
        index += 2;
        for _ in 0..LASER_COUNT {
            data[index..index + 2].copy_from_slice(&ranges[block].to_le_bytes());
            data[index + 2] = 50;
            data[index + 3] = 255;
            index += 4;
        }
    }

    index += 12; // reserved + motor speed
    data[index..index + 4].copy_from_slice(&500_000u32.to_le_bytes());
    index += 4;
    data[index] = RETURN_FIRST;
    index += 2;
    data[index..index + 6].copy_from_slice(&[24, 1, 2, 3, 4, 5]);

    data
}

/// One full rotation as 18 packets of four blocks each, starting just
/// past the zero scan phase.
fn rotation_packets(range: u16) -> Vec<Vec<u8>> {
    let azimuths: Vec<u16> = (0..BLOCKS_PER_TURN)
        .map(|i| (i as u16) * AZIMUTH_STEP + 1)
        .collect();
    azimuths
        .chunks(BLOCKS_PER_PACKET)
        .map(|chunk| {
            packet_bytes(
                [chunk[0], chunk[1], chunk[2], chunk[3]],
                [range; BLOCKS_PER_PACKET],
            )
        })
        .collect()
}

fn flat_calibration() -> Calibration {
    Calibration::new(vec![0.0; LASER_COUNT], vec![0.0; LASER_COUNT]).unwrap()
}

/// Codec over an in-memory map, recording every save.
struct MemoryCodec {
    map: Array2<f32>,
    saved: Rc<RefCell<Vec<Array2<f32>>>>,
}

impl BackgroundCodec for MemoryCodec {
    fn load(&self, _path: &str) -> Result<Array2<f32>> {
        Ok(self.map.clone())
    }

    fn save(&self, _path: &str, map: &Array2<f32>) -> Result<()> {
        self.saved.borrow_mut().push(map.clone());
        Ok(())
    }
}

#[test]
fn test_continuous_stream_splits_into_scans() {
    let mut packets = Vec::new();
    for _ in 0..3 {
        packets.extend(rotation_packets(RAW_10M));
    }
    let mut source = TestSource::new(packets);

    let mut decoder = Decoder::new(DecoderConfig::default(), flat_calibration(), None).unwrap();
    let mut buf = [0u8; 2048];
    let mut scans = Vec::new();

    while source.has_more() {
        let len = source.recv(&mut buf).unwrap();
        decoder.unpack(&buf[..len]).unwrap();
        if decoder.has_scanned() {
            scans.push(decoder.take_scan());
        }
    }

    // Three rotations produce two completed scans; the third is still
    // accumulating when the stream ends.
    assert_eq!(scans.len(), 2);
    for scan in &scans {
        // Each scan covers exactly one rotation's worth of blocks: the
        // wrapped blocks of the boundary packet rotate in at the front
        // and the next boundary closes it.
        assert_eq!(scan.len(), BLOCKS_PER_TURN * LASER_COUNT);
        assert!(scan.distance().iter().all(|&d| (d - 10.0).abs() < 1e-6));
        assert!(scan.intensity().iter().all(|&i| i == 50));
    }
}

#[test]
fn test_map_then_subtract_round_trip() {
    let saved = Rc::new(RefCell::new(Vec::new()));

    // Build: feed constant 10m rotations until the map is persisted.
    {
        let codec = MemoryCodec {
            map: Array2::zeros((LASER_COUNT, 600)),
            saved: saved.clone(),
        };
        let config = DecoderConfig {
            run_mode: RunMode::Map,
            background_map_path: "memory".into(),
            ..Default::default()
        };
        let mut decoder =
            Decoder::new(config, flat_calibration(), Some(Box::new(codec))).unwrap();

        let mut packets = Vec::new();
        for _ in 0..20 {
            packets.extend(rotation_packets(RAW_10M));
        }
        let mut source = TestSource::new(packets);
        let mut buf = [0u8; 2048];
        while source.has_more() {
            let len = source.recv(&mut buf).unwrap();
            decoder.unpack(&buf[..len]).unwrap();
            if decoder.has_scanned() {
                decoder.take_scan();
            }
        }
    }

    let map = {
        let maps = saved.borrow();
        assert_eq!(maps.len(), 1, "map must be persisted exactly once");
        maps[0].clone()
    };

    // Every visited bucket converged to 10m.
    let visited = map.iter().filter(|&&m| m != 0.0).count();
    assert_eq!(visited, BLOCKS_PER_TURN * LASER_COUNT);
    assert!(map
        .iter()
        .filter(|&&m| m != 0.0)
        .all(|&m| (m - 10.0).abs() < 1e-4));

    // Subtract: returns at the stored distance are background, nearer
    // returns are objects. The azimuths revisit buckets the build phase
    // populated; 1250 raw counts = 5m, well clear of the 10m background.
    let codec = MemoryCodec {
        map,
        saved: Rc::new(RefCell::new(Vec::new())),
    };
    let config = DecoderConfig {
        run_mode: RunMode::Subtract,
        background_map_path: "memory".into(),
        ..Default::default()
    };
    let mut decoder = Decoder::new(config, flat_calibration(), Some(Box::new(codec))).unwrap();

    let mut source = TestSource::new(vec![
        packet_bytes([1, 501, 1001, 1501], [RAW_10M; 4]),
        packet_bytes([2001, 2501, 3001, 3501], [1250; 4]),
    ]);
    let mut buf = [0u8; 2048];
    while source.has_more() {
        let len = source.recv(&mut buf).unwrap();
        decoder.unpack(&buf[..len]).unwrap();
    }

    assert_eq!(decoder.take_scan().len(), 8 * LASER_COUNT);
    assert_eq!(decoder.take_background().len(), 4 * LASER_COUNT);
    assert_eq!(decoder.take_objects().len(), 4 * LASER_COUNT);
}

#[test]
fn test_malformed_packets_are_skipped() {
    let mut packets = Vec::new();
    for _ in 0..2 {
        packets.extend(rotation_packets(RAW_10M));
    }
    // Interleave garbage: wrong length and wrong marker.
    packets.insert(3, vec![0u8; 1000]);
    let mut bad_marker = packet_bytes([9000, 9100, 9200, 9300], [RAW_10M; 4]);
    bad_marker[0] = 0x12;
    packets.insert(7, bad_marker);

    let mut source = TestSource::new(packets);
    let mut decoder = Decoder::new(DecoderConfig::default(), flat_calibration(), None).unwrap();
    let mut buf = [0u8; 2048];
    let mut errors = 0;

    while source.has_more() {
        let len = source.recv(&mut buf).unwrap();
        if decoder.unpack(&buf[..len]).is_err() {
            errors += 1;
        }
    }

    assert_eq!(errors, 2);
    // The rotation boundary between the two turns was still detected:
    // its packet contributed four boundary blocks.
    assert_eq!(decoder.scan_count(), 4);
}
