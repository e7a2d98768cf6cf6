/*
    fluxsector
    Flux-level sector recovery for floppy disk captures

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    tests/amiga.rs

    Tests for Amiga trackdisk decoding

*/

mod common;

use fluxsector::prelude::*;

use crate::common::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const HEADER_RAW_BYTES: usize = 48;

fn sectors(cylinder: u8, head: u8) -> Vec<TestSector> {
    (0..11).map(|s| TestSector::new(cylinder, head, s, 2)).collect()
}

fn decode_amiga(store: &mut SectorStore, intervals: &[u8], track: u8, head: u8) -> DecodeSummary {
    FluxDecoder::new(DecoderConfig::default())
        .decode(
            store,
            intervals,
            &TrackContext::new(track, head, SAMPLE_RATE),
            Some(Modulation::AmigaMfm),
            true,
        )
        .unwrap()
}

#[test]
fn test_amiga_track() {
    init();
    let source = sectors(5, 1);
    for jitter in [0.0, 0.1] {
        let intervals = cells_to_intervals(&amiga_track(&source), MFM_CELL, jitter, 1.0);
        let mut store = SectorStore::new();
        let summary = decode_amiga(&mut store, &intervals, 5, 1);

        assert_eq!(summary.total_inserted(), 11, "jitter {}", jitter);
        assert_eq!(store.presence_map(5, 1), (0..11).collect::<Vec<u8>>());
        for s in &source {
            let record = store.find_by_logical(5, 1, s.sector).unwrap();
            assert_eq!(record.data, s.data);
            assert_eq!(record.logical_size_code, 2);
            assert_eq!(record.data_type, 0xFF);
            assert_eq!(record.modulation, Modulation::AmigaMfm);
            assert!(!record.is_deleted());
            assert!(record.positions_ordered());
            // The data checksum follows the 48 raw byte header.
            let header_ticks = (HEADER_RAW_BYTES * 8) as f64 * MFM_CELL;
            let gap = (record.data_position - record.id_position) as f64;
            assert!(
                (gap - header_ticks).abs() < MFM_CELL * 8.0,
                "sector {}: header spans {} ticks",
                s.sector,
                gap
            );
            assert!(record.data_end_position > record.data_position);
        }
    }
}

#[test]
fn test_amiga_rejects_bad_checksums() {
    init();
    let mut source = sectors(0, 0);
    source[4] = source[4].clone().with_corrupt_id();
    source[7] = source[7].clone().with_corrupt_data();
    let intervals = cells_to_intervals(&amiga_track(&source), MFM_CELL, 0.1, 1.0);
    let mut store = SectorStore::new();
    let summary = decode_amiga(&mut store, &intervals, 0, 0);
    let stats = &summary.passes[0].stats;

    assert_eq!(store.presence_map(0, 0), vec![0, 1, 2, 3, 5, 6, 8, 9, 10]);
    assert_eq!(stats.address_bad, 1);
    assert_eq!(stats.data_bad, 1);
    assert_eq!(stats.data_ok, 9);
}

#[test]
fn test_amiga_rejects_single_bit_data_errors() {
    init();
    // The data block is 512 odd bytes then 512 even bytes. Only the 0x55 positions of each
    // byte hold data.
    for bit in [1, 7, 256 * 8 + 3, 512 * 8 - 1, 512 * 8 + 1, 1024 * 8 - 1] {
        let mut source = sectors(0, 0);
        source[7] = source[7].clone().with_corrupt_data_bit(bit);
        let intervals = cells_to_intervals(&amiga_track(&source), MFM_CELL, 0.1, 1.0);
        let mut store = SectorStore::new();
        let summary = decode_amiga(&mut store, &intervals, 0, 0);
        let stats = &summary.passes[0].stats;

        let expected: Vec<u8> = (0..11).filter(|s| *s != 7).collect();
        assert_eq!(store.presence_map(0, 0), expected, "bit {}", bit);
        assert_eq!(stats.data_bad, 1, "bit {}", bit);
        assert_eq!(stats.data_ok, 10, "bit {}", bit);
    }
}

#[test]
fn test_amiga_track_is_not_ibm_mfm() {
    init();
    let intervals = cells_to_intervals(&amiga_track(&sectors(0, 0)), MFM_CELL, 0.0, 1.0);
    let mut store = SectorStore::new();
    let summary = FluxDecoder::new(DecoderConfig::default())
        .decode(
            &mut store,
            &intervals,
            &TrackContext::new(0, 0, SAMPLE_RATE),
            Some(Modulation::Mfm),
            true,
        )
        .unwrap();

    assert_eq!(summary.total_inserted(), 0);
    assert!(store.is_empty());
}
