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

    tests/mfm.rs

    Tests for IBM MFM track decoding

*/

mod common;

use fluxsector::prelude::*;

use crate::common::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sectors(track: u8, head: u8) -> Vec<TestSector> {
    (1..=9).map(|s| TestSector::new(track, head, s, 2)).collect()
}

fn decode_mfm(store: &mut SectorStore, intervals: &[u8], track: u8, head: u8, config: DecoderConfig) -> DecodeSummary {
    FluxDecoder::new(config)
        .decode(
            store,
            intervals,
            &TrackContext::new(track, head, SAMPLE_RATE),
            Some(Modulation::Mfm),
            true,
        )
        .unwrap()
}

#[test]
fn test_mfm_clean_track() {
    init();
    let source = sectors(0, 0);
    let intervals = cells_to_intervals(&ibm_mfm_track(&source), MFM_CELL, 0.0, 1.0);
    let mut store = SectorStore::new();
    let summary = decode_mfm(&mut store, &intervals, 0, 0, DecoderConfig::default());

    assert_eq!(summary.total_inserted(), 9);
    assert_eq!(store.len(), 9);
    assert_eq!(store.presence_map(0, 0), (1..=9).collect::<Vec<u8>>());

    for s in &source {
        let record = store.find_by_logical(0, 0, s.sector).unwrap();
        assert_eq!(record.data, s.data);
        assert_eq!(record.logical_size_code, 2);
        assert_eq!(record.data_type, 0xFB);
        assert_eq!(record.modulation, Modulation::Mfm);
        assert!(!record.is_deleted());
        assert!(record.positions_ordered());
    }
}

#[test]
fn test_mfm_jitter_and_speed_variation() {
    init();
    let source = sectors(3, 1);
    let bits = ibm_mfm_track(&source);

    for (jitter, speed) in [(0.1, 1.0), (0.15, 1.03), (0.1, 0.97)] {
        let intervals = cells_to_intervals(&bits, MFM_CELL, jitter, speed);
        let mut store = SectorStore::new();
        let summary = decode_mfm(&mut store, &intervals, 3, 1, DecoderConfig::default());
        assert_eq!(
            summary.total_inserted(),
            9,
            "jitter {} speed {}: {}",
            jitter,
            speed,
            summary.passes[0]
        );
        for s in &source {
            assert_eq!(store.find_by_logical(3, 1, s.sector).unwrap().data, s.data);
        }
    }
}

#[test]
fn test_mfm_decode_is_idempotent() {
    init();
    let intervals = cells_to_intervals(&ibm_mfm_track(&sectors(0, 0)), MFM_CELL, 0.1, 1.0);
    let mut store = SectorStore::new();

    let first = decode_mfm(&mut store, &intervals, 0, 0, DecoderConfig::default());
    let second = decode_mfm(&mut store, &intervals, 0, 0, DecoderConfig::default());

    assert_eq!(first.total_inserted(), 9);
    assert_eq!(second.total_inserted(), 0);
    assert_eq!(second.total_decoded(), 9);
    assert_eq!(second.passes[0].stats.duplicates, 9);
    assert_eq!(store.len(), 9);
}

#[test]
fn test_mfm_rejects_corrupt_fields() {
    init();
    let mut source = sectors(0, 0);
    source[2] = source[2].clone().with_corrupt_id();
    source[4] = source[4].clone().with_corrupt_data();

    let intervals = cells_to_intervals(&ibm_mfm_track(&source), MFM_CELL, 0.1, 1.0);
    let mut store = SectorStore::new();
    let summary = decode_mfm(&mut store, &intervals, 0, 0, DecoderConfig::default());
    let stats = &summary.passes[0].stats;

    assert_eq!(store.presence_map(0, 0), vec![1, 2, 4, 6, 7, 8, 9]);
    assert_eq!(stats.address_bad, 1);
    assert_eq!(stats.orphan_data_marks, 1);
    assert_eq!(stats.data_bad, 1);
    assert_eq!(stats.data_ok, 7);
}

#[test]
fn test_mfm_rejects_single_bit_data_errors() {
    init();
    let last = sectors(0, 0)[4].last_payload_bit();
    // Mark byte, first and middle payload bytes, last payload byte and the CRC.
    for bit in [0, 5, 7, 8, 15, 256 * 8 + 3, last - 7, last, last + 1, last + 16] {
        let mut source = sectors(0, 0);
        source[4] = source[4].clone().with_corrupt_data_bit(bit);
        let intervals = cells_to_intervals(&ibm_mfm_track(&source), MFM_CELL, 0.1, 1.0);
        let mut store = SectorStore::new();
        let summary = decode_mfm(&mut store, &intervals, 0, 0, DecoderConfig::default());
        let stats = &summary.passes[0].stats;

        assert_eq!(store.presence_map(0, 0), vec![1, 2, 3, 4, 6, 7, 8, 9], "bit {}", bit);
        assert_eq!(stats.data_ok, 8, "bit {}", bit);
        if bit >= 8 {
            assert_eq!(stats.data_bad, 1, "bit {}", bit);
        }
    }
}

#[test]
fn test_mfm_enforced_clock_accepts_clean_track() {
    init();
    let intervals = cells_to_intervals(&ibm_mfm_track(&sectors(0, 0)), MFM_CELL, 0.0, 1.0);
    let mut store = SectorStore::new();
    let config = DecoderConfig::default().with_flags(DecodeFlags::ENFORCE_MFM_CLOCK);
    let summary = decode_mfm(&mut store, &intervals, 0, 0, config);

    assert_eq!(summary.total_inserted(), 9);
    assert_eq!(summary.passes[0].stats.aborted_fields, 0);
}

#[test]
fn test_mfm_bucket_slicer() {
    init();
    let intervals = cells_to_intervals(&ibm_mfm_track(&sectors(0, 0)), MFM_CELL, 0.0, 1.0);
    let mut store = SectorStore::new();
    let summary = FluxDecoder::new(DecoderConfig::default())
        .decode(
            &mut store,
            &intervals,
            &TrackContext::new(0, 0, SAMPLE_RATE),
            Some(Modulation::Mfm),
            false,
        )
        .unwrap();

    assert_eq!(summary.total_inserted(), 9);
}

#[test]
fn test_mfm_detected_bitcell() {
    init();
    // An 8% slow drive; the data rate alone would put the PLL at the edge of its range.
    let intervals = cells_to_intervals(&ibm_mfm_track(&sectors(0, 0)), MFM_CELL, 0.0, 1.08);
    let mut store = SectorStore::new();
    let config = DecoderConfig::default().with_flags(DecodeFlags::DETECT_BITCELL);
    let summary = decode_mfm(&mut store, &intervals, 0, 0, config);

    let pass = summary.pass(Modulation::Mfm).unwrap();
    assert!(
        (pass.bitcell - MFM_CELL * 1.08).abs() < 0.5,
        "detected bitcell {}",
        pass.bitcell
    );
    assert_eq!(summary.total_inserted(), 9);
}

#[test]
fn test_mfm_bitcell_override() {
    init();
    let intervals = cells_to_intervals(&ibm_mfm_track(&sectors(0, 0)), MFM_CELL, 0.0, 1.0);
    let mut store = SectorStore::new();
    // A 6MHz sample rate would imply a 12 tick bitcell; the override wins.
    let summary = FluxDecoder::new(DecoderConfig::default().with_bitcell_override(MFM_CELL))
        .decode(
            &mut store,
            &intervals,
            &TrackContext::new(0, 0, SAMPLE_RATE / 2),
            Some(Modulation::Mfm),
            true,
        )
        .unwrap();

    assert_eq!(summary.passes[0].bitcell, MFM_CELL);
    assert_eq!(summary.total_inserted(), 9);
}

#[test]
fn test_mfm_decodes_without_hint() {
    init();
    let intervals = cells_to_intervals(&ibm_mfm_track(&sectors(0, 0)), MFM_CELL, 0.1, 1.0);
    let mut store = SectorStore::new();
    let summary = FluxDecoder::new(DecoderConfig::default())
        .decode(&mut store, &intervals, &TrackContext::new(0, 0, SAMPLE_RATE), None, true)
        .unwrap();

    // FM, MFM and Amiga at double and high density, then both GCR formats.
    assert_eq!(summary.passes.len(), 8);
    assert_eq!(summary.best_modulation(), Some(Modulation::Mfm));
    let pass = summary.pass(Modulation::Mfm).unwrap();
    assert_eq!(pass.stats.data_ok, 9);
    assert_eq!(pass.density, Some(TrackDensity::Double));
    assert_eq!(store.iter().filter(|r| r.modulation == Modulation::Mfm).count(), 9);
}

#[test]
fn test_mfm_high_density_track() {
    init();
    let source: Vec<TestSector> = (1..=18).map(|s| TestSector::new(0, 0, s, 2)).collect();
    let intervals = cells_to_intervals(&ibm_mfm_track(&source), MFM_HD_CELL, 0.1, 1.0);

    for hint in [Some(Modulation::Mfm), None] {
        let mut store = SectorStore::new();
        let summary = FluxDecoder::new(DecoderConfig::default())
            .decode(&mut store, &intervals, &TrackContext::new(0, 0, SAMPLE_RATE), hint, true)
            .unwrap();

        let pass = summary.pass(Modulation::Mfm).unwrap();
        assert_eq!(pass.density, Some(TrackDensity::High), "hint {:?}", hint);
        assert_eq!(pass.bitcell, MFM_HD_CELL);
        assert_eq!(pass.stats.inserted, 18, "hint {:?}: {}", hint, pass);
        assert_eq!(summary.best_modulation(), Some(Modulation::Mfm));
        for s in &source {
            assert_eq!(store.find_by_logical(0, 0, s.sector).unwrap().data, s.data);
        }
    }
}

#[test]
fn test_mfm_quarter_cell_jitter_at_every_bitcell() {
    init();
    let source = sectors(0, 0);
    let bits = ibm_mfm_track(&source);

    for cell in [12.0, 16.0, 20.0, 24.0, 32.0, 40.0, 48.0] {
        let intervals = cells_to_intervals(&bits, cell, 0.24, 1.0);
        let mut store = SectorStore::new();
        let summary = decode_mfm(
            &mut store,
            &intervals,
            0,
            0,
            DecoderConfig::default().with_bitcell_override(cell),
        );
        assert_eq!(summary.total_inserted(), 9, "bitcell {}: {}", cell, summary.passes[0]);
        for s in &source {
            assert_eq!(store.find_by_logical(0, 0, s.sector).unwrap().data, s.data);
        }
    }
}

#[test]
fn test_mfm_zero_sample_rate_is_error() {
    init();
    let mut store = SectorStore::new();
    let result = FluxDecoder::new(DecoderConfig::default()).decode(
        &mut store,
        &[48, 48, 48],
        &TrackContext::new(0, 0, 0),
        Some(Modulation::Mfm),
        true,
    );
    assert!(matches!(result, Err(FluxSectorError::ParameterError(_))));
}
