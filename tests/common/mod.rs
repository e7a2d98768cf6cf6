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

    tests/common/mod.rs

    Common support routines for tests

*/
#![allow(dead_code)]

use bit_vec::BitVec;
use fluxsector::{
    bitstream_codec::{
        fm::{self, FM_DATA_CLOCK, FM_MARK_CLOCK},
        gcr,
        mfm,
        nibble::{encode_44, push_nibbles, push_sync, NibbleScheme, SECTOR_LEN},
        push_bits,
        EncodingVariant,
    },
    track_schema::meta_encoding::odd_even::{odd_even_split_block, odd_even_split_u32, push_clocked_bytes},
    util::{crc_ibm_3740, xor_bytes},
};

/// Sample rate used by the test captures. At 12MHz an MFM bitcell is 24 ticks.
pub const SAMPLE_RATE: u32 = 12_000_000;
pub const MFM_CELL: f64 = 24.0;
/// High density MFM at one million cells per second.
pub const MFM_HD_CELL: f64 = 12.0;
pub const FM_CELL: f64 = 48.0;
pub const FM_HD_CELL: f64 = 24.0;
pub const APPLE_CELL: f64 = 48.0;
/// Commodore speed zone 1 (tracks 0-16) at 307692 cells per second.
pub const COMMODORE_ZONE1_CELL: f64 = 39.0;

/// A sector to lay down on a synthetic track.
#[derive(Clone, Debug)]
pub struct TestSector {
    pub track: u8,
    pub head: u8,
    pub sector: u8,
    pub size_code: u8,
    pub data: Vec<u8>,
    /// Flip one bit of the address field after its checksum is calculated.
    pub corrupt_id: bool,
    /// Flip this bit of the data field after its checksum is calculated. Bits are counted from
    /// the most significant bit of the field's mark byte, or of the first payload byte for
    /// formats whose data field has no mark. Apple tracks replace the nibble at `bit / 8`.
    pub corrupt_data: Option<usize>,
}

impl TestSector {
    pub fn new(track: u8, head: u8, sector: u8, size_code: u8) -> Self {
        let len = 128usize << size_code;
        TestSector {
            track,
            head,
            sector,
            size_code,
            data: pattern(len, sector),
            corrupt_id: false,
            corrupt_data: None,
        }
    }

    pub fn with_corrupt_id(mut self) -> Self {
        self.corrupt_id = true;
        self
    }

    /// Corrupt a bit in the middle of the payload.
    pub fn with_corrupt_data(self) -> Self {
        let bit = (self.data.len() / 2) * 8 + 3;
        self.with_corrupt_data_bit(bit)
    }

    pub fn with_corrupt_data_bit(mut self, bit: usize) -> Self {
        self.corrupt_data = Some(bit);
        self
    }

    /// The bit index of the last payload bit, for formats with a one byte data mark.
    pub fn last_payload_bit(&self) -> usize {
        self.data.len() * 8 + 7
    }
}

/// A deterministic, sector-dependent fill pattern.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed.wrapping_mul(17)) ^ (i >> 8) as u8)
        .collect()
}

fn flip_bit(bytes: &mut [u8], bit: usize) {
    bytes[bit / 8] ^= 0x80 >> (bit % 8);
}

/// A small xorshift generator producing deterministic jitter.
pub struct Jitter(u64);

impl Jitter {
    pub fn new(seed: u64) -> Self {
        Jitter(seed.max(1))
    }

    /// Return a value in [-1.0, 1.0).
    pub fn next(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 52) as f64 - 1.0
    }
}

/// Convert a cell bitstream into byte flux intervals. Each one bit is a transition at the center
/// of its cell. `jitter` is the maximum displacement of a transition as a fraction of a cell and
/// `speed` scales the cell width (1.02 is a drive running 2% slow).
pub fn cells_to_intervals(bits: &BitVec, cell_ticks: f64, jitter: f64, speed: f64) -> Vec<u8> {
    let mut rng = Jitter::new(0x5EED_F1u64);
    let mut last = 0.0;
    let mut intervals = Vec::new();
    for (i, bit) in bits.iter().enumerate() {
        if !bit {
            continue;
        }
        let t = ((i as f64 + 0.5) * cell_ticks * speed + rng.next() * jitter * cell_ticks).round();
        let interval = t - last;
        assert!(interval > 0.0 && interval <= 255.0, "interval {} out of range at cell {}", interval, i);
        intervals.push(interval as u8);
        last = t;
    }
    intervals
}

/// Build an IBM System 34 MFM track.
pub fn ibm_mfm_track(sectors: &[TestSector]) -> BitVec {
    let mut bits = BitVec::new();
    let mut prev = mfm::encode(&[0x4E; 32], false, EncodingVariant::Data, &mut bits);

    for s in sectors {
        prev = mfm::encode(&[0x00; 12], prev, EncodingVariant::Data, &mut bits);
        prev = mfm::encode(&[0xA1; 3], prev, EncodingVariant::AddressMark, &mut bits);
        let mut id = vec![0xA1, 0xA1, 0xA1, 0xFE, s.track, s.head, s.sector, s.size_code];
        let crc = crc_ibm_3740(&id, None);
        id.extend_from_slice(&crc.to_be_bytes());
        if s.corrupt_id {
            id[6] ^= 0x01;
        }
        prev = mfm::encode(&id[3..], prev, EncodingVariant::Data, &mut bits);
        prev = mfm::encode(&[0x4E; 22], prev, EncodingVariant::Data, &mut bits);

        prev = mfm::encode(&[0x00; 12], prev, EncodingVariant::Data, &mut bits);
        prev = mfm::encode(&[0xA1; 3], prev, EncodingVariant::AddressMark, &mut bits);
        let mut field = vec![0xA1, 0xA1, 0xA1, 0xFB];
        field.extend_from_slice(&s.data);
        let crc = crc_ibm_3740(&field, None);
        field.extend_from_slice(&crc.to_be_bytes());
        if let Some(bit) = s.corrupt_data {
            flip_bit(&mut field[3..], bit);
        }
        prev = mfm::encode(&field[3..], prev, EncodingVariant::Data, &mut bits);
        prev = mfm::encode(&[0x4E; 24], prev, EncodingVariant::Data, &mut bits);
    }
    mfm::encode(&[0x4E; 16], prev, EncodingVariant::Data, &mut bits);
    bits
}

/// Build an IBM System 34 FM track. `data_mark` is written as the data address mark of every
/// sector.
pub fn ibm_fm_track(sectors: &[TestSector], data_mark: u8) -> BitVec {
    let mut bits = BitVec::new();
    fm::encode(&[0xFF; 16], FM_DATA_CLOCK, &mut bits);

    for s in sectors {
        fm::encode(&[0x00; 6], FM_DATA_CLOCK, &mut bits);
        fm::encode(&[0xFE], FM_MARK_CLOCK, &mut bits);
        let mut id = vec![0xFE, s.track, s.head, s.sector, s.size_code];
        let crc = crc_ibm_3740(&id, None);
        id.extend_from_slice(&crc.to_be_bytes());
        if s.corrupt_id {
            id[3] ^= 0x01;
        }
        fm::encode(&id[1..], FM_DATA_CLOCK, &mut bits);
        fm::encode(&[0xFF; 11], FM_DATA_CLOCK, &mut bits);

        fm::encode(&[0x00; 6], FM_DATA_CLOCK, &mut bits);
        let mut field = vec![data_mark];
        field.extend_from_slice(&s.data);
        let crc = crc_ibm_3740(&field, None);
        field.extend_from_slice(&crc.to_be_bytes());
        if let Some(bit) = s.corrupt_data {
            flip_bit(&mut field, bit);
        }
        fm::encode(&field[..1], FM_MARK_CLOCK, &mut bits);
        fm::encode(&field[1..], FM_DATA_CLOCK, &mut bits);
        fm::encode(&[0xFF; 27], FM_DATA_CLOCK, &mut bits);
    }
    bits
}

/// Build an FM track whose data fields carry a CRC calculated with a non-standard polynomial,
/// as written by some disk duplicators.
pub fn fm_duplicator_track(sectors: &[TestSector], polynomial: u16) -> BitVec {
    let mut bits = BitVec::new();
    fm::encode(&[0xFF; 16], FM_DATA_CLOCK, &mut bits);

    for s in sectors {
        fm::encode(&[0x00; 6], FM_DATA_CLOCK, &mut bits);
        fm::encode(&[0xFE], FM_MARK_CLOCK, &mut bits);
        let mut id = vec![0xFE, s.track, s.head, s.sector, s.size_code];
        let crc = crc_ibm_3740(&id, None);
        id.extend_from_slice(&crc.to_be_bytes());
        fm::encode(&id[1..], FM_DATA_CLOCK, &mut bits);
        fm::encode(&[0xFF; 11], FM_DATA_CLOCK, &mut bits);

        fm::encode(&[0x00; 6], FM_DATA_CLOCK, &mut bits);
        fm::encode(&[0xFB], FM_MARK_CLOCK, &mut bits);
        let mut field = vec![0xFB];
        field.extend_from_slice(&s.data);
        let crc = fluxsector::util::crc16_with_polynomial(&field, polynomial, 0xFFFF);
        field.extend_from_slice(&crc.to_be_bytes());
        fm::encode(&field[1..], FM_DATA_CLOCK, &mut bits);
        fm::encode(&[0xFF; 27], FM_DATA_CLOCK, &mut bits);
    }
    bits
}

fn push_odd_even_long(value: u32, prev: bool, bits: &mut BitVec) -> bool {
    let (odd, even) = odd_even_split_u32(value);
    let prev = push_clocked_bytes(&odd.to_be_bytes(), prev, bits);
    push_clocked_bytes(&even.to_be_bytes(), prev, bits)
}

fn data_bit_xor(blocks: &[&[u8]]) -> u32 {
    blocks
        .iter()
        .flat_map(|b| b.chunks_exact(4))
        .fold(0, |acc, c| acc ^ u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        & 0x5555_5555
}

/// Build an Amiga trackdisk track. Sector `track` fields hold the cylinder and `head` the head.
pub fn amiga_track(sectors: &[TestSector]) -> BitVec {
    let mut bits = BitVec::new();
    let mut prev = mfm::encode(&[0x00; 16], false, EncodingVariant::Data, &mut bits);
    let count = sectors.len() as u8;

    for (i, s) in sectors.iter().enumerate() {
        prev = mfm::encode(&[0x00; 2], prev, EncodingVariant::Data, &mut bits);
        push_bits(&mut bits, 0x4489_4489, 32);
        prev = true;

        let info = u32::from_be_bytes([0xFF, s.track * 2 + s.head, s.sector, count - i as u8]);
        let (info_odd, info_even) = odd_even_split_u32(info);
        let label = [0u8; 16];
        let (label_odd, label_even) = odd_even_split_block(&label);
        let mut header_sum = data_bit_xor(&[
            &info_odd.to_be_bytes()[..],
            &info_even.to_be_bytes()[..],
            &label_odd[..],
            &label_even[..],
        ]);

        let (data_odd, data_even) = odd_even_split_block(&s.data);
        let data_sum = data_bit_xor(&[&data_odd[..], &data_even[..]]);
        if s.corrupt_id {
            header_sum ^= 0x0000_0001;
        }

        prev = push_odd_even_long(info, prev, &mut bits);
        prev = push_clocked_bytes(&label_odd, prev, &mut bits);
        prev = push_clocked_bytes(&label_even, prev, &mut bits);
        prev = push_odd_even_long(header_sum, prev, &mut bits);
        prev = push_odd_even_long(data_sum, prev, &mut bits);

        let mut data_odd = data_odd;
        let mut data_even = data_even;
        if let Some(bit) = s.corrupt_data {
            let half = data_odd.len() * 8;
            if bit < half {
                flip_bit(&mut data_odd, bit);
            }
            else {
                flip_bit(&mut data_even, bit - half);
            }
        }
        prev = push_clocked_bytes(&data_odd, prev, &mut bits);
        prev = push_clocked_bytes(&data_even, prev, &mut bits);
    }
    mfm::encode(&[0x00; 16], prev, EncodingVariant::Data, &mut bits);
    bits
}

fn push_ones(count: usize, bits: &mut BitVec) {
    for _ in 0..count {
        bits.push(true);
    }
}

/// Build a Commodore 1541 GCR track with the given disk id.
pub fn commodore_track(sectors: &[TestSector], disk_id: [u8; 2]) -> BitVec {
    let mut bits = BitVec::new();
    gcr::encode(&[0x55; 8], &mut bits);

    for s in sectors {
        push_ones(40, &mut bits);
        let mut checksum = s.sector ^ s.track ^ disk_id[1] ^ disk_id[0];
        if s.corrupt_id {
            checksum ^= 0x01;
        }
        gcr::encode(
            &[0x08, checksum, s.sector, s.track, disk_id[1], disk_id[0], 0x0F, 0x0F],
            &mut bits,
        );
        gcr::encode(&[0x55; 9], &mut bits);

        push_ones(40, &mut bits);
        let mut block = vec![0x07];
        block.extend_from_slice(&s.data);
        block.push(xor_bytes(&s.data));
        block.extend_from_slice(&[0x00, 0x00]);
        if let Some(bit) = s.corrupt_data {
            flip_bit(&mut block, bit);
        }
        gcr::encode(&block, &mut bits);
        gcr::encode(&[0x55; 8], &mut bits);
    }
    bits
}

/// Build an Apple II GCR track in the given scheme.
pub fn apple_track(sectors: &[TestSector], volume: u8, scheme: NibbleScheme) -> BitVec {
    let address_prologue = match scheme {
        NibbleScheme::SixAndTwo => [0xD5, 0xAA, 0x96],
        NibbleScheme::FiveAndThree => [0xD5, 0xAA, 0xB5],
    };
    let mut bits = BitVec::new();
    push_sync(32, &mut bits);

    for s in sectors {
        push_sync(16, &mut bits);
        push_nibbles(&address_prologue, &mut bits);
        let mut checksum = volume ^ s.track ^ s.sector;
        if s.corrupt_id {
            checksum ^= 0x01;
        }
        for value in [volume, s.track, s.sector, checksum] {
            push_nibbles(&encode_44(value), &mut bits);
        }
        push_nibbles(&[0xDE, 0xAA, 0xEB], &mut bits);

        push_sync(6, &mut bits);
        push_nibbles(&[0xD5, 0xAA, 0xAD], &mut bits);
        let mut data = [0u8; SECTOR_LEN];
        data.copy_from_slice(&s.data[..SECTOR_LEN]);
        let mut nibbles = scheme.encode_sector(&data);
        if let Some(bit) = s.corrupt_data {
            // Replace one nibble with a different valid nibble.
            let i = bit / 8;
            let value = scheme.decode_nibble(nibbles[i]).unwrap_or(0);
            nibbles[i] = scheme.encode_value(value ^ 0x01);
        }
        push_nibbles(&nibbles, &mut bits);
        push_nibbles(&[0xDE, 0xAA, 0xEB], &mut bits);
    }
    push_sync(8, &mut bits);
    bits
}

/// A simulated drive holding a double density MFM disk of 9 sectors per track.
///
/// Every capture rebuilds the requested track. Tracks listed in `damaged` return a capture with
/// a corrupted data field the first time they are read.
pub struct MfmDiskSource {
    pub tracks: u8,
    pub heads: u8,
    pub jitter: f64,
    pub damaged: Vec<(u8, u8)>,
    pub captures: Vec<(u8, u8)>,
    /// A track the drive fails to seek away from. Captures then read this track instead.
    pub stuck_track: Option<u8>,
    track: u8,
    head: u8,
}

impl MfmDiskSource {
    pub fn new(tracks: u8, heads: u8) -> Self {
        MfmDiskSource {
            tracks,
            heads,
            jitter: 0.1,
            damaged: Vec::new(),
            captures: Vec::new(),
            stuck_track: None,
            track: 0,
            head: 0,
        }
    }

    pub fn with_damaged(mut self, track: u8, head: u8) -> Self {
        self.damaged.push((track, head));
        self
    }

    pub fn track_sectors(track: u8, head: u8) -> Vec<TestSector> {
        (1..=9)
            .map(|s| {
                let mut sector = TestSector::new(track, head, s, 2);
                sector.data = pattern(512, s.wrapping_add(track.wrapping_mul(9)).wrapping_add(head.wrapping_mul(101)));
                sector
            })
            .collect()
    }

    /// The expected linear image of the disk with heads interleaved per track.
    pub fn interleaved_image(&self) -> Vec<u8> {
        let mut image = Vec::new();
        for track in 0..self.tracks {
            for head in 0..self.heads {
                for s in Self::track_sectors(track, head) {
                    image.extend_from_slice(&s.data);
                }
            }
        }
        image
    }
}

impl fluxsector::SampleSource for MfmDiskSource {
    fn capture(&mut self, track: u8, head: u8) -> Result<fluxsector::Capture, fluxsector::FluxSectorError> {
        if track >= self.tracks || head >= self.heads {
            return Err(fluxsector::FluxSectorError::CaptureError(format!(
                "no track {} head {}",
                track, head
            )));
        }
        self.captures.push((track, head));
        let track = self.stuck_track.unwrap_or(track);
        self.track = track;
        self.head = head;

        let mut sectors = Self::track_sectors(track, head);
        if let Some(i) = self.damaged.iter().position(|t| *t == (track, head)) {
            self.damaged.remove(i);
            sectors[4] = sectors[4].clone().with_corrupt_data();
        }
        Ok(fluxsector::Capture {
            samples: cells_to_intervals(&ibm_mfm_track(&sectors), MFM_CELL, self.jitter, 1.0),
            sample_rate: SAMPLE_RATE,
            rotation_count: 1,
        })
    }

    fn current_track(&self) -> u8 {
        self.track
    }

    fn current_head(&self) -> u8 {
        self.head
    }
}
