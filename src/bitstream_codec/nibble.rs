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

    src/bitstream_codec/nibble.rs

    Implements Apple II 4&4, 5&3 and 6&2 nibble encoding and decoding.

*/

//! Apple II disk nibble codes.
//!
//! The Disk II controller shifts bits into a latch until the most significant bit is set, so
//! every valid disk byte ("nibble") has its high bit set. Three codes are used on top of this:
//! * 4&4, for address fields: each byte is split into two nibbles holding its odd and even bits.
//! * 5&3, for DOS 3.2 (13 sector) data fields: each 256-byte sector becomes 410 nibbles plus a
//!   checksum nibble.
//! * 6&2, for DOS 3.3 (16 sector) data fields: each 256-byte sector becomes 342 nibbles plus a
//!   checksum nibble.
//!
//! Data fields are written as a running XOR of consecutive values, so that the final checksum
//! nibble folds the whole field to zero.

use bit_vec::BitVec;

pub const SECTOR_LEN: usize = 256;

pub const CHUNK_53: usize = 0x33;
pub const THREES_53: usize = 154;
/// Nibbles in a 5&3 data field including the checksum nibble.
pub const DATA_NIBBLES_53: usize = THREES_53 + SECTOR_LEN + 1;

pub const CHUNK_62: usize = 0x56;
/// Nibbles in a 6&2 data field including the checksum nibble.
pub const DATA_NIBBLES_62: usize = CHUNK_62 + SECTOR_LEN + 1;

const INVALID: u8 = 0xFF;

#[rustfmt::skip]
const ENCODE_53: [u8; 32] = [
    0xab, 0xad, 0xae, 0xaf, 0xb5, 0xb6, 0xb7, 0xba,
    0xbb, 0xbd, 0xbe, 0xbf, 0xd6, 0xd7, 0xda, 0xdb,
    0xdd, 0xde, 0xdf, 0xea, 0xeb, 0xed, 0xee, 0xef,
    0xf5, 0xf6, 0xf7, 0xfa, 0xfb, 0xfd, 0xfe, 0xff,
];

#[rustfmt::skip]
const ENCODE_62: [u8; 64] = [
    0x96, 0x97, 0x9a, 0x9b, 0x9d, 0x9e, 0x9f, 0xa6,
    0xa7, 0xab, 0xac, 0xad, 0xae, 0xaf, 0xb2, 0xb3,
    0xb4, 0xb5, 0xb6, 0xb7, 0xb9, 0xba, 0xbb, 0xbc,
    0xbd, 0xbe, 0xbf, 0xcb, 0xcd, 0xce, 0xcf, 0xd3,
    0xd6, 0xd7, 0xd9, 0xda, 0xdb, 0xdc, 0xdd, 0xde,
    0xdf, 0xe5, 0xe6, 0xe7, 0xe9, 0xea, 0xeb, 0xec,
    0xed, 0xee, 0xef, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6,
    0xf7, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe, 0xff,
];

const DECODE_53: [u8; 256] = build_decode_table(&ENCODE_53);
const DECODE_62: [u8; 256] = build_decode_table(&ENCODE_62);

const fn build_decode_table<const N: usize>(encode: &[u8; N]) -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < N {
        table[encode[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// The data field code of an Apple sector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NibbleScheme {
    #[doc = "5&3 encoding, 13 sectors per track"]
    FiveAndThree,
    #[doc = "6&2 encoding, 16 sectors per track"]
    SixAndTwo,
}

impl NibbleScheme {
    /// Return the number of nibbles in a data field including the checksum nibble.
    pub fn data_nibbles(&self) -> usize {
        match self {
            NibbleScheme::FiveAndThree => DATA_NIBBLES_53,
            NibbleScheme::SixAndTwo => DATA_NIBBLES_62,
        }
    }

    /// Translate a disk nibble to its 5 or 6 bit value.
    pub fn decode_nibble(&self, nibble: u8) -> Option<u8> {
        let value = match self {
            NibbleScheme::FiveAndThree => DECODE_53[nibble as usize],
            NibbleScheme::SixAndTwo => DECODE_62[nibble as usize],
        };
        (value != INVALID).then_some(value)
    }

    pub fn encode_value(&self, value: u8) -> u8 {
        match self {
            NibbleScheme::FiveAndThree => ENCODE_53[(value & 0x1F) as usize],
            NibbleScheme::SixAndTwo => ENCODE_62[(value & 0x3F) as usize],
        }
    }

    /// Encode a 256-byte sector into a data field of disk nibbles.
    pub fn encode_sector(&self, data: &[u8; SECTOR_LEN]) -> Vec<u8> {
        let values = match self {
            NibbleScheme::FiveAndThree => split_53(data),
            NibbleScheme::SixAndTwo => split_62(data),
        };
        let mut nibbles = Vec::with_capacity(values.len() + 1);
        let mut previous = 0u8;
        for value in values {
            nibbles.push(self.encode_value(value ^ previous));
            previous = value;
        }
        nibbles.push(self.encode_value(previous));
        nibbles
    }

    /// Decode a complete data field of disk nibbles into a 256-byte sector.
    /// Returns the sector and the recorded checksum value, or None if a nibble is invalid or the
    /// field does not fold to zero.
    pub fn decode_sector(&self, nibbles: &[u8]) -> Option<(Vec<u8>, u8)> {
        if nibbles.len() != self.data_nibbles() {
            return None;
        }
        let mut values = Vec::with_capacity(nibbles.len() - 1);
        let mut running = 0u8;
        for &nibble in &nibbles[..nibbles.len() - 1] {
            running ^= self.decode_nibble(nibble)?;
            values.push(running);
        }
        let checksum = self.decode_nibble(nibbles[nibbles.len() - 1])?;
        if running ^ checksum != 0 {
            return None;
        }
        let data = match self {
            NibbleScheme::FiveAndThree => join_53(&values),
            NibbleScheme::SixAndTwo => join_62(&values),
        };
        Some((data, checksum))
    }
}

// The low two bits of each byte are stored bit-swapped.
fn swap2(v: u8) -> u8 {
    ((v & 1) << 1) | ((v >> 1) & 1)
}

/// Split a sector into 86 auxiliary 6-bit values holding the low bits of three bytes each,
/// followed by the 256 high 6-bit values.
fn split_62(data: &[u8; SECTOR_LEN]) -> Vec<u8> {
    let mut values = vec![0u8; CHUNK_62 + SECTOR_LEN];
    for i in 0..CHUNK_62 {
        let mut aux = swap2(data[i] & 3) | (swap2(data[i + CHUNK_62] & 3) << 2);
        if i + 2 * CHUNK_62 < SECTOR_LEN {
            aux |= swap2(data[i + 2 * CHUNK_62] & 3) << 4;
        }
        values[i] = aux;
    }
    for (i, &byte) in data.iter().enumerate() {
        values[CHUNK_62 + i] = byte >> 2;
    }
    values
}

fn join_62(values: &[u8]) -> Vec<u8> {
    let (aux, high) = values.split_at(CHUNK_62);
    high.iter()
        .enumerate()
        .map(|(i, &h)| {
            let shift = 2 * (i / CHUNK_62);
            let low = swap2((aux[i % CHUNK_62] >> shift) & 3);
            (h << 2) | low
        })
        .collect()
}

/// Split a sector into 154 "threes" values holding the low three bits of five byte groups,
/// followed by the 256 high 5-bit values. The threes are written in reverse order.
fn split_53(data: &[u8; SECTOR_LEN]) -> Vec<u8> {
    let mut top = [0u8; SECTOR_LEN];
    let mut threes = [0u8; THREES_53];
    for i in 0..CHUNK_53 {
        let off = CHUNK_53 - 1 - i;
        let group = &data[i * 5..i * 5 + 5];
        for (k, &byte) in group.iter().enumerate() {
            top[off + CHUNK_53 * k] = byte >> 3;
        }
        let (d3, d4) = (group[3], group[4]);
        threes[off] = ((group[0] & 7) << 2) | ((d3 & 4) >> 1) | ((d4 & 4) >> 2);
        threes[off + CHUNK_53] = ((group[1] & 7) << 2) | (d3 & 2) | ((d4 & 2) >> 1);
        threes[off + 2 * CHUNK_53] = ((group[2] & 7) << 2) | ((d3 & 1) << 1) | (d4 & 1);
    }
    top[SECTOR_LEN - 1] = data[SECTOR_LEN - 1] >> 3;
    threes[THREES_53 - 1] = data[SECTOR_LEN - 1] & 7;

    let mut values = Vec::with_capacity(THREES_53 + SECTOR_LEN);
    values.extend(threes.iter().rev());
    values.extend_from_slice(&top);
    values
}

fn join_53(values: &[u8]) -> Vec<u8> {
    let (rev_threes, top) = values.split_at(THREES_53);
    let threes: Vec<u8> = rev_threes.iter().rev().copied().collect();
    let base: Vec<u8> = top.iter().map(|v| v << 3).collect();

    let mut data = Vec::with_capacity(SECTOR_LEN);
    for i in (0..CHUNK_53).rev() {
        let (t1, t2, t3) = (threes[i], threes[CHUNK_53 + i], threes[2 * CHUNK_53 + i]);
        let t4 = ((t1 & 2) << 1) | (t2 & 2) | ((t3 & 2) >> 1);
        let t5 = ((t1 & 1) << 2) | ((t2 & 1) << 1) | (t3 & 1);
        data.push(base[i] | ((t1 >> 2) & 7));
        data.push(base[CHUNK_53 + i] | ((t2 >> 2) & 7));
        data.push(base[2 * CHUNK_53 + i] | ((t3 >> 2) & 7));
        data.push(base[3 * CHUNK_53 + i] | t4);
        data.push(base[4 * CHUNK_53 + i] | t5);
    }
    data.push(base[SECTOR_LEN - 1] | (threes[THREES_53 - 1] & 7));
    data
}

/// Encode a byte as a pair of 4&4 nibbles.
pub fn encode_44(value: u8) -> [u8; 2] {
    [(value >> 1) | 0xAA, value | 0xAA]
}

/// Decode a pair of 4&4 nibbles, or return None if either nibble is not a valid 4&4 nibble.
pub fn decode_44(odd: u8, even: u8) -> Option<u8> {
    if odd & 0xAA != 0xAA || even & 0xAA != 0xAA {
        return None;
    }
    Some(((odd << 1) | 1) & even)
}

/// Append disk nibbles to `bits`, 8 bits each, most significant bit first.
pub fn push_nibbles(nibbles: &[u8], bits: &mut BitVec) {
    for &nibble in nibbles {
        for i in (0..8).rev() {
            bits.push((nibble >> i) & 1 != 0);
        }
    }
}

/// Append `count` self-sync 0xFF nibbles, each followed by two zero bits.
pub fn push_sync(count: usize, bits: &mut BitVec) {
    for _ in 0..count {
        push_nibbles(&[0xFF], bits);
        bits.push(false);
        bits.push(false);
    }
}
