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

    src/bitstream_codec/gcr.rs

    Implements Commodore 4-to-5 GCR encoding and decoding.

*/

//! Commodore 4-to-5 GCR.
//!
//! Every nybble is written as a 5-bit group chosen so that no more than two zero bits occur in a
//! row and no more than eight one bits occur in a row, including across group boundaries. A run
//! of ten or more one bits is therefore reserved for sync.

use bit_vec::BitVec;

pub const GCR_GROUP_LEN: usize = 5;
pub const GCR_BYTE_LEN: usize = 10;
/// The minimum number of consecutive one bits recognized as sync.
pub const GCR_SYNC_MIN_ONES: u32 = 10;

const INVALID: u8 = 0xFF;

#[rustfmt::skip]
const GCR_ENCODE: [u8; 16] = [
    0b01010, 0b01011, 0b10010, 0b10011, 0b01110, 0b01111, 0b10110, 0b10111,
    0b01001, 0b11001, 0b11010, 0b11011, 0b01101, 0b11101, 0b11110, 0b10101,
];

const GCR_DECODE: [u8; 32] = build_decode_table();

const fn build_decode_table() -> [u8; 32] {
    let mut table = [INVALID; 32];
    let mut i = 0;
    while i < GCR_ENCODE.len() {
        table[GCR_ENCODE[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Encode a nybble as a 5-bit GCR group.
pub fn encode_nybble(nybble: u8) -> u8 {
    GCR_ENCODE[(nybble & 0x0F) as usize]
}

/// Decode a 5-bit GCR group, or return None if the group is not a valid code.
pub fn decode_group(group: u8) -> Option<u8> {
    match GCR_DECODE.get(group as usize) {
        Some(&INVALID) | None => None,
        Some(&nybble) => Some(nybble),
    }
}

/// Encode `data` as GCR, appending 10 bits per byte to `bits`.
pub fn encode(data: &[u8], bits: &mut BitVec) {
    for &byte in data {
        let pair = ((encode_nybble(byte >> 4) as u16) << 5) | encode_nybble(byte) as u16;
        for i in (0..GCR_BYTE_LEN).rev() {
            bits.push((pair >> i) & 1 != 0);
        }
    }
}
