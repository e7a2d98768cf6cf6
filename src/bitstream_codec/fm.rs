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

    src/bitstream_codec/fm.rs

    Implements FM encoding and decoding of clock and data bytes.

*/

//! FM channel code.
//!
//! Each data bit is written as a clock cell followed by a data cell. Normal data has every clock
//! cell set (clock byte 0xFF). Address marks are written with a clock byte of 0xC7 (0xD7 for the
//! index mark) so that they cannot occur in normal data.

use bit_vec::BitVec;

pub const FM_BYTE_LEN: usize = 16;
pub const FM_DATA_CLOCK: u8 = 0xFF;
pub const FM_MARK_CLOCK: u8 = 0xC7;
pub const FM_INDEX_MARK_CLOCK: u8 = 0xD7;

/// Interleave a clock byte and a data byte into a 16-cell FM word.
pub const fn encode_byte(data: u8, clock: u8) -> u16 {
    let mut word = 0u16;
    let mut i = 8;
    while i > 0 {
        i -= 1;
        word = (word << 2) | ((((clock >> i) & 1) as u16) << 1) | ((data >> i) & 1) as u16;
    }
    word
}

/// Split a 16-cell FM word into its (clock, data) bytes.
pub fn decode_word(word: u16) -> (u8, u8) {
    let mut clock = 0u8;
    let mut data = 0u8;
    for i in (0..8).rev() {
        clock = (clock << 1) | ((word >> (i * 2 + 1)) & 1) as u8;
        data = (data << 1) | ((word >> (i * 2)) & 1) as u8;
    }
    (clock, data)
}

/// Encode `data` as FM with the given clock byte, appending to `bits`.
pub fn encode(data: &[u8], clock: u8, bits: &mut BitVec) {
    for &byte in data {
        let word = encode_byte(byte, clock);
        for i in (0..16).rev() {
            bits.push((word >> i) & 1 != 0);
        }
    }
}
