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

    src/bitstream_codec/mfm.rs

    Implements MFM encoding and decoding of bytes and address marks.

*/

//! MFM channel code.
//!
//! Each data bit becomes two cells, a clock cell followed by a data cell. A `1` is written as
//! `01`. A `0` is written as `10` after a `0` and as `00` after a `1`, so that no two adjacent
//! cells are both set. Address marks break this rule by omitting one clock cell, which makes
//! them impossible to mistake for data.

use bit_vec::BitVec;

use crate::bitstream_codec::EncodingVariant;

pub const MFM_BYTE_LEN: usize = 16;
/// 0xA1 with the clock between bits 4 and 5 omitted.
pub const MFM_SYNC_WORD: u16 = 0x4489;

/// Encode `data` as MFM, appending to `bits`. `prev_bit` is the last data bit written before
/// `data`. Returns the last data bit written.
///
/// With [EncodingVariant::AddressMark] the A1 sync byte is written with its missing clock.
pub fn encode(data: &[u8], prev_bit: bool, encoding_type: EncodingVariant, bits: &mut BitVec) -> bool {
    let mut previous_bit = prev_bit;
    for &byte in data {
        let word = match (byte, encoding_type) {
            (0xA1, EncodingVariant::AddressMark) => MFM_SYNC_WORD,
            _ => encode_byte(byte, previous_bit),
        };
        for i in (0..16).rev() {
            bits.push((word >> i) & 1 != 0);
        }
        previous_bit = byte & 1 != 0;
    }
    previous_bit
}

/// Encode a single byte as a 16-cell MFM word.
pub fn encode_byte(byte: u8, prev_bit: bool) -> u16 {
    let mut previous_bit = prev_bit;
    let mut word = 0u16;
    for i in (0..8).rev() {
        let bit = (byte & (1 << i)) != 0;
        let clock = !previous_bit && !bit;
        word = (word << 2) | ((clock as u16) << 1) | bit as u16;
        previous_bit = bit;
    }
    word
}

/// Decode the data bits of a 16-cell MFM word.
pub fn decode_word(word: u16) -> u8 {
    let mut byte = 0u8;
    for i in (0..8).rev() {
        byte = (byte << 1) | ((word >> (i * 2)) & 1) as u8;
    }
    byte
}

/// Count the clock cells of a 16-cell MFM word that differ from the clock the encoding rules
/// require, given the last data bit before the word.
pub fn clock_violations(word: u16, prev_bit: bool) -> u32 {
    let expected = encode_byte(decode_word(word), prev_bit);
    ((expected ^ word) & 0xAAAA).count_ones()
}
