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

    src/track_schema/meta_encoding/odd_even.rs

    Implements the odd/even meta-encoding.

*/

//! Odd/even meta-encoding, as used by the Amiga trackdisk format.
//!
//! A value is split into its odd bits (shifted right by one) and its even bits, and each half is
//! written as a separate MFM block. Once MFM-encoded, the data bits of a block sit in the
//! `0x55` positions of each raw byte and the clock bits in the `0xAA` positions.
//!
//! The Amiga uses three block sizes:
//! * `LONG`     - a 32-bit value, encoded as 16 odd and 16 even bits.
//! * `LONGx4`   - 4x 32-bit values. Only used for a sector's label area.
//! * `BYTEx512` - 512x 8-bit values, encoded as 512 bytes of odd and 512 bytes of even bits.

use bit_vec::BitVec;

const DATA_BITS_U32: u32 = 0x5555_5555;
const DATA_BITS_U8: u8 = 0x55;

/// Decode a value from its raw, clock-aligned odd and even MFM longs.
pub fn odd_even_decode_raw_u32(odd: u32, even: u32) -> u32 {
    // Clock aligned MFM data bits are always "even" as the MSB is always a clock bit. The odd
    // bits, encoded first, are shifted left by 1 to return to their original positions.
    ((odd & DATA_BITS_U32) << 1) | (even & DATA_BITS_U32)
}

/// Decode a value from 8 raw, clock-aligned MFM bytes: the odd long followed by the even long.
/// Returns None if fewer than 8 bytes are provided.
pub fn odd_even_decode_raw_u32_from_slice(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < 8 {
        return None;
    }
    let odd = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let even = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Some(odd_even_decode_raw_u32(odd, even))
}

/// Split a value into its (odd, even) data-bit longs, before clock bits are added.
pub fn odd_even_split_u32(value: u32) -> (u32, u32) {
    ((value >> 1) & DATA_BITS_U32, value & DATA_BITS_U32)
}

/// Decode a block of bytes from its raw odd and even MFM blocks. The output is as long as the
/// shorter of the two blocks.
pub fn odd_even_decode_raw_block(odd: &[u8], even: &[u8]) -> Vec<u8> {
    odd.iter()
        .zip(even.iter())
        .map(|(o, e)| ((o & DATA_BITS_U8) << 1) | (e & DATA_BITS_U8))
        .collect()
}

/// Split a block of bytes into its (odd, even) data-bit blocks, before clock bits are added.
pub fn odd_even_split_block(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let odd = data.iter().map(|b| (b >> 1) & DATA_BITS_U8).collect();
    let even = data.iter().map(|b| b & DATA_BITS_U8).collect();
    (odd, even)
}

/// MFM-encode data-bit bytes (data in the `0x55` positions only) by filling in the clock bits,
/// appending 8 cells per byte to `bits`. Returns the last data bit written.
pub fn push_clocked_bytes(data_bits: &[u8], prev_bit: bool, bits: &mut BitVec) -> bool {
    let mut prev = prev_bit;
    for &byte in data_bits {
        for i in (0..4).rev() {
            let data = (byte >> (i * 2)) & 1 != 0;
            bits.push(!(prev || data));
            bits.push(data);
            prev = data;
        }
    }
    prev
}
