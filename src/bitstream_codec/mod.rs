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

    src/bitstream_codec/mod.rs

*/

//! Channel codes used by the supported modulations.
//!
//! Each module provides both directions of its code. Decoders use the decoding half on bits
//! recovered from flux; the encoding half produces bit-accurate tracks for tests and tools.

pub mod fm;
pub mod gcr;
pub mod mfm;
pub mod nibble;

use bit_vec::BitVec;

/// Whether a byte is encoded as plain data or as an address mark with missing clock bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EncodingVariant {
    #[default]
    Data,
    AddressMark,
}

/// Append the low `width` bits of `value` to `bits`, most significant bit first.
pub fn push_bits(bits: &mut BitVec, value: u64, width: usize) {
    for i in (0..width).rev() {
        bits.push((value >> i) & 1 != 0);
    }
}

/// Collect `width` bits starting at `start` into an integer, most significant bit first.
/// Bits past the end of `bits` read as zero.
pub fn read_bits(bits: &BitVec, start: usize, width: usize) -> u64 {
    (start..start + width).fold(0, |acc, i| (acc << 1) | bits.get(i).unwrap_or(false) as u64)
}
