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

    src/util.rs

    Checksum helpers

*/

//! Checksum routines shared by the modulation decoders.

/// The CRC-16 polynomial used by IBM System 34 style FM and MFM fields.
pub const CCITT_POLYNOMIAL: u16 = 0x1021;

/// Calculate a CRC-16/IBM-3740 (CCITT polynomial, initial value 0xFFFF, no reflection) over
/// `data`. A previous CRC value may be passed in `start` to continue a running calculation.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    crc16_with_polynomial(data, CCITT_POLYNOMIAL, start.unwrap_or(0xFFFF))
}

/// Calculate an MSB-first CRC-16 over `data` with an arbitrary polynomial and initial value.
pub fn crc16_with_polynomial(data: &[u8], polynomial: u16, initial: u16) -> u16 {
    let mut crc = initial;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ polynomial
            }
            else {
                crc << 1
            };
        }
    }
    crc
}

/// XOR all bytes of `data` together.
pub fn xor_bytes(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &b| acc ^ b)
}

/// XOR all big-endian 32-bit words of `data` together. Trailing bytes that do not fill a word are
/// ignored.
pub fn xor_longs(data: &[u8]) -> u32 {
    data.chunks_exact(4)
        .fold(0, |acc, c| acc ^ u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
}

/// Return the (recorded, calculated) CRC pair for a field that ends in a big-endian CRC-16.
pub(crate) fn crc16_bytes(field: &[u8]) -> (u16, u16) {
    let len = field.len();
    if len < 2 {
        return (0, crc_ibm_3740(&[], None));
    }
    let recorded = u16::from_be_bytes([field[len - 2], field[len - 1]]);
    let calculated = crc_ibm_3740(&field[..len - 2], None);
    (recorded, calculated)
}
