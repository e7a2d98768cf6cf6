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

    src/track_schema/system34.rs

    Constants and field layouts shared by the IBM System 34 FM and MFM decoders.

*/

//! Definitions shared by the IBM System 34 FM and MFM decoders.

use std::io::Cursor;

use binrw::{binrw, BinRead};

use crate::util::crc16_with_polynomial;

pub const IDAM_MARKER_BYTES: [u8; 4] = [0xA1, 0xA1, 0xA1, 0xFE];

pub const IDAM_MARK: u8 = 0xFE;
pub const IAM_MARK: u8 = 0xFC;
pub const DAM_MARK: u8 = 0xFB;
pub const DAM_MARK_ALT: u8 = 0xFA;
pub const DDAM_MARK: u8 = 0xF8;
pub const DDAM_MARK_ALT: u8 = 0xF9;

/// Length of an address field: mark, C, H, R, N and a 16-bit CRC.
pub const ADDRESS_FIELD_LEN: usize = 7;
pub const CRC_LEN: usize = 2;

/// The kind of field a System 34 mark byte introduces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum System34Mark {
    Iam,
    Idam,
    Dam,
    Ddam,
}

impl TryFrom<u8> for System34Mark {
    type Error = ();
    fn try_from(mark: u8) -> Result<Self, Self::Error> {
        match mark {
            IAM_MARK => Ok(System34Mark::Iam),
            IDAM_MARK => Ok(System34Mark::Idam),
            DAM_MARK | DAM_MARK_ALT => Ok(System34Mark::Dam),
            DDAM_MARK | DDAM_MARK_ALT => Ok(System34Mark::Ddam),
            _ => Err(()),
        }
    }
}

/// The layout of a System 34 address field, mark byte included.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct SectorIdField {
    pub mark: u8,
    pub c: u8,
    pub h: u8,
    pub s: u8,
    pub n: u8,
    pub crc: u16,
}

impl SectorIdField {
    /// Parse an address field starting at its mark byte.
    pub fn parse(field: &[u8]) -> Option<SectorIdField> {
        SectorIdField::read(&mut Cursor::new(field)).ok()
    }
}

/// Search for a CRC-16 polynomial under which `field` produces the `recorded` CRC, with the
/// standard 0xFFFF initial value. Some disk duplicators wrote data fields with a non-standard
/// CRC polynomial; a field that verifies under some other polynomial is likely intact.
///
/// This is a heuristic. With 2^15 candidate polynomials and a 16-bit check, a damaged field has
/// a real chance of matching some polynomial by coincidence.
pub fn search_duplicator_polynomial(field: &[u8], recorded: u16) -> Option<u16> {
    // A CRC generator polynomial always includes the x^0 term.
    (1..=u16::MAX)
        .step_by(2)
        .filter(|poly| *poly != crate::util::CCITT_POLYNOMIAL)
        .find(|poly| crc16_with_polynomial(field, *poly, 0xFFFF) == recorded)
}
