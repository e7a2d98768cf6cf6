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

    sector_record.rs

    Defines the SectorRecord type produced by the modulation decoders

*/

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use crate::{types::Modulation, MAXIMUM_SECTOR_SIZE};

/// The largest size code that maps to a sector size. Size codes above this are considered
/// corrupt and replaced by the modulation's default sector size.
pub const MAXIMUM_SIZE_CODE: u8 = 7;

/// Convert a sector size code into a size in bytes (128 << n), or None if the size code is out of
/// range.
pub fn size_code_to_bytes(n: u8) -> Option<usize> {
    if n <= MAXIMUM_SIZE_CODE {
        let size = 128usize << n;
        debug_assert!(size <= MAXIMUM_SECTOR_SIZE);
        Some(size)
    }
    else {
        None
    }
}

/// Convert a sector size code into a size in bytes, falling back to `default` for out of range
/// size codes.
pub fn data_length_for(n: u8, default: usize) -> usize {
    size_code_to_bytes(n).unwrap_or(default)
}

/// A sector recovered from a flux capture, with both its physical location (the track and head
/// it was captured from) and the logical address recorded in its address field.
///
/// Positions are sample offsets in ticks from the start of the capture buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorRecord {
    #[doc = "The physical track (cylinder) the sector was captured from."]
    pub physical_track: u8,
    #[doc = "The physical head the sector was captured from."]
    pub physical_head: u8,
    #[doc = "The track number recorded in the sector's address field."]
    pub logical_track: u8,
    #[doc = "The head number recorded in the sector's address field."]
    pub logical_head: u8,
    #[doc = "The sector id recorded in the sector's address field."]
    pub logical_sector: u8,
    #[doc = "The size code recorded in (or implied by) the sector's address field."]
    pub logical_size_code: u8,
    pub modulation: Modulation,
    #[doc = "Sample position of the address mark."]
    pub id_position: u64,
    #[doc = "Sample position of the data mark, or of the start of the data field."]
    pub data_position: u64,
    #[doc = "Sample position of the last bit of the data field."]
    pub data_end_position: u64,
    pub id_checksum: u32,
    pub data_checksum: u32,
    #[doc = "The data mark byte. Distinguishes normal from deleted data on IBM formats."]
    pub data_type: u8,
    #[doc = "The sector payload, without mark or checksum bytes."]
    pub data: Vec<u8>,
}

/// The full identity of a sector record. Two records with equal identities are duplicates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorIdentity {
    pub physical_track: u8,
    pub physical_head: u8,
    pub logical_track: u8,
    pub logical_head: u8,
    pub logical_sector: u8,
    pub logical_size_code: u8,
    pub id_checksum: u32,
    pub data_checksum: u32,
    pub data_len: usize,
}

impl SectorRecord {
    pub fn identity(&self) -> SectorIdentity {
        SectorIdentity {
            physical_track: self.physical_track,
            physical_head: self.physical_head,
            logical_track: self.logical_track,
            logical_head: self.logical_head,
            logical_sector: self.logical_sector,
            logical_size_code: self.logical_size_code,
            id_checksum: self.id_checksum,
            data_checksum: self.data_checksum,
            data_len: self.data.len(),
        }
    }

    /// Return true if the data mark of this sector indicates deleted data.
    /// Only IBM FM and MFM formats distinguish deleted data.
    pub fn is_deleted(&self) -> bool {
        matches!(self.modulation, Modulation::Fm | Modulation::Mfm) && matches!(self.data_type, 0xF8 | 0xF9)
    }

    /// Return true if the recorded positions of this sector are in address, data, end order.
    pub fn positions_ordered(&self) -> bool {
        self.id_position <= self.data_position && self.data_position <= self.data_end_position
    }
}

impl Display for SectorRecord {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "[{} p:{}/{} l:c{} h{} s{} n{} len:{}]",
            self.modulation,
            self.physical_track,
            self.physical_head,
            self.logical_track,
            self.logical_head,
            self.logical_sector,
            self.logical_size_code,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_code_calculates_correct_size() {
        assert_eq!(size_code_to_bytes(0), Some(128));
        assert_eq!(size_code_to_bytes(2), Some(512));
        assert_eq!(size_code_to_bytes(7), Some(16384));
        assert_eq!(size_code_to_bytes(8), None);
    }

    #[test]
    fn out_of_range_size_code_uses_default() {
        assert_eq!(data_length_for(0xFF, 256), 256);
        assert_eq!(data_length_for(1, 512), 256);
    }
}
