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

    src/track_schema/amiga.rs

    Implements the Amiga trackdisk sector decoder.

*/

//! Amiga trackdisk decoder.
//!
//! Amiga trackdisk tracks are MFM encoded and typically contain sequential sectors 0-10 without
//! the inter-sector gaps seen on IBM PC diskettes. Each sector starts with two 0x00 bytes and two
//! 0x4489 sync words, followed by:
//!
//! | Field           | Raw MFM bytes | Content                                           |
//! |-----------------|---------------|---------------------------------------------------|
//! | info            | 8             | format, track, sector, sectors to gap (odd/even)  |
//! | label           | 32            | 4 longs, odd/even, unused                         |
//! | header checksum | 8             | XOR of the info and label longs                   |
//! | data checksum   | 8             | XOR of the data longs                             |
//! | data            | 1024          | 512 bytes, odd/even                               |
//!
//! Fields are collected as raw, clock-aligned MFM bytes and decoded with the odd/even
//! meta-encoding. Checksums are computed over the raw longs with the clock bits masked off.
//!
//! Good documentation on the Amiga trackdisk format can be found at:
//! http://lclevy.free.fr/adflib/adf_info.html

use std::io::Cursor;

use binrw::{binrw, BinRead};

use crate::{
    flux::BitSink,
    track_schema::{
        meta_encoding::odd_even::{odd_even_decode_raw_block, odd_even_decode_raw_u32_from_slice},
        DecodeStats,
        DecoderCore,
        DecoderState,
        IdamCache,
    },
    util::xor_longs,
};

/// Two 0x00 bytes followed by two 0x4489 sync words. The first clock bit depends on the
/// previous data bit and is masked off.
pub const AMIGA_SECTOR_MARKER: u64 = 0x2AAA_AAAA_4489_4489;
pub const AMIGA_SECTOR_MASK: u64 = 0x7FFF_FFFF_FFFF_FFFF;

pub const AMIGA_FORMAT_BYTE: u8 = 0xFF;
pub const AMIGA_SECTOR_SIZE: usize = 512;
pub const AMIGA_SIZE_CODE: u8 = 2;

const RAW_BYTE_LEN: usize = 8;
const INFO_LEN: usize = 8;
const LABEL_LEN: usize = 32;
const CHECKSUM_LEN: usize = 8;
/// Raw bytes of info, label and header checksum.
pub const AMIGA_HEADER_LEN: usize = INFO_LEN + LABEL_LEN + CHECKSUM_LEN;
const CHECKSUM_MASK: u32 = 0x5555_5555;

/// The decoded sector info long.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct AmigaSectorInfo {
    pub format: u8,
    #[doc = "Track number in linear form: cylinder * 2 + head."]
    pub track: u8,
    pub sector: u8,
    pub sectors_to_gap: u8,
}

impl AmigaSectorInfo {
    pub fn from_u32(info: u32) -> Option<AmigaSectorInfo> {
        AmigaSectorInfo::read(&mut Cursor::new(info.to_be_bytes())).ok()
    }

    pub fn cylinder(&self) -> u8 {
        self.track / 2
    }

    pub fn head(&self) -> u8 {
        self.track % 2
    }
}

pub struct AmigaDecoder<'s> {
    core: DecoderCore<'s>,
    shift_reg: u64,
    bit_ct: usize,
    format: u8,
}

impl<'s> AmigaDecoder<'s> {
    pub fn new(core: DecoderCore<'s>) -> Self {
        AmigaDecoder {
            core,
            shift_reg: 0,
            bit_ct: 0,
            format: AMIGA_FORMAT_BYTE,
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        self.core.stats()
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.shift_reg = 0;
        self.bit_ct = 0;
    }

    /// Validate a complete header. `end_position` is the position of its last bit, where the
    /// data checksum and data block begin.
    fn complete_header(&mut self, end_position: u64) {
        let buffer = self.core.buffer();
        let info = odd_even_decode_raw_u32_from_slice(&buffer[..INFO_LEN]);
        let recorded = odd_even_decode_raw_u32_from_slice(&buffer[INFO_LEN + LABEL_LEN..AMIGA_HEADER_LEN]);
        let calculated = xor_longs(&buffer[..INFO_LEN + LABEL_LEN]) & CHECKSUM_MASK;

        let (Some(info), Some(recorded)) = (info, recorded)
        else {
            self.core.abort_field();
            return;
        };
        if recorded != calculated {
            self.core.reject_address(recorded, calculated);
            return;
        }
        let Some(info) = AmigaSectorInfo::from_u32(info)
        else {
            self.core.abort_field();
            return;
        };
        if info.format != AMIGA_FORMAT_BYTE {
            log::debug!(
                "AmigaDecoder::complete_header(): unusual format byte {:02X} at {}",
                info.format,
                self.core.field_position()
            );
        }

        let position = self.core.field_position();
        self.format = info.format;
        self.core.accept_address(IdamCache {
            track: info.cylinder(),
            head: info.head(),
            sector: info.sector,
            size_code: AMIGA_SIZE_CODE,
            id_checksum: calculated,
            id_position: position,
            data_len: AMIGA_SECTOR_SIZE,
        });
        // The data checksum and data block follow the header without a mark of their own.
        self.core
            .begin_data(end_position, &[], |len| CHECKSUM_LEN + 2 * len);
    }

    fn complete_data(&mut self, position: u64) {
        let buffer = self.core.buffer();
        let len = (buffer.len() - CHECKSUM_LEN) / 2;
        let recorded = odd_even_decode_raw_u32_from_slice(&buffer[..CHECKSUM_LEN]).unwrap_or_default();
        let calculated = xor_longs(&buffer[CHECKSUM_LEN..]) & CHECKSUM_MASK;

        if recorded == calculated {
            let odd = &buffer[CHECKSUM_LEN..CHECKSUM_LEN + len];
            let even = &buffer[CHECKSUM_LEN + len..];
            let data = odd_even_decode_raw_block(odd, even);
            let format = self.format;
            self.core.insert_sector(data, format, calculated, position);
        }
        else {
            self.core.reject_data(recorded, calculated);
        }
    }
}

impl BitSink for AmigaDecoder<'_> {
    fn push_bit(&mut self, bit: bool, position: u64) {
        self.shift_reg = (self.shift_reg << 1) | bit as u64;

        match self.core.state() {
            DecoderState::Sync => {
                if self.shift_reg & AMIGA_SECTOR_MASK == AMIGA_SECTOR_MARKER {
                    self.core.begin_address(position, &[], AMIGA_HEADER_LEN);
                    self.bit_ct = 0;
                }
            }
            state @ (DecoderState::Address | DecoderState::Data) => {
                self.bit_ct += 1;
                if self.bit_ct < RAW_BYTE_LEN {
                    return;
                }
                self.bit_ct = 0;

                if self.core.push_byte(self.shift_reg as u8) {
                    if state == DecoderState::Address {
                        self.complete_header(position);
                    }
                    else {
                        self.complete_data(position);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_info_splits_linear_track() {
        let info = AmigaSectorInfo::from_u32(0xFF05_030B).unwrap();
        assert_eq!(info.format, 0xFF);
        assert_eq!(info.cylinder(), 2);
        assert_eq!(info.head(), 1);
        assert_eq!(info.sector, 3);
        assert_eq!(info.sectors_to_gap, 11);
    }
}
