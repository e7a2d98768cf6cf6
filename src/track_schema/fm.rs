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

    src/track_schema/fm.rs

    Implements the IBM System 34 FM sector decoder.

*/

//! IBM System 34 FM decoder.
//!
//! FM marks are recognized as exact 16-cell clock and data patterns. Address and data fields
//! are verified with CRC-16/IBM-3740 over the mark byte and field bytes.

use crate::{
    bitstream_codec::fm::{self, FM_BYTE_LEN, FM_INDEX_MARK_CLOCK, FM_MARK_CLOCK},
    flux::BitSink,
    track_schema::{
        system34::{
            search_duplicator_polynomial,
            SectorIdField,
            System34Mark,
            ADDRESS_FIELD_LEN,
            CRC_LEN,
            DAM_MARK,
            DAM_MARK_ALT,
            DDAM_MARK,
            DDAM_MARK_ALT,
            IAM_MARK,
            IDAM_MARK,
        },
        DecodeStats,
        DecoderCore,
        DecoderState,
        IdamCache,
    },
    util::crc16_bytes,
};

pub const FM_IAM_MARKER: u16 = fm::encode_byte(IAM_MARK, FM_INDEX_MARK_CLOCK);
pub const FM_IDAM_MARKER: u16 = fm::encode_byte(IDAM_MARK, FM_MARK_CLOCK);
pub const FM_DAM_MARKER: u16 = fm::encode_byte(DAM_MARK, FM_MARK_CLOCK);
pub const FM_DAM_ALT_MARKER: u16 = fm::encode_byte(DAM_MARK_ALT, FM_MARK_CLOCK);
pub const FM_DDAM_MARKER: u16 = fm::encode_byte(DDAM_MARK, FM_MARK_CLOCK);
pub const FM_DDAM_ALT_MARKER: u16 = fm::encode_byte(DDAM_MARK_ALT, FM_MARK_CLOCK);

pub struct FmDecoder<'s> {
    core: DecoderCore<'s>,
    shift_reg: u16,
    bit_ct: usize,
    duplicator_recovery: bool,
}

impl<'s> FmDecoder<'s> {
    /// Create an FM decoder. With `duplicator_recovery` set, data fields that fail their CRC
    /// are checked against alternate CRC polynomials before being discarded.
    pub fn new(core: DecoderCore<'s>, duplicator_recovery: bool) -> Self {
        FmDecoder {
            core,
            shift_reg: 0,
            bit_ct: 0,
            duplicator_recovery,
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

    fn scan_marker(&mut self, position: u64) {
        let mark = match self.shift_reg {
            FM_IDAM_MARKER
            | FM_DAM_MARKER
            | FM_DAM_ALT_MARKER
            | FM_DDAM_MARKER
            | FM_DDAM_ALT_MARKER
            | FM_IAM_MARKER => fm::decode_word(self.shift_reg).1,
            _ => return,
        };

        match System34Mark::try_from(mark) {
            Ok(System34Mark::Idam) => {
                self.core.begin_address(position, &[mark], ADDRESS_FIELD_LEN);
                self.bit_ct = 0;
            }
            Ok(System34Mark::Dam | System34Mark::Ddam) => {
                if self.core.begin_data(position, &[mark], |len| 1 + len + CRC_LEN) {
                    self.bit_ct = 0;
                }
            }
            Ok(System34Mark::Iam) => {
                log::trace!("FmDecoder::scan_marker(): index address mark at {}", position);
            }
            Err(_) => {}
        }
    }

    fn complete_address(&mut self) {
        let (recorded, calculated) = crc16_bytes(self.core.buffer());
        if recorded != calculated {
            self.core.reject_address(recorded as u32, calculated as u32);
            return;
        }
        match SectorIdField::parse(self.core.buffer()) {
            Some(id) => {
                let idam = IdamCache::new(
                    self.core.modulation(),
                    id.c,
                    id.h,
                    id.s,
                    id.n,
                    calculated as u32,
                    self.core.field_position(),
                );
                self.core.accept_address(idam);
            }
            None => self.core.abort_field(),
        }
    }

    fn complete_data(&mut self, position: u64) {
        let buffer = self.core.buffer();
        let len = buffer.len();
        let mark = buffer[0];
        let (recorded, calculated) = crc16_bytes(buffer);

        if recorded == calculated {
            let data = buffer[1..len - CRC_LEN].to_vec();
            self.core.insert_sector(data, mark, calculated as u32, position);
            return;
        }

        if self.duplicator_recovery {
            if let Some(poly) = search_duplicator_polynomial(&buffer[..len - CRC_LEN], recorded) {
                log::warn!(
                    "FmDecoder::complete_data(): data field at {} verified with duplicator polynomial {:04X}",
                    self.core.field_position(),
                    poly
                );
                let data = buffer[1..len - CRC_LEN].to_vec();
                self.core.stats_mut().recovered += 1;
                self.core.insert_sector(data, mark, recorded as u32, position);
                return;
            }
        }
        self.core.reject_data(recorded as u32, calculated as u32);
    }
}

impl BitSink for FmDecoder<'_> {
    fn push_bit(&mut self, bit: bool, position: u64) {
        self.shift_reg = (self.shift_reg << 1) | bit as u16;

        match self.core.state() {
            DecoderState::Sync => self.scan_marker(position),
            state @ (DecoderState::Address | DecoderState::Data) => {
                self.bit_ct += 1;
                if self.bit_ct < FM_BYTE_LEN {
                    return;
                }
                self.bit_ct = 0;
                let (_clock, data) = fm::decode_word(self.shift_reg);
                if self.core.push_byte(data) {
                    if state == DecoderState::Address {
                        self.complete_address();
                    }
                    else {
                        self.complete_data(position);
                    }
                }
            }
        }
    }
}
