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

    src/track_schema/mfm.rs

    Implements the IBM System 34 MFM sector decoder.

*/

//! IBM System 34 MFM decoder.
//!
//! An MFM mark is a run of 0x4489 sync words (0xA1 with a missing clock) followed by a mark
//! byte. Address and data fields are verified with CRC-16/IBM-3740 seeded over the three A1 sync
//! bytes and the mark byte.

use crate::{
    bitstream_codec::mfm::{self, MFM_BYTE_LEN, MFM_SYNC_WORD},
    flux::BitSink,
    track_schema::{
        system34::{SectorIdField, System34Mark, ADDRESS_FIELD_LEN, CRC_LEN, IDAM_MARKER_BYTES},
        DecodeStats,
        DecoderCore,
        DecoderState,
        IdamCache,
    },
    util::crc16_bytes,
};

/// Bytes of the sync prefix (three A1 bytes) stored ahead of the mark byte in each field buffer.
const SYNC_PREFIX_LEN: usize = 3;

pub struct MfmDecoder<'s> {
    core: DecoderCore<'s>,
    shift_reg: u16,
    bit_ct: usize,
    sync_ct: u32,
    mark_pending: bool,
    prev_data_bit: bool,
    clock_errors: u32,
    enforce_clock: bool,
}

impl<'s> MfmDecoder<'s> {
    /// Create an MFM decoder. With `enforce_clock` set, fields containing clock violations are
    /// discarded; otherwise violations are only logged.
    pub fn new(core: DecoderCore<'s>, enforce_clock: bool) -> Self {
        MfmDecoder {
            core,
            shift_reg: 0,
            bit_ct: 0,
            sync_ct: 0,
            mark_pending: false,
            prev_data_bit: false,
            clock_errors: 0,
            enforce_clock,
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        self.core.stats()
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.shift_reg = 0;
        self.bit_ct = 0;
        self.sync_ct = 0;
        self.mark_pending = false;
    }

    fn scan_sync(&mut self, position: u64) {
        if self.shift_reg == MFM_SYNC_WORD {
            self.sync_ct += 1;
            self.bit_ct = 0;
            self.mark_pending = true;
            return;
        }
        if !self.mark_pending {
            return;
        }

        self.bit_ct += 1;
        if self.bit_ct < MFM_BYTE_LEN {
            return;
        }
        self.mark_pending = false;
        self.bit_ct = 0;

        let mark = mfm::decode_word(self.shift_reg);
        if self.sync_ct < 3 {
            log::trace!(
                "MfmDecoder::scan_sync(): mark {:02X} at {} after only {} sync words",
                mark,
                position,
                self.sync_ct
            );
        }
        self.sync_ct = 0;

        let mut prefix = IDAM_MARKER_BYTES;
        prefix[SYNC_PREFIX_LEN] = mark;

        match System34Mark::try_from(mark) {
            Ok(System34Mark::Idam) => {
                self.core
                    .begin_address(position, &prefix, SYNC_PREFIX_LEN + ADDRESS_FIELD_LEN);
                self.begin_field(mark);
            }
            Ok(System34Mark::Dam | System34Mark::Ddam) => {
                if self
                    .core
                    .begin_data(position, &prefix, |len| SYNC_PREFIX_LEN + 1 + len + CRC_LEN)
                {
                    self.begin_field(mark);
                }
            }
            // The index mark uses C2 sync words and never follows A1 sync.
            Ok(System34Mark::Iam) | Err(_) => {
                log::trace!("MfmDecoder::scan_sync(): ignoring mark {:02X} at {}", mark, position);
            }
        }
    }

    fn begin_field(&mut self, mark: u8) {
        self.bit_ct = 0;
        self.prev_data_bit = mark & 1 != 0;
        self.clock_errors = 0;
    }

    /// Check the clock violation count of a completed field. Returns false if the field should
    /// be discarded.
    fn check_clock(&mut self) -> bool {
        if self.clock_errors == 0 {
            return true;
        }
        log::trace!(
            "MfmDecoder::check_clock(): {} clock violations in field at {}",
            self.clock_errors,
            self.core.field_position()
        );
        if self.enforce_clock {
            self.core.abort_field();
            return false;
        }
        true
    }

    fn complete_address(&mut self) {
        if !self.check_clock() {
            return;
        }
        let (recorded, calculated) = crc16_bytes(self.core.buffer());
        if recorded != calculated {
            self.core.reject_address(recorded as u32, calculated as u32);
            return;
        }
        match SectorIdField::parse(&self.core.buffer()[SYNC_PREFIX_LEN..]) {
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
        if !self.check_clock() {
            return;
        }
        let buffer = self.core.buffer();
        let len = buffer.len();
        let mark = buffer[SYNC_PREFIX_LEN];
        let (recorded, calculated) = crc16_bytes(buffer);

        if recorded == calculated {
            let data = buffer[SYNC_PREFIX_LEN + 1..len - CRC_LEN].to_vec();
            self.core.insert_sector(data, mark, calculated as u32, position);
        }
        else {
            self.core.reject_data(recorded as u32, calculated as u32);
        }
    }
}

impl BitSink for MfmDecoder<'_> {
    fn push_bit(&mut self, bit: bool, position: u64) {
        self.shift_reg = (self.shift_reg << 1) | bit as u16;

        match self.core.state() {
            DecoderState::Sync => self.scan_sync(position),
            state @ (DecoderState::Address | DecoderState::Data) => {
                self.bit_ct += 1;
                if self.bit_ct < MFM_BYTE_LEN {
                    return;
                }
                self.bit_ct = 0;

                let byte = mfm::decode_word(self.shift_reg);
                self.clock_errors += mfm::clock_violations(self.shift_reg, self.prev_data_bit);
                self.prev_data_bit = byte & 1 != 0;

                if self.core.push_byte(byte) {
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
