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

    src/track_schema/commodore.rs

    Implements the Commodore 1541 GCR sector decoder.

*/

//! Commodore 1541 GCR decoder.
//!
//! Every block starts after a sync run of at least ten one bits. The first GCR byte after sync
//! identifies the block:
//!
//! * `0x08` - a header block: checksum, sector, track, two disk id bytes and two 0x0F pad bytes.
//!   The checksum is the XOR of sector, track and the id bytes.
//! * `0x07` - a data block: 256 data bytes followed by their XOR checksum.
//!
//! The format carries no head number or size code. Sectors are recorded on head 0 with an
//! implied size code of 1 (256 bytes).

use std::io::Cursor;

use binrw::{binrw, BinRead};

use crate::{
    bitstream_codec::gcr::{decode_group, GCR_GROUP_LEN, GCR_SYNC_MIN_ONES},
    flux::BitSink,
    track_schema::{DecodeStats, DecoderCore, DecoderState, IdamCache},
    types::Modulation,
    util::xor_bytes,
};

pub const HEADER_BLOCK_ID: u8 = 0x08;
pub const DATA_BLOCK_ID: u8 = 0x07;
/// Header block bytes up to and including the second disk id byte.
pub const HEADER_LEN: usize = 6;

#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct CommodoreHeader {
    pub block_id: u8,
    pub checksum: u8,
    pub sector: u8,
    pub track: u8,
    pub id2: u8,
    pub id1: u8,
}

impl CommodoreHeader {
    pub fn parse(field: &[u8]) -> Option<CommodoreHeader> {
        CommodoreHeader::read(&mut Cursor::new(field)).ok()
    }

    pub fn calculated_checksum(&self) -> u8 {
        self.sector ^ self.track ^ self.id2 ^ self.id1
    }
}

enum GcrShift {
    Pending,
    Byte(u8),
    Invalid(u8),
}

pub struct CommodoreDecoder<'s> {
    core: DecoderCore<'s>,
    ones_ct: u32,
    group: u8,
    group_bits: usize,
    high_nybble: Option<u8>,
    // Collecting the block id byte after a sync run.
    block_pending: bool,
    block_position: u64,
}

impl<'s> CommodoreDecoder<'s> {
    pub fn new(core: DecoderCore<'s>) -> Self {
        CommodoreDecoder {
            core,
            ones_ct: 0,
            group: 0,
            group_bits: 0,
            high_nybble: None,
            block_pending: false,
            block_position: 0,
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        self.core.stats()
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.ones_ct = 0;
        self.block_pending = false;
        self.clear_groups();
    }

    fn clear_groups(&mut self) {
        self.group = 0;
        self.group_bits = 0;
        self.high_nybble = None;
    }

    fn shift_gcr(&mut self, bit: bool) -> GcrShift {
        self.group = (self.group << 1) | bit as u8;
        self.group_bits += 1;
        if self.group_bits < GCR_GROUP_LEN {
            return GcrShift::Pending;
        }

        let group = self.group;
        self.group = 0;
        self.group_bits = 0;
        let Some(nybble) = decode_group(group)
        else {
            self.high_nybble = None;
            return GcrShift::Invalid(group);
        };

        match self.high_nybble.take() {
            Some(high) => GcrShift::Byte((high << 4) | nybble),
            None => {
                self.high_nybble = Some(nybble);
                GcrShift::Pending
            }
        }
    }

    fn begin_block(&mut self, block_id: u8) {
        let position = self.block_position;
        match block_id {
            HEADER_BLOCK_ID => self.core.begin_address(position, &[block_id], HEADER_LEN),
            DATA_BLOCK_ID => {
                self.core.begin_data(position, &[block_id], |len| 1 + len + 1);
            }
            _ => {
                log::trace!(
                    "CommodoreDecoder::begin_block(): unknown block id {:02X} at {}",
                    block_id,
                    position
                );
            }
        }
    }

    fn complete_header(&mut self) {
        let Some(header) = CommodoreHeader::parse(self.core.buffer())
        else {
            self.core.abort_field();
            return;
        };
        let calculated = header.calculated_checksum();
        if header.checksum != calculated {
            self.core.reject_address(header.checksum as u32, calculated as u32);
            return;
        }
        let idam = IdamCache::new(
            Modulation::CommodoreGcr,
            header.track,
            0,
            header.sector,
            Modulation::CommodoreGcr.implied_size_code(),
            header.checksum as u32,
            self.core.field_position(),
        );
        self.core.accept_address(idam);
    }

    fn complete_data(&mut self, position: u64) {
        let buffer = self.core.buffer();
        let len = buffer.len();
        let recorded = buffer[len - 1];
        let calculated = xor_bytes(&buffer[1..len - 1]);

        if recorded == calculated {
            let data = buffer[1..len - 1].to_vec();
            self.core
                .insert_sector(data, DATA_BLOCK_ID, calculated as u32, position);
        }
        else {
            self.core.reject_data(recorded as u32, calculated as u32);
        }
    }
}

impl BitSink for CommodoreDecoder<'_> {
    fn push_bit(&mut self, bit: bool, position: u64) {
        let sync_run = self.ones_ct;
        self.ones_ct = if bit { self.ones_ct + 1 } else { 0 };

        match self.core.state() {
            DecoderState::Sync => {
                if !self.block_pending {
                    // The first bit of every block id is a zero, ending the sync run.
                    if !bit && sync_run >= GCR_SYNC_MIN_ONES {
                        self.block_pending = true;
                        self.block_position = position;
                        self.clear_groups();
                        self.group_bits = 1;
                    }
                    return;
                }
                match self.shift_gcr(bit) {
                    GcrShift::Pending => {}
                    GcrShift::Invalid(group) => {
                        log::trace!(
                            "CommodoreDecoder::push_bit(): invalid GCR group {:05b} after sync at {}",
                            group,
                            self.block_position
                        );
                        self.block_pending = false;
                    }
                    GcrShift::Byte(block_id) => {
                        self.block_pending = false;
                        self.begin_block(block_id);
                    }
                }
            }
            state @ (DecoderState::Address | DecoderState::Data) => match self.shift_gcr(bit) {
                GcrShift::Pending => {}
                GcrShift::Invalid(_) => self.core.abort_field(),
                GcrShift::Byte(byte) => {
                    if self.core.push_byte(byte) {
                        if state == DecoderState::Address {
                            self.complete_header();
                        }
                        else {
                            self.complete_data(position);
                        }
                    }
                }
            },
        }
    }
}
