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

    src/track_schema/apple.rs

    Implements the Apple II GCR sector decoder.

*/

//! Apple II GCR decoder.
//!
//! The disk controller shifts bits into a latch until its high bit is set, producing one disk
//! nibble. Leading zero bits are absorbed by an empty latch, which is what lets self-sync 0xFF
//! nibbles (each followed by two zero bits) bring the latch into nibble alignment.
//!
//! Fields are introduced by three-nibble prologues:
//! * `D5 AA 96` - a 16 sector (6&2) address field.
//! * `D5 AA B5` - a 13 sector (5&3) address field.
//! * `D5 AA AD` - a data field, coded with the scheme of the address field before it.
//!
//! An address field holds volume, track, sector and checksum as 4&4 nibble pairs. The checksum
//! is the XOR of the other three.

use crate::{
    bitstream_codec::nibble::{decode_44, NibbleScheme},
    flux::BitSink,
    track_schema::{DecodeStats, DecoderCore, DecoderState, IdamCache},
    types::Modulation,
};

pub const ADDRESS_PROLOGUE_62: u32 = 0xD5AA96;
pub const ADDRESS_PROLOGUE_53: u32 = 0xD5AAB5;
pub const DATA_PROLOGUE: u32 = 0xD5AAAD;
/// Four 4&4 nibble pairs.
pub const ADDRESS_FIELD_NIBBLES: usize = 8;
pub const APPLE_DATA_TYPE: u8 = 0xAD;

const PROLOGUE_MASK: u32 = 0xFF_FFFF;

/// A decoded Apple address field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AppleAddress {
    pub volume: u8,
    pub track: u8,
    pub sector: u8,
    pub checksum: u8,
}

impl AppleAddress {
    /// Decode an address field from its 8 nibbles, or return None if a nibble pair is not valid
    /// 4&4.
    pub fn from_nibbles(nibbles: &[u8]) -> Option<AppleAddress> {
        if nibbles.len() < ADDRESS_FIELD_NIBBLES {
            return None;
        }
        Some(AppleAddress {
            volume: decode_44(nibbles[0], nibbles[1])?,
            track: decode_44(nibbles[2], nibbles[3])?,
            sector: decode_44(nibbles[4], nibbles[5])?,
            checksum: decode_44(nibbles[6], nibbles[7])?,
        })
    }

    pub fn calculated_checksum(&self) -> u8 {
        self.volume ^ self.track ^ self.sector
    }
}

pub struct AppleDecoder<'s> {
    core: DecoderCore<'s>,
    latch: u8,
    window: u32,
    scheme: NibbleScheme,
}

impl<'s> AppleDecoder<'s> {
    pub fn new(core: DecoderCore<'s>) -> Self {
        AppleDecoder {
            core,
            latch: 0,
            window: 0,
            scheme: NibbleScheme::SixAndTwo,
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        self.core.stats()
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.latch = 0;
        self.window = 0;
    }

    /// The data scheme announced by the most recent address prologue.
    pub fn scheme(&self) -> NibbleScheme {
        self.scheme
    }

    fn scan_prologue(&mut self, nibble: u8, position: u64) {
        self.window = ((self.window << 8) | nibble as u32) & PROLOGUE_MASK;
        match self.window {
            ADDRESS_PROLOGUE_62 | ADDRESS_PROLOGUE_53 => {
                self.scheme = if self.window == ADDRESS_PROLOGUE_53 {
                    NibbleScheme::FiveAndThree
                }
                else {
                    NibbleScheme::SixAndTwo
                };
                self.window = 0;
                self.core.begin_address(position, &[], ADDRESS_FIELD_NIBBLES);
            }
            DATA_PROLOGUE => {
                self.window = 0;
                let nibbles = self.scheme.data_nibbles();
                self.core.begin_data(position, &[], |_| nibbles);
            }
            _ => {}
        }
    }

    fn complete_address(&mut self) {
        let Some(address) = AppleAddress::from_nibbles(self.core.buffer())
        else {
            self.core.abort_field();
            return;
        };
        let calculated = address.calculated_checksum();
        if address.checksum != calculated {
            self.core.reject_address(address.checksum as u32, calculated as u32);
            return;
        }
        let idam = IdamCache::new(
            Modulation::AppleGcr,
            address.track,
            0,
            address.sector,
            Modulation::AppleGcr.implied_size_code(),
            address.checksum as u32,
            self.core.field_position(),
        );
        self.core.accept_address(idam);
    }

    fn complete_data(&mut self, position: u64) {
        let scheme = self.scheme;
        let decoded = scheme.decode_sector(self.core.buffer());
        match decoded {
            Some((data, checksum)) => {
                self.core
                    .insert_sector(data, APPLE_DATA_TYPE, checksum as u32, position);
            }
            None => {
                let buffer = self.core.buffer();
                let (body, last) = buffer.split_at(buffer.len().saturating_sub(1));
                let calculated = body
                    .iter()
                    .filter_map(|&n| scheme.decode_nibble(n))
                    .fold(0, |acc, v| acc ^ v);
                let recorded = last.first().and_then(|&n| scheme.decode_nibble(n)).unwrap_or_default();
                self.core.reject_data(recorded as u32, calculated as u32);
            }
        }
    }
}

impl BitSink for AppleDecoder<'_> {
    fn push_bit(&mut self, bit: bool, position: u64) {
        self.latch = (self.latch << 1) | bit as u8;
        if self.latch & 0x80 == 0 {
            return;
        }
        let nibble = self.latch;
        self.latch = 0;

        match self.core.state() {
            DecoderState::Sync => self.scan_prologue(nibble, position),
            DecoderState::Address => {
                if self.core.push_byte(nibble) {
                    self.complete_address();
                }
            }
            DecoderState::Data => {
                if self.scheme.decode_nibble(nibble).is_none() {
                    log::trace!(
                        "AppleDecoder::push_bit(): invalid {:?} nibble {:02X} at {}",
                        self.scheme,
                        nibble,
                        position
                    );
                    self.core.abort_field();
                    return;
                }
                if self.core.push_byte(nibble) {
                    self.complete_data(position);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream_codec::nibble::encode_44;

    #[test]
    fn address_field_decodes_4_and_4() {
        let mut nibbles = Vec::new();
        for value in [0xFE, 0x11, 0x05, 0xFE ^ 0x11 ^ 0x05] {
            nibbles.extend_from_slice(&encode_44(value));
        }
        let address = AppleAddress::from_nibbles(&nibbles).unwrap();
        assert_eq!(address.volume, 0xFE);
        assert_eq!(address.track, 0x11);
        assert_eq!(address.sector, 5);
        assert_eq!(address.checksum, address.calculated_checksum());
    }
}
