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

    src/track_schema/mod.rs

    Defines the decoder state machine core shared by all modulation decoders.

*/

//! Modulation decoders.
//!
//! Each decoder is a small state machine driven one recovered bit at a time through the
//! [crate::flux::BitSink] trait. All decoders share the same outline:
//!
//! * `Sync` - scan a shift register for the modulation's sync and mark patterns.
//! * `Address` - collect and verify an address field. A valid address field fills the IDAM
//!   cache, which describes the sector the next data field belongs to.
//! * `Data` - collect and verify a data field. A valid data field becomes a
//!   [crate::SectorRecord] built from the IDAM cache and is inserted into the
//!   [crate::SectorStore].
//!
//! A data field is only collected when the IDAM cache is valid, and the cache is invalidated
//! after every data field, so a record is never produced from a data field without a verified
//! address field immediately preceding it. The bookkeeping shared by all decoders lives in
//! [DecoderCore].

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use crate::{
    sector_store::SectorStore,
    types::{data_length_for, Modulation, SectorRecord},
};

pub mod amiga;
pub mod apple;
pub mod commodore;
pub mod dispatch;
pub mod fm;
pub mod meta_encoding;
pub mod mfm;
pub mod system34;

pub use dispatch::ModulationDecoder;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DecoderState {
    #[default]
    Sync,
    Address,
    Data,
}

/// The values of the most recently verified address field.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IdamCache {
    pub track: u8,
    pub head: u8,
    pub sector: u8,
    pub size_code: u8,
    pub id_checksum: u32,
    pub id_position: u64,
    /// Payload length of the data field this address field announces.
    pub data_len: usize,
}

impl IdamCache {
    /// Create a cache entry for an address field with a size code, deriving the data length from
    /// the size code or the modulation default.
    pub fn new(
        modulation: Modulation,
        track: u8,
        head: u8,
        sector: u8,
        size_code: u8,
        id_checksum: u32,
        id_position: u64,
    ) -> Self {
        IdamCache {
            track,
            head,
            sector,
            size_code,
            id_checksum,
            id_position,
            data_len: data_length_for(size_code, modulation.default_sector_size()),
        }
    }
}

impl Display for IdamCache {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "[c:{} h:{} s:{} n:{} at {}]",
            self.track, self.head, self.sector, self.size_code, self.id_position
        )
    }
}

/// Counters describing the work done by one decoder over one pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeStats {
    pub address_marks: u32,
    pub address_ok: u32,
    pub address_bad: u32,
    pub data_marks: u32,
    /// Data marks seen without a valid address field before them.
    pub orphan_data_marks: u32,
    pub data_ok: u32,
    pub data_bad: u32,
    /// Fields abandoned before completion because of invalid codes or allocation failure.
    pub aborted_fields: u32,
    /// Data fields accepted by the duplicator mark CRC heuristic.
    pub recovered: u32,
    pub inserted: u32,
    pub duplicates: u32,
}

impl Display for DecodeStats {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "IDAM: {} ok/{} bad DAM: {} ok/{} bad/{} orphan Aborted: {} Recovered: {} Inserted: {} Duplicates: {}",
            self.address_ok,
            self.address_bad,
            self.data_ok,
            self.data_bad,
            self.orphan_data_marks,
            self.aborted_fields,
            self.recovered,
            self.inserted,
            self.duplicates
        )
    }
}

/// State and bookkeeping shared by every modulation decoder.
pub struct DecoderCore<'s> {
    modulation: Modulation,
    physical_track: u8,
    physical_head: u8,
    state: DecoderState,
    buffer: Vec<u8>,
    field_len: usize,
    field_position: u64,
    idam: Option<IdamCache>,
    last_good: Option<IdamCache>,
    stats: DecodeStats,
    store: &'s mut SectorStore,
}

impl<'s> DecoderCore<'s> {
    pub fn new(modulation: Modulation, physical_track: u8, physical_head: u8, store: &'s mut SectorStore) -> Self {
        DecoderCore {
            modulation,
            physical_track,
            physical_head,
            state: DecoderState::Sync,
            buffer: Vec::new(),
            field_len: 0,
            field_position: 0,
            idam: None,
            last_good: None,
            stats: DecodeStats::default(),
            store,
        }
    }

    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DecodeStats {
        &mut self.stats
    }

    /// The bytes collected so far for the current field, including any prefix.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn idam(&self) -> Option<&IdamCache> {
        self.idam.as_ref()
    }

    /// The most recent verified address field, kept for diagnostics after the IDAM cache is
    /// invalidated.
    pub fn last_good(&self) -> Option<&IdamCache> {
        self.last_good.as_ref()
    }

    /// Sample position of the mark that started the current field.
    pub fn field_position(&self) -> u64 {
        self.field_position
    }

    /// Reset to the `Sync` state, dropping any partial field and the IDAM cache.
    pub fn reset(&mut self) {
        self.state = DecoderState::Sync;
        self.buffer.clear();
        self.field_len = 0;
        self.idam = None;
    }

    /// Start collecting an address field of `field_len` bytes (including `prefix`) at the mark
    /// found at `position`. Any previously cached address is invalidated.
    pub fn begin_address(&mut self, position: u64, prefix: &[u8], field_len: usize) {
        self.stats.address_marks += 1;
        self.idam = None;
        self.buffer.clear();
        self.buffer.extend_from_slice(prefix);
        self.field_len = field_len;
        self.field_position = position;
        self.state = DecoderState::Address;
        log::trace!(
            "DecoderCore::begin_address(): {} address mark at {}",
            self.modulation,
            position
        );
    }

    /// Start collecting a data field at the mark found at `position`, if the IDAM cache is
    /// valid. `field_len` maps the cached payload length to the total field length including
    /// `prefix` and any trailer. Returns false, remaining in `Sync`, if there is no valid IDAM
    /// or the field buffer could not be allocated.
    pub fn begin_data(&mut self, position: u64, prefix: &[u8], field_len: impl FnOnce(usize) -> usize) -> bool {
        self.stats.data_marks += 1;
        let Some(idam) = self.idam
        else {
            self.stats.orphan_data_marks += 1;
            log::trace!(
                "DecoderCore::begin_data(): {} data mark at {} without a valid address field",
                self.modulation,
                position
            );
            self.state = DecoderState::Sync;
            return false;
        };

        let field_len = field_len(idam.data_len);
        self.buffer.clear();
        if let Err(e) = self.buffer.try_reserve_exact(field_len) {
            log::warn!(
                "DecoderCore::begin_data(): could not allocate {} byte field: {}",
                field_len,
                e
            );
            self.abort_field();
            return false;
        }
        self.buffer.extend_from_slice(prefix);
        self.field_len = field_len;
        self.field_position = position;
        self.state = DecoderState::Data;
        true
    }

    /// Append a decoded byte to the current field. Returns true when the field is complete.
    pub fn push_byte(&mut self, byte: u8) -> bool {
        if self.buffer.len() < self.field_len {
            self.buffer.push(byte);
        }
        self.buffer.len() >= self.field_len
    }

    /// Record a verified address field and return to `Sync`.
    pub fn accept_address(&mut self, idam: IdamCache) {
        self.stats.address_ok += 1;
        log::trace!(
            "DecoderCore::accept_address(): {} c:{} h:{} s:{} n:{} at {}",
            self.modulation,
            idam.track,
            idam.head,
            idam.sector,
            idam.size_code,
            idam.id_position
        );
        self.idam = Some(idam);
        self.last_good = Some(idam);
        self.state = DecoderState::Sync;
    }

    /// Discard an address field that failed verification and return to `Sync`.
    pub fn reject_address(&mut self, recorded: u32, calculated: u32) {
        self.stats.address_bad += 1;
        log::trace!(
            "DecoderCore::reject_address(): {} address field at {} checksum mismatch: recorded {:04X} calculated {:04X}, last good {}",
            self.modulation,
            self.field_position,
            recorded,
            calculated,
            self.last_good.map_or_else(|| "none".to_string(), |idam| idam.to_string())
        );
        self.idam = None;
        self.state = DecoderState::Sync;
    }

    /// Build a sector record from the IDAM cache and a verified payload and insert it into the
    /// store. The IDAM cache is consumed either way. Returns true if the record was new.
    pub fn insert_sector(&mut self, data: Vec<u8>, data_type: u8, data_checksum: u32, end_position: u64) -> bool {
        self.stats.data_ok += 1;
        let Some(idam) = self.idam.take()
        else {
            // Unreachable through begin_data(), but never build a record without an address.
            self.state = DecoderState::Sync;
            return false;
        };

        let record = SectorRecord {
            physical_track: self.physical_track,
            physical_head: self.physical_head,
            logical_track: idam.track,
            logical_head: idam.head,
            logical_sector: idam.sector,
            logical_size_code: idam.size_code,
            modulation: self.modulation,
            id_position: idam.id_position,
            data_position: self.field_position,
            data_end_position: end_position,
            id_checksum: idam.id_checksum,
            data_checksum,
            data_type,
            data,
        };

        let inserted = self.store.insert(record);
        if inserted {
            self.stats.inserted += 1;
        }
        else {
            self.stats.duplicates += 1;
        }
        self.buffer.clear();
        self.state = DecoderState::Sync;
        inserted
    }

    /// Discard a data field that failed verification, invalidate the IDAM cache and return to
    /// `Sync`.
    pub fn reject_data(&mut self, recorded: u32, calculated: u32) {
        self.stats.data_bad += 1;
        log::trace!(
            "DecoderCore::reject_data(): {} data field at {} checksum mismatch: recorded {:04X} calculated {:04X}",
            self.modulation,
            self.field_position,
            recorded,
            calculated
        );
        self.buffer.clear();
        self.idam = None;
        self.state = DecoderState::Sync;
    }

    /// Abandon the field in progress, invalidate the IDAM cache and return to `Sync`.
    pub fn abort_field(&mut self) {
        self.stats.aborted_fields += 1;
        log::trace!(
            "DecoderCore::abort_field(): {} abandoning {:?} field at {} after {} bytes",
            self.modulation,
            self.state,
            self.field_position,
            self.buffer.len()
        );
        self.reset();
    }
}
