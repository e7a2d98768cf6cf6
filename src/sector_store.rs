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

    src/sector_store.rs

    Implements the SectorStore collection of decoded sector records.

*/

//! The [SectorStore], an insertion-ordered collection of decoded sector records.
//!
//! Records are deduplicated on their full [SectorIdentity]: a sector captured twice with the
//! same contents is stored once, while the same logical sector captured with differing
//! checksums is kept once per variant. Extent statistics are maintained on every insert.
//!
//! The absolute offset read interface lives in [crate::sector_view].

use std::collections::HashSet;

use crate::{
    sector_view::{StoreGeometry, ViewState},
    types::{SectorIdentity, SectorRecord, SortPolicy},
};

/// Minimum and maximum values seen across all records in a store. Tracks and heads are
/// physical; sector ids and size codes are logical.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreExtents {
    pub min_track: u8,
    pub max_track: u8,
    pub min_head: u8,
    pub max_head: u8,
    pub min_sector: u8,
    pub max_sector: u8,
    pub min_size_code: u8,
    pub max_size_code: u8,
}

impl StoreExtents {
    fn from_record(record: &SectorRecord) -> Self {
        StoreExtents {
            min_track: record.physical_track,
            max_track: record.physical_track,
            min_head: record.physical_head,
            max_head: record.physical_head,
            min_sector: record.logical_sector,
            max_sector: record.logical_sector,
            min_size_code: record.logical_size_code,
            max_size_code: record.logical_size_code,
        }
    }

    fn update(&mut self, record: &SectorRecord) {
        self.min_track = self.min_track.min(record.physical_track);
        self.max_track = self.max_track.max(record.physical_track);
        self.min_head = self.min_head.min(record.physical_head);
        self.max_head = self.max_head.max(record.physical_head);
        self.min_sector = self.min_sector.min(record.logical_sector);
        self.max_sector = self.max_sector.max(record.logical_sector);
        self.min_size_code = self.min_size_code.min(record.logical_size_code);
        self.max_size_code = self.max_size_code.max(record.logical_size_code);
    }
}

#[derive(Debug, Default)]
pub struct SectorStore {
    records: Vec<SectorRecord>,
    identities: HashSet<SectorIdentity>,
    extents: Option<StoreExtents>,
    pub(crate) geometry: Option<StoreGeometry>,
    pub(crate) view: Option<ViewState>,
}

impl SectorStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record unless a record with an identical identity is already present.
    /// Returns true if the record was inserted.
    pub fn insert(&mut self, record: SectorRecord) -> bool {
        if !self.identities.insert(record.identity()) {
            log::trace!("SectorStore::insert(): duplicate record {}", record);
            return false;
        }
        debug_assert!(record.positions_ordered());

        match &mut self.extents {
            Some(extents) => extents.update(&record),
            None => self.extents = Some(StoreExtents::from_record(&record)),
        }
        log::trace!("SectorStore::insert(): {}", record);
        self.records.push(record);
        true
    }

    /// Find the record with exactly the given identity.
    pub fn find_exact(&self, identity: &SectorIdentity) -> Option<&SectorRecord> {
        if !self.identities.contains(identity) {
            return None;
        }
        self.records.iter().find(|r| r.identity() == *identity)
    }

    /// Find the first record, in current order, with the given logical address.
    pub fn find_by_logical(&self, track: u8, head: u8, sector: u8) -> Option<&SectorRecord> {
        self.records
            .iter()
            .find(|r| r.logical_track == track && r.logical_head == head && r.logical_sector == sector)
    }

    /// Find the first record, in current order, captured from the given physical track and head
    /// with the given logical sector id.
    pub fn find_by_physical_and_logical_sector(
        &self,
        physical_track: u8,
        physical_head: u8,
        logical_sector: u8,
    ) -> Option<&SectorRecord> {
        self.records.iter().find(|r| {
            r.physical_track == physical_track
                && r.physical_head == physical_head
                && r.logical_sector == logical_sector
        })
    }

    /// Return the `n`th record, in current order, captured from the given physical track and
    /// head.
    pub fn find_nth(&self, physical_track: u8, physical_head: u8, n: usize) -> Option<&SectorRecord> {
        self.on_track(physical_track, physical_head).nth(n)
    }

    /// Return the number of records captured from the given physical track and head.
    pub fn count(&self, physical_track: u8, physical_head: u8) -> usize {
        self.on_track(physical_track, physical_head).count()
    }

    fn on_track(&self, physical_track: u8, physical_head: u8) -> impl Iterator<Item = &SectorRecord> {
        self.records
            .iter()
            .filter(move |r| r.physical_track == physical_track && r.physical_head == physical_head)
    }

    /// Sort records by physical track and head, then by the key selected by `policy`. The sort
    /// is stable, so records with equal keys keep their insertion order.
    pub fn sort(&mut self, policy: SortPolicy) {
        self.records.sort_by(|a, b| {
            let physical = (a.physical_track, a.physical_head).cmp(&(b.physical_track, b.physical_head));
            physical.then_with(|| match policy {
                SortPolicy::LogicalSector => a.logical_sector.cmp(&b.logical_sector),
                SortPolicy::RotationalPosition { revolution_ticks } => {
                    rotational_offset(a.data_position, revolution_ticks)
                        .cmp(&rotational_offset(b.data_position, revolution_ticks))
                }
            })
        });
    }

    pub fn extents(&self) -> Option<StoreExtents> {
        self.extents
    }

    /// Return the sorted, deduplicated list of logical sector ids present on a physical track.
    pub fn presence_map(&self, physical_track: u8, physical_head: u8) -> Vec<u8> {
        let mut ids: Vec<u8> = self
            .on_track(physical_track, physical_head)
            .map(|r| r.logical_sector)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Move all records of `other` into this store through [SectorStore::insert]. Returns the
    /// number of records inserted.
    pub fn merge(&mut self, other: SectorStore) -> usize {
        let offered = other.records.len();
        let inserted = other.records.into_iter().fold(0, |acc, r| {
            if self.insert(r) {
                acc + 1
            }
            else {
                acc
            }
        });
        log::debug!(
            "SectorStore::merge(): inserted {} of {} records",
            inserted,
            offered
        );
        inserted
    }

    /// Remove all records and reset extents and the absolute read cursor. An explicit geometry
    /// set with [SectorStore::set_geometry] is kept.
    pub fn clear(&mut self) {
        self.records.clear();
        self.identities.clear();
        self.extents = None;
        self.view = None;
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectorRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a SectorStore {
    type Item = &'a SectorRecord;
    type IntoIter = std::slice::Iter<'a, SectorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn rotational_offset(position: u64, revolution_ticks: u64) -> u64 {
    if revolution_ticks == 0 {
        position
    }
    else {
        position % revolution_ticks
    }
}
