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

    src/sector_view.rs

    Implements absolute offset reads over a SectorStore.

*/

//! A linear byte view over the records of a [SectorStore].
//!
//! [SectorStore::absolute_seek] translates a byte offset into a track, head, sector id and
//! intra-sector offset, and [SectorStore::absolute_read] reads forward from there as if the
//! store were a raw sector image. When a sector is missing, the read asks a [TrackAcquirer] to
//! capture and decode its track once, then retries. A sector still missing ends the read early.

use crate::{
    sector_store::SectorStore,
    types::{data_length_for, InterleavePolicy},
    FluxSectorError,
    DEFAULT_SECTOR_SIZE,
};

/// The layout used to translate byte offsets into sector addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreGeometry {
    pub sectors_per_track: u8,
    #[doc = "The id of the first sector of each track, usually 1 for IBM formats and 0 for Amiga and GCR formats."]
    pub first_sector: u8,
    pub sector_size: usize,
    pub heads: u8,
}

impl StoreGeometry {
    /// Sector ids are a byte, so the last sector of a track must not pass 255.
    fn is_valid(&self) -> bool {
        self.sectors_per_track > 0
            && self.first_sector as u16 + self.sectors_per_track as u16 <= 256
            && self.sector_size > 0
            && (1..=2).contains(&self.heads)
    }

    fn track_size(&self) -> u64 {
        self.sectors_per_track as u64 * self.sector_size as u64
    }
}

/// A sector address within the linear view.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AbsoluteCursor {
    pub track: u8,
    pub head: u8,
    pub sector_id: u8,
    #[doc = "Byte offset within the sector."]
    pub offset: usize,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct ViewState {
    offset: u64,
    policy: InterleavePolicy,
    track_count: u8,
    geometry: StoreGeometry,
}

impl ViewState {
    fn total_size(&self) -> u64 {
        self.geometry.track_size() * self.geometry.heads as u64 * self.track_count as u64
    }

    fn locate(&self, offset: u64) -> AbsoluteCursor {
        let geometry = &self.geometry;
        let spt = geometry.sectors_per_track as u64;
        let heads = geometry.heads as u64;
        let index = offset / geometry.sector_size as u64;
        let sector_id = geometry.first_sector as u64 + index % spt;

        let (track, head) = match self.policy {
            InterleavePolicy::Interleaved => (index / (spt * heads), (index / spt) % heads),
            InterleavePolicy::Sequenced => {
                let track_count = self.track_count as u64;
                ((index / spt) % track_count, index / (spt * track_count))
            }
        };

        AbsoluteCursor {
            track: track as u8,
            head: head as u8,
            sector_id: sector_id as u8,
            offset: (offset % geometry.sector_size as u64) as usize,
        }
    }
}

/// Captures and decodes a track into a store on demand.
pub trait TrackAcquirer {
    fn acquire(&mut self, track: u8, head: u8, store: &mut SectorStore) -> Result<(), FluxSectorError>;
}

/// A [TrackAcquirer] with no capture source. Missing sectors always end a read.
pub struct NullAcquirer;

impl TrackAcquirer for NullAcquirer {
    fn acquire(&mut self, _track: u8, _head: u8, _store: &mut SectorStore) -> Result<(), FluxSectorError> {
        Ok(())
    }
}

impl SectorStore {
    /// Set an explicit geometry for absolute reads, or None to infer it from the store's
    /// extents.
    pub fn set_geometry(&mut self, geometry: Option<StoreGeometry>) {
        self.geometry = geometry;
    }

    /// Return the explicit geometry if one was set, otherwise infer one from the extents:
    /// sector ids span `min_sector..=max_sector`, the sector size follows the largest size code,
    /// and the disk is double-sided if any record was captured from head 1.
    pub fn geometry(&self) -> Option<StoreGeometry> {
        if self.geometry.is_some() {
            return self.geometry;
        }
        let extents = self.extents()?;
        Some(StoreGeometry {
            sectors_per_track: (extents.max_sector - extents.min_sector).saturating_add(1),
            first_sector: extents.min_sector,
            sector_size: data_length_for(extents.max_size_code, DEFAULT_SECTOR_SIZE),
            heads: if extents.max_head >= 1 { 2 } else { 1 },
        })
    }

    /// Position the absolute read cursor at byte `offset` of a disk of `track_count` tracks,
    /// walking heads according to `policy`.
    pub fn absolute_seek(
        &mut self,
        offset: u64,
        policy: InterleavePolicy,
        track_count: u8,
    ) -> Result<AbsoluteCursor, FluxSectorError> {
        let geometry = self
            .geometry()
            .filter(|g| g.is_valid() && track_count > 0)
            .ok_or(FluxSectorError::GeometryError)?;

        let view = ViewState {
            offset,
            policy,
            track_count,
            geometry,
        };
        if offset >= view.total_size() {
            log::debug!(
                "SectorStore::absolute_seek(): offset {} beyond disk size {}",
                offset,
                view.total_size()
            );
            return Err(FluxSectorError::SeekError);
        }

        let cursor = view.locate(offset);
        log::trace!(
            "SectorStore::absolute_seek(): offset {} -> c:{} h:{} s:{} +{}",
            offset,
            cursor.track,
            cursor.head,
            cursor.sector_id,
            cursor.offset
        );
        self.view = Some(view);
        Ok(cursor)
    }

    /// Return the cursor of the current absolute read position, if a seek has been performed
    /// and the position is within the disk.
    pub fn absolute_cursor(&self) -> Option<AbsoluteCursor> {
        self.view
            .filter(|v| v.offset < v.total_size())
            .map(|v| v.locate(v.offset))
    }

    /// Read from the current absolute position into `buf`, advancing the position. Returns the
    /// number of bytes read, which is short if the end of the disk is reached or a sector is
    /// missing even after `acquirer` has been asked for its track.
    ///
    /// Sectors with less data than the geometry's sector size read as zeros past their end.
    pub fn absolute_read(&mut self, buf: &mut [u8], acquirer: &mut dyn TrackAcquirer) -> Result<usize, FluxSectorError> {
        let Some(mut view) = self.view
        else {
            return Err(FluxSectorError::SeekError);
        };
        let sector_size = view.geometry.sector_size;
        let total = view.total_size();
        let mut read = 0;

        while read < buf.len() && view.offset < total {
            let cursor = view.locate(view.offset);
            let len = (sector_size - cursor.offset).min(buf.len() - read);
            let dest = &mut buf[read..read + len];

            let mut copied = self.copy_sector(&cursor, dest);
            if !copied {
                log::debug!(
                    "SectorStore::absolute_read(): sector c:{} h:{} s:{} missing, acquiring track",
                    cursor.track,
                    cursor.head,
                    cursor.sector_id
                );
                match acquirer.acquire(cursor.track, cursor.head, self) {
                    Ok(()) => copied = self.copy_sector(&cursor, dest),
                    Err(e) => {
                        log::warn!(
                            "SectorStore::absolute_read(): acquisition of track {} head {} failed: {}",
                            cursor.track,
                            cursor.head,
                            e
                        );
                    }
                }
            }
            if !copied {
                log::warn!(
                    "SectorStore::absolute_read(): sector c:{} h:{} s:{} unavailable, short read of {} bytes",
                    cursor.track,
                    cursor.head,
                    cursor.sector_id,
                    read
                );
                break;
            }

            read += len;
            view.offset += len as u64;
        }

        self.view = Some(view);
        Ok(read)
    }

    fn copy_sector(&self, cursor: &AbsoluteCursor, dest: &mut [u8]) -> bool {
        let Some(record) = self.find_by_physical_and_logical_sector(cursor.track, cursor.head, cursor.sector_id)
        else {
            return false;
        };
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = record.data.get(cursor.offset + i).copied().unwrap_or(0);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Modulation, SectorRecord};

    fn geometry() -> StoreGeometry {
        StoreGeometry {
            sectors_per_track: 9,
            first_sector: 1,
            sector_size: 512,
            heads: 2,
        }
    }

    #[test]
    fn seek_without_geometry_fails() {
        let mut store = SectorStore::new();
        assert_eq!(
            store.absolute_seek(0, InterleavePolicy::Interleaved, 40),
            Err(FluxSectorError::GeometryError)
        );
    }

    #[test]
    fn sector_ids_past_255_are_rejected() {
        let mut store = SectorStore::new();
        store.set_geometry(Some(StoreGeometry {
            sectors_per_track: 20,
            first_sector: 250,
            ..geometry()
        }));
        assert_eq!(
            store.absolute_seek(0, InterleavePolicy::Interleaved, 40),
            Err(FluxSectorError::GeometryError)
        );

        store.set_geometry(Some(StoreGeometry {
            sectors_per_track: 6,
            first_sector: 250,
            ..geometry()
        }));
        let cursor = store.absolute_seek(5 * 512, InterleavePolicy::Interleaved, 40).unwrap();
        assert_eq!(cursor.sector_id, 255);
    }

    #[test]
    fn interleaved_seek_alternates_heads() {
        let mut store = SectorStore::new();
        store.set_geometry(Some(geometry()));
        // Sixth sector of track 0.
        let cursor = store.absolute_seek(2560, InterleavePolicy::Interleaved, 40).unwrap();
        assert_eq!((cursor.track, cursor.head, cursor.sector_id, cursor.offset), (0, 0, 6, 0));
        // Tenth sector is the first of head 1.
        let cursor = store.absolute_seek(9 * 512 + 3, InterleavePolicy::Interleaved, 40).unwrap();
        assert_eq!((cursor.track, cursor.head, cursor.sector_id, cursor.offset), (0, 1, 1, 3));
        let cursor = store.absolute_seek(18 * 512, InterleavePolicy::Interleaved, 40).unwrap();
        assert_eq!((cursor.track, cursor.head), (1, 0));
    }

    #[test]
    fn sequenced_seek_walks_head_zero_first() {
        let mut store = SectorStore::new();
        store.set_geometry(Some(geometry()));
        let cursor = store.absolute_seek(9 * 512, InterleavePolicy::Sequenced, 40).unwrap();
        assert_eq!((cursor.track, cursor.head, cursor.sector_id), (1, 0, 1));
        let cursor = store.absolute_seek(40 * 9 * 512, InterleavePolicy::Sequenced, 40).unwrap();
        assert_eq!((cursor.track, cursor.head, cursor.sector_id), (0, 1, 1));
    }

    #[test]
    fn seek_past_end_fails() {
        let mut store = SectorStore::new();
        store.set_geometry(Some(geometry()));
        let size = 40 * 2 * 9 * 512;
        assert!(store.absolute_seek(size - 1, InterleavePolicy::Interleaved, 40).is_ok());
        assert_eq!(
            store.absolute_seek(size, InterleavePolicy::Interleaved, 40),
            Err(FluxSectorError::SeekError)
        );
    }

    #[test]
    fn geometry_is_inferred_from_extents() {
        let mut store = SectorStore::new();
        for sector in [1u8, 9] {
            store.insert(SectorRecord {
                physical_track: 0,
                physical_head: 1,
                logical_track: 0,
                logical_head: 1,
                logical_sector: sector,
                logical_size_code: 2,
                modulation: Modulation::Mfm,
                id_position: 0,
                data_position: 0,
                data_end_position: 0,
                id_checksum: 0,
                data_checksum: 0,
                data_type: 0xFB,
                data: vec![0; 512],
            });
        }
        assert_eq!(store.geometry(), Some(geometry()));
    }

    #[test]
    fn read_without_seek_fails() {
        let mut store = SectorStore::new();
        let mut buf = [0u8; 16];
        assert_eq!(
            store.absolute_read(&mut buf, &mut NullAcquirer),
            Err(FluxSectorError::SeekError)
        );
    }
}
