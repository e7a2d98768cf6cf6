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

    src/lib.rs

*/

//! # fluxsector
//!
//! fluxsector recovers sector data from raw floppy disk flux timing captures.
//!
//! A capture is a buffer of flux transition intervals, each byte holding the number of
//! sampling-clock ticks since the previous transition. The buffer is run through a software
//! phase-locked loop ([flux::pll::Pll]) or a fixed bucket slicer ([flux::bucket::BucketSlicer]) to
//! recover channel bits, which are then fed to one of the modulation decoders in [track_schema].
//! Decoders validate address and data fields and insert the resulting [SectorRecord]s into a
//! [SectorStore], which can then be queried, sorted, or read as a linear disk image.
//!
//! The following modulations are supported:
//! * IBM System 34 style FM and MFM
//! * Amiga MFM
//! * Commodore 4-to-5 GCR
//! * Apple 5&3 (13 sector) and 6&2 (16 sector) GCR
//!
//! ```no_run
//! use fluxsector::prelude::*;
//!
//! let samples: Vec<u8> = Vec::new();
//! let mut store = SectorStore::new();
//! let decoder = FluxDecoder::new(DecoderConfig::default());
//! let context = TrackContext::new(0, 0, 24_000_000);
//! let summary = decoder.decode(&mut store, &samples, &context, Some(Modulation::Mfm), true);
//! ```
pub mod bitstream_codec;
pub mod capture;
pub mod flux;
mod flux_decoder;
pub mod sector_store;
pub mod sector_view;
pub mod track_schema;
pub mod types;
pub mod util;

use thiserror::Error;

/// The largest sector payload a decoder will accept, corresponding to size code 7.
pub const MAXIMUM_SECTOR_SIZE: usize = 16384;
pub const DEFAULT_SECTOR_SIZE: usize = 512;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FluxSectorError {
    #[error("Invalid parameters were specified to a library function: {0}")]
    ParameterError(String),
    #[error("The sample source failed to produce a capture: {0}")]
    CaptureError(String),
    #[error("Disk geometry could not be determined from the sector store")]
    GeometryError,
    #[error("The requested offset lies outside the disk")]
    SeekError,
}

pub use crate::{
    capture::{Capture, CaptureSession, SampleSource},
    flux::{pll::PllConfig, BitSink, FluxStats, RecoveredBit},
    flux_decoder::{DecodeSummary, DecoderConfig, FluxDecoder, PassSummary, TrackContext},
    sector_store::{SectorStore, StoreExtents},
    sector_view::{AbsoluteCursor, NullAcquirer, StoreGeometry, TrackAcquirer},
    track_schema::DecodeStats,
    types::{DecodeFlags, InterleavePolicy, Modulation, SectorIdentity, SectorRecord, SortPolicy, TrackDensity},
};

pub mod prelude {
    pub use crate::{
        capture::{Capture, CaptureSession, SampleSource},
        flux::{pll::PllConfig, BitSink, FluxStats},
        flux_decoder::{DecodeSummary, DecoderConfig, FluxDecoder, TrackContext},
        sector_store::SectorStore,
        sector_view::{NullAcquirer, TrackAcquirer},
        types::{DecodeFlags, InterleavePolicy, Modulation, SectorRecord, SortPolicy, TrackDensity},
        FluxSectorError,
    };
}
