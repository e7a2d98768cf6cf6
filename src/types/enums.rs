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

    enums.rs

    Defines common enum types

*/

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use strum::EnumIter;

/// The channel encoding ("modulation") of a track.
/// fluxsector supports five families of modulation:
/// * Fm: IBM System 34 single density Frequency Modulation.
/// * Mfm: IBM System 34 double density Modified Frequency Modulation.
/// * AmigaMfm: Amiga trackdisk format, MFM with odd/even interleaved fields.
/// * CommodoreGcr: Commodore 1541 style 4-to-5 Group Code Recording.
/// * AppleGcr: Apple II 5&3 (13 sector) and 6&2 (16 sector) Group Code Recording.
///
/// Iterating this enum with [strum::IntoEnumIterator] yields the order in which modulations are
/// tried when no modulation hint is given.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modulation {
    #[doc = "IBM System 34 Frequency Modulation, used by 8&quot; and single density diskettes."]
    Fm,
    #[default]
    #[doc = "IBM System 34 Modified Frequency Modulation, used by most PC diskettes."]
    Mfm,
    #[doc = "Amiga trackdisk MFM with odd/even split fields and XOR checksums."]
    AmigaMfm,
    #[doc = "Commodore 4-to-5 GCR as used by the 1541 and compatible drives."]
    CommodoreGcr,
    #[doc = "Apple II GCR, either 5&3 (DOS 3.2) or 6&2 (DOS 3.3 and later)."]
    AppleGcr,
}

impl Modulation {
    /// Return the nominal channel bit (cell) rate of this modulation at the given density, in
    /// cells per second. Commodore GCR uses speed zones; the zone is selected by the physical
    /// track number. GCR formats are only recorded at double density.
    pub fn cell_rate(&self, physical_track: u8, density: TrackDensity) -> u32 {
        let base = match self {
            Modulation::Fm => 250_000,
            Modulation::Mfm => 500_000,
            Modulation::AmigaMfm => 500_000,
            Modulation::CommodoreGcr => return commodore_zone_rate(physical_track),
            Modulation::AppleGcr => return 250_000,
        };
        match density {
            TrackDensity::Double => base,
            TrackDensity::High => base * 2,
        }
    }

    /// Return the densities this modulation is found at, in the order they are tried.
    pub fn densities(&self) -> &'static [TrackDensity] {
        match self {
            Modulation::Fm | Modulation::Mfm | Modulation::AmigaMfm => &[TrackDensity::Double, TrackDensity::High],
            Modulation::CommodoreGcr | Modulation::AppleGcr => &[TrackDensity::Double],
        }
    }

    /// Return the number of bitcells in the shortest legal interval between two flux
    /// transitions.
    pub fn shortest_interval_cells(&self) -> u32 {
        match self {
            Modulation::Mfm | Modulation::AmigaMfm => 2,
            Modulation::Fm | Modulation::CommodoreGcr | Modulation::AppleGcr => 1,
        }
    }

    /// Return the data length to assume when a size code is out of range, or when the format
    /// carries no size code at all.
    pub fn default_sector_size(&self) -> usize {
        match self {
            Modulation::Fm => 128,
            Modulation::Mfm => 512,
            Modulation::AmigaMfm => 512,
            Modulation::CommodoreGcr => 256,
            Modulation::AppleGcr => 256,
        }
    }

    /// Return the size code recorded for sectors of formats that carry no size code.
    pub fn implied_size_code(&self) -> u8 {
        match self {
            Modulation::Fm => 0,
            Modulation::Mfm | Modulation::AmigaMfm => 2,
            Modulation::CommodoreGcr | Modulation::AppleGcr => 1,
        }
    }
}

impl Display for Modulation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Modulation::Fm => write!(f, "FM"),
            Modulation::Mfm => write!(f, "MFM"),
            Modulation::AmigaMfm => write!(f, "Amiga MFM"),
            Modulation::CommodoreGcr => write!(f, "Commodore GCR"),
            Modulation::AppleGcr => write!(f, "Apple GCR"),
        }
    }
}

/// The recording density of a track. FM and MFM double density diskettes are written at 250
/// or 500 thousand cells per second, high density diskettes at twice that.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackDensity {
    #[default]
    Double,
    High,
}

impl Display for TrackDensity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TrackDensity::Double => write!(f, "Double"),
            TrackDensity::High => write!(f, "High"),
        }
    }
}

/// Return the cell rate of the Commodore speed zone containing the given zero-based physical
/// track. Tracks beyond 40 fall into the slowest zone.
pub fn commodore_zone_rate(physical_track: u8) -> u32 {
    match physical_track {
        0..=16 => 307_692,
        17..=23 => 285_714,
        24..=29 => 266_667,
        _ => 250_000,
    }
}

/// The order in which a linear byte offset walks the heads of a double-sided disk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterleavePolicy {
    #[doc = "All tracks of head 0, followed by all tracks of head 1."]
    Sequenced,
    #[default]
    #[doc = "Head 0 then head 1 of each track before moving to the next track."]
    Interleaved,
}

/// The secondary sort key applied within each physical track by [crate::SectorStore::sort].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortPolicy {
    #[default]
    #[doc = "Sort by logical sector id."]
    LogicalSector,
    #[doc = "Sort by the position of the data field within one revolution of the given length in sample ticks."]
    RotationalPosition { revolution_ticks: u64 },
}
