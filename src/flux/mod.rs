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

    src/flux/mod.rs

    Defines flux statistics and the BitSink trait connecting clock recovery to the
    modulation decoders

*/

//! Bit clock recovery from flux transition intervals.
//!
//! A flux capture is a sequence of intervals, each the number of sampling-clock ticks between two
//! flux transitions. The [pll::Pll] and the simpler [bucket::BucketSlicer] both turn intervals
//! into channel bits, which they hand to a [BitSink] one at a time.

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use bit_vec::BitVec;

#[doc(hidden)]
#[macro_export]
macro_rules! format_ticks {
    ($value:expr) => {
        format!("{:.3}t", $value)
    };
}

pub mod bucket;
#[cfg(feature = "flux")]
pub mod histogram;
pub mod pll;

/// A single recovered channel bit and the sample position at which its bitcell ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecoveredBit {
    pub bit: bool,
    pub position: u64,
}

/// A consumer of recovered channel bits. Modulation decoders implement this trait so that a
/// clock recovery stage can drive them directly.
pub trait BitSink {
    fn push_bit(&mut self, bit: bool, position: u64);
}

impl BitSink for BitVec {
    fn push_bit(&mut self, bit: bool, _position: u64) {
        self.push(bit);
    }
}

impl BitSink for Vec<RecoveredBit> {
    fn push_bit(&mut self, bit: bool, position: u64) {
        self.push(RecoveredBit { bit, position });
    }
}

/// A classification of a flux interval by the number of bitcells it spans, relative to the
/// shortest legal interval of the modulation being decoded.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FluxTransition {
    Short,
    Medium,
    Long,
    Other,
}

impl Display for FluxTransition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FluxTransition::Short => write!(f, "S"),
            FluxTransition::Medium => write!(f, "M"),
            FluxTransition::Long => write!(f, "L"),
            FluxTransition::Other => write!(f, "X"),
        }
    }
}

impl FluxTransition {
    pub fn from_cells(cells: u32, shortest_cells: u32) -> FluxTransition {
        match cells.checked_sub(shortest_cells) {
            Some(0) => FluxTransition::Short,
            Some(1) => FluxTransition::Medium,
            Some(2) => FluxTransition::Long,
            _ => FluxTransition::Other,
        }
    }
}

/// Statistics gathered by a clock recovery stage over one decode pass.
/// Interval lengths are in sample ticks.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FluxStats {
    pub total: u32,
    pub short: u32,
    pub medium: u32,
    pub long: u32,
    /// Intervals too short to be a legal transition, typically two transitions in one bitcell.
    pub too_short: u32,
    /// Intervals longer than the longest legal transition.
    pub too_long: u32,

    pub shortest_flux: f64,
    pub longest_flux:  f64,
    shortest_cells: u32,
}

impl Display for FluxStats {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Total: {} S: {} M: {} L: {} Shortest: {} Longest: {} Too Short: {} Too Long: {}",
            self.total,
            self.short,
            self.medium,
            self.long,
            format_ticks!(self.shortest_flux),
            format_ticks!(self.longest_flux),
            self.too_short,
            self.too_long
        )
    }
}

impl FluxStats {
    pub fn new(shortest_cells: u32) -> Self {
        FluxStats {
            shortest_cells: shortest_cells.max(1),
            ..Default::default()
        }
    }

    /// Record an interval of `ticks` length that was resolved as spanning `cells` bitcells.
    pub fn record(&mut self, ticks: f64, cells: u32) {
        if self.total == 0 || ticks < self.shortest_flux {
            self.shortest_flux = ticks;
        }
        if ticks > self.longest_flux {
            self.longest_flux = ticks;
        }
        self.total += 1;

        if cells < self.shortest_cells {
            self.too_short += 1;
            return;
        }
        match FluxTransition::from_cells(cells, self.shortest_cells) {
            FluxTransition::Short => self.short += 1,
            FluxTransition::Medium => self.medium += 1,
            FluxTransition::Long => self.long += 1,
            FluxTransition::Other => self.too_long += 1,
        }
    }

    /// Record an interval that was discarded without producing a bit.
    pub fn record_discarded(&mut self, ticks: f64) {
        self.total += 1;
        self.too_short += 1;
        if self.total == 1 || ticks < self.shortest_flux {
            self.shortest_flux = ticks;
        }
    }
}
