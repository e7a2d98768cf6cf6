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

    src/flux/bucket.rs

    Implements a fixed threshold interval slicer

*/

//! A fixed three-bucket interval slicer.
//!
//! The slicer is the non-PLL alternative to [crate::flux::pll::Pll]. Each interval is rounded to
//! a whole number of bitcells at a fixed bitcell width, and clamped into the three legal interval
//! lengths of the modulation. It does not track speed variation and is only suitable for clean
//! captures at a known data rate.

use crate::{
    flux::{BitSink, FluxStats},
    format_ticks,
};

pub struct BucketSlicer {
    bitcell: f64,
    shortest_cells: u32,
    stats: FluxStats,
}

impl BucketSlicer {
    /// Create a slicer for a bitcell width in ticks, where the shortest legal interval spans
    /// `shortest_cells` bitcells.
    pub fn new(bitcell: f64, shortest_cells: u32) -> Self {
        debug_assert!(bitcell > 0.0);
        let shortest_cells = shortest_cells.max(1);
        BucketSlicer {
            bitcell,
            shortest_cells,
            stats: FluxStats::new(shortest_cells),
        }
    }

    pub fn stats(&self) -> &FluxStats {
        &self.stats
    }

    /// Classify a single interval and emit its bits: `n - 1` zeros followed by a one, where `n`
    /// is the bucket the interval falls into.
    pub fn feed_sample<S: BitSink + ?Sized>(&mut self, interval: u32, position: u64, sink: &mut S) {
        let ticks = interval as f64;
        let raw_cells = (ticks / self.bitcell).round() as u32;

        if raw_cells == 0 {
            self.stats.record_discarded(ticks);
            return;
        }
        self.stats.record(ticks, raw_cells);

        let cells = raw_cells.clamp(self.shortest_cells, self.shortest_cells + 2);
        for i in 1..cells {
            let back = (cells - i) as f64 * self.bitcell;
            let pos = (position as f64 - back).max(0.0) as u64;
            sink.push_bit(false, pos);
        }
        sink.push_bit(true, position);
    }

    /// Feed a buffer of byte intervals starting at absolute tick position `start`. Returns the
    /// absolute tick position of the last transition.
    pub fn feed_buffer<S: BitSink + ?Sized>(&mut self, samples: &[u8], start: u64, sink: &mut S) -> u64 {
        let mut position = start;
        for &sample in samples {
            position += sample as u64;
            self.feed_sample(sample as u32, position, sink);
        }
        log::debug!(
            "BucketSlicer::feed_buffer(): {} samples at bitcell {} stats: {}",
            samples.len(),
            format_ticks!(self.bitcell),
            self.stats
        );
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bit_vec::BitVec;

    fn bits_to_string(bits: &BitVec) -> String {
        bits.iter().map(|b| if b { '1' } else { '0' }).collect()
    }

    #[test]
    fn mfm_buckets_emit_expected_bits() {
        let mut slicer = BucketSlicer::new(8.0, 2);
        let mut bits = BitVec::new();
        slicer.feed_buffer(&[16, 24, 32, 17, 23], 0, &mut bits);
        assert_eq!(bits_to_string(&bits), "01001000101001");
    }

    #[test]
    fn out_of_range_intervals_are_clamped() {
        let mut slicer = BucketSlicer::new(8.0, 2);
        let mut bits = BitVec::new();
        // One cell is clamped up to the short bucket, seven cells down to the long bucket.
        slicer.feed_buffer(&[8, 56, 2], 0, &mut bits);
        assert_eq!(bits_to_string(&bits), "010001");
        assert_eq!(slicer.stats().too_short, 2);
        assert_eq!(slicer.stats().too_long, 1);
    }
}
