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

    src/flux/histogram.rs

    Implements a flux interval histogram used to detect the bitcell width of a capture

*/

//! This module defines a [FluxHistogram] structure which is used to estimate the bitcell width
//! of a capture so that the PLL may be properly initialized for decoding.
//!
//! The shortest legal flux interval of every supported modulation is also the most frequent one,
//! so the first dominant peak of the interval histogram marks the short transition time.

use histogram::{Bucket, Histogram};

// Intervals are scaled up before bucketing so that the grouping error of the histogram is small
// compared to a single sample tick.
const TICK_SCALE: f64 = 64.0;

pub struct FluxHistogram {
    histogram: Histogram,
    maxima: Vec<(u64, std::ops::RangeInclusive<u64>)>,
    samples: Vec<u8>,
    total_count: u64,
}

impl FluxHistogram {
    /// Produce a [FluxHistogram] over a fraction of the byte intervals of a capture.
    /// # Arguments
    /// * `samples` - A slice of intervals in sample ticks
    /// * `fraction` - The fraction of the samples to use in the histogram
    pub fn new(samples: &[u8], fraction: f64) -> Option<Self> {
        // Max value power of 2^15 covers 255 ticks at 64x scale.
        // Grouping power of 5 limits bucket width to ~3% of the value.
        let mut histogram = match Histogram::new(5, 15) {
            Ok(h) => h,
            Err(e) => {
                log::error!("FluxHistogram::new(): Failed to create histogram: {:?}", e);
                return None;
            }
        };

        let take_count = (samples.len() as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
        log::trace!("FluxHistogram::new(): Taking {} intervals", take_count);
        let samples: Vec<u8> = samples.iter().take(take_count).copied().filter(|s| *s > 0).collect();
        let mut total_count = 0;
        for &sample in &samples {
            if histogram.increment(Self::ticks_to_u64(sample as f64)).is_ok() {
                total_count += 1;
            }
        }

        Some(FluxHistogram {
            histogram,
            maxima: Vec::new(),
            samples,
            total_count,
        })
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    fn ticks_to_u64(value: f64) -> u64 {
        (value * TICK_SCALE) as u64
    }

    fn u64_to_ticks(value: u64) -> f64 {
        value as f64 / TICK_SCALE
    }

    /// Locate local maxima in a histogram by bucket.
    fn find_local_maxima(&mut self, threshold: Option<f64>) -> &Vec<(u64, std::ops::RangeInclusive<u64>)> {
        let mut peaks = vec![];
        let mut previous_bucket: Option<Bucket> = None;
        let mut current_bucket: Option<Bucket> = None;

        let threshold = (self.total_count as f64 * threshold.unwrap_or(0.005)).round() as u64;

        for bucket in self.histogram.into_iter() {
            if let Some(curr) = current_bucket.as_ref() {
                let prev_count = previous_bucket.as_ref().map(|b| b.count()).unwrap_or(0);
                if curr.count() >= prev_count && curr.count() > bucket.count() && curr.count() >= threshold.max(1) {
                    peaks.push((curr.count(), curr.start()..=curr.end()));
                }
            }
            previous_bucket = current_bucket.take();
            current_bucket = Some(bucket.clone());
        }

        self.maxima = peaks;
        &self.maxima
    }

    /// Attempt to calculate the base (shortest) transition time in ticks.
    ///
    /// The first peak locates the short transition cluster. The estimate is the mean of all
    /// intervals within 25% of that peak, so a peak split across neighboring buckets is still
    /// measured accurately.
    pub fn base_transition_time(&mut self) -> Option<f64> {
        if self.maxima.is_empty() {
            self.find_local_maxima(None);
        }

        let Some((_, first_peak)) = self.maxima.first()
        else {
            log::warn!("FluxHistogram::base_transition_time(): No peaks found");
            return None;
        };

        let center = Self::u64_to_ticks((first_peak.start() + first_peak.end()) / 2);
        let (lo, hi) = (center * 0.75, center * 1.25);
        let (sum, count) = self
            .samples
            .iter()
            .map(|s| *s as f64)
            .filter(|s| *s >= lo && *s <= hi)
            .fold((0.0, 0u32), |(sum, count), s| (sum + s, count + 1));

        if count == 0 {
            return None;
        }
        let base = sum / count as f64;
        log::debug!(
            "FluxHistogram::base_transition_time(): first peak at {:.3} ticks, base: {:.3} ticks",
            center,
            base
        );
        Some(base)
    }

    /// Return the detected peaks as (count, tick range start) pairs.
    pub fn peaks(&mut self) -> Vec<(u64, f64)> {
        if self.maxima.is_empty() {
            self.find_local_maxima(None);
        }
        self.maxima
            .iter()
            .map(|(count, range)| (*count, Self::u64_to_ticks(*range.start())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_finds_short_mfm_interval() {
        // MFM at 8 ticks per cell: 2, 3 and 4 cell intervals with +/- 1 tick of noise.
        let mut samples = Vec::new();
        for i in 0..3000 {
            let noise = [0i32, 1, -1][i % 3];
            let base = [16i32, 16, 24, 16, 32, 24][i % 6];
            samples.push((base + noise) as u8);
        }
        let mut histogram = FluxHistogram::new(&samples, 1.0).unwrap();
        let base = histogram.base_transition_time().unwrap();
        assert!((base - 16.0).abs() < 1.0, "base transition time was {}", base);
    }

    #[test]
    fn empty_histogram_has_no_base() {
        let mut histogram = FluxHistogram::new(&[], 1.0).unwrap();
        assert!(histogram.base_transition_time().is_none());
    }
}
