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

    src/flux/pll.rs

    Implements a phase-locked loop for recovering a bit clock from flux transition
    intervals

*/

//! A software phase-locked loop that recovers a channel bit clock from flux transition
//! intervals.
//!
//! The PLL divides time into bitcell windows of a running `period`. Each window that closes with
//! a flux transition inside it produces a `1`, each window that closes without one produces a
//! `0`. When a transition arrives, its distance from the center of its window is the phase
//! error. A fraction of the phase error is applied to the next window boundary, and sustained
//! errors of the same sign nudge the period itself so the loop follows drive speed variation.

use crate::{
    flux::{BitSink, FluxStats},
    format_ticks,
};

pub const DEFAULT_PHASE_ADJUST_GAIN: f64 = 0.65;
pub const DEFAULT_PERIOD_ADJUST_GAIN: f64 = 0.001;
pub const DEFAULT_MAX_PERIOD_STEP: f64 = 0.001;
pub const DEFAULT_MAX_ADJUST: f64 = 0.25;

/// Loop gains and limits for a [Pll].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllConfig {
    #[doc = "Fraction of each phase error applied to the next window boundary."]
    pub phase_adjust_gain: f64,
    #[doc = "Fraction of each phase error, relative to the period, applied to the period once a same-sign streak is established."]
    pub period_adjust_gain: f64,
    #[doc = "Largest relative period change allowed for a single transition."]
    pub max_period_step: f64,
    #[doc = "Largest relative deviation of the period from the nominal bitcell width."]
    pub max_adjust: f64,
}

impl Default for PllConfig {
    fn default() -> Self {
        PllConfig {
            phase_adjust_gain: DEFAULT_PHASE_ADJUST_GAIN,
            period_adjust_gain: DEFAULT_PERIOD_ADJUST_GAIN,
            max_period_step: DEFAULT_MAX_PERIOD_STEP,
            max_adjust: DEFAULT_MAX_ADJUST,
        }
    }
}

impl PllConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_phase_adjust_gain(mut self, gain: f64) -> Self {
        self.phase_adjust_gain = gain;
        self
    }

    pub fn with_period_adjust_gain(mut self, gain: f64) -> Self {
        self.period_adjust_gain = gain;
        self
    }

    pub fn with_max_period_step(mut self, step: f64) -> Self {
        self.max_period_step = step;
        self
    }

    pub fn with_max_adjust(mut self, adjust: f64) -> Self {
        self.max_adjust = adjust;
        self
    }

    /// Return true if all gains and limits are finite and within (0, 1).
    pub fn is_valid(&self) -> bool {
        [
            self.phase_adjust_gain,
            self.period_adjust_gain,
            self.max_period_step,
            self.max_adjust,
        ]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0 && *v < 1.0)
    }
}

pub struct Pll {
    config: PllConfig,
    nominal_period: f64,
    period: f64,
    min_period: f64,
    max_period: f64,

    locked: bool,
    window_start: f64,
    window_end: f64,
    // Signed streak of same-sign phase errors.
    freq_hist: i32,
    clamp_warned: bool,
    stats: FluxStats,
}

impl Pll {
    /// Create a new PLL with the given nominal bitcell width in sample ticks.
    pub fn new(nominal_period: f64, config: PllConfig) -> Self {
        let mut pll = Pll {
            config,
            nominal_period,
            period: nominal_period,
            min_period: nominal_period,
            max_period: nominal_period,
            locked: false,
            window_start: 0.0,
            window_end: 0.0,
            freq_hist: 0,
            clamp_warned: false,
            stats: FluxStats::new(1),
        };
        pll.reset(nominal_period);
        pll
    }

    /// Set the number of bitcells in the shortest legal interval of the modulation being
    /// decoded. Only affects the classification of intervals in [FluxStats].
    pub fn with_shortest_interval(mut self, cells: u32) -> Self {
        self.stats = FluxStats::new(cells);
        self
    }

    /// Reset the loop to an unlocked state with the given nominal bitcell width.
    pub fn reset(&mut self, nominal_period: f64) {
        debug_assert!(nominal_period > 0.0);
        self.nominal_period = nominal_period;
        self.period = nominal_period;
        self.min_period = nominal_period * (1.0 - self.config.max_adjust);
        self.max_period = nominal_period * (1.0 + self.config.max_adjust);
        self.locked = false;
        self.window_start = 0.0;
        self.window_end = 0.0;
        self.freq_hist = 0;
        self.clamp_warned = false;
        log::trace!(
            "Pll::reset(): nominal period: {} range: {}-{}",
            format_ticks!(self.nominal_period),
            format_ticks!(self.min_period),
            format_ticks!(self.max_period)
        );
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn nominal_period(&self) -> f64 {
        self.nominal_period
    }

    pub fn stats(&self) -> &FluxStats {
        &self.stats
    }

    /// Feed one flux transition into the loop. `interval` is the number of ticks since the
    /// previous transition and `position` is the absolute tick position of this transition.
    /// Zero or more bits are emitted to `sink`, each tagged with the position at which its
    /// window closed.
    pub fn feed_sample<S: BitSink + ?Sized>(&mut self, interval: u32, position: u64, sink: &mut S) {
        let t = position as f64;

        if !self.locked {
            // Center the first window on the first transition.
            self.locked = true;
            self.window_start = t + self.period / 2.0;
            self.window_end = self.window_start + self.period;
            sink.push_bit(true, self.window_start as u64);
            return;
        }

        if interval == 0 || t < self.window_start {
            // A second transition inside a window that already produced a 1.
            self.stats.record_discarded(interval as f64);
            return;
        }

        // Close every window that ended before this transition. These free-run without any
        // phase correction.
        let mut cells = 1;
        while self.window_end <= t {
            sink.push_bit(false, self.window_end as u64);
            self.window_start = self.window_end;
            self.window_end += self.period;
            cells += 1;
        }

        let phase_error = t - (self.window_end - self.period / 2.0);
        sink.push_bit(true, self.window_end as u64);
        self.stats.record(interval as f64, cells);

        let phase_adjust = self.config.phase_adjust_gain * phase_error;

        if phase_error >= 0.0 {
            self.freq_hist = if self.freq_hist >= 0 { self.freq_hist + 1 } else { 1 };
        }
        else {
            self.freq_hist = if self.freq_hist <= 0 { self.freq_hist - 1 } else { -1 };
        }

        if self.freq_hist.abs() > 1 {
            let step = (self.config.period_adjust_gain * phase_error / self.period)
                .clamp(-self.config.max_period_step, self.config.max_period_step);
            self.period += self.period * step;
        }

        if self.period < self.min_period || self.period > self.max_period {
            if !self.clamp_warned {
                log::warn!(
                    "Pll::feed_sample(): period {} out of range at position {}, clamping",
                    format_ticks!(self.period),
                    position
                );
                self.clamp_warned = true;
            }
            self.period = self.period.clamp(self.min_period, self.max_period);
        }

        self.window_start = self.window_end;
        self.window_end += self.period + phase_adjust;
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
            "Pll::feed_buffer(): {} samples, final period: {} stats: {}",
            samples.len(),
            format_ticks!(self.period),
            self.stats
        );
        position
    }
}
