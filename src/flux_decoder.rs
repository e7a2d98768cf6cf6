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

    src/flux_decoder.rs

    Drives clock recovery and modulation decoders over a capture buffer.

*/

//! Drives clock recovery and the modulation decoders over a capture buffer.
//!
//! A [FluxDecoder] runs one pass per modulation and candidate density. Each pass recovers a bitstream from the
//! interval samples with either the [Pll] or the [BucketSlicer] and feeds it, bit by bit, to the
//! [ModulationDecoder] for that modulation, which inserts validated sectors into the store.
//! Without a modulation hint every modulation is tried in turn over the same buffer. Unless the
//! bitcell width is fixed or detected, each modulation is tried at every density it is recorded
//! at, so a high density track decodes without being told its data rate.

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use strum::IntoEnumIterator;

use crate::{
    flux::{bucket::BucketSlicer, pll::Pll, pll::PllConfig, FluxStats},
    format_ticks,
    sector_store::SectorStore,
    track_schema::{DecodeStats, ModulationDecoder},
    types::{DecodeFlags, Modulation, TrackDensity},
    FluxSectorError,
};

/// Fraction of a capture used to build the interval histogram for bitcell detection.
#[cfg(feature = "flux")]
const HISTOGRAM_FRACTION: f64 = 0.5;

/// Where a capture buffer came from, and how to interpret its samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TrackContext {
    pub physical_track: u8,
    pub physical_head: u8,
    #[doc = "Sampling clock frequency in Hz. One sample tick is 1 / sample_rate seconds."]
    pub sample_rate: u32,
    #[doc = "Number of index-to-index revolutions contained in the buffer, if known."]
    pub rotation_count: u32,
}

impl TrackContext {
    pub fn new(physical_track: u8, physical_head: u8, sample_rate: u32) -> Self {
        TrackContext {
            physical_track,
            physical_head,
            sample_rate,
            rotation_count: 1,
        }
    }

    pub fn with_rotation_count(mut self, rotation_count: u32) -> Self {
        self.rotation_count = rotation_count;
        self
    }
}

/// Decoder options. Build with [DecoderConfig::new] and the `with_*` methods.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderConfig {
    pub pll: PllConfig,
    pub flags: DecodeFlags,
    #[doc = "A fixed nominal bitcell width in sample ticks, overriding detection and data rates."]
    pub bitcell_override: Option<f64>,
    #[doc = "Physical (track, head) pairs on which the FM duplicator mark heuristic may be used."]
    pub duplicator_tracks: Vec<(u8, u8)>,
}

impl DecoderConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_pll(mut self, pll: PllConfig) -> Self {
        self.pll = pll;
        self
    }

    pub fn with_flags(mut self, flags: DecodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_bitcell_override(mut self, ticks: f64) -> Self {
        self.bitcell_override = Some(ticks);
        self
    }

    /// Permit the duplicator mark heuristic on a physical track and head. The heuristic is
    /// only used when [DecodeFlags::DUPLICATOR_MARK_RECOVERY] is also set.
    pub fn with_duplicator_track(mut self, track: u8, head: u8) -> Self {
        if !self.duplicator_tracks.contains(&(track, head)) {
            self.duplicator_tracks.push((track, head));
        }
        self
    }

    fn validate(&self) -> Result<(), FluxSectorError> {
        if !self.pll.is_valid() {
            return Err(FluxSectorError::ParameterError(format!(
                "invalid PLL configuration: {:?}",
                self.pll
            )));
        }
        if let Some(ticks) = self.bitcell_override {
            if !ticks.is_finite() || ticks <= 0.0 {
                return Err(FluxSectorError::ParameterError(format!(
                    "invalid bitcell width: {}",
                    ticks
                )));
            }
        }
        Ok(())
    }
}

/// The result of decoding one buffer with one modulation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassSummary {
    pub modulation: Modulation,
    #[doc = "The density assumed for this pass. None if the bitcell width was fixed or detected."]
    pub density: Option<TrackDensity>,
    #[doc = "The nominal bitcell width used for this pass, in sample ticks."]
    pub bitcell: f64,
    pub stats: DecodeStats,
    pub flux_stats: FluxStats,
}

impl Display for PassSummary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.density {
            Some(density) => write!(
                f,
                "{} ({} density) bitcell: {} {}",
                self.modulation,
                density,
                format_ticks!(self.bitcell),
                self.stats
            ),
            None => write!(
                f,
                "{} bitcell: {} {}",
                self.modulation,
                format_ticks!(self.bitcell),
                self.stats
            ),
        }
    }
}

/// The result of decoding one buffer, with one [PassSummary] per modulation and density tried.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeSummary {
    pub passes: Vec<PassSummary>,
}

impl DecodeSummary {
    /// Total number of new records inserted into the store.
    pub fn total_inserted(&self) -> usize {
        self.passes.iter().map(|p| p.stats.inserted as usize).sum()
    }

    /// Total number of valid sectors decoded, including duplicates of records already stored.
    pub fn total_decoded(&self) -> usize {
        self.passes.iter().map(|p| p.stats.data_ok as usize).sum()
    }

    /// The pass of a modulation that produced the most valid sectors. The first pass wins a tie.
    pub fn pass(&self, modulation: Modulation) -> Option<&PassSummary> {
        let mut best: Option<&PassSummary> = None;
        for pass in self.passes.iter().filter(|p| p.modulation == modulation) {
            match best {
                Some(b) if b.stats.data_ok >= pass.stats.data_ok => {}
                _ => best = Some(pass),
            }
        }
        best
    }

    /// The modulation that produced the most valid sectors, if any produced one.
    pub fn best_modulation(&self) -> Option<Modulation> {
        self.passes
            .iter()
            .filter(|p| p.stats.data_ok > 0)
            .max_by_key(|p| p.stats.data_ok)
            .map(|p| p.modulation)
    }
}

pub struct FluxDecoder {
    config: DecoderConfig,
}

impl FluxDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        FluxDecoder { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a buffer of byte intervals, inserting every validated sector into `store`.
    ///
    /// With a `hint`, only that modulation is decoded; otherwise every [Modulation] is tried in
    /// turn. Each modulation is decoded once per candidate bitcell width (see
    /// [FluxDecoder::candidate_bitcells]). With `pll_enabled` false, the fixed [BucketSlicer]
    /// replaces the PLL.
    ///
    /// Bad media never produces an error, only an absence of records. Errors are returned for
    /// an invalid configuration or a zero sample rate.
    pub fn decode(
        &self,
        store: &mut SectorStore,
        buffer: &[u8],
        context: &TrackContext,
        hint: Option<Modulation>,
        pll_enabled: bool,
    ) -> Result<DecodeSummary, FluxSectorError> {
        if context.sample_rate == 0 {
            return Err(FluxSectorError::ParameterError("sample rate is zero".to_string()));
        }
        self.config.validate()?;

        let modulations: Vec<Modulation> = match hint {
            Some(modulation) => vec![modulation],
            None => Modulation::iter().collect(),
        };

        let mut summary = DecodeSummary::default();
        for modulation in modulations {
            for (density, bitcell) in self.candidate_bitcells(buffer, context, modulation) {
                let pass = self.decode_pass(store, buffer, context, modulation, density, bitcell, pll_enabled);
                log::debug!(
                    "FluxDecoder::decode(): track {} head {}: {}",
                    context.physical_track,
                    context.physical_head,
                    pass
                );
                summary.passes.push(pass);
            }
        }
        Ok(summary)
    }

    fn decode_pass(
        &self,
        store: &mut SectorStore,
        buffer: &[u8],
        context: &TrackContext,
        modulation: Modulation,
        density: Option<TrackDensity>,
        bitcell: f64,
        pll_enabled: bool,
    ) -> PassSummary {
        let mut decoder = ModulationDecoder::new(
            modulation,
            context.physical_track,
            context.physical_head,
            &self.config,
            store,
        );

        let flux_stats = if pll_enabled {
            let mut pll =
                Pll::new(bitcell, self.config.pll).with_shortest_interval(modulation.shortest_interval_cells());
            pll.feed_buffer(buffer, 0, &mut decoder);
            pll.stats().clone()
        }
        else {
            let mut slicer = BucketSlicer::new(bitcell, modulation.shortest_interval_cells());
            slicer.feed_buffer(buffer, 0, &mut decoder);
            slicer.stats().clone()
        };

        PassSummary {
            modulation,
            density,
            bitcell,
            stats: *decoder.stats(),
            flux_stats,
        }
    }

    /// Return the nominal bitcell widths in ticks to try for a modulation: the configured
    /// override, the width detected from the interval histogram, or otherwise one width per
    /// density the modulation is recorded at, implied by its data rate.
    fn candidate_bitcells(
        &self,
        buffer: &[u8],
        context: &TrackContext,
        modulation: Modulation,
    ) -> Vec<(Option<TrackDensity>, f64)> {
        if let Some(ticks) = self.config.bitcell_override {
            return vec![(None, ticks)];
        }
        if self.config.flags.contains(DecodeFlags::DETECT_BITCELL) {
            if let Some(detected) = detect_bitcell(buffer, modulation) {
                log::debug!(
                    "FluxDecoder::candidate_bitcells(): {} detected bitcell {}",
                    modulation,
                    format_ticks!(detected)
                );
                return vec![(None, detected)];
            }
            log::debug!(
                "FluxDecoder::candidate_bitcells(): {} detection failed, using data rate",
                modulation
            );
        }
        modulation
            .densities()
            .iter()
            .map(|&density| (Some(density), rate_bitcell(context, modulation, density)))
            .collect()
    }
}

fn rate_bitcell(context: &TrackContext, modulation: Modulation, density: TrackDensity) -> f64 {
    context.sample_rate as f64 / modulation.cell_rate(context.physical_track, density) as f64
}

#[cfg(feature = "flux")]
fn detect_bitcell(buffer: &[u8], modulation: Modulation) -> Option<f64> {
    use crate::flux::histogram::FluxHistogram;

    let mut histogram = FluxHistogram::new(buffer, HISTOGRAM_FRACTION)?;
    let base = histogram.base_transition_time()?;
    Some(base / modulation.shortest_interval_cells() as f64)
}

#[cfg(not(feature = "flux"))]
fn detect_bitcell(_buffer: &[u8], _modulation: Modulation) -> Option<f64> {
    None
}
