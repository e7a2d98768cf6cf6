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

    src/capture.rs

    Implements capture sessions over a flux sample source.

*/

//! Capture sessions: repeated acquisition and decoding of tracks from a [SampleSource].
//!
//! A [SampleSource] is anything that can produce a flux capture for a track and head, whether a
//! drive controller or a previously recorded sample file. A [CaptureSession] drives a source
//! and a [FluxDecoder], re-capturing a track until every expected sector has been recovered or
//! the attempt limit is reached.

use crate::{
    flux_decoder::{DecodeSummary, FluxDecoder, TrackContext},
    sector_store::SectorStore,
    sector_view::TrackAcquirer,
    types::Modulation,
    FluxSectorError,
};

/// A single flux capture of one track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capture {
    #[doc = "Intervals between flux transitions, in sample ticks."]
    pub samples: Vec<u8>,
    #[doc = "Sampling clock frequency in Hz."]
    pub sample_rate: u32,
    #[doc = "Number of revolutions captured."]
    pub rotation_count: u32,
}

/// A source of flux captures.
pub trait SampleSource {
    /// Capture the given track and head. The source is expected to seek as needed.
    fn capture(&mut self, track: u8, head: u8) -> Result<Capture, FluxSectorError>;
    fn current_track(&self) -> u8;
    fn current_head(&self) -> u8;
}

pub struct CaptureSession<S: SampleSource> {
    source: S,
    decoder: FluxDecoder,
    modulation: Option<Modulation>,
    pll_enabled: bool,
}

impl<S: SampleSource> CaptureSession<S> {
    /// Create a session decoding with the PLL and trying every modulation.
    pub fn new(source: S, decoder: FluxDecoder) -> Self {
        CaptureSession {
            source,
            decoder,
            modulation: None,
            pll_enabled: true,
        }
    }

    /// Decode only the given modulation instead of trying all of them.
    pub fn with_modulation(mut self, modulation: Modulation) -> Self {
        self.modulation = Some(modulation);
        self
    }

    /// Select the PLL (true) or the fixed bucket slicer (false) for clock recovery.
    pub fn with_pll(mut self, enabled: bool) -> Self {
        self.pll_enabled = enabled;
        self
    }

    pub fn decoder(&self) -> &FluxDecoder {
        &self.decoder
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Capture a track once and decode it into `store`.
    ///
    /// Records are stamped with the track and head the source reports after the capture, which
    /// differ from the requested ones if the drive failed to seek.
    pub fn decode_once(&mut self, store: &mut SectorStore, track: u8, head: u8) -> Result<DecodeSummary, FluxSectorError> {
        let capture = self.source.capture(track, head)?;
        let physical_track = self.source.current_track();
        let physical_head = self.source.current_head();
        if physical_track != track || physical_head != head {
            log::warn!(
                "CaptureSession::decode_once(): requested track {} head {}, source reports track {} head {}",
                track,
                head,
                physical_track,
                physical_head
            );
        }
        let context = TrackContext::new(physical_track, physical_head, capture.sample_rate)
            .with_rotation_count(capture.rotation_count);
        self.decoder
            .decode(store, &capture.samples, &context, self.modulation, self.pll_enabled)
    }

    /// Capture and decode a track until every sector id in `expected_sectors` is present in
    /// `store` for this physical track and head, or `max_attempts` captures have been made.
    /// With no expected sectors, a single capture is made.
    ///
    /// Returns the number of captures made. Giving up with sectors still missing is not an
    /// error; the caller can inspect [SectorStore::presence_map].
    pub fn capture_track(
        &mut self,
        store: &mut SectorStore,
        track: u8,
        head: u8,
        expected_sectors: &[u8],
        max_attempts: usize,
    ) -> Result<usize, FluxSectorError> {
        if max_attempts == 0 {
            return Err(FluxSectorError::ParameterError("max_attempts is zero".to_string()));
        }

        let mut attempts = 0;
        while attempts < max_attempts {
            attempts += 1;
            let summary = self.decode_once(store, track, head)?;
            let missing = missing_sectors(store, track, head, expected_sectors);
            log::debug!(
                "CaptureSession::capture_track(): track {} head {} attempt {}: {} new records, {} sectors missing",
                track,
                head,
                attempts,
                summary.total_inserted(),
                missing.len()
            );
            if missing.is_empty() {
                return Ok(attempts);
            }
            if attempts == max_attempts {
                log::warn!(
                    "CaptureSession::capture_track(): giving up on track {} head {} after {} attempts, missing sectors: {:?}",
                    track,
                    head,
                    attempts,
                    missing
                );
            }
        }
        Ok(attempts)
    }
}

impl<S: SampleSource> TrackAcquirer for CaptureSession<S> {
    fn acquire(&mut self, track: u8, head: u8, store: &mut SectorStore) -> Result<(), FluxSectorError> {
        self.decode_once(store, track, head).map(|_| ())
    }
}

fn missing_sectors(store: &SectorStore, track: u8, head: u8, expected: &[u8]) -> Vec<u8> {
    let present = store.presence_map(track, head);
    expected
        .iter()
        .copied()
        .filter(|s| present.binary_search(s).is_err())
        .collect()
}
