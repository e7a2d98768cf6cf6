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

    src/track_schema/dispatch.rs

*/

//! Selects a modulation decoder and forwards recovered bits to it.

use crate::{
    flux::BitSink,
    flux_decoder::DecoderConfig,
    sector_store::SectorStore,
    track_schema::{
        amiga::AmigaDecoder,
        apple::AppleDecoder,
        commodore::CommodoreDecoder,
        fm::FmDecoder,
        mfm::MfmDecoder,
        DecodeStats,
        DecoderCore,
    },
    types::{DecodeFlags, Modulation},
};

pub enum ModulationDecoder<'s> {
    Fm(FmDecoder<'s>),
    Mfm(MfmDecoder<'s>),
    Amiga(AmigaDecoder<'s>),
    Commodore(CommodoreDecoder<'s>),
    Apple(AppleDecoder<'s>),
}

impl<'s> ModulationDecoder<'s> {
    /// Create the decoder for `modulation`, inserting sectors for the given physical track and
    /// head into `store`.
    pub fn new(
        modulation: Modulation,
        physical_track: u8,
        physical_head: u8,
        config: &DecoderConfig,
        store: &'s mut SectorStore,
    ) -> Self {
        let core = DecoderCore::new(modulation, physical_track, physical_head, store);
        match modulation {
            Modulation::Fm => {
                let recovery = config.flags.contains(DecodeFlags::DUPLICATOR_MARK_RECOVERY)
                    && config.duplicator_tracks.contains(&(physical_track, physical_head));
                if recovery {
                    log::debug!(
                        "ModulationDecoder::new(): duplicator mark recovery enabled for track {} head {}",
                        physical_track,
                        physical_head
                    );
                }
                ModulationDecoder::Fm(FmDecoder::new(core, recovery))
            }
            Modulation::Mfm => ModulationDecoder::Mfm(MfmDecoder::new(
                core,
                config.flags.contains(DecodeFlags::ENFORCE_MFM_CLOCK),
            )),
            Modulation::AmigaMfm => ModulationDecoder::Amiga(AmigaDecoder::new(core)),
            Modulation::CommodoreGcr => ModulationDecoder::Commodore(CommodoreDecoder::new(core)),
            Modulation::AppleGcr => ModulationDecoder::Apple(AppleDecoder::new(core)),
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        match self {
            ModulationDecoder::Fm(d) => d.stats(),
            ModulationDecoder::Mfm(d) => d.stats(),
            ModulationDecoder::Amiga(d) => d.stats(),
            ModulationDecoder::Commodore(d) => d.stats(),
            ModulationDecoder::Apple(d) => d.stats(),
        }
    }

    /// Drop any partial field and return to sync scanning.
    pub fn reset(&mut self) {
        match self {
            ModulationDecoder::Fm(d) => d.reset(),
            ModulationDecoder::Mfm(d) => d.reset(),
            ModulationDecoder::Amiga(d) => d.reset(),
            ModulationDecoder::Commodore(d) => d.reset(),
            ModulationDecoder::Apple(d) => d.reset(),
        }
    }
}

impl BitSink for ModulationDecoder<'_> {
    fn push_bit(&mut self, bit: bool, position: u64) {
        match self {
            ModulationDecoder::Fm(d) => d.push_bit(bit, position),
            ModulationDecoder::Mfm(d) => d.push_bit(bit, position),
            ModulationDecoder::Amiga(d) => d.push_bit(bit, position),
            ModulationDecoder::Commodore(d) => d.push_bit(bit, position),
            ModulationDecoder::Apple(d) => d.push_bit(bit, position),
        }
    }
}
