//! Per-SoC output stages.
//!
//! Chips differ in how the analogue DACs are fed: newer parts have an HD
//! formatter that rescales digital YCbCr/RGB onto the DAC range, older
//! parts only have programmable sync insertion levels. Both sit behind
//! [`OutputVariant`] and are handed to the controller at construction.

use log::{debug, warn};
use tvout_dac::{DacLevels, SCALE_ONE};

use crate::control::SignalRange;
use crate::hw::RegisterBank;
use crate::mode::TvStandard;

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    pub struct OutputFormat: u32 {
        const RGB       = 1 << 0;
        const YUV       = 1 << 1;
        /// S-Video
        const YC        = 1 << 2;
        const CVBS      = 1 << 3;
        const DVI       = 1 << 4;
        const HDMI      = 1 << 5;
        const YUV_422   = 1 << 7;
        const ITUR656   = 1 << 8;
        const YUV_24BIT = 1 << 9;
    }
}

/// Everything a variant needs to know about the running output.
#[derive(Debug, Copy, Clone)]
pub struct FormatContext<'a> {
    pub standard: TvStandard,
    pub dac: &'a DacLevels,
    pub signal_range: SignalRange,
    /// The analogue encoder drives the DACs (SD outputs).
    pub encoder_in_use: bool,
}

pub trait OutputVariant {
    fn supported_formats(&self) -> OutputFormat;
    /// Routes `format` to the DACs. Returns false when the combination of
    /// format and standard can't be produced.
    fn set_output_format(&mut self, format: OutputFormat, ctx: &FormatContext<'_>) -> bool;
    fn enable_dacs(&mut self);
    fn disable_dacs(&mut self);
}

pub const HDF_ANA_CFG: usize = 0x00;
pub const HDF_ANA_SCALE_Y: usize = 0x04;
pub const HDF_ANA_SCALE_CB: usize = 0x08;
pub const HDF_ANA_SCALE_CR: usize = 0x0C;
pub const HDF_DAC_CFG: usize = 0x10;

pub const ANA_CFG_INPUT_YCBCR: u32 = 0b00;
pub const ANA_CFG_INPUT_RGB: u32 = 0b01;
pub const ANA_CFG_INPUT_ENCODER: u32 = 0b10;
pub const ANA_CFG_INPUT_MASK: u32 = 0b11;
pub const ANA_CFG_CLIP_EN: u32 = 1 << 2;

pub const DAC_CFG_POWER_DOWN: u32 = 1 << 0;

/// HD formatter: digital rescale in front of the DACs.
pub struct HdFormatterVariant<R> {
    regs: R,
}

impl<R: RegisterBank> HdFormatterVariant<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    fn write_scales(&mut self, y: u32, cb: u32, cr: u32) {
        self.regs.write(HDF_ANA_SCALE_Y, y);
        self.regs.write(HDF_ANA_SCALE_CB, cb);
        self.regs.write(HDF_ANA_SCALE_CR, cr);
    }
}

impl<R: RegisterBank> OutputVariant for HdFormatterVariant<R> {
    fn supported_formats(&self) -> OutputFormat {
        OutputFormat::RGB | OutputFormat::YUV | OutputFormat::YC | OutputFormat::CVBS
    }

    fn set_output_format(&mut self, format: OutputFormat, ctx: &FormatContext<'_>) -> bool {
        if !self.supported_formats().contains(format) {
            return false;
        }

        let dac = ctx.dac;
        let input = if ctx.encoder_in_use {
            let unity = DacLevels::scale_register(SCALE_ONE, 0);
            self.write_scales(unity, unity, unity);
            ANA_CFG_INPUT_ENCODER
        } else if ctx.standard.contains(TvStandard::VESA) {
            if format.contains(OutputFormat::RGB) {
                let rgb = DacLevels::scale_register(dac.rgb_scale, 0);
                self.write_scales(rgb, rgb, rgb);
                ANA_CFG_INPUT_RGB
            } else {
                // no YUV on PC modes
                self.write_scales(0, 0, 0);
                ANA_CFG_INPUT_YCBCR
            }
        } else if format.contains(OutputFormat::RGB) {
            let luma = DacLevels::scale_register(dac.luma_scale, dac.luma_offset);
            self.write_scales(luma, luma, luma);
            ANA_CFG_INPUT_RGB
        } else if format.contains(OutputFormat::YUV) {
            let luma = DacLevels::scale_register(dac.luma_scale, dac.luma_offset);
            let chroma = DacLevels::scale_register(dac.chroma_scale, dac.chroma_offset);
            self.write_scales(luma, chroma, chroma);
            ANA_CFG_INPUT_YCBCR
        } else {
            warn!(target: "output", "{:?} needs the encoder, not available for {:?}", format, ctx.standard);
            return false;
        };

        let mut cfg = self.regs.read(HDF_ANA_CFG) & !(ANA_CFG_INPUT_MASK | ANA_CFG_CLIP_EN);
        cfg |= input;
        if ctx.signal_range == SignalRange::Video {
            cfg |= ANA_CFG_CLIP_EN;
        }
        self.regs.write(HDF_ANA_CFG, cfg);
        debug!(target: "output", "HD formatter: {:?} input {} cfg {:#x}", format, input, cfg);
        true
    }

    fn enable_dacs(&mut self) {
        let cfg = self.regs.read(HDF_DAC_CFG);
        self.regs.write(HDF_DAC_CFG, cfg & !DAC_CFG_POWER_DOWN);
    }

    fn disable_dacs(&mut self) {
        let cfg = self.regs.read(HDF_DAC_CFG);
        self.regs.write(HDF_DAC_CFG, cfg | DAC_CFG_POWER_DOWN);
    }
}

pub const SYNC_LEVEL_LO: usize = 0x00;
pub const SYNC_LEVEL_MIDLO: usize = 0x04;
pub const SYNC_LEVEL_ZERO: usize = 0x08;
pub const SYNC_LEVEL_MIDHI: usize = 0x0C;
pub const SYNC_LEVEL_HI: usize = 0x10;
pub const SYNC_DAC_CFG: usize = 0x14;

/// Older parts: the DACs take the digital signal as-is, only the
/// inserted sync levels are programmable.
pub struct SyncLevelVariant<R> {
    regs: R,
}

impl<R: RegisterBank> SyncLevelVariant<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    fn write_levels(&mut self, levels: [u32; 5]) {
        let offsets = [SYNC_LEVEL_LO, SYNC_LEVEL_MIDLO, SYNC_LEVEL_ZERO, SYNC_LEVEL_MIDHI, SYNC_LEVEL_HI];
        for (offset, level) in offsets.into_iter().zip(levels) {
            self.regs.write(offset, level);
        }
    }
}

impl<R: RegisterBank> OutputVariant for SyncLevelVariant<R> {
    fn supported_formats(&self) -> OutputFormat {
        OutputFormat::RGB | OutputFormat::YUV
    }

    fn set_output_format(&mut self, format: OutputFormat, ctx: &FormatContext<'_>) -> bool {
        if !self.supported_formats().contains(format) {
            return false;
        }

        if ctx.standard.contains(TvStandard::VESA) {
            // VGA monitors take separate syncs
            self.write_levels([0; 5]);
        } else {
            let dac = ctx.dac;
            let zero = dac.sync_insertion;
            self.write_levels([
                dac.sync_tip(),
                zero.saturating_sub(dac.sync_pulse / 2),
                zero,
                zero + dac.full_scale / 2,
                dac.peak(),
            ]);
        }
        true
    }

    fn enable_dacs(&mut self) {
        let cfg = self.regs.read(SYNC_DAC_CFG);
        self.regs.write(SYNC_DAC_CFG, cfg & !DAC_CFG_POWER_DOWN);
    }

    fn disable_dacs(&mut self) {
        let cfg = self.regs.read(SYNC_DAC_CFG);
        self.regs.write(SYNC_DAC_CFG, cfg | DAC_CFG_POWER_DOWN);
    }
}
