//! Construction-time settings.

use tvout_dac::DacCalibration;

use crate::control::{PsiSettings, SignalRange};
use crate::hw::OwnerId;
use crate::output::OutputFormat;

/// Full HD (1080p60) is the fastest any supported part clocks pixels.
pub const DEFAULT_MAX_PIXEL_CLOCK_HZ: u32 = 148_500_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputConfig {
    pub owner: OwnerId,
    pub max_pixel_clock_hz: u32,
    pub dac: DacCalibration,
    pub output_format: OutputFormat,
    pub signal_range: SignalRange,
    pub psi: PsiSettings,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            owner: OwnerId::default(),
            max_pixel_clock_hz: DEFAULT_MAX_PIXEL_CLOCK_HZ,
            dac: DacCalibration::default(),
            output_format: OutputFormat::YUV,
            signal_range: SignalRange::Full,
            psi: PsiSettings::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TeletextConfig {
    /// Entries waiting for their field. One more can be in flight and one pending.
    pub queue_depth: usize,
    /// DMA request line the encoder raises for each teletext line.
    pub dma_pacing: u32,
    /// Encoder teletext data register, as the DMA engine sees it.
    pub data_register: usize,
    pub channel_flags: u32,
    pub transfer_flags: u32,
}

impl Default for TeletextConfig {
    fn default() -> Self {
        Self {
            queue_depth: 16,
            dma_pacing: 0,
            data_register: 0,
            channel_flags: 0,
            transfer_flags: 0,
        }
    }
}
