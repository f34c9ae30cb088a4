//! Output controls, the knobs that can be turned on a running (or stopped)
//! output without a mode change.

use crate::output::OutputFormat;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Control {
    /// [`Colorspace`] the mixer converts planes into.
    YCbCrColorspace,
    /// Mixer background colour, 0xAARRGGBB.
    BackgroundArgb,
    /// Plane crossbar order, passed straight to the mixer.
    MixerPlanes,
    /// [`OutputFormat`] bits routed to the DACs.
    VideoOutSelect,
    /// Pixel clock trim in ppm (two's complement).
    ClockAdjustment,
    Brightness,
    Contrast,
    Saturation,
    Hue,
    /// [`SignalRange`] clipping.
    SignalRange,
    DacMaxVoltage,
    DacSaturation,
    MaxPixelClock,
    /// Encoder-specific control, forwarded as-is.
    Other(u32),
}

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ControlCaps: u32 {
        const COLORSPACE       = 1 << 0;
        const BACKGROUND       = 1 << 1;
        const PLANE_ORDER      = 1 << 2;
        const VIDEO_OUT_SELECT = 1 << 3;
        const CLOCK_ADJUST     = 1 << 4;
        /// brightness, contrast, saturation and hue
        const PSI              = 1 << 5;
        const SIGNAL_RANGE     = 1 << 6;
        const DAC_CALIBRATION  = 1 << 7;
        const MAX_PIXEL_CLOCK  = 1 << 8;
        const METADATA         = 1 << 9;
        const ENCODER_SPECIFIC = 1 << 10;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Colorspace {
    /// Pick from the mode: BT.601 for SD, BT.709 otherwise.
    Auto = 0,
    Bt601 = 1,
    Bt709 = 2,
}

impl TryFrom<u32> for Colorspace {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Colorspace::Auto),
            1 => Ok(Colorspace::Bt601),
            2 => Ok(Colorspace::Bt709),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum SignalRange {
    /// 0..1023, no clipping.
    #[default]
    Full = 0,
    /// Clip to the legal video range (64..940 luma, 64..960 chroma).
    Video = 1,
}

impl TryFrom<u32> for SignalRange {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SignalRange::Full),
            1 => Ok(SignalRange::Video),
            _ => Err(()),
        }
    }
}

/// Picture settings applied by the encoder on SD outputs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PsiSettings {
    pub brightness: u8,
    pub contrast: u8,
    pub saturation: u8,
    pub hue: u8,
}

impl Default for PsiSettings {
    fn default() -> Self {
        Self {
            brightness: 128,
            contrast: 128,
            saturation: 128,
            hue: 128,
        }
    }
}

impl PsiSettings {
    pub const CONTROLS: [Control; 4] = [Control::Brightness, Control::Contrast, Control::Saturation, Control::Hue];

    pub fn get(&self, control: Control) -> Option<u8> {
        match control {
            Control::Brightness => Some(self.brightness),
            Control::Contrast => Some(self.contrast),
            Control::Saturation => Some(self.saturation),
            Control::Hue => Some(self.hue),
            _ => None,
        }
    }

    pub(crate) fn slot(&mut self, control: Control) -> Option<&mut u8> {
        match control {
            Control::Brightness => Some(&mut self.brightness),
            Control::Contrast => Some(&mut self.contrast),
            Control::Saturation => Some(&mut self.saturation),
            Control::Hue => Some(&mut self.hue),
            _ => None,
        }
    }
}

/// Checks a value before anything is stored or sent to hardware.
pub(crate) fn validate(control: Control, value: u32, formats: OutputFormat) -> bool {
    match control {
        Control::YCbCrColorspace => Colorspace::try_from(value).is_ok(),
        Control::Brightness | Control::Contrast | Control::Saturation | Control::Hue => value <= 0xFF,
        Control::SignalRange => SignalRange::try_from(value).is_ok(),
        Control::VideoOutSelect => OutputFormat::from_bits(value).is_some_and(|f| !f.is_empty() && formats.contains(f)),
        Control::MaxPixelClock => value != 0,
        _ => true,
    }
}
