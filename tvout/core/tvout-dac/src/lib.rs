//! # Analogue DAC levels
//!
//! Video DACs on these SoCs are 10 bit. Boards wire them so that the
//! full code range produces some maximum voltage (typically 1.4v), and the
//! output stage has to land on the standard analogue video levels:
//!
//! | Level            | Voltage | Used for                              |
//! |------------------|---------|---------------------------------------|
//! | sync insertion   | 0.321v  | blanking level above the sync tip     |
//! | sync pulse       | 0.301v  | sync amplitude (the "43 IRE" pulse)   |
//! | full scale       | 0.700v  | black to white, or chroma peak-peak   |
//!
//! [`calculate`] turns the board calibration into DAC codes and into the
//! 1.10 fixed point scale/offset pairs the output formatter applies to
//! digital luma, chroma and RGB. Everything is integer math with truncating
//! division so the same inputs always program the same register values.
#![no_std]

use thiserror::Error;

/// Largest code a 10 bit DAC accepts.
pub const DAC_MAX_CODE: u32 = 1023;

pub const SYNC_INSERTION_MV: u32 = 321;
pub const SYNC_PULSE_MV: u32 = 301;
pub const FULL_SCALE_MV: u32 = 700;

/// The smallest board maximum that still fits blanking + full scale.
pub const MIN_MAX_VOLTAGE_MV: u32 = SYNC_INSERTION_MV + FULL_SCALE_MV;

/// Unity in the formatter's 1.10 fixed point scale registers.
pub const SCALE_ONE: u32 = 0x400;

// ITU-R BT.601/709 10 bit code points
pub const LUMA_BLACK: u32 = 64;
pub const LUMA_WHITE: u32 = 940;
pub const CHROMA_MIN: u32 = 64;
pub const CHROMA_MID: u32 = 512;
pub const CHROMA_MAX: u32 = 960;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum DacError {
    #[error("DAC saturation point {0} outside 1..={max}", max = DAC_MAX_CODE)]
    Saturation(u32),
    #[error("DAC max voltage {0}mV below {min}mV", min = MIN_MAX_VOLTAGE_MV)]
    MaxVoltage(u32),
}

/// Board calibration for one bank of video DACs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DacCalibration {
    /// Output voltage at the saturation code, in mV.
    pub max_voltage_mv: u32,
    /// Raw DAC code that produces `max_voltage_mv`.
    pub saturation: u32,
}

impl Default for DacCalibration {
    fn default() -> Self {
        // Recommended board design: 1.4v at the top of the full 10 bit range.
        Self {
            max_voltage_mv: 1400,
            saturation: DAC_MAX_CODE,
        }
    }
}

impl DacCalibration {
    pub fn validate(&self) -> Result<(), DacError> {
        if self.saturation == 0 || self.saturation > DAC_MAX_CODE {
            return Err(DacError::Saturation(self.saturation));
        }
        if self.max_voltage_mv < MIN_MAX_VOLTAGE_MV {
            return Err(DacError::MaxVoltage(self.max_voltage_mv));
        }
        Ok(())
    }

    /// DAC code for a physical level in mV.
    #[inline(always)]
    pub fn level(&self, millivolts: u32) -> u32 {
        (u64::from(millivolts) * u64::from(self.saturation) / u64::from(self.max_voltage_mv)) as u32
    }
}

/// Derived DAC codes and formatter rescale constants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DacLevels {
    pub sync_insertion: u32,
    pub sync_pulse: u32,
    pub full_scale: u32,

    pub luma_scale: u32,
    pub luma_offset: i32,
    pub chroma_scale: u32,
    pub chroma_offset: i32,
    pub rgb_scale: u32,
}

impl DacLevels {
    /// Sync tip code.
    pub fn sync_tip(&self) -> u32 {
        self.sync_insertion.saturating_sub(self.sync_pulse)
    }

    /// Peak white code.
    pub fn peak(&self) -> u32 {
        self.sync_insertion + self.full_scale
    }

    /// Packs a scale/offset pair the way the formatter rescale registers take it.
    pub fn scale_register(scale: u32, offset: i32) -> u32 {
        (scale & 0x7FF) | (((offset as u32) & 0x3FF) << 16)
    }
}

pub fn calculate(cal: &DacCalibration) -> Result<DacLevels, DacError> {
    cal.validate()?;

    let sync_insertion = cal.level(SYNC_INSERTION_MV);
    let sync_pulse = cal.level(SYNC_PULSE_MV);
    let full_scale = cal.level(FULL_SCALE_MV);

    let luma_scale = full_scale * SCALE_ONE / (LUMA_WHITE - LUMA_BLACK);
    let luma_offset = sync_insertion as i32 - (LUMA_BLACK * luma_scale / SCALE_ONE) as i32;

    // chroma is centred, its midpoint has to land halfway up the video range
    let chroma_scale = full_scale * SCALE_ONE / (CHROMA_MAX - CHROMA_MIN);
    let chroma_mid = sync_insertion + full_scale / 2;
    let chroma_offset = chroma_mid as i32 - (CHROMA_MID * chroma_scale / SCALE_ONE) as i32;

    let rgb_scale = full_scale * SCALE_ONE / DAC_MAX_CODE;

    Ok(DacLevels {
        sync_insertion,
        sync_pulse,
        full_scale,
        luma_scale,
        luma_offset,
        chroma_scale,
        chroma_offset,
        rgb_scale,
    })
}
