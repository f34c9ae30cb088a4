use thiserror::Error;
use tvout_dac::DacError;

use crate::control::Control;
use crate::hw::{MetadataKind, PlaneMask};
use crate::mode::TvStandard;
use crate::output::OutputFormat;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("value {value:#x} out of range for {control:?}")]
    InvalidValue { control: Control, value: u32 },
    #[error(transparent)]
    Dac(#[from] DacError),
    #[error("{0:?} rejected by hardware")]
    Rejected(Control),
    #[error("{0:?} not supported")]
    Unsupported(Control),
    #[error("no encoder in use")]
    NoEncoder,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    #[error("output already active with an incompatible mode")]
    AlreadyActive,
    #[error("mode change already pending")]
    ChangePending,
    #[error("standard {standard:?} not in {supported:?}")]
    UnsupportedStandard { standard: TvStandard, supported: TvStandard },
    #[error("output is suspended")]
    Suspended,
    #[error("pixel clock {clock_hz}Hz above limit {max_hz}Hz")]
    PixelClockTooHigh { clock_hz: u32, max_hz: u32 },
    #[error("no encoder in use")]
    NoEncoder,
    #[error("planes {0:?} still enabled")]
    PlanesActive(PlaneMask),
    #[error("mixer failed to start")]
    MixerStart,
    #[error("timing generator failed to start")]
    TimingStart,
    #[error("encoder failed to start")]
    EncoderStart,
    #[error("encoder refused standard {0:?}")]
    StandardRejected(TvStandard),
    #[error("timing generator refused the mode update")]
    ModeUpdateRejected,
    #[error("encoder refused {0:?} metadata")]
    MetadataRejected(MetadataKind),
    #[error("clock reference rejected")]
    ClockReferenceRejected,
    #[error("output format {0:?} not supported")]
    FormatUnsupported(OutputFormat),
    #[error("plane {0:?} rejected by mixer")]
    PlaneRejected(PlaneMask),
    #[error("output not active")]
    NotActive,
    #[error(transparent)]
    Control(#[from] ControlError),
}
