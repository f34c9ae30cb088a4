//! # tvout-core
//!
//! Display output control for SoC video pipelines: bringing a timing
//! generator, mixer and analogue encoder up into a display mode, switching
//! modes without glitches, and streaming teletext into the VBI.
//!
//! Hardware is reached through the traits in [`hw`]; the platform supplies
//! implementations and calls the interrupt entry points:
//!
//! ```text
//! vsync irq:   output.handle_interrupts(); output.update_hw();
//!              if let Some(tick) = output.field_tick(now) { teletext.update_hw(tick) }
//! dma irq:     teletext.dma_completed(cookie);
//! ```
#![no_std]
extern crate alloc;

pub mod config;
pub mod control;
pub mod error;
pub mod hw;
pub mod mode;
pub mod output;
pub mod teletext;

pub use config::{OutputConfig, TeletextConfig};
pub use control::{Colorspace, Control, ControlCaps, PsiSettings, SignalRange};
pub use error::{ControlError, OutputError};
pub use mode::{DisplayMode, FieldParity, ScanType, TvStandard};
pub use output::{MasterOutput, OutputFormat, OutputState, OutputVariant};
pub use teletext::{TeletextEngine, TeletextError, TeletextMetadata};

pub use tvout_dac as dac;
pub use tvout_filter as filter;
