//! Interfaces to the hardware blocks an output is built from.
//!
//! The controller only sequences these; their register level programming
//! lives with the platform. Boolean returns are the hardware's own answer
//! ("did it take?") and get mapped to [`crate::OutputError`] by the caller.

use heapless::Vec;

use crate::control::{Control, ControlCaps};
use crate::mode::{DisplayMode, FieldParity, TvStandard};
use crate::teletext::TeletextControl;

/// Identifies the output that owns a shared block (the encoder).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnerId(pub u32);

/// What the timing generator's interrupt was raised for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum VtgEvent {
    #[default]
    None,
    Line,
    TopField,
    BottomField,
}

impl VtgEvent {
    #[inline(always)]
    pub fn is_field(self) -> bool {
        matches!(self, VtgEvent::TopField | VtgEvent::BottomField)
    }

    pub fn parity(self) -> Option<FieldParity> {
        match self {
            VtgEvent::TopField => Some(FieldParity::Top),
            VtgEvent::BottomField => Some(FieldParity::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct VsyncInfo {
    pub event: VtgEvent,
    /// Time since the previous vsync. Negative when the clock went backwards.
    pub interval_us: i64,
}

pub trait TimingGenerator {
    fn start(&mut self, mode: &DisplayMode) -> bool;
    fn stop(&mut self);
    /// Pulses the counter reset, which also latches double buffered registers.
    fn reset_counters(&mut self);
    /// Schedules a switch to `mode` on the next field boundary.
    fn request_mode_update(&mut self, mode: &DisplayMode) -> bool;
    fn current_mode(&self) -> Option<DisplayMode>;
    /// Reads and acknowledges the pending interrupt.
    fn interrupt_status(&mut self) -> VtgEvent;
    fn last_vsync_info(&self) -> VsyncInfo;
}

bitflags::bitflags! {
    /// Mixer planes. Single plane arguments use exactly one bit.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct PlaneMask: u32 {
        const BACKGROUND = 1 << 0;
        const VIDEO1     = 1 << 1;
        const VIDEO2     = 1 << 2;
        const GDP1       = 1 << 3;
        const GDP2       = 1 << 4;
        const GDP3       = 1 << 5;
        const GDP4       = 1 << 6;
        const CURSOR     = 1 << 7;
    }
}

pub trait Mixer {
    fn start(&mut self, mode: &DisplayMode) -> bool;
    fn stop(&mut self);
    fn active_planes(&self) -> PlaneMask;
    fn enable_plane(&mut self, plane: PlaneMask) -> bool;
    fn disable_plane(&mut self, plane: PlaneMask) -> bool;
    fn set_plane_depth(&mut self, plane: PlaneMask, depth: i32, activate: bool) -> bool;
    fn plane_depth(&self, plane: PlaneMask) -> Option<i32>;
    fn set_control(&mut self, control: Control, value: u32) -> bool;
    fn get_control(&self, control: Control) -> Option<u32>;
    fn supported_controls(&self) -> ControlCaps;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    Wss,
    Cgms,
    ClosedCaption,
}

/// Small per-field packets the encoder inserts into the VBI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMetadata {
    pub kind: MetadataKind,
    pub presentation_time_us: u64,
    pub payload: Vec<u8, 32>,
}

pub trait Encoder {
    fn start(&mut self, owner: OwnerId, mode: &DisplayMode, standard: TvStandard) -> bool;
    fn stop(&mut self);
    /// Switches standard on a running encoder without restarting it.
    fn set_standard(&mut self, mode: &DisplayMode, standard: TvStandard) -> bool;
    fn set_control(&mut self, control: Control, value: u32) -> bool;
    fn get_control(&self, control: Control) -> Option<u32>;
    fn supported_controls(&self) -> ControlCaps;
    fn queue_metadata(&mut self, metadata: &OutputMetadata) -> bool;
    fn flush_metadata(&mut self, kind: MetadataKind);
    /// Latches shadowed state; `event` is the edge the output just handled.
    fn update_hw(&mut self, event: VtgEvent);
}

pub trait ClockHelper {
    fn set_adjustment(&mut self, ppm: i32) -> bool;
    fn adjustment(&self) -> i32;
    fn set_clock_reference(&mut self, reference_hz: u32, error_ppm: i32) -> bool;
}

/// One contiguous copy, addresses in the DMA engine's view of memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DmaDescriptor {
    pub src: usize,
    pub dst: usize,
    pub len: usize,
}

/// Platform DMA. Entry points take `&self`: the vsync and DMA completion
/// interrupts both call in.
pub trait DmaSubsystem {
    type Channel;
    type Transfer;

    fn get_channel(&self, pacing: u32, depth: u32, flags: u32) -> Option<Self::Channel>;
    fn release_channel(&self, channel: Self::Channel);
    /// `cookie` comes back through the completion callback.
    fn create_transfer(
        &self,
        channel: &Self::Channel,
        descriptors: &[DmaDescriptor],
        pacing: u32,
        flags: u32,
        cookie: usize,
    ) -> Option<Self::Transfer>;
    fn start_transfer(&self, transfer: &Self::Transfer) -> bool;
    fn delete_transfer(&self, transfer: Self::Transfer);
    fn stop_channel(&self, channel: &Self::Channel);
}

/// 32 bit register window of an output stage.
pub trait RegisterBank {
    fn read(&self, offset: usize) -> u32;
    fn write(&mut self, offset: usize, value: u32);
}

pub trait TeletextRegisters {
    fn control(&self) -> TeletextControl;
    fn write_control(&mut self, value: TeletextControl);
    /// Which VBI lines the encoder replaces with teletext on `parity`.
    fn write_line_mask(&mut self, parity: FieldParity, mask: u32);
}
