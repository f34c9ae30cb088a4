#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tvout_core::control::{Control, ControlCaps};
use tvout_core::hw::*;
use tvout_core::mode::{DisplayMode, FieldParity, TvStandard};
use tvout_core::output::{FormatContext, MasterOutput, OutputFormat, OutputVariant};
use tvout_core::teletext::TeletextControl;
use tvout_core::OutputConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    VtgStart(DisplayMode),
    VtgStop,
    VtgReset,
    VtgRequestUpdate(DisplayMode),

    MixerStart(DisplayMode),
    MixerStop,
    MixerEnablePlane(PlaneMask),
    MixerDisablePlane(PlaneMask),
    MixerDepth(PlaneMask, i32),
    MixerControl(Control, u32),

    EncoderStart(TvStandard),
    EncoderStop,
    EncoderStandard(TvStandard),
    EncoderControl(Control, u32),
    EncoderMetadata(MetadataKind),
    EncoderFlush(MetadataKind),
    EncoderUpdate(VtgEvent),

    ClockAdjust(i32),
    ClockReference(u32, i32),

    Format(OutputFormat, bool),
    DacsOn,
    DacsOff,
}

impl Call {
    pub fn is_vtg(&self) -> bool {
        matches!(self, Call::VtgStart(_) | Call::VtgStop | Call::VtgReset | Call::VtgRequestUpdate(_))
    }

    pub fn is_mixer(&self) -> bool {
        matches!(
            self,
            Call::MixerStart(_)
                | Call::MixerStop
                | Call::MixerEnablePlane(_)
                | Call::MixerDisablePlane(_)
                | Call::MixerDepth(..)
                | Call::MixerControl(..)
        )
    }

    pub fn is_encoder(&self) -> bool {
        matches!(
            self,
            Call::EncoderStart(_)
                | Call::EncoderStop
                | Call::EncoderStandard(_)
                | Call::EncoderControl(..)
                | Call::EncoderMetadata(_)
                | Call::EncoderFlush(_)
                | Call::EncoderUpdate(_)
        )
    }
}

/// Everything the mocks share: the call log, and knobs tests turn while
/// the mocks are owned by the controller.
#[derive(Debug, Default)]
pub struct HwState {
    pub calls: Vec<Call>,

    pub vtg_mode: Option<DisplayMode>,
    pub vtg_event: VtgEvent,
    pub vsync_interval_us: i64,
    pub fail_vtg_start: bool,
    pub fail_mode_update: bool,

    pub planes: PlaneMask,
    pub depths: HashMap<u32, i32>,
    pub mixer_controls: HashMap<Control, u32>,
    pub fail_mixer_start: bool,

    pub encoder_controls: HashMap<Control, u32>,
    pub fail_encoder_start: bool,
    pub fail_set_standard: bool,
    pub fail_encoder_control: bool,

    pub clock_ppm: i32,
    pub reject_format: bool,
}

#[derive(Clone, Default)]
pub struct Hw(pub Rc<RefCell<HwState>>);

impl Hw {
    pub fn log(&self, call: Call) {
        self.0.borrow_mut().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().calls.iter().filter(|c| f(c)).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().calls.clear();
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut HwState) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Next interrupt is a field edge with a normal interval.
    pub fn field(&self, event: VtgEvent, interval_us: i64) {
        self.with(|s| {
            s.vtg_event = event;
            s.vsync_interval_us = interval_us;
        });
    }
}

pub struct MockVtg(pub Hw);

impl TimingGenerator for MockVtg {
    fn start(&mut self, mode: &DisplayMode) -> bool {
        self.0.log(Call::VtgStart(*mode));
        self.0.with(|s| {
            if s.fail_vtg_start {
                return false;
            }
            s.vtg_mode = Some(*mode);
            true
        })
    }

    fn stop(&mut self) {
        self.0.log(Call::VtgStop);
        self.0.with(|s| s.vtg_mode = None);
    }

    fn reset_counters(&mut self) {
        self.0.log(Call::VtgReset);
    }

    fn request_mode_update(&mut self, mode: &DisplayMode) -> bool {
        self.0.log(Call::VtgRequestUpdate(*mode));
        !self.0.with(|s| s.fail_mode_update)
    }

    fn current_mode(&self) -> Option<DisplayMode> {
        self.0.with(|s| s.vtg_mode)
    }

    fn interrupt_status(&mut self) -> VtgEvent {
        self.0.with(|s| core::mem::take(&mut s.vtg_event))
    }

    fn last_vsync_info(&self) -> VsyncInfo {
        self.0.with(|s| VsyncInfo {
            event: s.vtg_event,
            interval_us: s.vsync_interval_us,
        })
    }
}

pub struct MockMixer(pub Hw);

impl Mixer for MockMixer {
    fn start(&mut self, mode: &DisplayMode) -> bool {
        self.0.log(Call::MixerStart(*mode));
        !self.0.with(|s| s.fail_mixer_start)
    }

    fn stop(&mut self) {
        self.0.log(Call::MixerStop);
    }

    fn active_planes(&self) -> PlaneMask {
        self.0.with(|s| s.planes)
    }

    fn enable_plane(&mut self, plane: PlaneMask) -> bool {
        self.0.log(Call::MixerEnablePlane(plane));
        self.0.with(|s| s.planes |= plane);
        true
    }

    fn disable_plane(&mut self, plane: PlaneMask) -> bool {
        self.0.log(Call::MixerDisablePlane(plane));
        self.0.with(|s| s.planes -= plane);
        true
    }

    fn set_plane_depth(&mut self, plane: PlaneMask, depth: i32, _activate: bool) -> bool {
        self.0.log(Call::MixerDepth(plane, depth));
        self.0.with(|s| s.depths.insert(plane.bits(), depth));
        true
    }

    fn plane_depth(&self, plane: PlaneMask) -> Option<i32> {
        self.0.with(|s| s.depths.get(&plane.bits()).copied())
    }

    fn set_control(&mut self, control: Control, value: u32) -> bool {
        self.0.log(Call::MixerControl(control, value));
        self.0.with(|s| s.mixer_controls.insert(control, value));
        true
    }

    fn get_control(&self, control: Control) -> Option<u32> {
        self.0.with(|s| s.mixer_controls.get(&control).copied())
    }

    fn supported_controls(&self) -> ControlCaps {
        ControlCaps::COLORSPACE | ControlCaps::BACKGROUND | ControlCaps::PLANE_ORDER
    }
}

pub struct MockEncoder(pub Hw);

impl Encoder for MockEncoder {
    fn start(&mut self, _owner: OwnerId, _mode: &DisplayMode, standard: TvStandard) -> bool {
        self.0.log(Call::EncoderStart(standard));
        !self.0.with(|s| s.fail_encoder_start)
    }

    fn stop(&mut self) {
        self.0.log(Call::EncoderStop);
    }

    fn set_standard(&mut self, _mode: &DisplayMode, standard: TvStandard) -> bool {
        self.0.log(Call::EncoderStandard(standard));
        !self.0.with(|s| s.fail_set_standard)
    }

    fn set_control(&mut self, control: Control, value: u32) -> bool {
        self.0.log(Call::EncoderControl(control, value));
        self.0.with(|s| {
            if s.fail_encoder_control {
                return false;
            }
            s.encoder_controls.insert(control, value);
            true
        })
    }

    fn get_control(&self, control: Control) -> Option<u32> {
        self.0.with(|s| s.encoder_controls.get(&control).copied())
    }

    fn supported_controls(&self) -> ControlCaps {
        ControlCaps::ENCODER_SPECIFIC
    }

    fn queue_metadata(&mut self, metadata: &OutputMetadata) -> bool {
        self.0.log(Call::EncoderMetadata(metadata.kind));
        true
    }

    fn flush_metadata(&mut self, kind: MetadataKind) {
        self.0.log(Call::EncoderFlush(kind));
    }

    fn update_hw(&mut self, event: VtgEvent) {
        self.0.log(Call::EncoderUpdate(event));
    }
}

pub struct MockClock(pub Hw);

impl ClockHelper for MockClock {
    fn set_adjustment(&mut self, ppm: i32) -> bool {
        self.0.log(Call::ClockAdjust(ppm));
        if ppm.abs() > 500 {
            return false;
        }
        self.0.with(|s| s.clock_ppm = ppm);
        true
    }

    fn adjustment(&self) -> i32 {
        self.0.with(|s| s.clock_ppm)
    }

    fn set_clock_reference(&mut self, reference_hz: u32, error_ppm: i32) -> bool {
        self.0.log(Call::ClockReference(reference_hz, error_ppm));
        reference_hz != 0
    }
}

pub struct MockVariant(pub Hw);

impl OutputVariant for MockVariant {
    fn supported_formats(&self) -> OutputFormat {
        OutputFormat::RGB | OutputFormat::YUV | OutputFormat::YC | OutputFormat::CVBS
    }

    fn set_output_format(&mut self, format: OutputFormat, ctx: &FormatContext<'_>) -> bool {
        self.0.log(Call::Format(format, ctx.encoder_in_use));
        !self.0.with(|s| s.reject_format)
    }

    fn enable_dacs(&mut self) {
        self.0.log(Call::DacsOn);
    }

    fn disable_dacs(&mut self) {
        self.0.log(Call::DacsOff);
    }
}

pub type Output = MasterOutput<MockVtg, MockMixer, MockEncoder, MockClock, MockVariant>;

pub fn output_with(config: OutputConfig, with_encoder: bool) -> (Output, Hw) {
    let hw = Hw::default();
    hw.with(|s| s.planes = PlaneMask::BACKGROUND);
    let encoder = with_encoder.then(|| MockEncoder(hw.clone()));
    let output = MasterOutput::new(
        MockVtg(hw.clone()),
        MockMixer(hw.clone()),
        encoder,
        MockClock(hw.clone()),
        MockVariant(hw.clone()),
        config,
    )
    .unwrap();
    (output, hw)
}

pub fn output() -> (Output, Hw) {
    output_with(OutputConfig::default(), true)
}

// teletext

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTransfer {
    pub cookie: usize,
    pub lines: usize,
}

#[derive(Debug, Default)]
pub struct DmaState {
    pub channels_claimed: usize,
    pub channels_released: usize,
    pub created: Vec<usize>,
    pub started: Vec<usize>,
    pub deleted: Vec<usize>,
    pub channel_stops: usize,
    pub fail_channel: bool,
    pub fail_create: bool,
    pub fail_start: bool,
}

#[derive(Clone, Default)]
pub struct MockDma(pub Rc<RefCell<DmaState>>);

impl MockDma {
    pub fn state(&self) -> std::cell::Ref<'_, DmaState> {
        self.0.borrow()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut DmaState) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Transfers started and not yet released, i.e. actually on the channel.
    pub fn running(&self) -> usize {
        let s = self.state();
        s.started.iter().filter(|c| !s.deleted.contains(c)).count()
    }
}

impl DmaSubsystem for MockDma {
    type Channel = u32;
    type Transfer = MockTransfer;

    fn get_channel(&self, _pacing: u32, _depth: u32, _flags: u32) -> Option<u32> {
        self.with(|s| {
            if s.fail_channel {
                return None;
            }
            s.channels_claimed += 1;
            Some(3)
        })
    }

    fn release_channel(&self, _channel: u32) {
        self.with(|s| s.channels_released += 1);
    }

    fn create_transfer(
        &self,
        _channel: &u32,
        descriptors: &[DmaDescriptor],
        _pacing: u32,
        _flags: u32,
        cookie: usize,
    ) -> Option<MockTransfer> {
        self.with(|s| {
            if s.fail_create {
                return None;
            }
            s.created.push(cookie);
            Some(MockTransfer { cookie, lines: descriptors.len() })
        })
    }

    fn start_transfer(&self, transfer: &MockTransfer) -> bool {
        self.with(|s| {
            if s.fail_start {
                return false;
            }
            s.started.push(transfer.cookie);
            true
        })
    }

    fn delete_transfer(&self, transfer: MockTransfer) {
        self.with(|s| s.deleted.push(transfer.cookie));
    }

    fn stop_channel(&self, _channel: &u32) {
        self.with(|s| s.channel_stops += 1);
    }
}

#[derive(Debug, Default)]
pub struct RegState {
    pub control: TeletextControl,
    pub masks: Vec<(FieldParity, u32)>,
}

#[derive(Clone, Default)]
pub struct MockRegs(pub Rc<RefCell<RegState>>);

impl TeletextRegisters for MockRegs {
    fn control(&self) -> TeletextControl {
        self.0.borrow().control
    }

    fn write_control(&mut self, value: TeletextControl) {
        self.0.borrow_mut().control = value;
    }

    fn write_line_mask(&mut self, parity: FieldParity, mask: u32) {
        self.0.borrow_mut().masks.push((parity, mask));
    }
}
