//! # Master output
//!
//! A master output owns one timing generator (VTG) and mixer pair and turns
//! them into a running display mode. SD standards additionally run the
//! analogue encoder, which inserts sync and applies the picture controls.
//!
//! ## Mode changes
//!
//! Most mode changes need a [`stop`](MasterOutput::stop) and a fresh
//! [`start`](MasterOutput::start), but two kinds can happen on a live output:
//!
//! - SD standard swaps on the same raster (NTSC-M to NTSC-J, PAL to SECAM)
//!   only reprogram the encoder, immediately.
//! - ED/HD frame rate changes on the same raster (1080i60 to 1080i50) are
//!   handed to the VTG, which switches on a field boundary. The output sits
//!   in [`OutputState::ActivePendingChange`] until
//!   [`handle_interrupts`](MasterOutput::handle_interrupts) sees the VTG
//!   report the new mode.
//!
//! Every vsync the platform calls `handle_interrupts` then `update_hw`.

use log::{debug, error, trace, warn};
use tvout_dac::DacLevels;

use crate::config::OutputConfig;
use crate::control::{self, Control, ControlCaps, PsiSettings, SignalRange};
use crate::error::{ControlError, OutputError};
use crate::hw::{ClockHelper, Encoder, MetadataKind, Mixer, OutputMetadata, PlaneMask, TimingGenerator, VtgEvent};
use crate::mode::{DisplayMode, TvStandard};
use crate::teletext::FieldTick;

mod variant;
mod vsync;

pub use variant::*;
pub use vsync::{VsyncMonitor, VsyncStats, ANOMALY_REPORT_INTERVAL};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OutputState {
    Stopped,
    Active,
    ActivePendingChange,
    Suspended,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ActiveMode {
    mode: DisplayMode,
    standard: TvStandard,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct PendingChange {
    target: ActiveMode,
    /// The VTG has reported the target mode; cleared in `update_hw`.
    confirmed: bool,
}

pub struct MasterOutput<T, M, E, C, V> {
    vtg: T,
    mixer: M,
    encoder: Option<E>,
    clock: C,
    variant: V,

    config: OutputConfig,
    dac: DacLevels,

    current: Option<ActiveMode>,
    pending: Option<PendingChange>,

    mixer_running: bool,
    vtg_running: bool,
    encoder_in_use: bool,
    suspended: bool,

    last_event: VtgEvent,
    vsync: VsyncMonitor,
}

impl<T, M, E, C, V> MasterOutput<T, M, E, C, V>
where
    T: TimingGenerator,
    M: Mixer,
    E: Encoder,
    C: ClockHelper,
    V: OutputVariant,
{
    pub fn new(vtg: T, mixer: M, encoder: Option<E>, clock: C, variant: V, config: OutputConfig) -> Result<Self, OutputError> {
        let dac = tvout_dac::calculate(&config.dac).map_err(ControlError::from)?;

        Ok(Self {
            vtg,
            mixer,
            encoder,
            clock,
            variant,
            config,
            dac,
            current: None,
            pending: None,
            mixer_running: false,
            vtg_running: false,
            encoder_in_use: false,
            suspended: false,
            last_event: VtgEvent::None,
            vsync: VsyncMonitor::new(),
        })
    }

    pub fn state(&self) -> OutputState {
        if self.current.is_none() {
            OutputState::Stopped
        } else if self.suspended {
            OutputState::Suspended
        } else if self.pending.is_some() {
            OutputState::ActivePendingChange
        } else {
            OutputState::Active
        }
    }

    pub fn current_mode(&self) -> Option<DisplayMode> {
        self.current.map(|a| a.mode)
    }

    pub fn current_standard(&self) -> Option<TvStandard> {
        self.current.map(|a| a.standard)
    }

    pub fn pending_mode(&self) -> Option<DisplayMode> {
        self.pending.map(|p| p.target.mode)
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn dac_levels(&self) -> &DacLevels {
        &self.dac
    }

    pub fn vsync_stats(&self) -> VsyncStats {
        self.vsync.stats()
    }

    pub fn timing_generator(&self) -> &T {
        &self.vtg
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    pub fn encoder(&self) -> Option<&E> {
        self.encoder.as_ref()
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Checks everything that doesn't need the hardware.
    fn check_request(&self, mode: &DisplayMode, standard: TvStandard) -> Result<TvStandard, OutputError> {
        let standard = standard.normalized();

        if !mode.supports(standard) {
            warn!(target: "output", "standard {:?} not supported by mode ({:?})", standard, mode.standards);
            return Err(OutputError::UnsupportedStandard { standard, supported: mode.standards });
        }

        if self.suspended {
            return Err(OutputError::Suspended);
        }

        if mode.pixel_clock_hz > self.config.max_pixel_clock_hz {
            warn!(target: "output", "pixel clock {}Hz over limit {}Hz", mode.pixel_clock_hz, self.config.max_pixel_clock_hz);
            return Err(OutputError::PixelClockTooHigh {
                clock_hz: mode.pixel_clock_hz,
                max_hz: self.config.max_pixel_clock_hz,
            });
        }

        if standard.is_sync_insertion_family() && self.encoder.is_none() {
            return Err(OutputError::NoEncoder);
        }

        Ok(standard)
    }

    pub fn start(&mut self, mode: &DisplayMode, standard: TvStandard) -> Result<(), OutputError> {
        let standard = self.check_request(mode, standard)?;

        if self.current.is_some() {
            return self.change_mode(mode, standard).inspect_err(|e| {
                warn!(target: "output", "start on active output refused: {}", e);
            });
        }

        debug!(target: "output", "starting {}x{} @ {}mHz {:?}",
            mode.active_width, mode.active_height, mode.vertical_refresh_mhz, standard);

        if !self.mixer.start(mode) {
            error!(target: "output", "mixer failed to start");
            return Err(OutputError::MixerStart);
        }
        self.mixer_running = true;

        if let Err(e) = self.start_after_mixer(mode, standard) {
            error!(target: "output", "start failed ({}), rolling back", e);
            self.shutdown();
            return Err(e);
        }
        Ok(())
    }

    fn start_after_mixer(&mut self, mode: &DisplayMode, standard: TvStandard) -> Result<(), OutputError> {
        if !self.vtg.start(mode) {
            return Err(OutputError::TimingStart);
        }
        self.vtg_running = true;

        if standard.is_sync_insertion_family() {
            let encoder = self.encoder.as_mut().ok_or(OutputError::NoEncoder)?;
            if !encoder.start(self.config.owner, mode, standard) {
                return Err(OutputError::EncoderStart);
            }
            self.encoder_in_use = true;
            self.apply_psi();
            self.apply_encoder_signal_range();
        }

        self.current = Some(ActiveMode { mode: *mode, standard });

        if !self.apply_output_format() {
            return Err(OutputError::FormatUnsupported(self.config.output_format));
        }
        self.variant.enable_dacs();
        self.vsync.restart();
        Ok(())
    }

    /// Attempts an on-the-fly change of an active output. False when
    /// nothing is active or the change needs a full restart.
    pub fn try_mode_change(&mut self, mode: &DisplayMode, standard: TvStandard) -> bool {
        if self.current.is_none() {
            return false;
        }
        match self.check_request(mode, standard) {
            Ok(standard) => self.change_mode(mode, standard).is_ok(),
            Err(_) => false,
        }
    }

    fn change_mode(&mut self, mode: &DisplayMode, standard: TvStandard) -> Result<(), OutputError> {
        let Some(active) = self.current else {
            return Err(OutputError::NotActive);
        };

        // until the VTG confirms, `current` isn't what the output will end up in
        if self.pending.is_some() {
            warn!(target: "output", "mode change already pending");
            return Err(OutputError::ChangePending);
        }

        if active.mode == *mode && active.standard == standard {
            return Ok(());
        }

        let sd_from = active.standard.is_sync_insertion_family();
        let sd_to = standard.is_sync_insertion_family();

        if active.mode == *mode && sd_from && sd_to {
            let encoder = match self.encoder.as_mut() {
                Some(encoder) if self.encoder_in_use => encoder,
                _ => return Err(OutputError::NoEncoder),
            };
            if !encoder.set_standard(mode, standard) {
                warn!(target: "output", "encoder refused standard {:?}", standard);
                return Err(OutputError::StandardRejected(standard));
            }
            // the new standard may have its own clipping defaults
            let range = self.config.signal_range;
            if !encoder.set_control(Control::SignalRange, range as u32) {
                warn!(target: "output", "encoder refused signal range {:?} for {:?}", range, standard);
            }
            debug!(target: "output", "standard {:?} -> {:?}", active.standard, standard);
            self.current = Some(ActiveMode { mode: active.mode, standard });
            return Ok(());
        }

        if sd_from || sd_to || !active.mode.same_raster(mode) {
            return Err(OutputError::AlreadyActive);
        }

        if !self.vtg.request_mode_update(mode) {
            return Err(OutputError::ModeUpdateRejected);
        }

        debug!(target: "output", "mode change to {}mHz pending", mode.vertical_refresh_mhz);
        self.pending = Some(PendingChange {
            target: ActiveMode { mode: *mode, standard },
            confirmed: false,
        });
        Ok(())
    }

    /// Stops the output. Refused while any plane other than the background
    /// is still shown.
    pub fn stop(&mut self) -> Result<(), OutputError> {
        if !self.mixer_running && !self.vtg_running && !self.encoder_in_use && self.current.is_none() {
            return Ok(());
        }

        let planes = self.mixer.active_planes().difference(PlaneMask::BACKGROUND);
        if !planes.is_empty() {
            warn!(target: "output", "cannot stop with planes {:?} enabled", planes);
            return Err(OutputError::PlanesActive(planes));
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        debug!(target: "output", "stopping");
        self.variant.disable_dacs();

        if self.mixer_running {
            self.mixer.stop();
            self.mixer_running = false;
        }

        if self.encoder_in_use {
            if let Some(encoder) = self.encoder.as_mut() {
                encoder.stop();
            }
            self.encoder_in_use = false;
        }

        if self.vtg_running {
            // one more reset pulse flushes the double buffered registers
            self.vtg.reset_counters();
            self.vtg.stop();
            self.vtg_running = false;
        }

        self.pending = None;
        self.current = None;
    }

    /// Powers the DACs and VTG down, keeping the mode. A pending change is dropped.
    pub fn suspend(&mut self) {
        if self.suspended {
            return;
        }
        self.suspended = true;

        if self.current.is_none() {
            return;
        }

        debug!(target: "output", "suspending");
        self.variant.disable_dacs();
        if self.vtg_running {
            self.vtg.stop();
            self.vtg_running = false;
        }
        if self.pending.take().is_some() {
            debug!(target: "output", "pending mode change dropped by suspend");
        }
    }

    pub fn resume(&mut self) -> Result<(), OutputError> {
        if !self.suspended {
            return Ok(());
        }

        let Some(active) = self.current else {
            self.suspended = false;
            return Ok(());
        };

        debug!(target: "output", "resuming");
        if !self.vtg.start(&active.mode) {
            error!(target: "output", "timing generator failed to restart");
            return Err(OutputError::TimingStart);
        }
        self.suspended = false;
        self.vtg_running = true;
        self.vsync.restart();
        self.variant.enable_dacs();
        Ok(())
    }

    /// Vsync interrupt handler. Returns the edge that fired.
    pub fn handle_interrupts(&mut self) -> VtgEvent {
        let event = self.vtg.interrupt_status();
        self.last_event = event;

        if !event.is_field() {
            return event;
        }

        if let Some(active) = self.current {
            let info = self.vtg.last_vsync_info();
            self.vsync.record(info, active.mode.field_duration_us());
        }

        if let Some(pending) = self.pending.as_mut() {
            if !pending.confirmed && self.vtg.current_mode() == Some(pending.target.mode) {
                trace!(target: "output", "VTG switched mode");
                self.current = Some(pending.target);
                pending.confirmed = true;
            }
        }

        event
    }

    /// Post-interrupt hardware latch.
    pub fn update_hw(&mut self) {
        if self.pending.is_some_and(|p| p.confirmed) {
            self.pending = None;
            debug!(target: "output", "mode change complete");
        }

        if self.encoder_in_use {
            if let Some(encoder) = self.encoder.as_mut() {
                encoder.update_hw(self.last_event);
            }
        }
    }

    /// Field timing for the teletext engine after a field interrupt.
    pub fn field_tick(&self, now_us: u64) -> Option<FieldTick> {
        let parity = self.last_event.parity()?;
        let active = self.current?;
        Some(FieldTick {
            parity,
            now_us,
            field_duration_us: active.mode.field_duration_us(),
        })
    }

    fn format_applies(&mut self) -> bool {
        let Some(active) = self.current else {
            return true;
        };
        let ctx = FormatContext {
            standard: active.standard,
            dac: &self.dac,
            signal_range: self.config.signal_range,
            encoder_in_use: self.encoder_in_use,
        };
        self.variant.set_output_format(self.config.output_format, &ctx)
    }

    fn apply_output_format(&mut self) -> bool {
        let applied = self.format_applies();
        if !applied {
            warn!(target: "output", "output format {:?} rejected", self.config.output_format);
        }
        applied
    }

    fn apply_psi(&mut self) {
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        for control in PsiSettings::CONTROLS {
            let value = self.config.psi.get(control).unwrap_or(128);
            if !encoder.set_control(control, u32::from(value)) {
                warn!(target: "output", "encoder refused {:?}={}", control, value);
            }
        }
    }

    fn apply_encoder_signal_range(&mut self) {
        let range = self.config.signal_range;
        if let Some(encoder) = self.encoder.as_mut() {
            if !encoder.set_control(Control::SignalRange, range as u32) {
                warn!(target: "output", "encoder refused signal range {:?}", range);
            }
        }
    }

    pub fn set_control(&mut self, control: Control, value: u32) -> Result<(), ControlError> {
        if !control::validate(control, value, self.variant.supported_formats()) {
            warn!(target: "output", "{:?}={:#x} out of range", control, value);
            return Err(ControlError::InvalidValue { control, value });
        }

        match control {
            Control::YCbCrColorspace | Control::BackgroundArgb | Control::MixerPlanes => {
                if !self.mixer.set_control(control, value) {
                    return Err(ControlError::Rejected(control));
                }
            }
            Control::VideoOutSelect => {
                let previous = self.config.output_format;
                self.config.output_format = OutputFormat::from_bits_truncate(value);
                if !self.apply_output_format() {
                    self.config.output_format = previous;
                    self.format_applies();
                    return Err(ControlError::Rejected(control));
                }
            }
            Control::ClockAdjustment => {
                if !self.clock.set_adjustment(value as i32) {
                    return Err(ControlError::Rejected(control));
                }
            }
            Control::Brightness | Control::Contrast | Control::Saturation | Control::Hue => {
                if self.encoder_in_use {
                    if let Some(encoder) = self.encoder.as_mut() {
                        if !encoder.set_control(control, value) {
                            return Err(ControlError::Rejected(control));
                        }
                    }
                }
                if let Some(slot) = self.config.psi.slot(control) {
                    *slot = value as u8;
                }
            }
            Control::SignalRange => {
                let range = SignalRange::try_from(value).map_err(|_| ControlError::InvalidValue { control, value })?;
                if self.encoder_in_use {
                    if let Some(encoder) = self.encoder.as_mut() {
                        if !encoder.set_control(control, value) {
                            return Err(ControlError::Rejected(control));
                        }
                    }
                }
                self.config.signal_range = range;
                // refusal is logged, the new value still applies from the next start
                self.apply_output_format();
            }
            Control::DacMaxVoltage | Control::DacSaturation => {
                let mut cal = self.config.dac;
                if control == Control::DacMaxVoltage {
                    cal.max_voltage_mv = value;
                } else {
                    cal.saturation = value;
                }
                self.dac = tvout_dac::calculate(&cal)?;
                self.config.dac = cal;
                // refusal is logged, the new value still applies from the next start
                self.apply_output_format();
            }
            Control::MaxPixelClock => self.config.max_pixel_clock_hz = value,
            Control::Other(_) => {
                let encoder = self.encoder.as_mut().ok_or(ControlError::NoEncoder)?;
                if !encoder.set_control(control, value) {
                    return Err(ControlError::Rejected(control));
                }
            }
        }

        trace!(target: "output", "{:?} = {:#x}", control, value);
        Ok(())
    }

    pub fn get_control(&self, control: Control) -> Result<u32, ControlError> {
        match control {
            Control::YCbCrColorspace | Control::BackgroundArgb | Control::MixerPlanes => {
                self.mixer.get_control(control).ok_or(ControlError::Unsupported(control))
            }
            Control::VideoOutSelect => Ok(self.config.output_format.bits()),
            Control::ClockAdjustment => Ok(self.clock.adjustment() as u32),
            Control::Brightness | Control::Contrast | Control::Saturation | Control::Hue => {
                self.config.psi.get(control).map(u32::from).ok_or(ControlError::Unsupported(control))
            }
            Control::SignalRange => Ok(self.config.signal_range as u32),
            Control::DacMaxVoltage => Ok(self.config.dac.max_voltage_mv),
            Control::DacSaturation => Ok(self.config.dac.saturation),
            Control::MaxPixelClock => Ok(self.config.max_pixel_clock_hz),
            Control::Other(_) => {
                let encoder = self.encoder.as_ref().ok_or(ControlError::NoEncoder)?;
                encoder.get_control(control).ok_or(ControlError::Unsupported(control))
            }
        }
    }

    pub fn supported_controls(&self) -> ControlCaps {
        let mut caps = ControlCaps::VIDEO_OUT_SELECT
            | ControlCaps::CLOCK_ADJUST
            | ControlCaps::SIGNAL_RANGE
            | ControlCaps::DAC_CALIBRATION
            | ControlCaps::MAX_PIXEL_CLOCK;
        caps |= self.mixer.supported_controls();
        if let Some(encoder) = self.encoder.as_ref() {
            caps |= ControlCaps::PSI | ControlCaps::METADATA | encoder.supported_controls();
        }
        caps
    }

    fn encoder_in_use_mut(&mut self) -> Result<&mut E, OutputError> {
        match self.encoder.as_mut() {
            Some(encoder) if self.encoder_in_use => Ok(encoder),
            _ => Err(OutputError::NoEncoder),
        }
    }

    pub fn queue_metadata(&mut self, metadata: &OutputMetadata) -> Result<(), OutputError> {
        if !self.encoder_in_use_mut()?.queue_metadata(metadata) {
            return Err(OutputError::MetadataRejected(metadata.kind));
        }
        Ok(())
    }

    pub fn flush_metadata(&mut self, kind: MetadataKind) -> Result<(), OutputError> {
        self.encoder_in_use_mut()?.flush_metadata(kind);
        Ok(())
    }

    pub fn set_clock_reference(&mut self, reference_hz: u32, error_ppm: i32) -> Result<(), OutputError> {
        if !self.clock.set_clock_reference(reference_hz, error_ppm) {
            return Err(OutputError::ClockReferenceRejected);
        }
        Ok(())
    }

    pub fn show_plane(&mut self, plane: PlaneMask) -> Result<(), OutputError> {
        if !self.mixer.enable_plane(plane) {
            return Err(OutputError::PlaneRejected(plane));
        }
        Ok(())
    }

    pub fn hide_plane(&mut self, plane: PlaneMask) -> Result<(), OutputError> {
        if !self.mixer.disable_plane(plane) {
            return Err(OutputError::PlaneRejected(plane));
        }
        Ok(())
    }

    pub fn set_plane_depth(&mut self, plane: PlaneMask, depth: i32, activate: bool) -> Result<(), OutputError> {
        if !self.mixer.set_plane_depth(plane, depth, activate) {
            return Err(OutputError::PlaneRejected(plane));
        }
        Ok(())
    }

    pub fn plane_depth(&self, plane: PlaneMask) -> Option<i32> {
        self.mixer.plane_depth(plane)
    }
}
