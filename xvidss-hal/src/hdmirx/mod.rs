//! # HDMI RX protocol core driver
//!
//! The [HdmiRx] driver services the interrupts of the protocol core. It captures and
//! clears the status of all sub-cores, lets the [intr::Router] decode them and applies the
//! hardware actions requested by the router. The decoded [intr::CoreEvent]s are returned
//! to the caller, usually the [RX subsystem](crate::rxss::RxSubsystem).
use arbitrary_int::u24;
use xvidss::hdmirx::{
    AudioStatus, AuxStatus, BlockCtrl, DdcCtrl, DdcHdcpMode, DdcStatus, LinkStatusCtrl,
    LinkStatusStatus, MmioHdmiRx, PioIn, PioOut, TimerStatus, VtdCtrl, VtdStatus,
};

use crate::bridge::BridgeMode;
use crate::infoframe::AuxPacket;
use crate::time::{Hertz, Milliseconds};
use crate::video::VideoTiming;

pub mod intr;

pub use intr::{CoreAction, CoreEvent, CoreEvents, CoreState, IrqSnapshot, Router};

/// Maximum value of the 24-bit timing detector timebase.
const VTD_TIMEBASE_MAX: u32 = 0xFF_FFFF;

/// PIO inputs which raise change events. The scrambler lock is not evaluated by the
/// router.
const PIO_IN_EVENTS: PioIn = PioIn::new_with_raw_value(0)
    .with_det(true)
    .with_link_ready(true)
    .with_video_ready(true)
    .with_mode(true)
    .with_scdc_scrambler_enable(true)
    .with_scdc_tmds_clock_ratio(true)
    .with_bridge_overflow(true);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResetLine {
    /// Core video reset.
    Video,
    /// Core link reset.
    Link,
    /// External video reset, for example of the video bridge.
    ExtVideo,
    /// External system reset.
    ExtSystem,
}

/// HDCP control of the DDC slave.
pub trait DdcHdcp {
    fn set_ddc_hdcp_mode(&mut self, mode: DdcHdcpMode);

    fn set_ddc_hdcp_enabled(&mut self, enable: bool);

    fn set_ddc_hdcp_interrupts(&mut self, enable: bool);
}

/// Protocol core interface consumed by the RX subsystem.
pub trait RxCore: DdcHdcp {
    /// Service all pending sub-core interrupts and return the decoded events in order.
    fn service_interrupts(&mut self) -> CoreEvents;

    fn set_hpd(&mut self, high: bool);

    fn set_scrambler(&mut self, enable: bool);

    /// Clear the SCDC registers of the DDC slave.
    fn clear_scdc(&mut self);

    /// Clear the TMDS character error counters.
    fn clear_link_status(&mut self);

    fn set_reset(&mut self, line: ResetLine, asserted: bool);

    fn set_bridge_mode(&mut self, mode: BridgeMode);

    /// Timing measured by the video timing detector.
    fn video_timing(&mut self) -> VideoTiming;

    /// Enable the sub-cores and their interrupts.
    fn start(&mut self);

    /// Disable all sub-cores and their interrupts.
    fn stop(&mut self);
}

/// Convert a time into ticks of the core timer.
pub const fn time_to_ticks(axi_clock: Hertz, time: Milliseconds) -> u32 {
    (axi_clock.raw() / 1000).saturating_mul(time.ticks())
}

/// Build the measured timing. Returns [None] if the measurement is incomplete.
pub fn timing_from_measurements(
    h_total: u16,
    h_active: u16,
    v_total: u16,
    v_active: u16,
    interlaced: bool,
) -> Option<VideoTiming> {
    if h_active == 0 || v_active == 0 || h_active >= h_total || v_active >= v_total {
        return None;
    }
    Some(VideoTiming {
        h_active,
        v_active,
        h_total,
        v_total,
        interlaced,
    })
}

pub struct HdmiRx {
    regs: MmioHdmiRx<'static>,
    router: Router,
    axi_clock: Hertz,
}

unsafe impl Send for HdmiRx {}

impl HdmiRx {
    /// Create a driver from a MMIO HDMI RX block. The core stays stopped until
    /// [RxCore::start] is called.
    pub fn new(regs: MmioHdmiRx<'static>, axi_clock: Hertz) -> Self {
        let mut rx = Self {
            regs,
            router: Router::new(),
            axi_clock,
        };
        rx.stop();
        rx
    }

    /// Steal the HDMI RX core at the given base address.
    ///
    /// # Safety
    ///
    /// This function allows creating an arbitrary amount of memory-mapped peripheral
    /// drivers. See the [xvidss::hdmirx::HdmiRx::new_mmio_at_base] docs.
    pub const unsafe fn steal(base_addr: usize, axi_clock: Hertz) -> Self {
        Self {
            regs: unsafe { xvidss::hdmirx::HdmiRx::new_mmio_at_base(base_addr) },
            router: Router::new(),
            axi_clock,
        }
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioHdmiRx<'static> {
        &mut self.regs
    }

    #[inline]
    pub const fn axi_clock(&self) -> Hertz {
        self.axi_clock
    }

    #[inline]
    pub const fn core_state(&self) -> CoreState {
        self.router.state()
    }

    #[inline]
    pub fn is_cable_connected(&mut self) -> bool {
        self.regs.pio().read_input().det()
    }

    #[inline]
    pub fn is_link_ready(&mut self) -> bool {
        self.regs.pio().read_input().link_ready()
    }

    /// Character error counter of the given TMDS channel.
    pub fn link_errors(&mut self, channel: usize) -> Option<u32> {
        self.regs.link_status().read_errors(channel).ok()
    }

    /// Audio clock regeneration values CTS and N.
    pub fn audio_acr(&mut self) -> (u32, u32) {
        let audio = self.regs.audio();
        (audio.read_cts(), audio.read_n())
    }

    pub fn start_timer(&mut self, time: Milliseconds) {
        let ticks = time_to_ticks(self.axi_clock, time);
        self.regs.timer().write_counter(ticks);
    }

    /// Capture and clear the pending status of all sub-cores.
    pub fn snapshot(&mut self) -> IrqSnapshot {
        let mut snap = IrqSnapshot::new(self.regs.pio().read_input());

        if self.regs.pio().read_status() & 0x1 != 0 {
            let events = self.regs.pio().read_in_event();
            self.regs.pio().write_in_event(events);
            // Read the levels again after clearing the events.
            snap.pio_in = self.regs.pio().read_input();
            snap.pio_events = events;
        }

        let timer = self.regs.timer().read_status();
        if timer.irq() && timer.counter_event() {
            self.regs
                .timer()
                .write_status(TimerStatus::new_with_raw_value(0).with_counter_event(true));
            snap.timer_expired = true;
        }

        let vtd = self.regs.vtd().read_status();
        if vtd.irq() {
            let clear = VtdStatus::new_with_raw_value(0)
                .with_timebase_event(vtd.timebase_event())
                .with_sync_loss_event(vtd.sync_loss_event());
            self.regs.vtd().write_status(clear);
            if vtd.timebase_event() {
                snap.timing_valid = self.measure_timing().is_some();
            }
            snap.vtd = vtd;
        }

        let ddc = self.regs.ddc().read_status();
        if ddc.irq() {
            let events = ddc.raw_value()
                & (DdcStatus::HDCP_MESSAGE_EVENTS
                    | DdcStatus::new_with_raw_value(0)
                        .with_hdcp_1_protocol_event(true)
                        .with_hdcp_2_protocol_event(true)
                        .raw_value());
            self.regs
                .ddc()
                .write_status(DdcStatus::new_with_raw_value(events));
            snap.ddc = ddc;
        }

        let aux = self.regs.aux().read_status();
        if aux.irq() {
            self.regs.aux().write_status(
                AuxStatus::new_with_raw_value(0)
                    .with_new_packet_event(aux.new_packet_event())
                    .with_error_event(aux.error_event()),
            );
            if aux.error_event() {
                log::warn!("HDMI RX AUX packet error");
            }
            if aux.new_packet_event() && !aux.fifo_empty() {
                snap.aux_packet = Some(self.read_aux_packet());
            }
        }

        let audio = self.regs.audio().read_status();
        if audio.irq() {
            self.regs.audio().write_status(
                AudioStatus::new_with_raw_value(0)
                    .with_active_event(audio.active_event())
                    .with_channel_event(audio.channel_event()),
            );
            snap.audio = audio;
        }

        let link_status = self.regs.link_status().read_status();
        if link_status.irq() {
            self.regs.link_status().write_status(
                LinkStatusStatus::new_with_raw_value(0)
                    .with_error_max_event(link_status.error_max_event()),
            );
            snap.link_status = link_status;
        }
        snap
    }

    fn read_aux_packet(&mut self) -> AuxPacket {
        let mut aux = self.regs.aux();
        let header = aux.read_data();
        let mut data = [0; 8];
        for word in data.iter_mut() {
            *word = aux.read_data();
        }
        AuxPacket::from_words(header, data)
    }

    fn measure_timing(&mut self) -> Option<VideoTiming> {
        let vtd = self.regs.vtd();
        let interlaced = vtd.read_status().interlaced();
        timing_from_measurements(
            vtd.read_total_pixels().field_0(),
            vtd.read_active_pixels().field_0(),
            vtd.read_total_lines().field_0(),
            vtd.read_active_lines().field_0(),
            interlaced,
        )
    }

    fn set_pio_out(&mut self, bits: PioOut, set: bool) {
        if set {
            self.regs.pio().write_out_set(bits);
        } else {
            self.regs.pio().write_out_clr(bits);
        }
    }

    fn apply(&mut self, action: CoreAction) {
        match action {
            CoreAction::StartTimer(time) => self.start_timer(time),
            CoreAction::ClearScdc => self.clear_scdc(),
            CoreAction::SetScrambler(enable) => self.set_scrambler(enable),
            CoreAction::ToggleVideoResets => {
                self.set_reset(ResetLine::Video, true);
                self.set_reset(ResetLine::Video, false);
                let ext = PioOut::new_with_raw_value(0)
                    .with_ext_video_reset(true)
                    .with_ext_system_reset(true);
                self.set_pio_out(ext, true);
                self.set_pio_out(ext, false);
            }
            CoreAction::AssertCoreResets => {
                self.set_pio_out(
                    PioOut::new_with_raw_value(0)
                        .with_video_reset(true)
                        .with_link_reset(true),
                    true,
                );
            }
            CoreAction::EnableStreamPath => {
                let run = BlockCtrl::new_with_raw_value(0)
                    .with_run(true)
                    .with_interrupt_enable(true);
                self.regs.aux().write_ctrl_set(run);
                self.regs.audio().write_ctrl_set(run);
                self.set_pio_out(
                    PioOut::new_with_raw_value(0)
                        .with_video_reset(true)
                        .with_link_reset(true),
                    false,
                );
            }
            CoreAction::DisableStreamPath => {
                let run = BlockCtrl::new_with_raw_value(0).with_run(true);
                self.regs.aux().write_ctrl_clr(run);
                self.regs.audio().write_ctrl_clr(run);
                self.regs
                    .vtd()
                    .write_ctrl_clr(VtdCtrl::new_with_raw_value(0).with_run(true));
                // The video clock is not stable here, the bridge stays out of reset.
                self.set_pio_out(PioOut::new_with_raw_value(0).with_video_enable(true), true);
                self.set_pio_out(PioOut::new_with_raw_value(0).with_axis_enable(true), false);
            }
            CoreAction::EnableVtd => {
                // Measure every 100 ms.
                let timebase = (self.axi_clock.raw() / 10).min(VTD_TIMEBASE_MAX);
                self.regs.vtd().modify_ctrl(|mut ctrl| {
                    ctrl.set_timebase(u24::new(timebase));
                    ctrl.set_run(true);
                    ctrl.set_interrupt_enable(true);
                    ctrl
                });
            }
            CoreAction::EnableVideoOutput => {
                self.set_pio_out(PioOut::new_with_raw_value(0).with_axis_enable(true), true);
            }
        }
    }
}

impl DdcHdcp for HdmiRx {
    fn set_ddc_hdcp_mode(&mut self, mode: DdcHdcpMode) {
        self.regs.ddc().modify_ctrl(|mut ctrl| {
            ctrl.set_hdcp_mode(mode);
            ctrl
        });
    }

    fn set_ddc_hdcp_enabled(&mut self, enable: bool) {
        let bits = DdcCtrl::new_with_raw_value(0).with_hdcp_enable(true);
        if enable {
            self.regs.ddc().write_ctrl_set(bits);
        } else {
            self.regs.ddc().write_ctrl_clr(bits);
        }
    }

    fn set_ddc_hdcp_interrupts(&mut self, enable: bool) {
        let bits = DdcCtrl::new_with_raw_value(0).with_interrupt_enable(true);
        if enable {
            self.regs.ddc().write_ctrl_set(bits);
        } else {
            self.regs.ddc().write_ctrl_clr(bits);
        }
    }
}

impl RxCore for HdmiRx {
    fn service_interrupts(&mut self) -> CoreEvents {
        let snap = self.snapshot();
        let dispatch = self.router.route(&snap);
        for action in dispatch.actions {
            self.apply(action);
        }
        dispatch.events
    }

    fn set_hpd(&mut self, high: bool) {
        self.set_pio_out(PioOut::new_with_raw_value(0).with_hpd(true), high);
    }

    fn set_scrambler(&mut self, enable: bool) {
        self.set_pio_out(PioOut::new_with_raw_value(0).with_scrambler(true), enable);
    }

    fn clear_scdc(&mut self) {
        let bits = DdcCtrl::new_with_raw_value(0).with_scdc_clear(true);
        self.regs.ddc().write_ctrl_set(bits);
        self.regs.ddc().write_ctrl_clr(bits);
    }

    fn clear_link_status(&mut self) {
        let bits = LinkStatusCtrl::new_with_raw_value(0).with_error_counter_clear(true);
        self.regs.link_status().write_ctrl_set(bits);
        self.regs.link_status().write_ctrl_clr(bits);
    }

    fn set_reset(&mut self, line: ResetLine, asserted: bool) {
        let bits = PioOut::new_with_raw_value(0);
        let bits = match line {
            ResetLine::Video => bits.with_video_reset(true),
            ResetLine::Link => bits.with_link_reset(true),
            ResetLine::ExtVideo => bits.with_ext_video_reset(true),
            ResetLine::ExtSystem => bits.with_ext_system_reset(true),
        };
        self.set_pio_out(bits, asserted);
    }

    fn set_bridge_mode(&mut self, mode: BridgeMode) {
        let bridge = PioOut::new_with_raw_value(0)
            .with_bridge_pixel_drop(true)
            .with_bridge_yuv420(true);
        self.set_pio_out(bridge, false);
        match mode {
            BridgeMode::Normal => (),
            BridgeMode::PixelDrop => self.set_pio_out(
                PioOut::new_with_raw_value(0).with_bridge_pixel_drop(true),
                true,
            ),
            BridgeMode::Yuv420Repack => {
                self.set_pio_out(PioOut::new_with_raw_value(0).with_bridge_yuv420(true), true)
            }
        }
    }

    fn video_timing(&mut self) -> VideoTiming {
        self.measure_timing().unwrap_or_default()
    }

    fn start(&mut self) {
        self.router.reset();
        let run = BlockCtrl::new_with_raw_value(0)
            .with_run(true)
            .with_interrupt_enable(true);
        let mut pio = self.regs.pio();
        pio.write_in_event_rising(PIO_IN_EVENTS);
        pio.write_in_event_falling(PIO_IN_EVENTS);
        pio.write_ctrl_set(run);
        self.regs.timer().write_ctrl_set(run);
        self.regs.ddc().write_ctrl_set(
            DdcCtrl::new_with_raw_value(0)
                .with_run(true)
                .with_scdc_enable(true),
        );
        self.regs.link_status().write_ctrl_set(
            LinkStatusCtrl::new_with_raw_value(0)
                .with_run(true)
                .with_interrupt_enable(true),
        );
        self.set_pio_out(PioOut::new_with_raw_value(0).with_video_enable(true), true);
    }

    fn stop(&mut self) {
        let all = BlockCtrl::new_with_raw_value(0)
            .with_run(true)
            .with_interrupt_enable(true);
        self.regs.pio().write_ctrl_clr(all);
        self.regs.timer().write_ctrl_clr(all);
        self.regs.vtd().write_ctrl_clr(
            VtdCtrl::new_with_raw_value(0)
                .with_run(true)
                .with_interrupt_enable(true),
        );
        self.regs.ddc().write_ctrl_clr(
            DdcCtrl::new_with_raw_value(0)
                .with_run(true)
                .with_interrupt_enable(true)
                .with_scdc_enable(true),
        );
        self.regs.aux().write_ctrl_clr(all);
        self.regs.audio().write_ctrl_clr(all);
        self.regs.link_status().write_ctrl_clr(
            LinkStatusCtrl::new_with_raw_value(0)
                .with_run(true)
                .with_interrupt_enable(true),
        );
        self.set_pio_out(
            PioOut::new_with_raw_value(0)
                .with_hpd(true)
                .with_axis_enable(true),
            false,
        );
        self.router.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_ticks() {
        let axi = Hertz::MHz(100);
        assert_eq!(time_to_ticks(axi, Milliseconds::millis(10)), 1_000_000);
        assert_eq!(time_to_ticks(axi, intr::LOCK_TIME), 20_000_000);
        assert_eq!(
            time_to_ticks(Hertz::from_raw(u32::MAX), Milliseconds::millis(200_000)),
            u32::MAX
        );
    }

    #[test]
    fn measured_timing() {
        let timing = timing_from_measurements(2200, 1920, 1125, 1080, false).unwrap();
        assert_eq!(timing.cea_vic(), Some(16));
        assert!(timing_from_measurements(0, 0, 0, 0, false).is_none());
        assert!(timing_from_measurements(1920, 1920, 1125, 1080, false).is_none());
    }

    #[test]
    fn pio_event_mask() {
        assert_eq!(PIO_IN_EVENTS.raw_value(), 0xEF);
        assert!(!PIO_IN_EVENTS.scrambler_lock());
        assert!(PIO_IN_EVENTS.det() && PIO_IN_EVENTS.bridge_overflow());
    }
}
