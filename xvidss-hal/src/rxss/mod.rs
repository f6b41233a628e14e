//! # HDMI RX subsystem
//!
//! The [RxSubsystem] ties together the [HDMI RX core](crate::hdmirx), the clock generation
//! of the video PHY, the video bridge and the optional HDCP engines. It is driven by the
//! interrupt handler of the RX core and drives the stream lifecycle:
//!
//! ```text
//! Disconnected -> Connected -> Initializing -> Up -> Down -> Connected | Disconnected
//! ```
//!
//! Applications register handlers per [HandlerKind] which are called with the application
//! context and the current [Status].
use embedded_hal::delay::DelayNs;

use crate::{
    bridge::{self, BridgeMode},
    evtlog::{EventLog, LogEvent},
    hdmirx::{CoreEvent, ResetLine, RxCore},
    infoframe::{
        AudioInfoFrame, AuxPacket, AviInfoFrame, DrmInfoFrame, GeneralControl, PacketType,
        VendorSpecificInfoFrame,
    },
    mmcm::{self, HIGH_LINE_RATE_MBPS, MmcmConfig, MmcmError, MmcmParams, RxClockRequest},
    time::{Hertz, Milliseconds},
    video::{ColorDepth, ColorFormat, PixelsPerClock, VideoStream},
};

pub mod hdcp;

pub use hdcp::{
    HdcpCapability, HdcpEngine, HdcpError, HdcpEvent, HdcpLayer, HdcpProtocol, HdcpStatusEvent,
    NoHdcp,
};

/// Default time the HPD line is held low by [RxSubsystem::toggle_hpd].
pub const DEFAULT_HPD_TOGGLE_TIME: Milliseconds = Milliseconds::millis(500);

/// Events an application can register a handler for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum HandlerKind {
    Connect = 0,
    AuxPacket = 1,
    Audio = 2,
    LinkStatus = 3,
    StreamDown = 4,
    StreamInit = 5,
    StreamUp = 6,
    TmdsClockRatio = 7,
    VicError = 8,
    HdcpAuthenticated = 9,
    HdcpUnauthenticated = 10,
    HdcpAuthenticationRequest = 11,
    HdcpTopologyUpdate = 12,
    HdcpEncryptionUpdate = 13,
}

impl HandlerKind {
    pub const COUNT: usize = 14;
}

impl From<HdcpStatusEvent> for HandlerKind {
    fn from(event: HdcpStatusEvent) -> Self {
        match event {
            HdcpStatusEvent::Authenticated => HandlerKind::HdcpAuthenticated,
            HdcpStatusEvent::Unauthenticated => HandlerKind::HdcpUnauthenticated,
            HdcpStatusEvent::AuthenticationRequest => HandlerKind::HdcpAuthenticationRequest,
            HdcpStatusEvent::TopologyUpdate => HandlerKind::HdcpTopologyUpdate,
            HdcpStatusEvent::EncryptionUpdate => HandlerKind::HdcpEncryptionUpdate,
        }
    }
}

/// Application handler. It receives the application context and the subsystem status.
pub type Handler<Ctx> = fn(&mut Ctx, &Status);

/// Handler registry with one slot per [HandlerKind].
pub struct Handlers<Ctx> {
    table: [Option<Handler<Ctx>>; HandlerKind::COUNT],
}

impl<Ctx> Default for Handlers<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> Handlers<Ctx> {
    pub const fn new() -> Self {
        Self {
            table: [None; HandlerKind::COUNT],
        }
    }

    /// Register a handler. The previously registered handler is returned.
    pub fn set(&mut self, kind: HandlerKind, handler: Handler<Ctx>) -> Option<Handler<Ctx>> {
        self.table[u8::from(kind) as usize].replace(handler)
    }

    pub fn clear(&mut self, kind: HandlerKind) -> Option<Handler<Ctx>> {
        self.table[u8::from(kind) as usize].take()
    }

    #[inline]
    pub fn get(&self, kind: HandlerKind) -> Option<Handler<Ctx>> {
        self.table[u8::from(kind) as usize]
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Disconnected,
    Connected,
    Initializing,
    Up,
    Down,
}

/// Subsystem status passed to the application handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub state: StreamState,
    pub stream: VideoStream,
    pub avi: AviInfoFrame,
    pub gcp: GeneralControl,
    pub audio: AudioInfoFrame,
    /// [DrmInfoFrame::no_info] while no DRM InfoFrame was received since the last stream
    /// loss.
    pub drm: DrmInfoFrame,
    pub vsif: VendorSpecificInfoFrame,
    /// Last received auxiliary packet.
    pub aux_packet: AuxPacket,
    pub bridge_mode: BridgeMode,
    pub audio_active: bool,
    pub audio_channels: u8,
    /// The link error counters reached their maximum.
    pub link_error_max: bool,
    /// Line rate in Mbps.
    pub line_rate_mbps: u32,
    pub hdcp_protocol: HdcpProtocol,
}

impl Status {
    pub fn new(ppc: PixelsPerClock) -> Self {
        Self {
            state: StreamState::Disconnected,
            stream: VideoStream {
                ppc,
                ..VideoStream::default()
            },
            avi: AviInfoFrame::default(),
            gcp: GeneralControl::default(),
            audio: AudioInfoFrame::default(),
            drm: DrmInfoFrame::no_info(),
            vsif: VendorSpecificInfoFrame::default(),
            aux_packet: AuxPacket::default(),
            bridge_mode: BridgeMode::Normal,
            audio_active: false,
            audio_channels: 0,
            link_error_max: false,
            line_rate_mbps: 0,
            hdcp_protocol: HdcpProtocol::None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    pub ppc: PixelsPerClock,
    /// Deep color modes signalled by the source are limited to this depth.
    pub max_color_depth: ColorDepth,
    pub hdcp_capability: HdcpCapability,
    pub mmcm: MmcmConfig,
    pub hpd_toggle_time: Milliseconds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ppc: PixelsPerClock::Two,
            max_color_depth: ColorDepth::Bpc12,
            hdcp_capability: HdcpCapability::Both,
            mmcm: MmcmConfig::default(),
            hpd_toggle_time: DEFAULT_HPD_TOGGLE_TIME,
        }
    }
}

/// Clock interface of the video PHY.
pub trait RxPhy {
    /// Recovered TMDS reference clock.
    fn reference_clock(&mut self) -> Hertz;

    /// Program and start the RX MMCM.
    fn start_mmcm(&mut self, params: &MmcmParams);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("reference clock is zero")]
    ZeroClock,
    #[error("mmcm error: {0}")]
    Mmcm(#[from] MmcmError),
}

/// Effective pixel clock for the given TMDS reference clock. YUV 4:2:2 is always
/// transmitted with 8 bits per component.
pub fn pixel_clock(ref_clock: Hertz, color_format: ColorFormat, depth: ColorDepth) -> Hertz {
    let clock = ref_clock.raw() as u64;
    let pixel_clock = if color_format == ColorFormat::Yuv422 {
        clock
    } else {
        match depth {
            ColorDepth::Bpc8 => clock,
            ColorDepth::Bpc10 => clock * 4 / 5,
            ColorDepth::Bpc12 => clock * 2 / 3,
            ColorDepth::Bpc16 => clock / 2,
        }
    };
    Hertz::from_raw(pixel_clock as u32)
}

/// Line rate in Mbps for the given TMDS reference clock.
#[inline]
pub const fn line_rate_mbps(ref_clock: Hertz, tmds_clock_ratio: bool) -> u32 {
    if tmds_clock_ratio {
        ref_clock.raw() / 25_000
    } else {
        ref_clock.raw() / 100_000
    }
}

// Picture aspect variants of the same timing only differ in the VIC.
const fn base_vic(vic: u8) -> u8 {
    match vic {
        3 => 2,
        7 => 6,
        18 => 17,
        22 => 21,
        _ => vic,
    }
}

pub struct RxSubsystem<Core, Phy, E14 = NoHdcp, E22 = NoHdcp, Ctx = ()> {
    core: Core,
    phy: Phy,
    hdcp: HdcpLayer<E14, E22>,
    handlers: Handlers<Ctx>,
    ctx: Ctx,
    log: EventLog,
    config: Config,
    status: Status,
}

impl<Core: RxCore, Phy: RxPhy, E14: HdcpEngine, E22: HdcpEngine, Ctx>
    RxSubsystem<Core, Phy, E14, E22, Ctx>
{
    pub fn new(
        core: Core,
        phy: Phy,
        hdcp14: Option<E14>,
        hdcp22: Option<E22>,
        ctx: Ctx,
        config: Config,
    ) -> Self {
        Self {
            core,
            phy,
            hdcp: HdcpLayer::new(hdcp14, hdcp22),
            handlers: Handlers::new(),
            ctx,
            log: EventLog::new(),
            config,
            status: Status::new(config.ppc),
        }
    }

    delegate::delegate! {
        to self.hdcp {
            #[call(is_enabled)]
            pub fn hdcp_is_enabled(&self) -> bool;
            #[call(is_authenticated)]
            pub fn hdcp_is_authenticated(&self) -> bool;
            #[call(is_encrypted)]
            pub fn hdcp_is_encrypted(&self) -> bool;
            #[call(is_in_progress)]
            pub fn hdcp_is_in_progress(&self) -> bool;
            #[call(protocol)]
            pub fn hdcp_protocol(&self) -> HdcpProtocol;
            #[call(capability)]
            pub fn hdcp_capability(&self) -> HdcpCapability;
        }
    }

    #[inline]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    #[inline]
    pub const fn state(&self) -> StreamState {
        self.status.state
    }

    #[inline]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub const fn core(&self) -> &Core {
        &self.core
    }

    #[inline]
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    #[inline]
    pub fn phy_mut(&mut self) -> &mut Phy {
        &mut self.phy
    }

    #[inline]
    pub const fn ctx(&self) -> &Ctx {
        &self.ctx
    }

    #[inline]
    pub fn ctx_mut(&mut self) -> &mut Ctx {
        &mut self.ctx
    }

    #[inline]
    pub fn event_log(&mut self) -> &mut EventLog {
        &mut self.log
    }

    #[inline]
    pub fn hdcp(&mut self) -> &mut HdcpLayer<E14, E22> {
        &mut self.hdcp
    }

    /// Register a handler. A handler registered before for the same kind is replaced and
    /// returned.
    pub fn set_handler(
        &mut self,
        kind: HandlerKind,
        handler: Handler<Ctx>,
    ) -> Option<Handler<Ctx>> {
        self.handlers.set(kind, handler)
    }

    pub fn clear_handler(&mut self, kind: HandlerKind) -> Option<Handler<Ctx>> {
        self.handlers.clear(kind)
    }

    pub fn start(&mut self) {
        self.log.write(LogEvent::Start, 0);
        self.core.start();
        if self.hdcp.is_present() {
            if let Err(e) = self
                .hdcp
                .set_capability(self.config.hdcp_capability, &mut self.core)
            {
                log::warn!("setting HDCP capability failed: {}", e);
            }
        }
    }

    pub fn stop(&mut self) {
        self.log.write(LogEvent::Stop, 0);
        self.core.stop();
        self.on_stream_down();
    }

    /// Pulse all reset lines and reset the HDCP engines. The connection state is kept.
    pub fn reset(&mut self) {
        self.log.write(LogEvent::Reset, 0);
        for asserted in [true, false] {
            for line in [
                ResetLine::Video,
                ResetLine::Link,
                ResetLine::ExtVideo,
                ResetLine::ExtSystem,
            ] {
                self.core.set_reset(line, asserted);
            }
        }
        if let Err(e) = self.hdcp.reset() {
            log::warn!("HDCP reset failed: {}", e);
        }
        self.hdcp.clear_events();
        self.status = Status {
            state: self.status.state,
            hdcp_protocol: self.hdcp.protocol(),
            ..Status::new(self.config.ppc)
        };
    }

    /// Interrupt handler of the RX core.
    pub fn handle_interrupt(&mut self) {
        for event in self.core.service_interrupts() {
            self.on_core_event(event);
        }
    }

    /// Set the stream clock after the PHY locked. The line rate decides whether the
    /// stream is received with four or two pixels per clock.
    pub fn set_stream(&mut self, clock: Hertz, line_rate_mbps: u32) -> Result<(), StreamError> {
        if clock.raw() == 0 {
            self.log.write(LogEvent::SetStreamError, 0);
            log::error!("cannot set stream with a zero clock");
            return Err(StreamError::ZeroClock);
        }
        let stream = &mut self.status.stream;
        stream.ref_clock = clock;
        if line_rate_mbps > HIGH_LINE_RATE_MBPS {
            stream.ppc = PixelsPerClock::Four;
            stream.pixel_clock = Hertz::from_raw(clock.raw().saturating_mul(4));
        } else {
            stream.ppc = PixelsPerClock::Two;
            stream.pixel_clock = clock;
        }
        self.status.line_rate_mbps = line_rate_mbps;
        self.log.write(LogEvent::SetStream, 0);
        Ok(())
    }

    /// Toggle the HPD line to make the source re-read the EDID and restart the link.
    pub fn toggle_hpd(&mut self, delay: &mut impl DelayNs) {
        self.core.clear_scdc();
        self.core.set_scrambler(false);
        self.core.set_hpd(false);
        delay.delay_ms(self.config.hpd_toggle_time.ticks());
        self.core.set_hpd(true);
    }

    /// Run the HDCP engines. Must be called periodically from the main loop.
    pub fn poll_hdcp(&mut self) -> Option<HdcpStatusEvent> {
        let event = self.hdcp.poll(&mut self.core)?;
        self.dispatch(HandlerKind::from(event));
        Some(event)
    }

    pub fn set_hdcp_protocol(&mut self, protocol: HdcpProtocol) -> Result<(), HdcpError> {
        let result = self.hdcp.set_protocol(protocol, &mut self.core);
        self.status.hdcp_protocol = self.hdcp.protocol();
        if let Err(e) = result {
            log::warn!("selecting HDCP protocol {:?} failed: {}", protocol, e);
        }
        result
    }

    pub fn set_hdcp_capability(&mut self, capability: HdcpCapability) -> Result<(), HdcpError> {
        self.config.hdcp_capability = capability;
        let result = self.hdcp.set_capability(capability, &mut self.core);
        self.status.hdcp_protocol = self.hdcp.protocol();
        if let Err(e) = result {
            log::warn!("setting HDCP capability {:?} failed: {}", capability, e);
        }
        result
    }

    fn on_core_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Connect(connected) => self.on_connect(connected),
            CoreEvent::ModeChange { hdmi } => {
                self.status.stream.is_hdmi = hdmi;
                if hdmi {
                    self.push_hdcp_event(HdcpEvent::HdmiMode);
                    self.log.write(LogEvent::HdmiMode, 0);
                } else {
                    self.push_hdcp_event(HdcpEvent::DviMode);
                    self.log.write(LogEvent::DviMode, 0);
                }
            }
            CoreEvent::TmdsClockRatio(ratio) => {
                self.status.stream.tmds_clock_ratio = ratio;
                self.dispatch(HandlerKind::TmdsClockRatio);
            }
            CoreEvent::BridgeOverflow => {
                self.log.write(LogEvent::BridgeOverflow, 0);
                log::warn!("video bridge overflow");
            }
            CoreEvent::StreamInit => self.on_stream_init(),
            CoreEvent::StreamUp => self.on_stream_up(),
            CoreEvent::StreamDown => self.on_stream_down(),
            CoreEvent::SyncLoss(lost) => {
                if lost {
                    self.push_hdcp_event(HdcpEvent::SyncLoss);
                    self.log.write(LogEvent::SyncLoss, 0);
                } else {
                    self.push_hdcp_event(HdcpEvent::SyncEstablished);
                    self.log.write(LogEvent::SyncEstablished, 0);
                }
            }
            CoreEvent::HdcpMessage(events) => self.hdcp.handle_ddc_message(events),
            CoreEvent::Hdcp14Protocol => self.on_protocol_request(HdcpProtocol::Hdcp14),
            CoreEvent::Hdcp22Protocol => self.on_protocol_request(HdcpProtocol::Hdcp22),
            CoreEvent::AuxPacket(packet) => self.on_aux_packet(packet),
            CoreEvent::Audio { active, channels } => {
                self.status.audio_active = active;
                self.status.audio_channels = channels;
                self.dispatch(HandlerKind::Audio);
            }
            CoreEvent::LinkStatus { error_max } => {
                self.status.link_error_max = error_max;
                self.log.write(LogEvent::LinkStatus, error_max as u8);
                self.dispatch(HandlerKind::LinkStatus);
            }
        }
    }

    fn on_connect(&mut self, connected: bool) {
        if connected {
            self.core.set_hpd(true);
            self.status.state = StreamState::Connected;
            self.push_hdcp_event(HdcpEvent::Connect);
            self.log.write(LogEvent::Connect, 0);
        } else {
            self.core.set_hpd(false);
            self.core.set_scrambler(false);
            self.status.state = StreamState::Disconnected;
            self.push_hdcp_event(HdcpEvent::Disconnect);
            self.log.write(LogEvent::Disconnect, 0);
        }
        self.dispatch(HandlerKind::Connect);
    }

    fn on_stream_init(&mut self) {
        let ref_clock = self.phy.reference_clock();
        let stream = &self.status.stream;
        let color_depth = if stream.color_format == ColorFormat::Yuv422 {
            ColorDepth::Bpc8
        } else {
            stream.color_depth
        };
        let line_rate = line_rate_mbps(ref_clock, stream.tmds_clock_ratio);
        let request = RxClockRequest {
            ref_clk: ref_clock,
            line_rate_mbps: line_rate,
            ppc: self.config.ppc,
            color_depth,
            tmds_clock_ratio: stream.tmds_clock_ratio,
        };
        let params = match mmcm::calculate_rx_params(&self.config.mmcm, &request) {
            Ok(params) => params,
            Err(e) => {
                self.log.write(LogEvent::StreamInitError, 0);
                log::warn!("stream init failed: {}", e);
                return;
            }
        };
        self.status.state = StreamState::Initializing;
        self.log.write(LogEvent::StreamInit, 0);
        self.phy.start_mmcm(&params);
        let stream = &mut self.status.stream;
        stream.ref_clock = ref_clock;
        stream.pixel_clock = pixel_clock(ref_clock, stream.color_format, stream.color_depth);
        self.status.line_rate_mbps = line_rate;
        self.dispatch(HandlerKind::StreamInit);
    }

    fn on_stream_up(&mut self) {
        self.core.clear_link_status();
        self.status.state = StreamState::Up;
        self.log.write(LogEvent::StreamUp, 0);
        self.core.set_reset(ResetLine::ExtVideo, false);
        self.core.set_reset(ResetLine::ExtSystem, false);
        self.status.stream.timing = self.core.video_timing();

        match bridge::select(&self.status.stream.format()) {
            Ok(mode) => {
                self.status.bridge_mode = mode;
                self.core.set_bridge_mode(mode);
            }
            Err(e) => {
                self.log.write(LogEvent::PixelRepetitionError, e.0);
                log::warn!("{}, keeping bridge mode {:?}", e, self.status.bridge_mode);
            }
        }
        self.push_hdcp_event(HdcpEvent::StreamUp);

        let vic = self.status.stream.vic;
        if let Some(measured) = self.status.stream.timing.cea_vic() {
            if vic != 0 && base_vic(vic) != base_vic(measured) {
                self.log.write(LogEvent::VicError, vic);
                log::warn!("VIC {} does not match the measured timing (VIC {})", vic, measured);
                self.dispatch(HandlerKind::VicError);
            }
        }
        self.dispatch(HandlerKind::StreamUp);
    }

    fn on_stream_down(&mut self) {
        self.core.set_reset(ResetLine::Video, true);
        self.core.set_reset(ResetLine::ExtVideo, true);
        self.core.set_reset(ResetLine::ExtSystem, true);
        self.status.state = StreamState::Down;
        self.log.write(LogEvent::StreamDown, 0);
        self.status.avi = AviInfoFrame::default();
        self.status.drm = DrmInfoFrame::no_info();
        self.status.vsif = VendorSpecificInfoFrame::default();
        // Format fields taken from the InfoFrames must not leak into the next stream.
        let defaults = VideoStream::default();
        let stream = &mut self.status.stream;
        stream.color_format = defaults.color_format;
        stream.pixel_repetition = defaults.pixel_repetition;
        stream.vic = defaults.vic;
        stream.aspect_ratio = defaults.aspect_ratio;
        stream.is_3d = defaults.is_3d;
        self.push_hdcp_event(HdcpEvent::StreamDown);
        self.dispatch(HandlerKind::StreamDown);
    }

    fn on_protocol_request(&mut self, protocol: HdcpProtocol) {
        match self.hdcp.handle_protocol_request(protocol, &mut self.core) {
            Ok(()) => {
                let event = match protocol {
                    HdcpProtocol::Hdcp22 => LogEvent::Hdcp22,
                    _ => LogEvent::Hdcp14,
                };
                self.log.write(event, 0);
            }
            Err(e) => log::warn!("source requested HDCP protocol {:?}: {}", protocol, e),
        }
        self.status.hdcp_protocol = self.hdcp.protocol();
    }

    fn on_aux_packet(&mut self, packet: AuxPacket) {
        self.status.aux_packet = packet;
        match packet.packet_type() {
            Some(PacketType::Avi) => {
                let avi = AviInfoFrame::from_packet(&packet);
                let stream = &mut self.status.stream;
                stream.color_format = avi.color_format;
                stream.vic = avi.vic;
                stream.aspect_ratio = avi.picture_aspect;
                stream.pixel_repetition = avi.pixel_repetition;
                self.status.avi = avi;
            }
            Some(PacketType::GeneralControl) => {
                let gcp = GeneralControl::from_packet(&packet);
                if let Some(depth) = gcp.color_depth {
                    self.status.stream.color_depth =
                        if depth as u8 > self.config.max_color_depth as u8 {
                            self.config.max_color_depth
                        } else {
                            depth
                        };
                }
                self.status.gcp = gcp;
            }
            Some(PacketType::Audio) => {
                self.status.audio = AudioInfoFrame::from_packet(&packet);
            }
            Some(PacketType::DynamicRange) => {
                self.status.drm = DrmInfoFrame::from_packet(&packet);
            }
            Some(PacketType::VendorSpecific) => {
                let vsif = VendorSpecificInfoFrame::from_packet(&packet);
                if let Some(vic) = vsif.cea_vic() {
                    self.status.stream.vic = vic;
                }
                self.status.stream.is_3d = vsif.is_3d();
                self.status.vsif = vsif;
            }
            Some(PacketType::SourceProductDescriptor) | None => (),
        }
        self.dispatch(HandlerKind::AuxPacket);
    }

    fn push_hdcp_event(&mut self, event: HdcpEvent) {
        if self.hdcp.is_present() {
            self.hdcp.push_event(event);
        }
    }

    fn dispatch(&mut self, kind: HandlerKind) {
        if let Some(handler) = self.handlers.get(kind) {
            handler(&mut self.ctx, &self.status);
        }
    }
}
