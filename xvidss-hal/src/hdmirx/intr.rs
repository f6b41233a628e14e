//! Interrupt event router of the HDMI RX core.
//!
//! The [Router] turns a snapshot of the sub-core status registers into an ordered list
//! of [CoreEvent]s for the subsystem and a list of [CoreAction]s which the core driver
//! has to apply to the hardware. It also tracks the lock sequence of the core:
//!
//! ```text
//! link ready -> Idle --10 ms--> Init (StreamInit) --video ready--> Arm --200 ms--> Lock
//!                                                                                 |
//!                          Up (StreamUp) <--valid timing on timing detector event--+
//! ```
//!
//! Sub-cores are always decoded in the order PIO, timer, timing detector, DDC, AUX,
//! audio and link status.
use heapless::Vec;
use xvidss::hdmirx::{AudioStatus, DdcStatus, LinkStatusStatus, PioIn, VtdStatus};

use crate::infoframe::AuxPacket;
use crate::time::Milliseconds;

/// Settle time after the link became ready.
pub const LINK_SETTLE_TIME: Milliseconds = Milliseconds::millis(10);
/// Time to wait for the video to lock, 5 frames of a UHD stream.
pub const LOCK_TIME: Milliseconds = Milliseconds::millis(200);

pub const MAX_EVENTS: usize = 16;
pub const MAX_ACTIONS: usize = 12;

pub type CoreEvents = Vec<CoreEvent, MAX_EVENTS>;
pub type CoreActions = Vec<CoreAction, MAX_ACTIONS>;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum CoreState {
    Idle,
    Init,
    Arm,
    Lock,
    Up,
    #[default]
    Down,
}

/// Sub-core status captured in one interrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqSnapshot {
    /// Input change events.
    pub pio_events: PioIn,
    /// Input levels.
    pub pio_in: PioIn,
    pub timer_expired: bool,
    pub vtd: VtdStatus,
    /// Whether the timing measured by the timing detector is valid. Only evaluated for
    /// timebase events.
    pub timing_valid: bool,
    pub ddc: DdcStatus,
    pub aux_packet: Option<AuxPacket>,
    pub audio: AudioStatus,
    pub link_status: LinkStatusStatus,
}

impl IrqSnapshot {
    /// Snapshot without any pending event.
    pub const fn new(pio_in: PioIn) -> Self {
        Self {
            pio_events: PioIn::new_with_raw_value(0),
            pio_in,
            timer_expired: false,
            vtd: VtdStatus::new_with_raw_value(0),
            timing_valid: false,
            ddc: DdcStatus::new_with_raw_value(0),
            aux_packet: None,
            audio: AudioStatus::new_with_raw_value(0),
            link_status: LinkStatusStatus::new_with_raw_value(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Cable connected (`true`) or disconnected.
    Connect(bool),
    ModeChange {
        hdmi: bool,
    },
    TmdsClockRatio(bool),
    BridgeOverflow,
    StreamInit,
    StreamUp,
    StreamDown,
    /// Sync lost (`true`) or established again while the stream is up.
    SyncLoss(bool),
    /// HDCP message events of the DDC slave with the raw [DdcStatus] event bits.
    HdcpMessage(u32),
    Hdcp14Protocol,
    Hdcp22Protocol,
    AuxPacket(AuxPacket),
    Audio {
        active: bool,
        channels: u8,
    },
    LinkStatus {
        error_max: bool,
    },
}

/// Hardware operations requested by the router.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoreAction {
    StartTimer(Milliseconds),
    ClearScdc,
    SetScrambler(bool),
    /// Pulse the core video reset and the external video and system resets.
    ToggleVideoResets,
    /// Assert the core video and link resets.
    AssertCoreResets,
    /// Enable the AUX and audio blocks and release the core resets.
    EnableStreamPath,
    /// Disable the AUX, audio and timing detector blocks and the video output.
    DisableStreamPath,
    EnableVtd,
    EnableVideoOutput,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub events: CoreEvents,
    pub actions: CoreActions,
}

impl Dispatch {
    fn event(&mut self, event: CoreEvent) {
        // The capacity covers all events of a single snapshot.
        let _ = self.events.push(event);
    }

    fn action(&mut self, action: CoreAction) {
        let _ = self.actions.push(action);
    }
}

#[derive(Debug, Default)]
pub struct Router {
    state: CoreState,
    sync_lost: bool,
}

impl Router {
    pub const fn new() -> Self {
        Self {
            state: CoreState::Down,
            sync_lost: false,
        }
    }

    #[inline]
    pub const fn state(&self) -> CoreState {
        self.state
    }

    #[inline]
    pub const fn sync_lost(&self) -> bool {
        self.sync_lost
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn route(&mut self, snap: &IrqSnapshot) -> Dispatch {
        let mut dispatch = Dispatch::default();
        if snap.pio_events.raw_value() != 0 {
            self.route_pio(snap, &mut dispatch);
        }
        if snap.timer_expired {
            self.route_timer(&mut dispatch);
        }
        self.route_vtd(snap, &mut dispatch);
        Self::route_ddc(snap.ddc, &mut dispatch);
        if let Some(packet) = snap.aux_packet {
            dispatch.event(CoreEvent::AuxPacket(packet));
        }
        if snap.audio.active_event() || snap.audio.channel_event() {
            dispatch.event(CoreEvent::Audio {
                active: snap.audio.active(),
                channels: snap.audio.channels().count(),
            });
        }
        if snap.link_status.error_max_event() {
            dispatch.event(CoreEvent::LinkStatus {
                error_max: snap.link_status.error_max(),
            });
        }
        dispatch
    }

    fn route_pio(&mut self, snap: &IrqSnapshot, dispatch: &mut Dispatch) {
        let events = snap.pio_events;
        let input = snap.pio_in;
        if events.det() {
            if !input.det() {
                dispatch.action(CoreAction::ClearScdc);
            }
            dispatch.event(CoreEvent::Connect(input.det()));
        }
        if events.link_ready() {
            self.state = CoreState::Idle;
            dispatch.action(CoreAction::StartTimer(LINK_SETTLE_TIME));
        }
        if events.video_ready() {
            if input.video_ready() {
                // Any other state is a glitch on the video ready input.
                if self.state == CoreState::Init {
                    dispatch.action(CoreAction::ToggleVideoResets);
                    self.state = CoreState::Arm;
                    dispatch.action(CoreAction::StartTimer(LOCK_TIME));
                }
            } else {
                dispatch.action(CoreAction::AssertCoreResets);
                dispatch.action(CoreAction::DisableStreamPath);
                self.state = CoreState::Down;
                self.sync_lost = false;
                dispatch.event(CoreEvent::StreamDown);
            }
        }
        if events.scdc_scrambler_enable() {
            dispatch.action(CoreAction::SetScrambler(input.scdc_scrambler_enable()));
        }
        if events.mode() {
            if self.state == CoreState::Up {
                self.state = CoreState::Idle;
                dispatch.action(CoreAction::StartTimer(LINK_SETTLE_TIME));
            }
            dispatch.event(CoreEvent::ModeChange { hdmi: input.mode() });
        }
        if events.scdc_tmds_clock_ratio() {
            dispatch.event(CoreEvent::TmdsClockRatio(input.scdc_tmds_clock_ratio()));
        }
        if events.bridge_overflow() {
            dispatch.event(CoreEvent::BridgeOverflow);
        }
    }

    fn route_timer(&mut self, dispatch: &mut Dispatch) {
        match self.state {
            CoreState::Idle => {
                dispatch.action(CoreAction::EnableStreamPath);
                self.state = CoreState::Init;
                dispatch.action(CoreAction::StartTimer(LOCK_TIME));
            }
            CoreState::Init => dispatch.event(CoreEvent::StreamInit),
            CoreState::Arm => {
                dispatch.action(CoreAction::EnableVtd);
                self.state = CoreState::Lock;
            }
            CoreState::Lock | CoreState::Up | CoreState::Down => (),
        }
    }

    fn route_vtd(&mut self, snap: &IrqSnapshot, dispatch: &mut Dispatch) {
        if snap.vtd.timebase_event() {
            match self.state {
                CoreState::Lock if snap.timing_valid => {
                    dispatch.action(CoreAction::EnableVideoOutput);
                    self.state = CoreState::Up;
                    self.sync_lost = false;
                    dispatch.event(CoreEvent::StreamUp);
                }
                CoreState::Up if !snap.timing_valid => self.state = CoreState::Lock,
                CoreState::Up if self.sync_lost => {
                    self.sync_lost = false;
                    dispatch.event(CoreEvent::SyncLoss(false));
                }
                _ => (),
            }
        } else if snap.vtd.sync_loss_event() && self.state == CoreState::Up {
            self.sync_lost = true;
            dispatch.event(CoreEvent::SyncLoss(true));
        }
    }

    fn route_ddc(ddc: DdcStatus, dispatch: &mut Dispatch) {
        let messages = ddc.raw_value() & DdcStatus::HDCP_MESSAGE_EVENTS;
        if messages != 0 {
            dispatch.event(CoreEvent::HdcpMessage(messages));
        }
        if ddc.hdcp_1_protocol_event() {
            dispatch.event(CoreEvent::Hdcp14Protocol);
        }
        if ddc.hdcp_2_protocol_event() {
            dispatch.event(CoreEvent::Hdcp22Protocol);
        }
    }
}

#[cfg(test)]
mod tests {
    use xvidss::hdmirx::AudioChannels;

    use super::*;

    fn pio_in() -> PioIn {
        PioIn::new_with_raw_value(0)
    }

    fn pio_event(events: PioIn, input: PioIn) -> IrqSnapshot {
        IrqSnapshot {
            pio_events: events,
            ..IrqSnapshot::new(input)
        }
    }

    fn timer(input: PioIn) -> IrqSnapshot {
        IrqSnapshot {
            timer_expired: true,
            ..IrqSnapshot::new(input)
        }
    }

    fn timebase(input: PioIn, timing_valid: bool) -> IrqSnapshot {
        IrqSnapshot {
            vtd: VtdStatus::new_with_raw_value(0).with_timebase_event(true),
            timing_valid,
            ..IrqSnapshot::new(input)
        }
    }

    /// Drive the router from link ready up to the locked stream.
    fn bring_up(router: &mut Router) -> PioIn {
        let input = pio_in().with_det(true).with_link_ready(true);
        router.route(&pio_event(pio_in().with_link_ready(true), input));
        router.route(&timer(input));
        let input = input.with_video_ready(true);
        router.route(&pio_event(pio_in().with_video_ready(true), input));
        router.route(&timer(input));
        let dispatch = router.route(&timebase(input, true));
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::StreamUp]);
        input
    }

    #[test]
    fn cable_detect() {
        let mut router = Router::new();
        let det = pio_in().with_det(true);
        let dispatch = router.route(&pio_event(det, det));
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::Connect(true)]);
        assert!(dispatch.actions.is_empty());

        let dispatch = router.route(&pio_event(det, pio_in()));
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::Connect(false)]);
        assert_eq!(dispatch.actions.as_slice(), [CoreAction::ClearScdc]);
    }

    #[test]
    fn lock_sequence() {
        let mut router = Router::new();
        let input = pio_in().with_det(true).with_link_ready(true);
        let dispatch = router.route(&pio_event(pio_in().with_link_ready(true), input));
        assert_eq!(router.state(), CoreState::Idle);
        assert_eq!(
            dispatch.actions.as_slice(),
            [CoreAction::StartTimer(LINK_SETTLE_TIME)]
        );

        let dispatch = router.route(&timer(input));
        assert_eq!(router.state(), CoreState::Init);
        assert_eq!(
            dispatch.actions.as_slice(),
            [
                CoreAction::EnableStreamPath,
                CoreAction::StartTimer(LOCK_TIME)
            ]
        );

        let dispatch = router.route(&timer(input));
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::StreamInit]);
        assert_eq!(router.state(), CoreState::Init);

        let input = input.with_video_ready(true);
        let dispatch = router.route(&pio_event(pio_in().with_video_ready(true), input));
        assert_eq!(router.state(), CoreState::Arm);
        assert_eq!(
            dispatch.actions.as_slice(),
            [
                CoreAction::ToggleVideoResets,
                CoreAction::StartTimer(LOCK_TIME)
            ]
        );

        let dispatch = router.route(&timer(input));
        assert_eq!(router.state(), CoreState::Lock);
        assert_eq!(dispatch.actions.as_slice(), [CoreAction::EnableVtd]);

        let dispatch = router.route(&timebase(input, false));
        assert!(dispatch.events.is_empty());
        assert_eq!(router.state(), CoreState::Lock);

        let dispatch = router.route(&timebase(input, true));
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::StreamUp]);
        assert_eq!(dispatch.actions.as_slice(), [CoreAction::EnableVideoOutput]);
        assert_eq!(router.state(), CoreState::Up);
    }

    #[test]
    fn video_ready_glitch_is_ignored() {
        let mut router = Router::new();
        let input = pio_in().with_video_ready(true);
        let dispatch = router.route(&pio_event(pio_in().with_video_ready(true), input));
        assert!(dispatch.events.is_empty());
        assert!(dispatch.actions.is_empty());
        assert_eq!(router.state(), CoreState::Down);
    }

    #[test]
    fn video_ready_falling_edge_is_stream_down() {
        let mut router = Router::new();
        let input = bring_up(&mut router);
        let dispatch = router.route(&pio_event(
            pio_in().with_video_ready(true),
            input.with_video_ready(false),
        ));
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::StreamDown]);
        assert_eq!(
            dispatch.actions.as_slice(),
            [CoreAction::AssertCoreResets, CoreAction::DisableStreamPath]
        );
        assert_eq!(router.state(), CoreState::Down);
    }

    #[test]
    fn sync_loss_and_recovery() {
        let mut router = Router::new();
        let input = bring_up(&mut router);
        let loss = IrqSnapshot {
            vtd: VtdStatus::new_with_raw_value(0).with_sync_loss_event(true),
            ..IrqSnapshot::new(input)
        };
        let dispatch = router.route(&loss);
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::SyncLoss(true)]);
        assert!(router.sync_lost());

        let dispatch = router.route(&timebase(input, true));
        assert_eq!(dispatch.events.as_slice(), [CoreEvent::SyncLoss(false)]);
        assert!(!router.sync_lost());

        // Invalid timing drops back to the lock state.
        router.route(&timebase(input, false));
        assert_eq!(router.state(), CoreState::Lock);
    }

    #[test]
    fn sync_loss_ignored_unless_up() {
        let mut router = Router::new();
        let loss = IrqSnapshot {
            vtd: VtdStatus::new_with_raw_value(0).with_sync_loss_event(true),
            ..IrqSnapshot::new(pio_in())
        };
        assert!(router.route(&loss).events.is_empty());
    }

    #[test]
    fn mode_change_while_up_restarts_lock() {
        let mut router = Router::new();
        let input = bring_up(&mut router);
        let dispatch = router.route(&pio_event(pio_in().with_mode(true), input.with_mode(true)));
        assert_eq!(
            dispatch.events.as_slice(),
            [CoreEvent::ModeChange { hdmi: true }]
        );
        assert_eq!(
            dispatch.actions.as_slice(),
            [CoreAction::StartTimer(LINK_SETTLE_TIME)]
        );
        assert_eq!(router.state(), CoreState::Idle);
    }

    #[test]
    fn sub_core_order() {
        let mut router = Router::new();
        let input = pio_in()
            .with_det(true)
            .with_scdc_tmds_clock_ratio(true)
            .with_scdc_scrambler_enable(true);
        let packet = AuxPacket::from_payload([0x82, 2, 13, 0], &[0; 28]);
        let snap = IrqSnapshot {
            pio_events: pio_in()
                .with_det(true)
                .with_scdc_tmds_clock_ratio(true)
                .with_bridge_overflow(true)
                .with_scdc_scrambler_enable(true),
            ddc: DdcStatus::new_with_raw_value(0)
                .with_hdcp_aksv_event(true)
                .with_hdcp_1_protocol_event(true),
            aux_packet: Some(packet),
            audio: AudioStatus::new_with_raw_value(
                AudioStatus::new_with_raw_value(0)
                    .with_active_event(true)
                    .raw_value()
                    | (1 << 3)
                    | ((AudioChannels::Six as u32) << 4),
            ),
            link_status: LinkStatusStatus::new_with_raw_value(0b110),
            ..IrqSnapshot::new(input)
        };
        let dispatch = router.route(&snap);
        assert_eq!(
            dispatch.events.as_slice(),
            [
                CoreEvent::Connect(true),
                CoreEvent::TmdsClockRatio(true),
                CoreEvent::BridgeOverflow,
                CoreEvent::HdcpMessage(1 << 5),
                CoreEvent::Hdcp14Protocol,
                CoreEvent::AuxPacket(packet),
                CoreEvent::Audio {
                    active: true,
                    channels: 6
                },
                CoreEvent::LinkStatus { error_max: true },
            ]
        );
        assert_eq!(dispatch.actions.as_slice(), [CoreAction::SetScrambler(true)]);
    }
}
