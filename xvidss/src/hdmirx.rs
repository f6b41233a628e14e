//! # HDMI RX protocol core
//!
//! The core is split into peripheral blocks (PIO, timer, video timing detector, DDC,
//! auxiliary packets, audio, link status). Most blocks share the same layout: ID register,
//! control register with set/clear aliases and a status register where the event flags
//! are cleared by writing a one.
use arbitrary_int::{u4, u24};

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug)]
pub struct Version {
    #[bits(24..=31, r)]
    major: u8,
    #[bits(16..=23, r)]
    minor: u8,
    #[bits(8..=15, r)]
    revision: u8,
}

/// Shared control layout of the peripheral blocks.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct BlockCtrl {
    #[bit(1, rw)]
    interrupt_enable: bool,
    #[bit(0, rw)]
    run: bool,
}

/// PIO output bits.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PioOut {
    #[bit(30, rw)]
    bridge_pixel_drop: bool,
    #[bit(29, rw)]
    bridge_yuv420: bool,
    #[bit(7, rw)]
    hpd: bool,
    #[bit(6, rw)]
    axis_enable: bool,
    #[bit(5, rw)]
    ext_system_reset: bool,
    #[bit(4, rw)]
    ext_video_reset: bool,
    #[bit(3, rw)]
    video_reset: bool,
    #[bit(2, rw)]
    scrambler: bool,
    #[bit(1, rw)]
    video_enable: bool,
    #[bit(0, rw)]
    link_reset: bool,
}

/// PIO input bits. The same layout is used for the input event registers.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PioIn {
    #[bit(7, rw)]
    bridge_overflow: bool,
    #[bit(6, rw)]
    scdc_tmds_clock_ratio: bool,
    #[bit(5, rw)]
    scdc_scrambler_enable: bool,
    #[bit(4, rw)]
    scrambler_lock: bool,
    /// Set for HDMI, cleared for DVI.
    #[bit(3, rw)]
    mode: bool,
    #[bit(2, rw)]
    video_ready: bool,
    #[bit(1, rw)]
    link_ready: bool,
    /// Cable detect (+5V).
    #[bit(0, rw)]
    det: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Pio {
    #[mmio(PureRead)]
    id: u32,
    ctrl: BlockCtrl,
    #[mmio(Write)]
    ctrl_set: BlockCtrl,
    #[mmio(Write)]
    ctrl_clr: BlockCtrl,
    #[mmio(PureRead)]
    status: u32,
    out: PioOut,
    #[mmio(Write)]
    out_set: PioOut,
    #[mmio(Write)]
    out_clr: PioOut,
    out_mask: PioOut,
    #[mmio(PureRead)]
    input: PioIn,
    /// Input change events, write one to clear.
    #[mmio(PureRead, Write)]
    in_event: PioIn,
    in_event_rising: PioIn,
    in_event_falling: PioIn,
    _reserved: [u32; 0x3],
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct TimerStatus {
    #[bit(1, rw)]
    counter_event: bool,
    #[bit(0, r)]
    irq: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Timer {
    #[mmio(PureRead)]
    id: u32,
    ctrl: BlockCtrl,
    #[mmio(Write)]
    ctrl_set: BlockCtrl,
    #[mmio(Write)]
    ctrl_clr: BlockCtrl,
    #[mmio(PureRead, Write)]
    status: TimerStatus,
    /// Down counter in AXI clock cycles. Writing a value starts the timer.
    counter: u32,
    _reserved: [u32; 0x2],
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct VtdCtrl {
    /// Timebase in AXI clock cycles.
    #[bits(8..=31, rw)]
    timebase: u24,
    #[bit(2, rw)]
    field_polarity: bool,
    #[bit(1, rw)]
    interrupt_enable: bool,
    #[bit(0, rw)]
    run: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct VtdStatus {
    #[bit(5, r)]
    interlaced: bool,
    #[bit(4, r)]
    hsync_polarity: bool,
    #[bit(3, r)]
    vsync_polarity: bool,
    #[bit(2, rw)]
    sync_loss_event: bool,
    #[bit(1, rw)]
    timebase_event: bool,
    #[bit(0, r)]
    irq: bool,
}

/// Measured pair of values. For vertical values `field_1` holds the second field of an
/// interlaced frame.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Measurement {
    #[bits(16..=31, r)]
    field_1: u16,
    #[bits(0..=15, r)]
    field_0: u16,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Vtd {
    #[mmio(PureRead)]
    id: u32,
    ctrl: VtdCtrl,
    #[mmio(Write)]
    ctrl_set: VtdCtrl,
    #[mmio(Write)]
    ctrl_clr: VtdCtrl,
    #[mmio(PureRead, Write)]
    status: VtdStatus,
    #[mmio(PureRead)]
    total_pixels: Measurement,
    #[mmio(PureRead)]
    active_pixels: Measurement,
    #[mmio(PureRead)]
    total_lines: Measurement,
    #[mmio(PureRead)]
    active_lines: Measurement,
    #[mmio(PureRead)]
    vsync_width: Measurement,
    #[mmio(PureRead)]
    hsync_width: Measurement,
    #[mmio(PureRead)]
    vfront_porch: Measurement,
    #[mmio(PureRead)]
    vback_porch: Measurement,
    #[mmio(PureRead)]
    hfront_porch: Measurement,
    #[mmio(PureRead)]
    hback_porch: Measurement,
    _reserved: u32,
}

#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum DdcHdcpMode {
    Hdcp14 = 0,
    Hdcp22 = 1,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct DdcCtrl {
    #[bit(6, rw)]
    scdc_clear: bool,
    #[bit(5, rw)]
    hdcp_mode: DdcHdcpMode,
    #[bit(4, rw)]
    hdcp_enable: bool,
    #[bit(3, rw)]
    scdc_enable: bool,
    #[bit(1, rw)]
    interrupt_enable: bool,
    #[bit(0, rw)]
    run: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct DdcStatus {
    #[bit(12, rw)]
    hdcp_2_protocol_event: bool,
    #[bit(11, rw)]
    hdcp_1_protocol_event: bool,
    #[bit(10, r)]
    hdcp_2_protocol: bool,
    #[bit(9, r)]
    hdcp_1_protocol: bool,
    #[bit(8, rw)]
    hdcp_read_message_not_complete_event: bool,
    #[bit(7, rw)]
    hdcp_read_message_end_event: bool,
    #[bit(6, rw)]
    hdcp_write_message_new_event: bool,
    #[bit(5, rw)]
    hdcp_aksv_event: bool,
    #[bit(2, r)]
    busy: bool,
    #[bit(0, r)]
    irq: bool,
}

impl DdcStatus {
    /// Event bits forwarded to the HDCP engines.
    pub const HDCP_MESSAGE_EVENTS: u32 = (1 << 5) | (1 << 6) | (1 << 7) | (1 << 8);
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Ddc {
    #[mmio(PureRead)]
    id: u32,
    ctrl: DdcCtrl,
    #[mmio(Write)]
    ctrl_set: DdcCtrl,
    #[mmio(Write)]
    ctrl_clr: DdcCtrl,
    #[mmio(PureRead, Write)]
    status: DdcStatus,
    #[mmio(PureRead)]
    edid_status: u32,
    #[mmio(PureRead)]
    hdcp_status: u32,
    _reserved: [u32; 0x9],
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct AuxStatus {
    /// Number of packets in the FIFO.
    #[bits(8..=11, r)]
    packet_count: u4,
    #[bit(3, r)]
    fifo_empty: bool,
    #[bit(2, rw)]
    error_event: bool,
    #[bit(1, rw)]
    new_packet_event: bool,
    #[bit(0, r)]
    irq: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Aux {
    #[mmio(PureRead)]
    id: u32,
    ctrl: BlockCtrl,
    #[mmio(Write)]
    ctrl_set: BlockCtrl,
    #[mmio(Write)]
    ctrl_clr: BlockCtrl,
    #[mmio(PureRead, Write)]
    status: AuxStatus,
    /// Packet FIFO. One packet is read as a header word followed by eight data words.
    #[mmio(Read)]
    data: u32,
    _reserved: [u32; 0xA],
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum AudioChannels {
    Two = 0,
    Four = 1,
    Six = 2,
    Eight = 3,
}

impl AudioChannels {
    pub const fn count(&self) -> u8 {
        match self {
            AudioChannels::Two => 2,
            AudioChannels::Four => 4,
            AudioChannels::Six => 6,
            AudioChannels::Eight => 8,
        }
    }
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct AudioStatus {
    #[bits(4..=5, r)]
    channels: AudioChannels,
    #[bit(3, r)]
    active: bool,
    #[bit(2, rw)]
    channel_event: bool,
    #[bit(1, rw)]
    active_event: bool,
    #[bit(0, r)]
    irq: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Audio {
    #[mmio(PureRead)]
    id: u32,
    ctrl: BlockCtrl,
    #[mmio(Write)]
    ctrl_set: BlockCtrl,
    #[mmio(Write)]
    ctrl_clr: BlockCtrl,
    #[mmio(PureRead, Write)]
    status: AudioStatus,
    #[mmio(PureRead)]
    cts: u32,
    #[mmio(PureRead)]
    n: u32,
    _reserved: u32,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct LinkStatusCtrl {
    #[bit(2, rw)]
    error_counter_clear: bool,
    #[bit(1, rw)]
    interrupt_enable: bool,
    #[bit(0, rw)]
    run: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct LinkStatusStatus {
    #[bit(2, r)]
    error_max: bool,
    #[bit(1, rw)]
    error_max_event: bool,
    #[bit(0, r)]
    irq: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct LinkStatus {
    #[mmio(PureRead)]
    id: u32,
    ctrl: LinkStatusCtrl,
    #[mmio(Write)]
    ctrl_set: LinkStatusCtrl,
    #[mmio(Write)]
    ctrl_clr: LinkStatusCtrl,
    #[mmio(PureRead, Write)]
    status: LinkStatusStatus,
    /// Character error counters for the three TMDS channels.
    #[mmio(PureRead)]
    errors: [u32; 3],
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct HdmiRx {
    #[mmio(PureRead)]
    id: u32,
    #[mmio(PureRead)]
    version: Version,
    _reserved: [u32; 0x6],
    #[mmio(Inner)]
    pio: Pio,
    #[mmio(Inner)]
    timer: Timer,
    #[mmio(Inner)]
    vtd: Vtd,
    #[mmio(Inner)]
    ddc: Ddc,
    #[mmio(Inner)]
    aux: Aux,
    #[mmio(Inner)]
    audio: Audio,
    #[mmio(Inner)]
    link_status: LinkStatus,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Pio>(), 0x40);
static_assertions::const_assert_eq!(core::mem::size_of::<Timer>(), 0x20);
static_assertions::const_assert_eq!(core::mem::size_of::<Vtd>(), 0x40);
static_assertions::const_assert_eq!(core::mem::size_of::<Ddc>(), 0x40);
static_assertions::const_assert_eq!(core::mem::size_of::<Aux>(), 0x40);
static_assertions::const_assert_eq!(core::mem::size_of::<Audio>(), 0x20);
static_assertions::const_assert_eq!(core::mem::size_of::<LinkStatus>(), 0x20);
static_assertions::const_assert_eq!(core::mem::size_of::<HdmiRx>(), 0x180);

impl HdmiRx {
    /// Create a new HDMI RX MMIO instance for the core at the given base address.
    ///
    /// # Safety
    ///
    /// The address must point to an HDMI RX core. This API can be used to potentially
    /// create a driver to the same peripheral structure from multiple threads. The user must
    /// ensure that concurrent accesses are safe and do not interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_at_base(base_addr: usize) -> MmioHdmiRx<'static> {
        unsafe { HdmiRx::new_mmio_at(base_addr) }
    }
}
