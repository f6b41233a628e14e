//! # DisplayPort RX HDCP register subset
//!
//! The DisplayPort RX core answers DPCD reads of the HDCP 1.x port from a table of
//! 32-bit registers. Each register holds four consecutive port bytes in little-endian
//! order. Writes to the word containing the KSV FIFO push into the hardware FIFO.

/// HDCP related interrupt sources of the DP RX core.
#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct HdcpInterrupts {
    #[bit(21, rw)]
    binfo_read: bool,
    #[bit(20, rw)]
    ro_read: bool,
    #[bit(19, rw)]
    ainfo_write: bool,
    #[bit(18, rw)]
    an_write: bool,
    #[bit(17, rw)]
    aksv_write: bool,
    #[bit(16, rw)]
    debug_write: bool,
}

impl HdcpInterrupts {
    /// The three sources serviced by the HDCP port.
    pub const PORT_EVENTS: Self = Self::new_with_raw_value(0)
        .with_aksv_write(true)
        .with_ro_read(true)
        .with_binfo_read(true);
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct DpRx {
    _reserved_0: [u32; 0x5],
    /// Interrupt mask register. A set bit masks the interrupt source.
    interrupt_mask: HdcpInterrupts,
    _reserved_1: [u32; 0xA],
    /// Interrupt cause register, cleared on read.
    #[mmio(Read)]
    interrupt_cause: HdcpInterrupts,
    _reserved_2: [u32; 0x3AF],
    /// HDCP 1.x port table, mirrors the DPCD range 0x68000..0x68100.
    hdcp_table: [u32; 0x40],
}

static_assertions::const_assert_eq!(core::mem::size_of::<DpRx>(), 0x1000);

/// Byte offset of the HDCP table inside [DpRx].
pub const HDCP_TABLE_OFFSET: usize = 0x0F00;
