//! # HDCP 1.x port layout
//!
//! Offsets and bit layouts of the HDCP 1.x register space as it is exposed through the
//! DisplayPort configuration data (DPCD). Sink devices expose this space starting at
//! [DPCD_BASE_ADDR], all offsets below are relative to that address.
use arbitrary_int::{u3, u7};

/// DPCD address of the HDCP 1.x port.
pub const DPCD_BASE_ADDR: u32 = 0x0006_8000;

/// Size of the logical port window in bytes.
pub const PORT_SIZE: usize = 0x100;

pub mod offset {
    pub const BKSV: u8 = 0x00;
    pub const RO: u8 = 0x05;
    pub const AKSV: u8 = 0x07;
    pub const AN: u8 = 0x0C;
    pub const VH0: u8 = 0x14;
    pub const VH1: u8 = 0x18;
    pub const VH2: u8 = 0x1C;
    pub const VH3: u8 = 0x20;
    pub const VH4: u8 = 0x24;
    pub const BCAPS: u8 = 0x28;
    pub const BSTATUS: u8 = 0x29;
    pub const BINFO: u8 = 0x2A;
    /// Write-only FIFO on the receiver side. The register address does not increment.
    pub const KSVFIFO: u8 = 0x2C;
    pub const AINFO: u8 = 0x3B;
    pub const DBG: u8 = 0xC0;
}

pub mod size {
    pub const BKSV: usize = 5;
    pub const RO: usize = 2;
    pub const AKSV: usize = 5;
    pub const AN: usize = 8;
    pub const VH: usize = 20;
    pub const BCAPS: usize = 1;
    pub const BSTATUS: usize = 1;
    pub const BINFO: usize = 2;
    pub const KSVFIFO: usize = 15;
    pub const AINFO: usize = 1;
    pub const DBG: usize = 0x40;
}

/// Receiver capabilities.
#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Bcaps {
    #[bit(1, rw)]
    repeater: bool,
    #[bit(0, rw)]
    hdcp_capable: bool,
}

/// Receiver status. The flags are cleared by the receiver after the transmitter consumed
/// the associated data.
#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Bstatus {
    #[bit(3, rw)]
    reauth_request: bool,
    #[bit(2, rw)]
    link_integrity_failure: bool,
    #[bit(1, rw)]
    ro_available: bool,
    /// KSV list and V' are ready to be read.
    #[bit(0, rw)]
    ready: bool,
}

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Ainfo {
    #[bit(0, rw)]
    reauth_enable_irq: bool,
}

/// Repeater topology information. Only the lower 12 bits carry topology data.
#[bitbybit::bitfield(u16, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Binfo {
    #[bit(11, rw)]
    max_cascade_exceeded: bool,
    #[bits(8..=10, rw)]
    depth: u3,
    #[bit(7, rw)]
    max_devs_exceeded: bool,
    #[bits(0..=6, rw)]
    device_count: u7,
}

/// Mask of the valid topology bits inside [Binfo].
pub const BINFO_TOPOLOGY_MASK: u16 = 0x0FFF;
