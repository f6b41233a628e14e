//! # DisplayPort TX interrupt status layout
//!
//! Only the hot-plug related bits are needed by the HDCP transmitter port. The register
//! itself is read by the DP TX driver which forwards the raw value.

#[bitbybit::bitfield(u32, default = 0x0)]
#[derive(Debug, PartialEq, Eq)]
pub struct InterruptStatus {
    #[bit(4, rw)]
    hpd_pulse_detected: bool,
    #[bit(3, rw)]
    reply_timeout: bool,
    #[bit(2, rw)]
    reply_received: bool,
    #[bit(1, rw)]
    hpd_event: bool,
    #[bit(0, rw)]
    hpd_irq: bool,
}
