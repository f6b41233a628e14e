//! DisplayPort RX HDCP register table driver.
//!
//! Provides the [RxHdcpCore] implementation required by the
//! [HDCP 1.x receiver port](crate::hdcp1x::ReceiverPort).
use xvidss::dprx::{HdcpInterrupts, MmioDpRx};

use crate::{hdcp1x::RxHdcpCore, regwin::WordRegisters};

pub struct DpRxHdcp {
    regs: MmioDpRx<'static>,
}

unsafe impl Send for DpRxHdcp {}

impl DpRxHdcp {
    /// Create the driver from a MMIO DP RX block. All HDCP interrupts are masked.
    pub fn new(regs: MmioDpRx<'static>) -> Self {
        let mut dprx = Self { regs };
        dprx.set_hdcp_interrupts(HdcpInterrupts::PORT_EVENTS, false);
        dprx
    }

    /// Steal the DP RX block at the given base address.
    ///
    /// # Safety
    ///
    /// This function allows creating an arbitrary amount of memory-mapped peripheral
    /// drivers. The base address must be the one of a DP RX core.
    pub const unsafe fn steal(base_addr: usize) -> Self {
        Self {
            regs: unsafe { xvidss::dprx::DpRx::new_mmio_at(base_addr) },
        }
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioDpRx<'static> {
        &mut self.regs
    }
}

impl WordRegisters for DpRxHdcp {
    #[inline]
    fn read_word(&mut self, offset: u8) -> u32 {
        // The table covers the whole byte range, the index is always valid.
        self.regs
            .read_hdcp_table(offset as usize / 4)
            .unwrap_or(0)
    }

    #[inline]
    fn write_word(&mut self, offset: u8, value: u32) {
        let _ = self.regs.write_hdcp_table(offset as usize / 4, value);
    }
}

impl RxHdcpCore for DpRxHdcp {
    fn set_hdcp_interrupts(&mut self, irqs: HdcpInterrupts, enable: bool) {
        self.regs.modify_interrupt_mask(|mask| {
            let raw = if enable {
                mask.raw_value() & !irqs.raw_value()
            } else {
                mask.raw_value() | irqs.raw_value()
            };
            HdcpInterrupts::new_with_raw_value(raw)
        });
    }

    #[inline]
    fn read_hdcp_interrupt_cause(&mut self) -> HdcpInterrupts {
        self.regs.read_interrupt_cause()
    }
}
