//! Receiver side of the HDCP 1.x port.
use xvidss::{
    dprx::HdcpInterrupts,
    hdcp1x::{Ainfo, Bcaps, Bstatus, offset, size},
};

use super::{PortAdapter, PortError, PortEvent};
use crate::regwin::{ByteWindow, WordRegisters};

/// Signature programmed into the debug registers when the port is enabled.
pub const DEBUG_SIGNATURE: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Length of the status region cleared when the port is disabled, BKSV up to and
/// including Binfo. With the DPCD layout this covers 0x2C bytes, including the An and
/// V' registers between the named status bytes.
pub const STATUS_REGION_LEN: usize =
    (offset::BINFO - offset::BKSV) as usize + size::BINFO;

/// Protocol core which hosts the receiver port register table.
pub trait RxHdcpCore: WordRegisters {
    /// Unmask (`enable == true`) or mask the given HDCP interrupt sources.
    fn set_hdcp_interrupts(&mut self, irqs: HdcpInterrupts, enable: bool);

    /// Read and clear the pending HDCP interrupt causes.
    fn read_hdcp_interrupt_cause(&mut self) -> HdcpInterrupts;
}

pub struct ReceiverPort<C> {
    window: ByteWindow<C>,
    repeater: bool,
    registered: HdcpInterrupts,
}

impl<C: RxHdcpCore> ReceiverPort<C> {
    pub const fn new(core: C, repeater: bool) -> Self {
        Self {
            window: ByteWindow::new_with_fifo(core, offset::KSVFIFO),
            repeater,
            registered: HdcpInterrupts::new_with_raw_value(0),
        }
    }

    #[inline]
    pub const fn core(&self) -> &C {
        self.window.regs()
    }

    #[inline]
    pub fn core_mut(&mut self) -> &mut C {
        self.window.regs_mut()
    }

    #[inline]
    pub fn release(self) -> C {
        self.window.release()
    }

    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.registered.raw_value() != 0
    }

    /// Read the pending interrupt causes from the core and handle them.
    pub fn service_interrupts(&mut self) -> Option<PortEvent> {
        let cause = self.window.regs_mut().read_hdcp_interrupt_cause();
        self.handle_core_interrupt(cause)
    }

    /// Handle HDCP interrupt causes of the protocol core. Causes are only handled while the
    /// port is enabled.
    pub fn handle_core_interrupt(&mut self, cause: HdcpInterrupts) -> Option<PortEvent> {
        let cause = HdcpInterrupts::new_with_raw_value(
            cause.raw_value() & self.registered.raw_value(),
        );
        let mut event = None;
        if cause.aksv_write() {
            event = Some(self.on_aksv_write());
        }
        if cause.ro_read() {
            self.on_ro_read();
        }
        if cause.binfo_read() {
            self.on_binfo_read();
        }
        event
    }

    fn on_aksv_write(&mut self) -> PortEvent {
        self.window.modify_byte(offset::AINFO, |value| {
            Ainfo::new_with_raw_value(value)
                .with_reauth_enable_irq(false)
                .raw_value()
        });
        self.window.modify_byte(offset::BSTATUS, |value| {
            Bstatus::new_with_raw_value(value)
                .with_link_integrity_failure(false)
                .with_reauth_request(false)
                .raw_value()
        });
        PortEvent::AuthenticationRequest
    }

    fn on_ro_read(&mut self) {
        self.window.modify_byte(offset::BSTATUS, |value| {
            Bstatus::new_with_raw_value(value)
                .with_ro_available(false)
                .raw_value()
        });
    }

    fn on_binfo_read(&mut self) {
        self.window.modify_byte(offset::BSTATUS, |value| {
            Bstatus::new_with_raw_value(value)
                .with_ready(false)
                .raw_value()
        });
    }
}

impl<C: RxHdcpCore> PortAdapter for ReceiverPort<C> {
    fn init(&mut self) -> Result<(), PortError> {
        self.disable()
    }

    fn enable(&mut self) -> Result<(), PortError> {
        self.window.write(offset::BCAPS, &[0, 0]);
        let bcaps = Bcaps::DEFAULT
            .with_hdcp_capable(true)
            .with_repeater(self.repeater);
        self.window.write(offset::BCAPS, &[bcaps.raw_value()]);
        self.window.write(offset::DBG, &DEBUG_SIGNATURE);

        self.registered = HdcpInterrupts::PORT_EVENTS;
        self.window
            .regs_mut()
            .set_hdcp_interrupts(HdcpInterrupts::PORT_EVENTS, true);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), PortError> {
        self.window
            .regs_mut()
            .set_hdcp_interrupts(HdcpInterrupts::PORT_EVENTS, false);
        self.registered = HdcpInterrupts::new_with_raw_value(0);
        // The KSV FIFO, Ainfo and the debug registers keep their contents.
        self.window.fill(offset::BKSV, STATUS_REGION_LEN, 0);
        Ok(())
    }

    #[inline]
    fn read(&mut self, offset: u8, buf: &mut [u8]) -> usize {
        self.window.read(offset, buf)
    }

    #[inline]
    fn write(&mut self, offset: u8, data: &[u8]) -> usize {
        self.window.write(offset, data)
    }

    fn set_repeater(&mut self, repeater: bool) -> Result<(), PortError> {
        self.repeater = repeater;
        self.window.modify_byte(offset::BCAPS, |value| {
            Bcaps::new_with_raw_value(value)
                .with_repeater(repeater)
                .raw_value()
        });
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use xvidss::dprx::HdcpInterrupts;

    use super::RxHdcpCore;
    use crate::regwin::{WordRegisters, mock::MockRegs};

    pub struct MockRxCore {
        pub regs: MockRegs,
        /// Set bits are masked.
        pub mask: u32,
        pub cause: u32,
    }

    impl MockRxCore {
        pub fn new(regs: MockRegs) -> Self {
            Self {
                regs,
                mask: 0xFFFF_FFFF,
                cause: 0,
            }
        }
    }

    impl WordRegisters for MockRxCore {
        fn read_word(&mut self, offset: u8) -> u32 {
            self.regs.read_word(offset)
        }

        fn write_word(&mut self, offset: u8, value: u32) {
            self.regs.write_word(offset, value)
        }
    }

    impl RxHdcpCore for MockRxCore {
        fn set_hdcp_interrupts(&mut self, irqs: HdcpInterrupts, enable: bool) {
            if enable {
                self.mask &= !irqs.raw_value();
            } else {
                self.mask |= irqs.raw_value();
            }
        }

        fn read_hdcp_interrupt_cause(&mut self) -> HdcpInterrupts {
            let cause = self.cause;
            self.cause = 0;
            HdcpInterrupts::new_with_raw_value(cause)
        }
    }
}
