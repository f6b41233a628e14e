//! Transmitter side of the HDCP 1.x port.
use xvidss::{
    dptx::InterruptStatus,
    hdcp1x::{BINFO_TOPOLOGY_MASK, Bcaps, Bstatus, DPCD_BASE_ADDR, offset, size},
};

use super::{PortAdapter, PortError, PortEvent, RepeaterInfoError};
use crate::regwin::clamp_len;

/// AUX channel of a DisplayPort transmitter.
pub trait AuxChannel {
    type Error: core::fmt::Debug;

    fn aux_read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    fn aux_write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error>;
}

impl<T: AuxChannel + ?Sized> AuxChannel for &mut T {
    type Error = T::Error;

    #[inline]
    fn aux_read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        T::aux_read(self, address, buf)
    }

    #[inline]
    fn aux_write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
        T::aux_write(self, address, data)
    }
}

/// Accesses the HDCP port of the remote receiver.
pub struct TransmitterPort<A> {
    aux: A,
}

impl<A: AuxChannel> TransmitterPort<A> {
    #[inline]
    pub const fn new(aux: A) -> Self {
        Self { aux }
    }

    #[inline]
    pub const fn aux(&self) -> &A {
        &self.aux
    }

    #[inline]
    pub fn aux_mut(&mut self) -> &mut A {
        &mut self.aux
    }

    #[inline]
    pub fn release(self) -> A {
        self.aux
    }

    fn read_byte(&mut self, offset: u8) -> Option<u8> {
        let mut value = [0; 1];
        if self.read(offset, &mut value) == 1 {
            Some(value[0])
        } else {
            None
        }
    }
}

impl<A: AuxChannel> PortAdapter for TransmitterPort<A> {
    fn init(&mut self) -> Result<(), PortError> {
        self.disable()
    }

    /// Probes the remote device by reading its capabilities.
    fn enable(&mut self) -> Result<(), PortError> {
        self.read_byte(offset::BCAPS)
            .map(|_| ())
            .ok_or(PortError::AccessFailed)
    }

    fn disable(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    fn read(&mut self, offset: u8, buf: &mut [u8]) -> usize {
        let len = clamp_len(offset, buf.len());
        if len == 0 {
            return 0;
        }
        match self
            .aux
            .aux_read(DPCD_BASE_ADDR + offset as u32, &mut buf[..len])
        {
            Ok(()) => len,
            Err(e) => {
                log::warn!("HDCP port read at offset {:#04x} failed: {:?}", offset, e);
                0
            }
        }
    }

    fn write(&mut self, offset: u8, data: &[u8]) -> usize {
        let len = clamp_len(offset, data.len());
        if len == 0 {
            return 0;
        }
        match self
            .aux
            .aux_write(DPCD_BASE_ADDR + offset as u32, &data[..len])
        {
            Ok(()) => len,
            Err(e) => {
                log::warn!("HDCP port write at offset {:#04x} failed: {:?}", offset, e);
                0
            }
        }
    }

    fn is_capable(&mut self) -> Result<bool, PortError> {
        Ok(self
            .read_byte(offset::BCAPS)
            .is_some_and(|bcaps| Bcaps::new_with_raw_value(bcaps).hdcp_capable()))
    }

    fn is_repeater(&mut self) -> Result<bool, PortError> {
        Ok(self
            .read_byte(offset::BCAPS)
            .is_some_and(|bcaps| Bcaps::new_with_raw_value(bcaps).repeater()))
    }

    fn repeater_info(&mut self) -> Result<u16, RepeaterInfoError> {
        let bcaps = self
            .read_byte(offset::BCAPS)
            .map(Bcaps::new_with_raw_value)
            .ok_or(RepeaterInfoError::ReadFailed)?;
        if !bcaps.repeater() {
            return Err(RepeaterInfoError::NotRepeater);
        }
        // A failed status read is treated like a repeater which is not ready yet.
        let ready = self
            .read_byte(offset::BSTATUS)
            .is_some_and(|bstatus| Bstatus::new_with_raw_value(bstatus).ready());
        if !ready {
            return Err(RepeaterInfoError::Busy);
        }
        let mut binfo = [0; size::BINFO];
        if self.read(offset::BINFO, &mut binfo) != size::BINFO {
            return Err(RepeaterInfoError::ReadFailed);
        }
        Ok(u16::from_le_bytes(binfo) & BINFO_TOPOLOGY_MASK)
    }

    fn handle_interrupt(&mut self, cause: u32) -> Result<Option<PortEvent>, PortError> {
        let status = InterruptStatus::new_with_raw_value(cause);
        if !status.hpd_pulse_detected() && !status.hpd_event() {
            return Ok(None);
        }
        let Some(bstatus) = self.read_byte(offset::BSTATUS) else {
            return Ok(None);
        };
        let bstatus = Bstatus::new_with_raw_value(bstatus);
        if bstatus.link_integrity_failure() || bstatus.reauth_request() {
            return Ok(Some(PortEvent::AuthenticationRequest));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct AuxTimeout;

    struct MockAux {
        dpcd: [u8; 256],
        failing: Vec<u8>,
        reads: Vec<(u32, usize)>,
    }

    impl MockAux {
        fn new() -> Self {
            Self {
                dpcd: [0; 256],
                failing: Vec::new(),
                reads: Vec::new(),
            }
        }
    }

    impl AuxChannel for MockAux {
        type Error = AuxTimeout;

        fn aux_read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
            let offset = (address - DPCD_BASE_ADDR) as usize;
            if self.failing.contains(&(offset as u8)) {
                return Err(AuxTimeout);
            }
            self.reads.push((address, buf.len()));
            buf.copy_from_slice(&self.dpcd[offset..offset + buf.len()]);
            Ok(())
        }

        fn aux_write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
            let offset = (address - DPCD_BASE_ADDR) as usize;
            if self.failing.contains(&(offset as u8)) {
                return Err(AuxTimeout);
            }
            self.dpcd[offset..offset + data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    fn repeater_port(bstatus: u8, binfo: [u8; 2]) -> TransmitterPort<MockAux> {
        let mut aux = MockAux::new();
        aux.dpcd[offset::BCAPS as usize] = 0x03;
        aux.dpcd[offset::BSTATUS as usize] = bstatus;
        aux.dpcd[offset::BINFO as usize..offset::BINFO as usize + 2].copy_from_slice(&binfo);
        TransmitterPort::new(aux)
    }

    #[test]
    fn reads_are_relative_to_port_base() {
        let mut port = TransmitterPort::new(MockAux::new());
        port.aux_mut().dpcd[0..5].copy_from_slice(&[1, 2, 3, 4, 5]);
        let mut bksv = [0; 5];
        assert_eq!(port.read(offset::BKSV, &mut bksv), 5);
        assert_eq!(bksv, [1, 2, 3, 4, 5]);
        assert_eq!(port.aux().reads, [(0x68000, 5)]);
    }

    #[test]
    fn requests_are_clamped() {
        let mut port = TransmitterPort::new(MockAux::new());
        let mut buf = [0; 16];
        assert_eq!(port.read(0xF8, &mut buf), 8);
        assert_eq!(port.aux().reads, [(0x680F8, 8)]);
        assert_eq!(port.write(0xFC, &[1; 10]), 4);
        assert_eq!(port.aux().dpcd[0xFC..], [1, 1, 1, 1]);
    }

    #[test]
    fn failed_reads_return_zero() {
        let mut port = TransmitterPort::new(MockAux::new());
        port.aux_mut().failing.push(offset::AN);
        let mut an = [0; 8];
        assert_eq!(port.read(offset::AN, &mut an), 0);
        assert_eq!(port.write(offset::AN, &an), 0);
    }

    #[test]
    fn enable_probes_remote() {
        let mut port = TransmitterPort::new(MockAux::new());
        assert_eq!(port.init(), Ok(()));
        assert_eq!(port.enable(), Ok(()));
        port.aux_mut().failing.push(offset::BCAPS);
        assert_eq!(port.enable(), Err(PortError::AccessFailed));
        assert_eq!(port.disable(), Ok(()));
    }

    #[test]
    fn capabilities() {
        let mut port = TransmitterPort::new(MockAux::new());
        assert_eq!(port.is_capable(), Ok(false));
        port.aux_mut().dpcd[offset::BCAPS as usize] = 0x01;
        assert_eq!(port.is_capable(), Ok(true));
        assert_eq!(port.is_repeater(), Ok(false));
        port.aux_mut().dpcd[offset::BCAPS as usize] = 0x03;
        assert_eq!(port.is_repeater(), Ok(true));
        port.aux_mut().failing.push(offset::BCAPS);
        assert_eq!(port.is_capable(), Ok(false));
        assert_eq!(port.is_repeater(), Ok(false));
        assert_eq!(port.set_repeater(true), Err(PortError::NotSupported));
    }

    #[test]
    fn repeater_info_success() {
        let mut port = repeater_port(0x01, [0xFF, 0xFF]);
        assert_eq!(port.repeater_info(), Ok(0x0FFF));
        let mut port = repeater_port(0x01, [0x03, 0x02]);
        assert_eq!(port.repeater_info(), Ok(0x0203));
    }

    #[test]
    fn repeater_info_failures() {
        let mut port = repeater_port(0x00, [0x03, 0x02]);
        assert_eq!(port.repeater_info(), Err(RepeaterInfoError::Busy));

        let mut port = repeater_port(0x01, [0x03, 0x02]);
        port.aux_mut().dpcd[offset::BCAPS as usize] = 0x01;
        assert_eq!(port.repeater_info(), Err(RepeaterInfoError::NotRepeater));

        let mut port = repeater_port(0x01, [0x03, 0x02]);
        port.aux_mut().failing.push(offset::BCAPS);
        assert_eq!(port.repeater_info(), Err(RepeaterInfoError::ReadFailed));
    }

    #[test]
    fn hpd_pulse_with_link_failure_requests_authentication() {
        let mut port = repeater_port(0x04, [0, 0]);
        let pulse = InterruptStatus::new_with_raw_value(0)
            .with_hpd_pulse_detected(true)
            .raw_value();
        assert_eq!(
            port.handle_interrupt(pulse),
            Ok(Some(PortEvent::AuthenticationRequest))
        );
        let hpd_event = InterruptStatus::new_with_raw_value(0)
            .with_hpd_event(true)
            .raw_value();
        port.aux_mut().dpcd[offset::BSTATUS as usize] = 0x08;
        assert_eq!(
            port.handle_interrupt(hpd_event),
            Ok(Some(PortEvent::AuthenticationRequest))
        );
    }

    #[test]
    fn unrelated_interrupts_are_ignored() {
        let mut port = repeater_port(0x0C, [0, 0]);
        let reply = InterruptStatus::new_with_raw_value(0)
            .with_reply_received(true)
            .raw_value();
        assert_eq!(port.handle_interrupt(reply), Ok(None));
        assert!(port.aux().reads.is_empty());

        let mut port = repeater_port(0x03, [0, 0]);
        let pulse = InterruptStatus::new_with_raw_value(0)
            .with_hpd_pulse_detected(true)
            .raw_value();
        assert_eq!(port.handle_interrupt(pulse), Ok(None));
    }
}
