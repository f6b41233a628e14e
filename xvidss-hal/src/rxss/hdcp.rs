//! HDCP scheduling of the RX subsystem.
//!
//! The subsystem hosts up to two HDCP engines, one for HDCP 1.4 and one for HDCP 2.2.
//! At most one of them is enabled at a time. Stream and connection changes are queued as
//! [HdcpEvent]s from the interrupt handlers and applied to the engines from the polling
//! context.
use heapless::Deque;
use xvidss::hdmirx::DdcHdcpMode;

use crate::hdcp1x::PortError;
use crate::hdmirx::DdcHdcp;

/// Number of queued HDCP events. The oldest event is dropped when the queue is full.
pub const EVENT_QUEUE_LEN: usize = 16;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum HdcpProtocol {
    #[default]
    None,
    Hdcp14,
    Hdcp22,
}

/// HDCP versions announced to the source.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum HdcpCapability {
    #[default]
    None,
    Hdcp14,
    Hdcp22,
    Both,
}

impl HdcpCapability {
    pub const fn supports(self, protocol: HdcpProtocol) -> bool {
        matches!(
            (self, protocol),
            (_, HdcpProtocol::None)
                | (HdcpCapability::Hdcp14 | HdcpCapability::Both, HdcpProtocol::Hdcp14)
                | (HdcpCapability::Hdcp22 | HdcpCapability::Both, HdcpProtocol::Hdcp22)
        )
    }
}

/// Stream and connection changes forwarded to the HDCP engines.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HdcpEvent {
    StreamUp,
    StreamDown,
    Connect,
    Disconnect,
    DviMode,
    HdmiMode,
    SyncLoss,
    SyncEstablished,
}

/// Status changes reported by an HDCP engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HdcpStatusEvent {
    Authenticated,
    Unauthenticated,
    AuthenticationRequest,
    TopologyUpdate,
    EncryptionUpdate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HdcpError {
    #[error("hdcp port error: {0}")]
    Port(#[from] PortError),
    #[error("no engine for the requested protocol")]
    NotPresent,
    #[error("protocol not supported by the configured capability")]
    NotCapable,
}

/// Interface of an HDCP engine hosted by the subsystem.
pub trait HdcpEngine {
    fn enable(&mut self) -> Result<(), HdcpError>;

    fn disable(&mut self) -> Result<(), HdcpError>;

    /// Reset the engine. The engine is enabled again after a reset, so a reset is usually
    /// followed by [Self::disable].
    fn reset(&mut self) -> Result<(), HdcpError>;

    fn set_physical_state(&mut self, connected: bool);

    fn set_hdmi_mode(&mut self, hdmi: bool);

    /// HDCP message events of the DDC slave, as raw DDC status bits.
    fn handle_ddc_message(&mut self, _events: u32) {}

    /// Run the engine and return the next status change, if any.
    fn poll(&mut self) -> Option<HdcpStatusEvent>;

    fn is_enabled(&self) -> bool;

    fn is_authenticated(&self) -> bool;

    fn is_encrypted(&self) -> bool;

    fn is_in_progress(&self) -> bool;
}

/// Placeholder engine type for subsystems without the respective HDCP version.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoHdcp {}

impl HdcpEngine for NoHdcp {
    fn enable(&mut self) -> Result<(), HdcpError> {
        match *self {}
    }

    fn disable(&mut self) -> Result<(), HdcpError> {
        match *self {}
    }

    fn reset(&mut self) -> Result<(), HdcpError> {
        match *self {}
    }

    fn set_physical_state(&mut self, _connected: bool) {
        match *self {}
    }

    fn set_hdmi_mode(&mut self, _hdmi: bool) {
        match *self {}
    }

    fn poll(&mut self) -> Option<HdcpStatusEvent> {
        match *self {}
    }

    fn is_enabled(&self) -> bool {
        match *self {}
    }

    fn is_authenticated(&self) -> bool {
        match *self {}
    }

    fn is_encrypted(&self) -> bool {
        match *self {}
    }

    fn is_in_progress(&self) -> bool {
        match *self {}
    }
}

pub struct HdcpLayer<E14, E22> {
    hdcp14: Option<E14>,
    hdcp22: Option<E22>,
    capability: HdcpCapability,
    protocol: HdcpProtocol,
    events: Deque<HdcpEvent, EVENT_QUEUE_LEN>,
}

impl<E14: HdcpEngine, E22: HdcpEngine> HdcpLayer<E14, E22> {
    pub const fn new(hdcp14: Option<E14>, hdcp22: Option<E22>) -> Self {
        Self {
            hdcp14,
            hdcp22,
            capability: HdcpCapability::None,
            protocol: HdcpProtocol::None,
            events: Deque::new(),
        }
    }

    /// At least one HDCP engine is present.
    #[inline]
    pub const fn is_present(&self) -> bool {
        self.hdcp14.is_some() || self.hdcp22.is_some()
    }

    #[inline]
    pub fn hdcp14(&mut self) -> Option<&mut E14> {
        self.hdcp14.as_mut()
    }

    #[inline]
    pub fn hdcp22(&mut self) -> Option<&mut E22> {
        self.hdcp22.as_mut()
    }

    #[inline]
    pub const fn protocol(&self) -> HdcpProtocol {
        self.protocol
    }

    #[inline]
    pub const fn capability(&self) -> HdcpCapability {
        self.capability
    }

    pub fn push_event(&mut self, event: HdcpEvent) {
        if self.events.is_full() {
            self.events.pop_front();
        }
        // Can not fail, one slot was freed above.
        let _ = self.events.push_back(event);
    }

    #[inline]
    pub fn next_event(&mut self) -> Option<HdcpEvent> {
        self.events.pop_front()
    }

    #[inline]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Apply all queued events to the engines.
    pub fn process_events(&mut self, ddc: &mut impl DdcHdcp) {
        while let Some(event) = self.next_event() {
            self.process_event(event, ddc);
        }
    }

    fn process_event(&mut self, event: HdcpEvent, ddc: &mut impl DdcHdcp) {
        match event {
            HdcpEvent::StreamUp => (),
            HdcpEvent::StreamDown | HdcpEvent::DviMode | HdcpEvent::SyncLoss => {
                if let Some(hdcp14) = self.hdcp14.as_mut() {
                    hdcp14.set_hdmi_mode(false);
                }
            }
            HdcpEvent::HdmiMode | HdcpEvent::SyncEstablished => {
                if let Some(hdcp14) = self.hdcp14.as_mut() {
                    hdcp14.set_hdmi_mode(true);
                }
            }
            HdcpEvent::Connect => {
                if let Some(hdcp14) = self.hdcp14.as_mut() {
                    hdcp14.set_physical_state(true);
                }
                // Re-apply the last protocol, a new source starts from scratch.
                let protocol = self.protocol;
                if let Err(e) = self.set_protocol(protocol, ddc) {
                    log::warn!("restoring HDCP protocol {:?} failed: {}", protocol, e);
                }
            }
            HdcpEvent::Disconnect => {
                if let Some(hdcp14) = self.hdcp14.as_mut() {
                    hdcp14.set_hdmi_mode(false);
                    hdcp14.set_physical_state(false);
                }
            }
        }
    }

    /// Forward DDC message events to the engine of the current protocol.
    pub fn handle_ddc_message(&mut self, events: u32) {
        match self.protocol {
            HdcpProtocol::None => (),
            HdcpProtocol::Hdcp14 => {
                if let Some(hdcp14) = self.hdcp14.as_mut() {
                    hdcp14.handle_ddc_message(events);
                }
            }
            HdcpProtocol::Hdcp22 => {
                if let Some(hdcp22) = self.hdcp22.as_mut() {
                    hdcp22.handle_ddc_message(events);
                }
            }
        }
    }

    /// Process the queued events and run the enabled engine.
    pub fn poll(&mut self, ddc: &mut impl DdcHdcp) -> Option<HdcpStatusEvent> {
        if !self.is_present() {
            return None;
        }
        self.process_events(ddc);
        let mut status = None;
        if let Some(hdcp22) = self.hdcp22.as_mut() {
            if hdcp22.is_enabled() {
                status = hdcp22.poll();
            }
        }
        if let Some(hdcp14) = self.hdcp14.as_mut() {
            if hdcp14.is_enabled() {
                status = status.or(hdcp14.poll());
            }
        }
        status
    }

    /// Switch to the given protocol. Both engines are reset and the engine of the
    /// requested protocol is enabled. The protocol falls back to [HdcpProtocol::None] on
    /// failure.
    pub fn set_protocol(
        &mut self,
        protocol: HdcpProtocol,
        ddc: &mut impl DdcHdcp,
    ) -> Result<(), HdcpError> {
        self.protocol = protocol;
        let result = self.reset().and_then(|_| self.enable(ddc));
        if result.is_err() {
            self.protocol = HdcpProtocol::None;
        }
        result
    }

    /// Configure the HDCP versions announced to the source. The DDC HDCP slave is
    /// disabled for [HdcpCapability::None].
    pub fn set_capability(
        &mut self,
        capability: HdcpCapability,
        ddc: &mut impl DdcHdcp,
    ) -> Result<(), HdcpError> {
        self.capability = capability;
        match capability {
            HdcpCapability::None => {
                ddc.set_ddc_hdcp_interrupts(false);
                ddc.set_ddc_hdcp_enabled(false);
                self.disable()
            }
            _ => {
                ddc.set_ddc_hdcp_interrupts(true);
                ddc.set_ddc_hdcp_enabled(true);
                Ok(())
            }
        }
    }

    /// Handle a protocol selection of the source detected by the DDC slave.
    pub fn handle_protocol_request(
        &mut self,
        protocol: HdcpProtocol,
        ddc: &mut impl DdcHdcp,
    ) -> Result<(), HdcpError> {
        if !self.capability.supports(protocol) {
            return Err(HdcpError::NotCapable);
        }
        if protocol == self.protocol {
            return Ok(());
        }
        self.set_protocol(protocol, ddc)
    }

    /// Enable the engine of the current protocol and disable the other one.
    pub fn enable(&mut self, ddc: &mut impl DdcHdcp) -> Result<(), HdcpError> {
        let (status14, status22) = match self.protocol {
            HdcpProtocol::None => (
                self.hdcp14.as_mut().map_or(Ok(()), |e| e.disable()),
                self.hdcp22.as_mut().map_or(Ok(()), |e| e.disable()),
            ),
            HdcpProtocol::Hdcp14 => {
                let status14 = self
                    .hdcp14
                    .as_mut()
                    .map_or(Err(HdcpError::NotPresent), |e| e.enable());
                ddc.set_ddc_hdcp_mode(DdcHdcpMode::Hdcp14);
                let status22 = self.hdcp22.as_mut().map_or(Ok(()), |e| e.disable());
                (status14, status22)
            }
            HdcpProtocol::Hdcp22 => {
                let status14 = self.hdcp14.as_mut().map_or(Ok(()), |e| e.disable());
                let status22 = self
                    .hdcp22
                    .as_mut()
                    .map_or(Err(HdcpError::NotPresent), |e| e.enable());
                ddc.set_ddc_hdcp_mode(DdcHdcpMode::Hdcp22);
                (status14, status22)
            }
        };
        status14.and(status22)
    }

    /// Select [HdcpProtocol::None] and reset both engines.
    pub fn disable(&mut self) -> Result<(), HdcpError> {
        self.protocol = HdcpProtocol::None;
        self.reset()
    }

    /// Reset both engines and leave them disabled.
    pub fn reset(&mut self) -> Result<(), HdcpError> {
        if let Some(hdcp14) = self.hdcp14.as_mut() {
            hdcp14.reset()?;
            hdcp14.disable()?;
        }
        if let Some(hdcp22) = self.hdcp22.as_mut() {
            hdcp22.reset()?;
            hdcp22.disable()?;
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.query(E14::is_enabled, E22::is_enabled)
    }

    pub fn is_authenticated(&self) -> bool {
        self.query(E14::is_authenticated, E22::is_authenticated)
    }

    pub fn is_encrypted(&self) -> bool {
        self.query(E14::is_encrypted, E22::is_encrypted)
    }

    pub fn is_in_progress(&self) -> bool {
        self.query(E14::is_in_progress, E22::is_in_progress)
    }

    fn query(&self, hdcp14: fn(&E14) -> bool, hdcp22: fn(&E22) -> bool) -> bool {
        match self.protocol {
            HdcpProtocol::None => false,
            HdcpProtocol::Hdcp14 => self.hdcp14.as_ref().is_some_and(hdcp14),
            HdcpProtocol::Hdcp22 => self.hdcp22.as_ref().is_some_and(hdcp22),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{EngineCall, MockDdc, MockEngine};
    use super::*;

    type Layer = HdcpLayer<MockEngine, MockEngine>;

    fn layer() -> Layer {
        HdcpLayer::new(Some(MockEngine::default()), Some(MockEngine::default()))
    }

    #[test]
    fn queue_drops_oldest() {
        let mut layer = layer();
        layer.push_event(HdcpEvent::Connect);
        for _ in 0..EVENT_QUEUE_LEN {
            layer.push_event(HdcpEvent::StreamUp);
        }
        assert_eq!(layer.pending_events(), EVENT_QUEUE_LEN);
        assert_eq!(layer.next_event(), Some(HdcpEvent::StreamUp));
        layer.clear_events();
        assert_eq!(layer.next_event(), None);
    }

    #[test]
    fn protocols_are_mutually_exclusive() {
        let mut layer = layer();
        let mut ddc = MockDdc::default();
        layer.set_protocol(HdcpProtocol::Hdcp14, &mut ddc).unwrap();
        assert_eq!(ddc.mode, Some(DdcHdcpMode::Hdcp14));
        assert!(layer.hdcp14().unwrap().enabled);
        assert!(!layer.hdcp22().unwrap().enabled);

        layer.set_protocol(HdcpProtocol::Hdcp22, &mut ddc).unwrap();
        assert_eq!(ddc.mode, Some(DdcHdcpMode::Hdcp22));
        assert!(!layer.hdcp14().unwrap().enabled);
        assert!(layer.hdcp22().unwrap().enabled);
        assert!(layer.is_enabled());

        layer.disable().unwrap();
        assert_eq!(layer.protocol(), HdcpProtocol::None);
        assert!(!layer.is_enabled());
    }

    #[test]
    fn failed_protocol_switch_falls_back_to_none() {
        let mut layer = layer();
        let mut ddc = MockDdc::default();
        layer.hdcp14().unwrap().fail_enable = true;
        assert!(layer.set_protocol(HdcpProtocol::Hdcp14, &mut ddc).is_err());
        assert_eq!(layer.protocol(), HdcpProtocol::None);

        let mut layer: HdcpLayer<MockEngine, NoHdcp> =
            HdcpLayer::new(Some(MockEngine::default()), None);
        assert_eq!(
            layer.set_protocol(HdcpProtocol::Hdcp22, &mut ddc),
            Err(HdcpError::NotPresent)
        );
        assert_eq!(layer.protocol(), HdcpProtocol::None);
    }

    #[test]
    fn connect_restores_protocol() {
        let mut layer = layer();
        let mut ddc = MockDdc::default();
        layer.set_protocol(HdcpProtocol::Hdcp14, &mut ddc).unwrap();
        layer.hdcp14().unwrap().calls.clear();
        layer.push_event(HdcpEvent::Connect);
        layer.process_events(&mut ddc);
        assert_eq!(
            layer.hdcp14().unwrap().calls,
            [
                EngineCall::Physical(true),
                EngineCall::Reset,
                EngineCall::Disable,
                EngineCall::Enable
            ]
        );
        assert_eq!(layer.protocol(), HdcpProtocol::Hdcp14);
    }

    #[test]
    fn mode_events() {
        let mut layer = layer();
        let mut ddc = MockDdc::default();
        for event in [
            HdcpEvent::HdmiMode,
            HdcpEvent::SyncLoss,
            HdcpEvent::SyncEstablished,
            HdcpEvent::DviMode,
            HdcpEvent::StreamUp,
            HdcpEvent::StreamDown,
            HdcpEvent::Disconnect,
        ] {
            layer.push_event(event);
        }
        layer.process_events(&mut ddc);
        assert_eq!(
            layer.hdcp14().unwrap().calls,
            [
                EngineCall::HdmiMode(true),
                EngineCall::HdmiMode(false),
                EngineCall::HdmiMode(true),
                EngineCall::HdmiMode(false),
                EngineCall::HdmiMode(false),
                EngineCall::HdmiMode(false),
                EngineCall::Physical(false),
            ]
        );
        assert!(layer.hdcp22().unwrap().calls.is_empty());
    }

    #[test]
    fn capability_controls_ddc_slave() {
        let mut layer = layer();
        let mut ddc = MockDdc::default();
        layer.set_capability(HdcpCapability::Both, &mut ddc).unwrap();
        assert!(ddc.enabled && ddc.interrupts);
        layer.set_protocol(HdcpProtocol::Hdcp22, &mut ddc).unwrap();
        layer.set_capability(HdcpCapability::None, &mut ddc).unwrap();
        assert!(!ddc.enabled && !ddc.interrupts);
        assert_eq!(layer.protocol(), HdcpProtocol::None);
    }

    #[test]
    fn protocol_requests_respect_capability() {
        let mut layer = layer();
        let mut ddc = MockDdc::default();
        layer.set_capability(HdcpCapability::Hdcp14, &mut ddc).unwrap();
        assert_eq!(
            layer.handle_protocol_request(HdcpProtocol::Hdcp22, &mut ddc),
            Err(HdcpError::NotCapable)
        );
        layer
            .handle_protocol_request(HdcpProtocol::Hdcp14, &mut ddc)
            .unwrap();
        assert_eq!(layer.protocol(), HdcpProtocol::Hdcp14);
    }

    #[test]
    fn poll_runs_enabled_engine() {
        let mut layer = layer();
        let mut ddc = MockDdc::default();
        layer.set_protocol(HdcpProtocol::Hdcp14, &mut ddc).unwrap();
        layer.hdcp14().unwrap().status = Some(HdcpStatusEvent::Authenticated);
        layer.hdcp22().unwrap().status = Some(HdcpStatusEvent::Unauthenticated);
        layer.hdcp14().unwrap().authenticated = true;
        assert_eq!(layer.poll(&mut ddc), Some(HdcpStatusEvent::Authenticated));
        assert!(layer.is_authenticated());
        assert_eq!(layer.poll(&mut ddc), None);
    }

    #[test]
    fn absent_engines() {
        let mut layer: HdcpLayer<NoHdcp, NoHdcp> = HdcpLayer::new(None, None);
        let mut ddc = MockDdc::default();
        assert!(!layer.is_present());
        assert_eq!(layer.poll(&mut ddc), None);
        assert_eq!(layer.set_protocol(HdcpProtocol::None, &mut ddc), Ok(()));
        assert!(!layer.is_authenticated());
    }
}
