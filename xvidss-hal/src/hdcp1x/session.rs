use heapless::Deque;

use super::{PortAdapter, PortError, PortEvent, ReceiverPort, RxHdcpCore};
use crate::rxss::hdcp::{HdcpEngine, HdcpError, HdcpStatusEvent};

const PENDING_LEN: usize = 4;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disabled,
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// HDCP 1.x session on top of a port adapter. The session owns its port for its whole
/// lifetime.
pub struct Session<P> {
    port: P,
    state: SessionState,
    physical: bool,
    hdmi_mode: bool,
    encrypted: bool,
    pending: Deque<HdcpStatusEvent, PENDING_LEN>,
    auth_requests: u32,
}

impl<P: PortAdapter> Session<P> {
    pub const fn new(port: P) -> Self {
        Self {
            port,
            state: SessionState::Disabled,
            physical: false,
            hdmi_mode: false,
            encrypted: false,
            pending: Deque::new(),
            auth_requests: 0,
        }
    }

    #[inline]
    pub const fn port(&self) -> &P {
        &self.port
    }

    #[inline]
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    #[inline]
    pub fn release(self) -> P {
        self.port
    }

    #[inline]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub const fn physical_state(&self) -> bool {
        self.physical
    }

    #[inline]
    pub const fn hdmi_mode(&self) -> bool {
        self.hdmi_mode
    }

    /// Number of authentication requests since the session was created.
    #[inline]
    pub const fn auth_requests(&self) -> u32 {
        self.auth_requests
    }

    /// Forward a link layer interrupt to the port.
    pub fn handle_port_interrupt(&mut self, cause: u32) {
        match self.port.handle_interrupt(cause) {
            Ok(Some(event)) => self.on_port_event(event),
            Ok(None) | Err(PortError::NotSupported) => (),
            Err(e) => log::warn!("HDCP port interrupt handling failed: {}", e),
        }
    }

    pub fn on_port_event(&mut self, event: PortEvent) {
        match event {
            PortEvent::AuthenticationRequest => self.on_authentication_request(),
        }
    }

    /// The remote side started or requested an authentication. Ignored while the session
    /// is disabled.
    pub fn on_authentication_request(&mut self) {
        if self.state == SessionState::Disabled {
            return;
        }
        self.auth_requests = self.auth_requests.wrapping_add(1);
        self.state = SessionState::Authenticating;
        self.set_encrypted(false);
        self.queue(HdcpStatusEvent::AuthenticationRequest);
    }

    /// Report the result of an authentication attempt.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        if self.state == SessionState::Disabled {
            return;
        }
        if authenticated {
            self.state = SessionState::Authenticated;
            self.queue(HdcpStatusEvent::Authenticated);
        } else {
            self.state = SessionState::Unauthenticated;
            self.set_encrypted(false);
            self.queue(HdcpStatusEvent::Unauthenticated);
        }
    }

    pub fn set_encrypted(&mut self, encrypted: bool) {
        if self.encrypted != encrypted {
            self.encrypted = encrypted;
            self.queue(HdcpStatusEvent::EncryptionUpdate);
        }
    }

    fn queue(&mut self, event: HdcpStatusEvent) {
        if self.pending.is_full() {
            self.pending.pop_front();
        }
        let _ = self.pending.push_back(event);
    }

    fn clear_authentication(&mut self) {
        self.encrypted = false;
        self.pending.clear();
    }
}

impl<C: RxHdcpCore> Session<ReceiverPort<C>> {
    /// Service the HDCP interrupts of the receiver core.
    pub fn handle_receiver_interrupt(&mut self) {
        if let Some(event) = self.port.service_interrupts() {
            self.on_port_event(event);
        }
    }
}

impl<P: PortAdapter> HdcpEngine for Session<P> {
    fn enable(&mut self) -> Result<(), HdcpError> {
        self.port.enable()?;
        if self.state == SessionState::Disabled {
            self.state = SessionState::Unauthenticated;
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HdcpError> {
        self.port.disable()?;
        self.state = SessionState::Disabled;
        self.clear_authentication();
        Ok(())
    }

    fn reset(&mut self) -> Result<(), HdcpError> {
        self.port.init()?;
        self.port.enable()?;
        self.state = SessionState::Unauthenticated;
        self.clear_authentication();
        Ok(())
    }

    fn set_physical_state(&mut self, connected: bool) {
        self.physical = connected;
        if !connected && self.state != SessionState::Disabled {
            self.state = SessionState::Unauthenticated;
            self.clear_authentication();
        }
    }

    fn set_hdmi_mode(&mut self, hdmi: bool) {
        self.hdmi_mode = hdmi;
    }

    fn poll(&mut self) -> Option<HdcpStatusEvent> {
        self.pending.pop_front()
    }

    fn is_enabled(&self) -> bool {
        self.state != SessionState::Disabled
    }

    fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn is_in_progress(&self) -> bool {
        self.state == SessionState::Authenticating
    }
}
