//! # HDCP 1.x port adapters
//!
//! The HDCP 1.x protocol exchanges its data through a byte addressable port. On
//! DisplayPort, the port is part of the DPCD address space. A receiver answers the port
//! reads and writes of the remote transmitter from a local register table, while a
//! transmitter accesses the port of the remote receiver with AUX transactions.
//!
//! Both variants implement the [PortAdapter] trait. Some capabilities only exist for one
//! of the variants. The other variant returns [PortError::NotSupported] for these.
pub mod rx;
pub mod tx;

mod session;

pub use rx::{ReceiverPort, RxHdcpCore};
pub use session::*;
pub use tx::{AuxChannel, TransmitterPort};
pub use xvidss::hdcp1x::{Ainfo, Bcaps, Binfo, Bstatus, offset, size};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("operation not supported by the port")]
    NotSupported,
    #[error("port access failed")]
    AccessFailed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepeaterInfoError {
    #[error("remote device is not a repeater")]
    NotRepeater,
    #[error("remote repeater is busy")]
    Busy,
    #[error("port read failed")]
    ReadFailed,
    #[error("operation not supported by the port")]
    NotSupported,
}

/// Notification raised by a port towards its session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// The remote side started or requested a (re-)authentication.
    AuthenticationRequest,
}

pub trait PortAdapter {
    /// Disable the port and clear its status fields.
    fn init(&mut self) -> Result<(), PortError>;

    fn enable(&mut self) -> Result<(), PortError>;

    fn disable(&mut self) -> Result<(), PortError>;

    /// Read from the port. Returns the number of bytes read, zero on failure.
    fn read(&mut self, offset: u8, buf: &mut [u8]) -> usize;

    /// Write to the port. Returns the number of bytes written, zero on failure.
    fn write(&mut self, offset: u8, data: &[u8]) -> usize;

    /// Check whether the remote device is HDCP capable.
    fn is_capable(&mut self) -> Result<bool, PortError> {
        Err(PortError::NotSupported)
    }

    /// Check whether the remote device is a repeater.
    fn is_repeater(&mut self) -> Result<bool, PortError> {
        Err(PortError::NotSupported)
    }

    /// Read the topology information of a remote repeater. Only the 12 topology bits of
    /// [Binfo] are returned.
    fn repeater_info(&mut self) -> Result<u16, RepeaterInfoError> {
        Err(RepeaterInfoError::NotSupported)
    }

    /// Configure whether the local device announces itself as a repeater.
    fn set_repeater(&mut self, _repeater: bool) -> Result<(), PortError> {
        Err(PortError::NotSupported)
    }

    /// Handle an interrupt of the link layer with the raw interrupt cause bits.
    fn handle_interrupt(&mut self, _cause: u32) -> Result<Option<PortEvent>, PortError> {
        Err(PortError::NotSupported)
    }
}
