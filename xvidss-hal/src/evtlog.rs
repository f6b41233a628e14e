//! # Subsystem event log
//!
//! Bounded in-memory log of subsystem events, mainly useful for post-mortem debugging of
//! the interrupt driven state machines. When the log is full, the oldest entry is
//! overwritten. Every entry is also forwarded to the [log] facade at debug level.
use ringbuf::{
    StaticRb,
    traits::{Consumer, Observer, RingBuffer},
};

/// Default number of log entries.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum LogEvent {
    Start = 1,
    Stop,
    Reset,
    Connect,
    Disconnect,
    SyncLoss,
    SyncEstablished,
    HdmiMode,
    DviMode,
    VicError,
    LinkStatus,
    StreamDown,
    StreamInit,
    StreamInitError,
    StreamUp,
    SetStream,
    SetStreamError,
    PixelRepetitionError,
    BridgeOverflow,
    Hdcp14,
    Hdcp22,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub event: LogEvent,
    pub data: u8,
}

pub struct EventLog<const N: usize = DEFAULT_CAPACITY> {
    entries: StaticRb<LogEntry, N>,
}

impl<const N: usize> Default for EventLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for EventLog<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.entries.occupied_len())
            .finish()
    }
}

impl<const N: usize> EventLog<N> {
    pub fn new() -> Self {
        Self {
            entries: StaticRb::default(),
        }
    }

    pub fn write(&mut self, event: LogEvent, data: u8) {
        log::debug!("rxss event {:?} ({})", event, data);
        self.entries.push_overwrite(LogEntry { event, data });
    }

    /// Pop the oldest entry.
    pub fn read(&mut self) -> Option<LogEntry> {
        self.entries.try_pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
