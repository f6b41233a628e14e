//! # Time units
#![deny(missing_docs)]

// Frequency based

/// Hertz
pub type Hertz = fugit::HertzU32;
/// Type alias for Hertz.
pub type Hz = Hertz;

/// MegaHertz
pub type MegaHertz = fugit::MegahertzU32;
/// Type alias for Mega Hertz.
pub type MHz = MegaHertz;

// Period based

/// Milliseconds
pub type Milliseconds = fugit::MillisDurationU32;
