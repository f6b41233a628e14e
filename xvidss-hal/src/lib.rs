//! # HAL for the AMD/Xilinx HDMI RX subsystem
//!
//! This crate contains the drivers on top of the [register definitions](xvidss) of the
//! video IP cores:
//!
//! - [regwin]: byte addressable register windows emulated on top of 32-bit register files.
//! - [hdcp1x]: HDCP 1.x port adapters for the receiver and the transmitter side.
//! - [hdmirx]: HDMI RX protocol core driver and its interrupt event router.
//! - [rxss]: the RX subsystem which drives the connect and stream lifecycle, the video
//!   bridge and the HDCP engines.
//!
//! All drivers are single-threaded. The user is expected to call the interrupt handlers
//! from the respective interrupt service routines and to own the driver instances.
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod bridge;
pub mod dprx;
pub mod evtlog;
pub mod hdcp1x;
pub mod hdmirx;
pub mod infoframe;
pub mod mmcm;
pub mod regwin;
pub mod rxss;
pub mod time;
pub mod video;

pub use xvidss as pac;
