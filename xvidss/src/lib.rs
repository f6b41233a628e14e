//! # Register definitions for the AMD/Xilinx video subsystem IP cores
//!
//! This crate contains the register blocks of the soft IP cores which make up an HDMI
//! receiver subsystem, and the DisplayPort register subsets used by the HDCP 1.x port
//! adapters. The cores live in the programmable logic, so there are no fixed base
//! addresses. All register blocks are created with the `new_mmio_at` constructors
//! generated by [derive_mmio] using the base address of the respective IP instance.
#![no_std]

pub mod dprx;
pub mod dptx;
pub mod hdcp1x;
pub mod hdmirx;
