//! # Video bridge mode selection
//!
//! The bridge between the RX core and the video pipeline can drop repeated pixels and
//! repack 4:2:0 sub-sampled video. The required mode only depends on the received format.
use crate::video::{ColorFormat, VideoFormat};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum BridgeMode {
    /// Pass-through.
    #[default]
    Normal,
    /// Drop every second pixel of double clocked standard definition video.
    PixelDrop,
    /// Repack YUV 4:2:0 video.
    Yuv420Repack,
}

/// The bridge only supports pixel repetition factors up to 2.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported pixel repetition factor {0}")]
pub struct UnsupportedPixelRepetition(pub u8);

/// Select the bridge mode for the given format.
///
/// Legacy DVI NTSC/PAL interlaced streams (1440x240i, 1440x288i) are double clocked
/// without carrying an AVI InfoFrame, so they always use [BridgeMode::PixelDrop].
pub fn select(format: &VideoFormat) -> Result<BridgeMode, UnsupportedPixelRepetition> {
    if !format.is_hdmi
        && format.interlaced
        && format.h_active == 1440
        && (format.v_active == 240 || format.v_active == 288)
    {
        return Ok(BridgeMode::PixelDrop);
    }
    if format.pixel_repetition > 2 {
        return Err(UnsupportedPixelRepetition(format.pixel_repetition));
    }
    if format.color_format == ColorFormat::Yuv420 {
        return Ok(BridgeMode::Yuv420Repack);
    }
    if format.pixel_repetition == 2 {
        return Ok(BridgeMode::PixelDrop);
    }
    Ok(BridgeMode::Normal)
}
