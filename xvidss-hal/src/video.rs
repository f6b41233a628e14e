//! # Video stream descriptions
use crate::time::Hertz;

/// Color format as signalled by the Y field of the AVI InfoFrame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum ColorFormat {
    #[default]
    Rgb = 0,
    Yuv422 = 1,
    Yuv444 = 2,
    Yuv420 = 3,
}

/// Bits per color component.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum ColorDepth {
    #[default]
    Bpc8 = 8,
    Bpc10 = 10,
    Bpc12 = 12,
    Bpc16 = 16,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PixelsPerClock {
    One = 1,
    #[default]
    Two = 2,
    Four = 4,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum AspectRatio {
    #[default]
    Unknown,
    Ratio4x3,
    Ratio16x9,
}

/// Timing measured by the video timing detector of the RX core.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VideoTiming {
    pub h_active: u16,
    pub v_active: u16,
    pub h_total: u16,
    /// Total lines of the first field.
    pub v_total: u16,
    pub interlaced: bool,
}

impl VideoTiming {
    /// CTA-861 video identification code of the timing, if it is one of the formats which
    /// have to be distinguished by the RX subsystem.
    pub fn cea_vic(&self) -> Option<u8> {
        let vic = match (self.h_active, self.v_active, self.h_total, self.interlaced) {
            (640, 480, 800, false) => 1,
            (720, 480, 858, false) => 2,
            (1280, 720, 1650, false) => 4,
            (1920, 540, 2200, true) => 5,
            (1440, 240, 1716, true) => 6,
            (720, 576, 864, false) => 17,
            (1280, 720, 1980, false) => 19,
            (1920, 540, 2640, true) => 20,
            (1440, 288, 1728, true) => 21,
            (1920, 1080, 2200, false) => 16,
            (1920, 1080, 2640, false) => 31,
            (3840, 2160, 4400, false) => 95,
            (3840, 2160, 5280, false) => 94,
            (3840, 2160, 5500, false) => 93,
            (4096, 2160, 4400, false) => 98,
            _ => return None,
        };
        Some(vic)
    }
}

/// Format descriptor consumed by the [bridge mode selector](crate::bridge::select).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VideoFormat {
    pub is_hdmi: bool,
    pub interlaced: bool,
    pub h_active: u16,
    pub v_active: u16,
    pub color_format: ColorFormat,
    /// Pixel repetition factor, 1 means no repetition.
    pub pixel_repetition: u8,
}

/// Current state of the received stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VideoStream {
    pub timing: VideoTiming,
    pub color_format: ColorFormat,
    pub color_depth: ColorDepth,
    pub pixel_repetition: u8,
    pub ppc: PixelsPerClock,
    pub vic: u8,
    pub aspect_ratio: AspectRatio,
    pub is_hdmi: bool,
    pub is_3d: bool,
    pub tmds_clock_ratio: bool,
    pub ref_clock: Hertz,
    pub pixel_clock: Hertz,
}

impl Default for VideoStream {
    fn default() -> Self {
        Self {
            timing: VideoTiming::default(),
            color_format: ColorFormat::default(),
            color_depth: ColorDepth::default(),
            pixel_repetition: 1,
            ppc: PixelsPerClock::default(),
            vic: 0,
            aspect_ratio: AspectRatio::default(),
            is_hdmi: false,
            is_3d: false,
            tmds_clock_ratio: false,
            ref_clock: Hertz::from_raw(0),
            pixel_clock: Hertz::from_raw(0),
        }
    }
}

impl VideoStream {
    pub fn format(&self) -> VideoFormat {
        VideoFormat {
            is_hdmi: self.is_hdmi,
            interlaced: self.timing.interlaced,
            h_active: self.timing.h_active,
            v_active: self.timing.v_active,
            color_format: self.color_format,
            pixel_repetition: self.pixel_repetition.max(1),
        }
    }
}
