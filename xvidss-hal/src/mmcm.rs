//! # RX MMCM parameter calculation
//!
//! The video PHY contains an MMCM which generates the link, the reference and the video
//! clock of the RX path from the recovered TMDS reference clock. The dividers depend on
//! the line rate, the pixels per clock and the color depth of the received stream.
use crate::{
    time::Hertz,
    video::{ColorDepth, PixelsPerClock},
};

/// Maximum VCO frequency of the MMCM.
pub const DEFAULT_FVCO_MAX: Hertz = Hertz::from_raw(1_200_000_000);

/// Line rates at or above this value use the 1/40 TMDS clock ratio.
pub const HIGH_LINE_RATE_MBPS: u32 = 3400;

/// Largest valid output divider.
pub const MAX_OUTPUT_DIVIDER: u16 = 128;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MmcmConfig {
    pub fvco_max: Hertz,
    /// The reference clock is divided by this value before it is fed into the MMCM.
    pub ref_clk_scale: u32,
}

impl Default for MmcmConfig {
    fn default() -> Self {
        Self {
            fvco_max: DEFAULT_FVCO_MAX,
            ref_clk_scale: 1,
        }
    }
}

/// Properties of the received stream relevant for the clock generation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RxClockRequest {
    pub ref_clk: Hertz,
    pub line_rate_mbps: u32,
    pub ppc: PixelsPerClock,
    pub color_depth: ColorDepth,
    pub tmds_clock_ratio: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MmcmParams {
    pub divclk_divide: u8,
    pub clkfbout_mult: u8,
    /// Link clock.
    pub clkout0_divide: u16,
    /// Reference clock.
    pub clkout1_divide: u16,
    /// Video clock.
    pub clkout2_divide: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MmcmError {
    #[error("reference clock is zero")]
    ZeroReferenceClock,
    #[error("multiplier {0} out of range")]
    MultiplierOutOfRange(u32),
    #[error("no valid divider configuration")]
    NoValidDividers,
}

/// Calculate the RX MMCM parameters.
pub fn calculate_rx_params(
    config: &MmcmConfig,
    request: &RxClockRequest,
) -> Result<MmcmParams, MmcmError> {
    let ref_clk = request.ref_clk.raw() / config.ref_clk_scale.max(1);
    if ref_clk == 0 {
        return Err(MmcmError::ZeroReferenceClock);
    }
    let step = if request.ppc == PixelsPerClock::Four {
        4
    } else {
        2
    };
    let mut mult = config.fvco_max.raw() / ref_clk;
    mult -= mult % step;
    if !(2..=64).contains(&mult) {
        return Err(MmcmError::MultiplierOutOfRange(mult));
    }

    while mult > 0 {
        let clkout0 = if request.line_rate_mbps >= HIGH_LINE_RATE_MBPS {
            mult
        } else {
            mult * 4
        };
        let clkout1 = mult;
        let mut clkout2 = video_clock_divider(mult, request.ppc, request.color_depth);
        if request.tmds_clock_ratio {
            clkout2 = if clkout2 % 4 == 0 { clkout2 / 4 } else { 255 };
        }
        let max = MAX_OUTPUT_DIVIDER as u32;
        if clkout0 <= max && clkout1 <= max && clkout2 <= max {
            return Ok(MmcmParams {
                divclk_divide: 1,
                clkfbout_mult: mult as u8,
                clkout0_divide: clkout0 as u16,
                clkout1_divide: clkout1 as u16,
                clkout2_divide: clkout2 as u16,
            });
        }
        mult -= step;
    }
    Err(MmcmError::NoValidDividers)
}

const fn video_clock_divider(mult: u32, ppc: PixelsPerClock, depth: ColorDepth) -> u32 {
    let quad = matches!(ppc, PixelsPerClock::Four);
    match depth {
        ColorDepth::Bpc8 => {
            if quad {
                mult * 4
            } else {
                mult * 2
            }
        }
        ColorDepth::Bpc10 => {
            if quad {
                mult * 5
            } else {
                mult * 5 / 2
            }
        }
        ColorDepth::Bpc12 => {
            if quad {
                mult * 6
            } else {
                mult * 3
            }
        }
        ColorDepth::Bpc16 => {
            if quad {
                mult * 8
            } else {
                mult * 4
            }
        }
    }
}
