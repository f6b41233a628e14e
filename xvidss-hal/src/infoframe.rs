//! # Auxiliary packet decoding
//!
//! Minimal decoders for the InfoFrames and control packets the RX subsystem needs. Every
//! decoder starts from a default value, so no field of a previously received packet
//! survives a new packet.
use arbitrary_int::{u2, u3, u4};

use crate::video::{AspectRatio, ColorDepth, ColorFormat};

/// Auxiliary packet as read from the RX core packet FIFO.
///
/// The data bytes are made up of four sub-packets with seven payload bytes followed by one
/// ECC byte each.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AuxPacket {
    pub header: [u8; 4],
    pub data: [u8; 32],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum PacketType {
    GeneralControl = 0x03,
    VendorSpecific = 0x81,
    Avi = 0x82,
    SourceProductDescriptor = 0x83,
    Audio = 0x84,
    DynamicRange = 0x87,
}

impl AuxPacket {
    /// Create a packet from the header word and the eight data words read from the FIFO.
    pub fn from_words(header: u32, data: [u32; 8]) -> Self {
        let mut packet = Self {
            header: header.to_le_bytes(),
            data: [0; 32],
        };
        for (chunk, word) in packet.data.chunks_exact_mut(4).zip(data) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        packet
    }

    /// Create a packet from a header and the payload bytes without ECC bytes. Mostly useful
    /// for tests and for injecting packets.
    pub fn from_payload(header: [u8; 4], payload: &[u8]) -> Self {
        let mut packet = Self {
            header,
            data: [0; 32],
        };
        for (idx, byte) in payload.iter().take(28).enumerate() {
            packet.data[(idx / 7) * 8 + idx % 7] = *byte;
        }
        packet
    }

    #[inline]
    pub fn raw_type(&self) -> u8 {
        self.header[0]
    }

    #[inline]
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::try_from(self.header[0]).ok()
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.header[1]
    }

    /// Payload bytes PB0..PB27 with the ECC bytes removed.
    pub fn payload(&self) -> [u8; 28] {
        let mut payload = [0; 28];
        for (idx, byte) in payload.iter_mut().enumerate() {
            *byte = self.data[(idx / 7) * 8 + idx % 7];
        }
        payload
    }
}

#[bitbybit::bitfield(u8, default = 0x0)]
struct AviByte1 {
    #[bits(5..=6, r)]
    color_format: u2,
}

#[bitbybit::bitfield(u8, default = 0x0)]
struct AviByte2 {
    #[bits(6..=7, r)]
    colorimetry: u2,
    #[bits(4..=5, r)]
    picture_aspect: u2,
}

#[bitbybit::bitfield(u8, default = 0x0)]
struct AviByte5 {
    #[bits(0..=3, r)]
    pixel_repetition: u4,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AviInfoFrame {
    pub version: u8,
    pub color_format: ColorFormat,
    pub colorimetry: u8,
    pub picture_aspect: AspectRatio,
    pub vic: u8,
    /// Pixel repetition factor. Zero if no InfoFrame was received.
    pub pixel_repetition: u8,
}

impl AviInfoFrame {
    pub fn from_packet(packet: &AuxPacket) -> Self {
        let payload = packet.payload();
        let byte1 = AviByte1::new_with_raw_value(payload[1]);
        let byte2 = AviByte2::new_with_raw_value(payload[2]);
        let byte5 = AviByte5::new_with_raw_value(payload[5]);
        Self {
            version: packet.version(),
            color_format: ColorFormat::try_from(byte1.color_format().value())
                .unwrap_or_default(),
            colorimetry: byte2.colorimetry().value(),
            picture_aspect: match byte2.picture_aspect().value() {
                1 => AspectRatio::Ratio4x3,
                2 => AspectRatio::Ratio16x9,
                _ => AspectRatio::Unknown,
            },
            vic: if packet.version() >= 3 {
                payload[4]
            } else {
                payload[4] & 0x7F
            },
            pixel_repetition: byte5.pixel_repetition().value() + 1,
        }
    }
}

#[bitbybit::bitfield(u8, default = 0x0)]
struct GcpByte0 {
    #[bit(4, r)]
    clear_avmute: bool,
    #[bit(0, r)]
    set_avmute: bool,
}

#[bitbybit::bitfield(u8, default = 0x0)]
struct GcpByte1 {
    #[bits(0..=3, r)]
    color_depth: u4,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GeneralControl {
    pub set_avmute: bool,
    pub clear_avmute: bool,
    /// Color depth of the stream, [None] if the source does not indicate it.
    pub color_depth: Option<ColorDepth>,
}

impl GeneralControl {
    pub fn from_packet(packet: &AuxPacket) -> Self {
        let payload = packet.payload();
        let byte0 = GcpByte0::new_with_raw_value(payload[0]);
        let byte1 = GcpByte1::new_with_raw_value(payload[1]);
        Self {
            set_avmute: byte0.set_avmute(),
            clear_avmute: byte0.clear_avmute(),
            color_depth: match byte1.color_depth().value() {
                4 => Some(ColorDepth::Bpc8),
                5 => Some(ColorDepth::Bpc10),
                6 => Some(ColorDepth::Bpc12),
                7 => Some(ColorDepth::Bpc16),
                _ => None,
            },
        }
    }
}

#[bitbybit::bitfield(u8, default = 0x0)]
struct AudioByte1 {
    #[bits(4..=7, r)]
    coding_type: u4,
    #[bits(0..=2, r)]
    channel_count: u3,
}

#[bitbybit::bitfield(u8, default = 0x0)]
struct AudioByte2 {
    #[bits(2..=4, r)]
    sample_frequency: u3,
    #[bits(0..=1, r)]
    sample_size: u2,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AudioInfoFrame {
    pub coding_type: u8,
    /// Number of channels. Zero means the count is taken from the stream header.
    pub channel_count: u8,
    pub sample_frequency: u8,
    pub sample_size: u8,
    pub channel_allocation: u8,
}

impl AudioInfoFrame {
    pub fn from_packet(packet: &AuxPacket) -> Self {
        let payload = packet.payload();
        let byte1 = AudioByte1::new_with_raw_value(payload[1]);
        let byte2 = AudioByte2::new_with_raw_value(payload[2]);
        let channels = byte1.channel_count().value();
        Self {
            coding_type: byte1.coding_type().value(),
            channel_count: if channels == 0 { 0 } else { channels + 1 },
            sample_frequency: byte2.sample_frequency().value(),
            sample_size: byte2.sample_size().value(),
            channel_allocation: payload[4],
        }
    }
}

/// Value of the EOTF and descriptor fields while no DRM InfoFrame is valid.
pub const DRM_NO_INFO: u8 = 0xFF;

/// Dynamic range and mastering InfoFrame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DrmInfoFrame {
    pub eotf: u8,
    pub static_metadata_descriptor_id: u8,
    /// Static metadata descriptor bytes, PB3..PB26.
    pub metadata: [u8; 24],
}

impl DrmInfoFrame {
    /// Marker value used while no InfoFrame was received since the last stream loss.
    pub const fn no_info() -> Self {
        Self {
            eotf: DRM_NO_INFO,
            static_metadata_descriptor_id: DRM_NO_INFO,
            metadata: [0; 24],
        }
    }

    pub fn from_packet(packet: &AuxPacket) -> Self {
        let payload = packet.payload();
        let mut metadata = [0; 24];
        metadata.copy_from_slice(&payload[3..27]);
        Self {
            eotf: payload[1] & 0x07,
            static_metadata_descriptor_id: payload[2] & 0x07,
            metadata,
        }
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.eotf != DRM_NO_INFO
    }

    /// Maximum content light level in cd/m^2.
    #[inline]
    pub const fn max_content_light_level(&self) -> u16 {
        u16::from_le_bytes([self.metadata[20], self.metadata[21]])
    }

    /// Maximum frame average light level in cd/m^2.
    #[inline]
    pub const fn max_frame_average_light_level(&self) -> u16 {
        u16::from_le_bytes([self.metadata[22], self.metadata[23]])
    }
}

/// IEEE OUI of HDMI Licensing, LLC.
pub const HDMI_LLC_OUI: u32 = 0x00_0C03;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum HdmiVideoFormat {
    #[default]
    None,
    /// Extended resolution format with the HDMI VIC.
    ExtendedResolution(u8),
    /// 3D format with the 3D structure field.
    ThreeD(u8),
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VendorSpecificInfoFrame {
    pub oui: u32,
    pub format: HdmiVideoFormat,
}

impl VendorSpecificInfoFrame {
    pub fn from_packet(packet: &AuxPacket) -> Self {
        let payload = packet.payload();
        let oui = u32::from_le_bytes([payload[1], payload[2], payload[3], 0]);
        if oui != HDMI_LLC_OUI {
            return Self {
                oui,
                format: HdmiVideoFormat::None,
            };
        }
        let format = match payload[4] >> 5 {
            1 => HdmiVideoFormat::ExtendedResolution(payload[5]),
            2 => HdmiVideoFormat::ThreeD(payload[5] >> 4),
            _ => HdmiVideoFormat::None,
        };
        Self { oui, format }
    }

    /// CTA-861 VIC of an extended resolution format.
    pub fn cea_vic(&self) -> Option<u8> {
        match self.format {
            HdmiVideoFormat::ExtendedResolution(hdmi_vic) => hdmi_vic_to_cea(hdmi_vic),
            _ => None,
        }
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        matches!(self.format, HdmiVideoFormat::ThreeD(_))
    }
}

/// Map the HDMI VIC of the 4K extended resolution formats to the CTA-861 VIC.
pub const fn hdmi_vic_to_cea(hdmi_vic: u8) -> Option<u8> {
    match hdmi_vic {
        1 => Some(95),
        2 => Some(94),
        3 => Some(93),
        4 => Some(98),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_skips_ecc_bytes() {
        let mut data = [0u8; 32];
        for (idx, byte) in data.iter_mut().enumerate() {
            *byte = idx as u8;
        }
        let packet = AuxPacket {
            header: [0x82, 2, 13, 0],
            data,
        };
        let payload = packet.payload();
        assert_eq!(payload[..8], [0, 1, 2, 3, 4, 5, 6, 8]);
        assert_eq!(payload[27], 30);
        assert_eq!(AuxPacket::from_payload(packet.header, &payload).payload(), payload);
    }

    #[test]
    fn packet_from_words() {
        let packet = AuxPacket::from_words(0x000D_0282, [0x0403_0201, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(packet.packet_type(), Some(PacketType::Avi));
        assert_eq!(packet.version(), 2);
        assert_eq!(packet.data[..4], [1, 2, 3, 4]);
    }

    #[test]
    fn avi_yuv420_with_repetition() {
        let packet = AuxPacket::from_payload([0x82, 2, 13, 0], &[0, 0b0110_0000, 0b0010_0000, 0, 0x90, 0x01]);
        let avi = AviInfoFrame::from_packet(&packet);
        assert_eq!(avi.color_format, ColorFormat::Yuv420);
        assert_eq!(avi.picture_aspect, AspectRatio::Ratio16x9);
        assert_eq!(avi.vic, 0x10);
        assert_eq!(avi.pixel_repetition, 2);
    }

    #[test]
    fn avi_version_3_vic() {
        let packet = AuxPacket::from_payload([0x82, 3, 13, 0], &[0, 0, 0, 0, 0x90]);
        assert_eq!(AviInfoFrame::from_packet(&packet).vic, 0x90);
    }

    #[test]
    fn gcp_color_depth() {
        let packet = AuxPacket::from_payload([0x03, 0, 0, 0], &[0x10, 0x05]);
        let gcp = GeneralControl::from_packet(&packet);
        assert!(gcp.clear_avmute);
        assert!(!gcp.set_avmute);
        assert_eq!(gcp.color_depth, Some(ColorDepth::Bpc10));
        let packet = AuxPacket::from_payload([0x03, 0, 0, 0], &[0x00, 0x00]);
        assert_eq!(GeneralControl::from_packet(&packet).color_depth, None);
    }

    #[test]
    fn audio_channels() {
        let packet = AuxPacket::from_payload([0x84, 1, 10, 0], &[0, 0x17, 0b0000_1101, 0, 0x13]);
        let audio = AudioInfoFrame::from_packet(&packet);
        assert_eq!(audio.coding_type, 1);
        assert_eq!(audio.channel_count, 8);
        assert_eq!(audio.sample_frequency, 3);
        assert_eq!(audio.sample_size, 1);
        assert_eq!(audio.channel_allocation, 0x13);
    }

    #[test]
    fn drm_fields() {
        let mut payload = [0u8; 28];
        payload[1] = 2;
        payload[2] = 0;
        payload[23] = 0xE8;
        payload[24] = 0x03;
        let drm = DrmInfoFrame::from_packet(&AuxPacket::from_payload([0x87, 1, 26, 0], &payload));
        assert_eq!(drm.eotf, 2);
        assert_eq!(drm.static_metadata_descriptor_id, 0);
        assert_eq!(drm.max_content_light_level(), 1000);
        assert!(drm.is_valid());
        assert!(!DrmInfoFrame::no_info().is_valid());
    }

    #[test]
    fn vsif_extended_resolution() {
        let packet = AuxPacket::from_payload([0x81, 1, 5, 0], &[0, 0x03, 0x0C, 0x00, 0x20, 0x03]);
        let vsif = VendorSpecificInfoFrame::from_packet(&packet);
        assert_eq!(vsif.format, HdmiVideoFormat::ExtendedResolution(3));
        assert_eq!(vsif.cea_vic(), Some(93));
        assert!(!vsif.is_3d());

        let packet = AuxPacket::from_payload([0x81, 1, 5, 0], &[0, 0x03, 0x0C, 0x00, 0x40, 0x60]);
        let vsif = VendorSpecificInfoFrame::from_packet(&packet);
        assert_eq!(vsif.format, HdmiVideoFormat::ThreeD(6));
        assert!(vsif.is_3d());
    }

    #[test]
    fn vsif_foreign_oui() {
        let packet = AuxPacket::from_payload([0x81, 1, 5, 0], &[0, 0xD8, 0x5D, 0xC4, 0x20, 0x01]);
        let vsif = VendorSpecificInfoFrame::from_packet(&packet);
        assert_eq!(vsif.oui, 0xC4_5DD8);
        assert_eq!(vsif.format, HdmiVideoFormat::None);
    }
}
