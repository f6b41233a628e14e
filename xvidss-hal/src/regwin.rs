//! # Byte addressable register windows
//!
//! Some cores expose a byte addressable register space, for example the HDCP port inside
//! the DisplayPort configuration data, through a register file which only supports aligned
//! 32-bit accesses. Each register holds four consecutive bytes of the window in
//! little-endian order, so byte `n` of the window lives in lane `n % 4` of the register at
//! offset `n & !0b11`.
//!
//! Partial register writes are emulated with read-modify-write cycles which only replace
//! the targeted byte lanes. The window can contain one FIFO sub-window. Writes starting at
//! the FIFO offset always target the same register and never read the register first.

/// Size of a logical window in bytes. Requests are truncated at this boundary.
pub const WINDOW_SIZE: usize = 0x100;

/// Word addressable register file backing a [ByteWindow].
pub trait WordRegisters {
    /// Read the register at the 4-byte aligned byte `offset`.
    fn read_word(&mut self, offset: u8) -> u32;

    /// Write the register at the 4-byte aligned byte `offset`.
    fn write_word(&mut self, offset: u8, value: u32);
}

impl<T: WordRegisters + ?Sized> WordRegisters for &mut T {
    #[inline]
    fn read_word(&mut self, offset: u8) -> u32 {
        T::read_word(self, offset)
    }

    #[inline]
    fn write_word(&mut self, offset: u8, value: u32) {
        T::write_word(self, offset, value)
    }
}

/// Clamp a request length so that the request does not exceed the window.
#[inline]
pub const fn clamp_len(offset: u8, len: usize) -> usize {
    let available = WINDOW_SIZE - offset as usize;
    if len > available { available } else { len }
}

/// Byte lane of the given window offset inside its register.
#[inline]
pub const fn lane_alignment(offset: usize) -> usize {
    offset % 4
}

/// Number of bytes which can be handled with one register access at `offset`.
#[inline]
pub const fn chunk_len(offset: usize, remaining: usize) -> usize {
    let lanes = 4 - lane_alignment(offset);
    if lanes > remaining { remaining } else { lanes }
}

/// Mask covering `len` byte lanes starting at lane `alignment`.
#[inline]
pub const fn lane_mask(alignment: usize, len: usize) -> u32 {
    let lanes = if len >= 4 {
        u32::MAX
    } else {
        (1u32 << (8 * len)) - 1
    };
    lanes << (8 * alignment)
}

/// Byte addressable view on a [WordRegisters] implementation.
#[derive(Debug)]
pub struct ByteWindow<R> {
    regs: R,
    fifo: Option<u8>,
}

impl<R: WordRegisters> ByteWindow<R> {
    #[inline]
    pub const fn new(regs: R) -> Self {
        Self { regs, fifo: None }
    }

    /// Create a window with a write FIFO at `fifo_offset`.
    #[inline]
    pub const fn new_with_fifo(regs: R, fifo_offset: u8) -> Self {
        Self {
            regs,
            fifo: Some(fifo_offset),
        }
    }

    #[inline]
    pub const fn fifo_offset(&self) -> Option<u8> {
        self.fifo
    }

    #[inline]
    pub const fn regs(&self) -> &R {
        &self.regs
    }

    #[inline]
    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    #[inline]
    pub fn release(self) -> R {
        self.regs
    }

    /// Read `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read, which is smaller than the buffer length if the
    /// request exceeds the window.
    pub fn read(&mut self, offset: u8, buf: &mut [u8]) -> usize {
        let len = clamp_len(offset, buf.len());
        let mut offset = offset as usize;
        let mut done = 0;
        while done < len {
            let alignment = lane_alignment(offset);
            let count = chunk_len(offset, len - done);
            let word = self.regs.read_word((offset - alignment) as u8) >> (8 * alignment);
            buf[done..done + count].copy_from_slice(&word.to_le_bytes()[..count]);
            offset += count;
            done += count;
        }
        len
    }

    /// Write `data` starting at `offset`.
    ///
    /// Returns the number of bytes written, which is smaller than the data length if the
    /// request exceeds the window.
    pub fn write(&mut self, offset: u8, data: &[u8]) -> usize {
        let len = clamp_len(offset, data.len());
        let is_fifo = self.fifo == Some(offset);
        let mut reg_offset = offset as usize & !0b11;
        let mut offset = offset as usize;
        let mut done = 0;
        while done < len {
            let alignment = lane_alignment(offset);
            let count = chunk_len(offset, len - done);
            let mut lanes = [0u8; 4];
            lanes[alignment..alignment + count].copy_from_slice(&data[done..done + count]);
            let value = u32::from_le_bytes(lanes);
            if count == 4 || is_fifo {
                self.regs.write_word(reg_offset as u8, value);
            } else {
                let mask = lane_mask(alignment, count);
                let current = self.regs.read_word(reg_offset as u8);
                self.regs
                    .write_word(reg_offset as u8, (current & !mask) | value);
            }
            offset += count;
            done += count;
            // The FIFO auto-increments internally.
            if !is_fifo {
                reg_offset += 4;
            }
        }
        len
    }

    /// Read-modify-write of a single byte.
    pub fn modify_byte(&mut self, offset: u8, f: impl FnOnce(u8) -> u8) {
        let mut byte = [0u8; 1];
        self.read(offset, &mut byte);
        byte[0] = f(byte[0]);
        self.write(offset, &byte);
    }

    /// Fill `len` bytes starting at `offset` with `value`. Returns the number of bytes
    /// written.
    pub fn fill(&mut self, offset: u8, len: usize, value: u8) -> usize {
        let len = clamp_len(offset, len);
        let chunk = [value; 16];
        let mut done = 0;
        while done < len {
            let count = core::cmp::min(chunk.len(), len - done);
            self.write(offset + done as u8, &chunk[..count]);
            done += count;
        }
        len
    }
}

#[cfg(test)]
pub(crate) mod mock {
    extern crate std;

    use std::vec::Vec;

    use super::WordRegisters;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Access {
        Read(u8),
        Write(u8, u32),
    }

    /// Register file which records every access.
    #[derive(Debug)]
    pub struct MockRegs {
        pub words: [u32; 64],
        pub accesses: Vec<Access>,
    }

    impl MockRegs {
        pub fn new() -> Self {
            Self::new_filled(0)
        }

        pub fn new_filled(value: u32) -> Self {
            Self {
                words: [value; 64],
                accesses: Vec::new(),
            }
        }

        pub fn byte(&self, offset: usize) -> u8 {
            self.words[offset / 4].to_le_bytes()[offset % 4]
        }

        pub fn bytes(&self) -> [u8; 256] {
            let mut bytes = [0; 256];
            for (idx, byte) in bytes.iter_mut().enumerate() {
                *byte = self.byte(idx);
            }
            bytes
        }

        pub fn set_byte(&mut self, offset: usize, value: u8) {
            let mut lanes = self.words[offset / 4].to_le_bytes();
            lanes[offset % 4] = value;
            self.words[offset / 4] = u32::from_le_bytes(lanes);
        }

        pub fn writes(&self) -> Vec<(u8, u32)> {
            self.accesses
                .iter()
                .filter_map(|access| match access {
                    Access::Write(offset, value) => Some((*offset, *value)),
                    Access::Read(_) => None,
                })
                .collect()
        }

        pub fn reads(&self) -> usize {
            self.accesses
                .iter()
                .filter(|access| matches!(access, Access::Read(_)))
                .count()
        }
    }

    impl WordRegisters for MockRegs {
        fn read_word(&mut self, offset: u8) -> u32 {
            assert_eq!(offset % 4, 0, "unaligned register read");
            self.accesses.push(Access::Read(offset));
            self.words[offset as usize / 4]
        }

        fn write_word(&mut self, offset: u8, value: u32) {
            assert_eq!(offset % 4, 0, "unaligned register write");
            self.accesses.push(Access::Write(offset, value));
            self.words[offset as usize / 4] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Access, MockRegs};
    use super::*;

    #[test]
    fn lane_masks() {
        assert_eq!(lane_mask(0, 1), 0x0000_00FF);
        assert_eq!(lane_mask(1, 1), 0x0000_FF00);
        assert_eq!(lane_mask(2, 1), 0x00FF_0000);
        assert_eq!(lane_mask(3, 1), 0xFF00_0000);
        assert_eq!(lane_mask(1, 2), 0x00FF_FF00);
        assert_eq!(lane_mask(2, 2), 0xFFFF_0000);
        assert_eq!(lane_mask(1, 3), 0xFFFF_FF00);
        assert_eq!(lane_mask(0, 4), 0xFFFF_FFFF);
    }

    #[test]
    fn chunk_lengths() {
        assert_eq!(chunk_len(0, 10), 4);
        assert_eq!(chunk_len(0, 2), 2);
        assert_eq!(chunk_len(1, 10), 3);
        assert_eq!(chunk_len(2, 10), 2);
        assert_eq!(chunk_len(3, 10), 1);
        assert_eq!(chunk_len(5, 2), 2);
    }

    #[test]
    fn clamping() {
        assert_eq!(clamp_len(0, 256), 256);
        assert_eq!(clamp_len(0, 300), 256);
        assert_eq!(clamp_len(0xF0, 0x20), 0x10);
        assert_eq!(clamp_len(0xFF, 5), 1);
        assert_eq!(clamp_len(0x10, 4), 4);
    }

    #[test]
    fn unaligned_read() {
        let mut regs = MockRegs::new();
        regs.words[0] = 0x4433_2211;
        regs.words[1] = 0x8877_6655;
        let mut window = ByteWindow::new(regs);
        let mut buf = [0; 5];
        assert_eq!(window.read(1, &mut buf), 5);
        assert_eq!(buf, [0x22, 0x33, 0x44, 0x55, 0x66]);
        let regs = window.release();
        assert_eq!(regs.accesses, [Access::Read(0), Access::Read(4)]);
    }

    #[test]
    fn aligned_word_write_is_single_access() {
        let mut window = ByteWindow::new(MockRegs::new_filled(0xFFFF_FFFF));
        assert_eq!(window.write(8, &[0x01, 0x02, 0x03, 0x04]), 4);
        let regs = window.release();
        assert_eq!(regs.accesses, [Access::Write(8, 0x0403_0201)]);
    }

    #[test]
    fn partial_write_lane_0() {
        let mut window = ByteWindow::new(MockRegs::new_filled(0xAABB_CCDD));
        window.write(4, &[0x11]);
        assert_eq!(window.regs().words[1], 0xAABB_CC11);
        assert_eq!(window.regs().reads(), 1);
    }

    #[test]
    fn partial_write_lane_1() {
        let mut window = ByteWindow::new(MockRegs::new_filled(0xAABB_CCDD));
        window.write(5, &[0x11]);
        assert_eq!(window.regs().words[1], 0xAABB_11DD);
    }

    #[test]
    fn partial_write_lane_2() {
        let mut window = ByteWindow::new(MockRegs::new_filled(0xAABB_CCDD));
        window.write(6, &[0x11, 0x22]);
        assert_eq!(window.regs().words[1], 0x2211_CCDD);
        assert_eq!(window.regs().words[2], 0xAABB_CCDD);
    }

    #[test]
    fn partial_write_lane_3() {
        let mut window = ByteWindow::new(MockRegs::new_filled(0xAABB_CCDD));
        window.write(7, &[0x11, 0x22]);
        assert_eq!(window.regs().words[1], 0x11BB_CCDD);
        assert_eq!(window.regs().words[2], 0xAABB_CC22);
    }

    #[test]
    fn write_then_read_every_offset() {
        for offset in 0..=255u8 {
            for len in 1..=4usize {
                let mut window = ByteWindow::new(MockRegs::new_filled(0x5A5A_5A5A));
                let data: [u8; 4] = core::array::from_fn(|i| offset.wrapping_add(i as u8) ^ 0xC3);
                let expected_len = clamp_len(offset, len);
                assert_eq!(window.write(offset, &data[..len]), expected_len);

                let mut expected = [0x5A; 256];
                expected[offset as usize..offset as usize + expected_len]
                    .copy_from_slice(&data[..expected_len]);
                assert_eq!(window.regs().bytes(), expected);

                let mut readback = [0; 4];
                assert_eq!(window.read(offset, &mut readback[..len]), expected_len);
                assert_eq!(readback[..expected_len], data[..expected_len]);
            }
        }
    }

    #[test]
    fn truncation_at_window_end() {
        let mut window = ByteWindow::new(MockRegs::new());
        assert_eq!(window.write(0xFE, &[1, 2, 3, 4]), 2);
        assert_eq!(window.regs().words[63], 0x0201_0000);
        assert!(
            window
                .regs()
                .accesses
                .iter()
                .all(|access| matches!(access, Access::Read(0xFC) | Access::Write(0xFC, _)))
        );
        let mut buf = [0; 8];
        assert_eq!(window.read(0xFD, &mut buf), 3);
        assert_eq!(buf[..3], [0x00, 0x01, 0x02]);
    }

    #[test]
    fn fifo_address_does_not_advance() {
        let mut window = ByteWindow::new_with_fifo(MockRegs::new(), 0x2C);
        let data: [u8; 15] = core::array::from_fn(|i| i as u8 + 1);
        assert_eq!(window.write(0x2C, &data), 15);
        let regs = window.release();
        assert_eq!(regs.reads(), 0);
        assert_eq!(
            regs.writes(),
            [
                (0x2C, 0x0403_0201),
                (0x2C, 0x0807_0605),
                (0x2C, 0x0C0B_0A09),
                (0x2C, 0x000F_0E0D),
            ]
        );
    }

    #[test]
    fn fifo_handling_only_applies_at_fifo_offset() {
        let mut window = ByteWindow::new_with_fifo(MockRegs::new(), 0x2C);
        window.write(0x28, &[0; 8]);
        assert_eq!(window.regs().writes(), [(0x28, 0), (0x2C, 0)]);
    }

    #[test]
    fn modify_single_byte() {
        let mut regs = MockRegs::new();
        regs.words[0x28 / 4] = 0x0000_0F00;
        let mut window = ByteWindow::new(regs);
        window.modify_byte(0x29, |value| value & !0b1100);
        assert_eq!(window.regs().words[0x28 / 4], 0x0000_0300);
    }

    #[test]
    fn fill_region() {
        let mut window = ByteWindow::new(MockRegs::new_filled(0xFFFF_FFFF));
        assert_eq!(window.fill(0x02, 0x23, 0), 0x23);
        let bytes = window.regs().bytes();
        assert_eq!(bytes[..2], [0xFF, 0xFF]);
        assert!(bytes[0x02..0x25].iter().all(|b| *b == 0));
        assert_eq!(bytes[0x25], 0xFF);
    }
}
