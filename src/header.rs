//! 신뢰성 헤더 (12바이트, 빅엔디언)
//!
//! ```text
//! 0..4   sequence
//! 4..8   ack       (송신측이 본 remote_sequence)
//! 8..12  ack_bits  (ack 이전 32개 시퀀스 수신 여부)
//! ```

use bytes::{Buf, BufMut};

/// 헤더 크기
pub const HEADER_SIZE: usize = 12;

/// 시퀀스/ack 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReliabilityHeader {
    pub sequence: u32,
    pub ack: u32,
    pub ack_bits: u32,
}

impl ReliabilityHeader {
    pub fn new(sequence: u32, ack: u32, ack_bits: u32) -> Self {
        Self {
            sequence,
            ack,
            ack_bits,
        }
    }

    pub fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.sequence);
        buf.put_u32(self.ack);
        buf.put_u32(self.ack_bits);
    }

    /// 12바이트 미만이면 None
    pub fn read<B: Buf>(buf: &mut B) -> Option<Self> {
        if buf.remaining() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            sequence: buf.get_u32(),
            ack: buf.get_u32(),
            ack_bits: buf.get_u32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let header = ReliabilityHeader::new(0x0102_0304, 0x0A0B_0C0D, 0x8000_0001);
        let mut buf = Vec::new();
        header.write(&mut buf);

        assert_eq!(
            buf,
            [0x01, 0x02, 0x03, 0x04, 0x0A, 0x0B, 0x0C, 0x0D, 0x80, 0x00, 0x00, 0x01]
        );

        let mut slice = &buf[..];
        assert_eq!(ReliabilityHeader::read(&mut slice), Some(header));
        assert!(slice.is_empty());
    }

    #[test]
    fn test_truncated_header() {
        let mut slice: &[u8] = &[0u8; HEADER_SIZE - 1];
        assert_eq!(ReliabilityHeader::read(&mut slice), None);
    }
}
