//! 연결 설정

use crate::{Error, Result, DEFAULT_MAX_SEQUENCE, DEFAULT_PROTOCOL_ID, PACKET_OVERHEAD};

/// 수신 큐 유지 범위(34)와 ack 비트 윈도우(32)가 시퀀스 공간 절반 안에 들어가야 함
const MIN_MAX_SEQUENCE: u32 = 64;

/// RUDP 연결 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 프로토콜 식별자 (모든 데이터그램 앞 4바이트)
    /// 불일치하는 패킷은 조용히 버려짐
    pub protocol_id: u32,

    /// 연결 타임아웃 (시간 단위, update의 dt와 동일)
    pub timeout: f32,

    /// 시퀀스 최대값 (wrap 모듈러스 - 1)
    pub max_sequence: u32,

    /// RTT 윈도우: 손실 판정 및 대역폭 샘플링 기간
    pub rtt_window: f32,

    /// 데이터그램 최대 크기 (프로토콜 ID + 신뢰성 헤더 + 페이로드)
    pub max_packet_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol_id: DEFAULT_PROTOCOL_ID,
            timeout: 5.0,                   // 5초
            max_sequence: DEFAULT_MAX_SEQUENCE,
            rtt_window: 1.0,                // 1초
            max_packet_size: 1400,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 프로토콜 ID만 바꾼 기본 설정
    pub fn with_protocol_id(protocol_id: u32) -> Self {
        Self {
            protocol_id,
            ..Self::default()
        }
    }

    /// 페이로드 최대 크기 (프레이밍 오버헤드 제외)
    pub fn max_payload_size(&self) -> usize {
        self.max_packet_size.saturating_sub(PACKET_OVERHEAD)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err(Error::InvalidConfig {
                reason: "timeout must be positive",
            });
        }
        if !self.rtt_window.is_finite() || self.rtt_window <= 0.0 {
            return Err(Error::InvalidConfig {
                reason: "rtt_window must be positive",
            });
        }
        if self.max_sequence < MIN_MAX_SEQUENCE {
            return Err(Error::InvalidConfig {
                reason: "max_sequence too small for the ack window",
            });
        }
        if self.max_packet_size <= PACKET_OVERHEAD {
            return Err(Error::InvalidConfig {
                reason: "max_packet_size must exceed the framing overhead",
            });
        }
        Ok(())
    }

    /// LAN용 설정 (빠른 타임아웃)
    pub fn lan() -> Self {
        Self {
            timeout: 2.0,
            max_packet_size: 1400,
            ..Self::default()
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            timeout: 15.0,
            max_packet_size: 1000,          // 작은 데이터그램
            ..Self::default()
        }
    }

    /// 시퀀스 wrap 테스트용 설정
    pub fn wraparound_test(max_sequence: u32) -> Self {
        Self {
            max_sequence,
            ..Self::default()
        }
    }
}
