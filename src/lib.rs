//! # RUDP (Reliable UDP)
//!
//! UDP 위의 가상 연결 + 선택적 ack 기반 신뢰성 계층
//!
//! ## 핵심 특징
//! - **가상 연결**: 프로토콜 ID 필터링, 리슨/커넥트, 타임아웃
//! - **선택적 ack**: 최신 ack + 이전 32개 시퀀스 비트필드
//! - **시퀀스 wrap**: 설정 가능한 시퀀스 공간에서 반 범위 비교
//! - **RTT/대역폭 추정**: 지수 이동 평균, RTT 윈도우 기반 집계
//! - **재전송 없음**: ack/손실 정보만 제공, 재전송은 호출자 몫
//!
//! ## 와이어 포맷
//! ```text
//! [protocol_id: u32][sequence: u32][ack: u32][ack_bits: u32][payload...]
//! ```
//! 모든 정수는 빅엔디언.

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod header;
pub mod queue;
pub mod reliability;
pub mod reliable;
pub mod seq;
pub mod simulator;
pub mod socket;
pub mod stats;

pub use config::Config;
pub use connection::{Connection, ConnectionHooks, ConnectionState, Mode};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use header::ReliabilityHeader;
pub use queue::{PacketQueue, PacketRecord};
pub use reliability::ReliabilitySystem;
pub use reliable::ReliableConnection;
pub use simulator::{LossySocket, MemoryNetwork, MemoryTransport};
pub use socket::{DatagramSocket, Transport};
pub use stats::ReliabilityStats;

/// 프로토콜 ID 크기 (바이트)
pub const PROTOCOL_ID_SIZE: usize = 4;

/// 데이터그램당 프레이밍 오버헤드 (프로토콜 ID + 신뢰성 헤더)
pub const PACKET_OVERHEAD: usize = PROTOCOL_ID_SIZE + header::HEADER_SIZE;

/// 기본 프로토콜 ID
pub const DEFAULT_PROTOCOL_ID: u32 = 0x1111_2222;

/// 기본 최대 시퀀스 번호
pub const DEFAULT_MAX_SEQUENCE: u32 = 0xFFFF_FFFF;
