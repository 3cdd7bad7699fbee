//! 에러 타입 정의
//!
//! 치명적인 실패(소켓 생성/바인드 실패, 잘못된 설정)만 에러로 올린다.
//! 프로토콜 ID 불일치, 잘린 헤더, 중복 시퀀스 같은 수신 이상은
//! "0 바이트 수신"으로 정규화되며 에러가 아니다.

use thiserror::Error;

/// RUDP 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("소켓 바인드 실패: port={port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("이미 실행 중인 연결")]
    AlreadyRunning,

    #[error("유효하지 않은 설정: {reason}")]
    InvalidConfig { reason: &'static str },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
