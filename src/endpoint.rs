//! 피어 주소
//!
//! 32비트 IPv4 주소 + 16비트 포트. 생성 후 변경되지 않는 값 타입이며
//! 맵 키 및 동등 비교에만 쓰인다.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// 피어 식별자
///
/// 정렬은 주소 → 포트 순 (구조적 비교)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    address: u32,
    port: u16,
}

impl Endpoint {
    pub const fn new(address: u32, port: u16) -> Self {
        Self { address, port }
    }

    /// `a.b.c.d:port` 형태로 생성
    pub const fn from_octets(a: u8, b: u8, c: u8, d: u8, port: u16) -> Self {
        Self {
            address: u32::from_be_bytes([a, b, c, d]),
            port,
        }
    }

    pub const fn address(&self) -> u32 {
        self.address
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn a(&self) -> u8 {
        (self.address >> 24) as u8
    }

    pub const fn b(&self) -> u8 {
        (self.address >> 16) as u8
    }

    pub const fn c(&self) -> u8 {
        (self.address >> 8) as u8
    }

    pub const fn d(&self) -> u8 {
        self.address as u8
    }

    /// 주소가 0이면 "피어 없음"
    pub const fn is_unspecified(&self) -> bool {
        self.address == 0
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::from(*self))
    }

    /// IPv6 주소는 표현 불가 → None
    pub fn from_socket_addr(addr: SocketAddr) -> Option<Self> {
        match addr {
            SocketAddr::V4(v4) => Some(Self::from(v4)),
            SocketAddr::V6(_) => None,
        }
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(u32::from(*addr.ip()), addr.port())
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(endpoint: Endpoint) -> Self {
        SocketAddrV4::new(Ipv4Addr::from(endpoint.address), endpoint.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}:{}",
            self.a(),
            self.b(),
            self.c(),
            self.d(),
            self.port
        )
    }
}
