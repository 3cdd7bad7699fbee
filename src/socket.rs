//! 논블로킹 데이터그램 소켓
//!
//! 재시도나 버퍼링 없이 시스템 콜만 감싼다. 플랫폼별 구현은
//! `mio`가 빌드 시점에 선택한다.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use mio::net::UdpSocket;
use tracing::trace;

use crate::endpoint::Endpoint;
use crate::{Error, Result};

/// 연결 계층이 사용하는 전송 인터페이스
pub trait Transport {
    /// 버퍼 전체가 전송되었는지 반환. 블록하거나 큐잉하지 않음.
    fn send_to(&mut self, destination: Endpoint, data: &[u8]) -> bool;

    /// 대기 중인 데이터그램 하나 수신. 없으면 `None`.
    fn recv_from(&mut self, buf: &mut [u8]) -> Option<(usize, Endpoint)>;

    /// 닫기 (중복 호출 안전)
    fn close(&mut self);

    /// 바인드된 로컬 주소
    fn local_endpoint(&self) -> Option<Endpoint>;
}

/// UDP 소켓 래퍼
#[derive(Debug, Default)]
pub struct DatagramSocket {
    inner: Option<UdpSocket>,
}

impl DatagramSocket {
    /// `0.0.0.0:port`에 바인드 (port 0이면 OS가 선택)
    pub fn open(port: u16) -> Result<Self> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let socket = UdpSocket::bind(addr).map_err(|source| Error::Bind { port, source })?;

        let local = socket.local_addr()?;
        trace!("socket bound on {}", local);
        Ok(Self {
            inner: Some(socket),
        })
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// 실제 바인드된 포트
    pub fn local_port(&self) -> Option<u16> {
        self.local_endpoint().map(|endpoint| endpoint.port())
    }

    pub fn send(&self, destination: Endpoint, data: &[u8]) -> bool {
        let socket = match &self.inner {
            Some(socket) => socket,
            None => return false,
        };
        if data.is_empty() || destination.is_unspecified() || destination.port() == 0 {
            return false;
        }

        match socket.send_to(data, destination.to_socket_addr()) {
            Ok(sent) => sent == data.len(),
            Err(e) => {
                trace!("send_to {} failed: {}", destination, e);
                false
            }
        }
    }

    pub fn receive(&self, buf: &mut [u8]) -> Option<(usize, Endpoint)> {
        let socket = self.inner.as_ref()?;
        if buf.is_empty() {
            return None;
        }

        match socket.recv_from(buf) {
            Ok((0, _)) => None,
            Ok((len, addr)) => Endpoint::from_socket_addr(addr).map(|sender| (len, sender)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                trace!("recv_from failed: {}", e);
                None
            }
        }
    }

    pub fn close(&mut self) {
        self.inner = None;
    }
}

impl Transport for DatagramSocket {
    fn send_to(&mut self, destination: Endpoint, data: &[u8]) -> bool {
        self.send(destination, data)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Option<(usize, Endpoint)> {
        self.receive(buf)
    }

    fn close(&mut self) {
        DatagramSocket::close(self);
    }

    fn local_endpoint(&self) -> Option<Endpoint> {
        let addr = self.inner.as_ref()?.local_addr().ok()?;
        Endpoint::from_socket_addr(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback(port: u16) -> Endpoint {
        Endpoint::from_octets(127, 0, 0, 1, port)
    }

    fn receive_with_retry(socket: &DatagramSocket, buf: &mut [u8]) -> Option<(usize, Endpoint)> {
        for _ in 0..100 {
            if let Some(received) = socket.receive(buf) {
                return Some(received);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_send_and_receive() {
        let a = DatagramSocket::open(0).unwrap();
        let b = DatagramSocket::open(0).unwrap();
        let a_port = a.local_port().unwrap();
        let b_port = b.local_port().unwrap();

        assert!(a.send(loopback(b_port), b"hello"));

        let mut buf = [0u8; 64];
        let (len, sender) = receive_with_retry(&b, &mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(sender, loopback(a_port));
    }

    #[test]
    fn test_receive_nothing_pending() {
        let socket = DatagramSocket::open(0).unwrap();
        let mut buf = [0u8; 64];
        assert!(socket.receive(&mut buf).is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut socket = DatagramSocket::open(0).unwrap();
        socket.close();
        socket.close();
        assert!(!socket.is_open());
        assert!(!socket.send(loopback(9), b"x"));
    }

    #[test]
    fn test_bind_conflict_is_error() {
        let first = DatagramSocket::open(0).unwrap();
        let port = first.local_port().unwrap();

        let second = DatagramSocket::open(port);
        assert!(matches!(second, Err(Error::Bind { port: p, .. }) if p == port));
    }

    #[test]
    fn test_open_any_port_binds_ephemeral() {
        let socket = DatagramSocket::open(0).unwrap();
        let endpoint = socket.local_endpoint().unwrap();
        assert_ne!(endpoint.port(), 0);
        assert!(endpoint.is_unspecified());
    }

    #[test]
    fn test_send_rejects_unspecified() {
        let socket = DatagramSocket::open(0).unwrap();
        assert!(!socket.send(Endpoint::default(), b"x"));
        assert!(!socket.send(loopback(9), b""));
    }
}
