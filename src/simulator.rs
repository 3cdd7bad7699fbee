//! 네트워크 시뮬레이터
//!
//! 실제 네트워크 조건에 의존하지 않고 신뢰성 계층을 검증하기 위한
//! 전송 계층 구현들:
//!
//! | 타입             | 설명                                          |
//! |------------------|-----------------------------------------------|
//! | `MemoryNetwork`  | 프로세스 내 가상 네트워크 (단일 스레드)        |
//! | `MemoryTransport`| `MemoryNetwork`에 바인드된 엔드포인트          |
//! | `LossySocket`    | 임의의 `Transport` 위에서 송신 패킷을 확률적으로 드롭 |

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::endpoint::Endpoint;
use crate::socket::Transport;

type Inboxes = Rc<RefCell<HashMap<Endpoint, VecDeque<(Endpoint, Bytes)>>>>;

/// 프로세스 내 가상 네트워크
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inboxes: Inboxes,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// `endpoint`에 바인드된 전송 계층 생성
    pub fn bind(&self, endpoint: Endpoint) -> MemoryTransport {
        self.inboxes.borrow_mut().entry(endpoint).or_default();
        MemoryTransport {
            endpoint,
            inboxes: Rc::clone(&self.inboxes),
            open: true,
        }
    }

    /// 아직 수신되지 않은 데이터그램 수
    pub fn in_flight(&self) -> usize {
        self.inboxes.borrow().values().map(VecDeque::len).sum()
    }
}

/// 가상 네트워크 엔드포인트
#[derive(Debug)]
pub struct MemoryTransport {
    endpoint: Endpoint,
    inboxes: Inboxes,
    open: bool,
}

impl Transport for MemoryTransport {
    /// 바인드되지 않은 목적지로 보낸 데이터그램은 UDP처럼 사라진다
    fn send_to(&mut self, destination: Endpoint, data: &[u8]) -> bool {
        if !self.open || data.is_empty() {
            return false;
        }
        if let Some(inbox) = self.inboxes.borrow_mut().get_mut(&destination) {
            inbox.push_back((self.endpoint, Bytes::copy_from_slice(data)));
        }
        true
    }

    /// 버퍼보다 큰 데이터그램은 잘린다
    fn recv_from(&mut self, buf: &mut [u8]) -> Option<(usize, Endpoint)> {
        if !self.open {
            return None;
        }
        let (sender, datagram) = self
            .inboxes
            .borrow_mut()
            .get_mut(&self.endpoint)?
            .pop_front()?;

        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Some((len, sender))
    }

    fn close(&mut self) {
        if self.open {
            self.inboxes.borrow_mut().remove(&self.endpoint);
            self.open = false;
        }
    }

    fn local_endpoint(&self) -> Option<Endpoint> {
        self.open.then_some(self.endpoint)
    }
}

/// 송신 패킷을 `loss_rate` 확률로 드롭하는 전송 계층
///
/// 드롭된 패킷도 전송 성공으로 보고한다 (네트워크 손실과 동일).
#[derive(Debug)]
pub struct LossySocket<T> {
    inner: T,
    loss_rate: f64,
    rng: StdRng,
    dropped: u64,
}

impl<T: Transport> LossySocket<T> {
    pub fn new(inner: T, loss_rate: f64) -> Self {
        Self::with_rng(inner, loss_rate, StdRng::from_entropy())
    }

    /// 재현 가능한 손실 패턴
    pub fn with_seed(inner: T, loss_rate: f64, seed: u64) -> Self {
        Self::with_rng(inner, loss_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(inner: T, loss_rate: f64, rng: StdRng) -> Self {
        Self {
            inner,
            loss_rate: if loss_rate.is_nan() {
                0.0
            } else {
                loss_rate.clamp(0.0, 1.0)
            },
            rng,
            dropped: 0,
        }
    }

    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    /// 드롭된 패킷 수
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for LossySocket<T> {
    fn send_to(&mut self, destination: Endpoint, data: &[u8]) -> bool {
        if self.rng.gen_bool(self.loss_rate) {
            self.dropped += 1;
            trace!("simulated loss: {} bytes to {}", data.len(), destination);
            return true;
        }
        self.inner.send_to(destination, data)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Option<(usize, Endpoint)> {
        self.inner.recv_from(buf)
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn local_endpoint(&self) -> Option<Endpoint> {
        self.inner.local_endpoint()
    }
}
