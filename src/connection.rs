//! 연결 상태 머신
//!
//! 데이터그램 소켓 위에서 피어 하나와의 수명 주기를 관리한다.
//! - 서버: `listen()` 후 처음 도착한 유효 패킷의 송신자를 피어로 채택
//! - 클라이언트: `connect()` 대상 피어로부터 패킷이 오면 연결 완료
//! - 타임아웃: `update(dt)` 누적값이 설정값을 넘으면 실패/해제
//!
//! 모든 데이터그램은 4바이트 프로토콜 ID로 시작하며, 불일치하거나 너무
//! 짧은 데이터그램은 상태 변화 없이 "0 바이트 수신"으로 처리된다.

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::socket::{DatagramSocket, Transport};
use crate::{Config, Error, Result, PROTOCOL_ID_SIZE};

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Listening,
    Connecting,
    ConnectFail,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// 연결 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    None,
    Client,
    Server,
}

/// 상태 전이 훅
///
/// 기본 구현은 아무것도 하지 않는다.
pub trait ConnectionHooks {
    fn on_start(&mut self) {}

    fn on_stop(&mut self) {}

    fn on_connect(&mut self, _peer: Endpoint) {}

    fn on_disconnect(&mut self) {}
}

impl ConnectionHooks for () {}

/// 피어 하나와의 연결
pub struct Connection<H = (), T = DatagramSocket>
where
    H: ConnectionHooks,
    T: Transport,
{
    config: Config,
    mode: Mode,
    state: ConnectionState,
    timeout_accumulator: f32,
    peer: Endpoint,
    transport: Option<T>,
    hooks: H,
    send_buf: BytesMut,
    recv_buf: Vec<u8>,
}

impl Connection {
    /// 훅 없는 UDP 연결 생성
    pub fn new(config: Config) -> Result<Self> {
        Self::with_hooks(config, ())
    }
}

impl<H: ConnectionHooks> Connection<H, DatagramSocket> {
    /// UDP 소켓을 열고 시작. 바인드 실패는 에러.
    pub fn start(&mut self, port: u16) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        let socket = DatagramSocket::open(port)?;
        self.start_with(socket)
    }
}

impl<H: ConnectionHooks, T: Transport> Connection<H, T> {
    pub fn with_hooks(config: Config, hooks: H) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            send_buf: BytesMut::with_capacity(config.max_packet_size),
            recv_buf: vec![0u8; config.max_packet_size],
            config,
            mode: Mode::None,
            state: ConnectionState::Disconnected,
            timeout_accumulator: 0.0,
            peer: Endpoint::default(),
            transport: None,
            hooks,
        })
    }

    /// 이미 열린 전송 계층으로 시작
    pub fn start_with(&mut self, transport: T) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }

        if let Some(local) = transport.local_endpoint() {
            info!("RUDP connection started on {}", local);
        }
        self.transport = Some(transport);
        self.hooks.on_start();
        Ok(())
    }

    /// 정지. 실행 중이 아니면 아무것도 하지 않음.
    pub fn stop(&mut self) {
        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => return,
        };

        let connected = self.is_connected();
        self.clear_data();
        self.mode = Mode::None;
        transport.close();

        if connected {
            self.hooks.on_disconnect();
        }
        self.hooks.on_stop();
        info!("RUDP connection stopped");
    }

    /// 서버 모드로 대기
    pub fn listen(&mut self) {
        info!("server listening for connection");
        let connected = self.is_connected();
        self.clear_data();
        if connected {
            self.hooks.on_disconnect();
        }
        self.mode = Mode::Server;
        self.state = ConnectionState::Listening;
    }

    /// 클라이언트 모드로 `peer`에 연결 시도
    pub fn connect(&mut self, peer: Endpoint) {
        info!("client connecting to {}", peer);
        let connected = self.is_connected();
        self.clear_data();
        if connected {
            self.hooks.on_disconnect();
        }
        self.mode = Mode::Client;
        self.state = ConnectionState::Connecting;
        self.peer = peer;
    }

    /// 타임아웃 누적 및 상태 전이
    pub fn update(&mut self, dt: f32) {
        if !self.is_running() {
            return;
        }

        self.timeout_accumulator += dt;
        if self.timeout_accumulator <= self.config.timeout {
            return;
        }

        match self.state {
            ConnectionState::Connecting => {
                warn!("connect to {} timed out", self.peer);
                self.clear_data();
                self.state = ConnectionState::ConnectFail;
                self.hooks.on_disconnect();
            }
            ConnectionState::Connected => {
                warn!("connection to {} timed out", self.peer);
                self.clear_data();
                self.hooks.on_disconnect();
            }
            _ => {}
        }
    }

    /// 프로토콜 ID를 붙여 피어에게 전송
    ///
    /// 피어가 없거나 최대 크기를 넘으면 `false`.
    pub fn send_packet(&mut self, data: &[u8]) -> bool {
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => return false,
        };
        if self.peer.is_unspecified() {
            return false;
        }
        if data.len() + PROTOCOL_ID_SIZE > self.config.max_packet_size {
            debug!(
                "packet too large: {} bytes (max {})",
                data.len() + PROTOCOL_ID_SIZE,
                self.config.max_packet_size
            );
            return false;
        }

        self.send_buf.clear();
        self.send_buf.put_u32(self.config.protocol_id);
        self.send_buf.put_slice(data);
        transport.send_to(self.peer, &self.send_buf)
    }

    /// 데이터그램 하나를 수신해 프로토콜 ID 뒤 내용을 `buf`에 복사
    ///
    /// 쓸 수 있는 데이터가 없으면 0.
    pub fn receive_packet(&mut self, buf: &mut [u8]) -> usize {
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => return 0,
        };
        let (len, sender) = match transport.recv_from(&mut self.recv_buf) {
            Some(received) => received,
            None => return 0,
        };
        if len <= PROTOCOL_ID_SIZE {
            debug!("datagram from {} too short: {} bytes", sender, len);
            return 0;
        }

        let mut frame = &self.recv_buf[..len];
        let protocol_id = frame.get_u32();
        if protocol_id != self.config.protocol_id {
            debug!(
                "protocol id mismatch from {}: expected {:08X}, got {:08X}",
                sender, self.config.protocol_id, protocol_id
            );
            return 0;
        }

        if self.mode == Mode::Server && self.state != ConnectionState::Connected {
            info!("server accepts connection from client {}", sender);
            self.state = ConnectionState::Connected;
            self.peer = sender;
            self.hooks.on_connect(sender);
        }

        if sender != self.peer {
            return 0;
        }

        if self.mode == Mode::Client && self.state == ConnectionState::Connecting {
            info!("client completes connection with server {}", sender);
            self.state = ConnectionState::Connected;
            self.hooks.on_connect(sender);
        }
        self.timeout_accumulator = 0.0;

        if frame.len() > buf.len() {
            debug!(
                "payload of {} bytes does not fit receive buffer of {}",
                frame.len(),
                buf.len()
            );
            return 0;
        }
        buf[..frame.len()].copy_from_slice(frame);
        frame.len()
    }

    fn clear_data(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.timeout_accumulator = 0.0;
        self.peer = Endpoint::default();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn is_connect_failed(&self) -> bool {
        self.state == ConnectionState::ConnectFail
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_listening(&self) -> bool {
        self.state == ConnectionState::Listening
    }

    /// 현재 피어 (없으면 None)
    pub fn peer(&self) -> Option<Endpoint> {
        (!self.peer.is_unspecified()).then_some(self.peer)
    }

    pub fn timeout_accumulator(&self) -> f32 {
        self.timeout_accumulator
    }

    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.transport.as_ref()?.local_endpoint()
    }

    pub fn header_size(&self) -> usize {
        PROTOCOL_ID_SIZE
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }
}

impl<H: ConnectionHooks, T: Transport> Drop for Connection<H, T> {
    fn drop(&mut self) {
        self.stop();
    }
}
