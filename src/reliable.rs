//! 신뢰성 연결
//!
//! `Connection` 위에 12바이트 시퀀스/ack 헤더를 얹는다.
//! 데이터그램 하나의 프레이밍 오버헤드는 4(프로토콜 ID) + 12(헤더) 바이트.
//!
//! 재전송하지 않는다. 어떤 패킷이 ack되었는지는 `acks()`로,
//! 손실은 `stats().lost_packets`로 확인하고 재전송 여부는 호출자가 결정한다.

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::connection::{Connection, ConnectionHooks, ConnectionState, Mode};
use crate::endpoint::Endpoint;
use crate::header::{ReliabilityHeader, HEADER_SIZE};
use crate::reliability::ReliabilitySystem;
use crate::socket::{DatagramSocket, Transport};
use crate::stats::ReliabilityStats;
use crate::{Config, Result, PACKET_OVERHEAD};

/// 연결 해제/정지 시 신뢰성 상태를 초기화하고 사용자 훅으로 전달
struct ReliableHooks<H> {
    reliability: ReliabilitySystem,
    user: H,
}

impl<H: ConnectionHooks> ConnectionHooks for ReliableHooks<H> {
    fn on_start(&mut self) {
        self.user.on_start();
    }

    fn on_stop(&mut self) {
        self.reliability.reset();
        self.user.on_stop();
    }

    fn on_connect(&mut self, peer: Endpoint) {
        self.user.on_connect(peer);
    }

    fn on_disconnect(&mut self) {
        self.reliability.reset();
        self.user.on_disconnect();
    }
}

/// 시퀀스/ack를 관리하는 연결
pub struct ReliableConnection<H = (), T = DatagramSocket>
where
    H: ConnectionHooks,
    T: Transport,
{
    connection: Connection<ReliableHooks<H>, T>,

    /// `local_sequence & mask != 0`이면 송신한 것으로만 기록 (테스트용)
    packet_loss_mask: u32,

    send_buf: BytesMut,
    recv_buf: Vec<u8>,
}

impl ReliableConnection {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_hooks(config, ())
    }
}

impl<H: ConnectionHooks> ReliableConnection<H, DatagramSocket> {
    /// UDP 소켓을 열고 시작
    pub fn start(&mut self, port: u16) -> Result<()> {
        self.connection.start(port)
    }
}

impl<H: ConnectionHooks, T: Transport> ReliableConnection<H, T> {
    pub fn with_hooks(config: Config, hooks: H) -> Result<Self> {
        let reliability = ReliabilitySystem::with_rtt_window(config.max_sequence, config.rtt_window);
        let max_packet_size = config.max_packet_size;
        let connection = Connection::with_hooks(
            config,
            ReliableHooks {
                reliability,
                user: hooks,
            },
        )?;

        Ok(Self {
            connection,
            packet_loss_mask: 0,
            send_buf: BytesMut::with_capacity(max_packet_size),
            recv_buf: vec![0u8; max_packet_size],
        })
    }

    pub fn start_with(&mut self, transport: T) -> Result<()> {
        self.connection.start_with(transport)
    }

    pub fn stop(&mut self) {
        self.connection.stop();
    }

    pub fn listen(&mut self) {
        self.connection.listen();
    }

    pub fn connect(&mut self, peer: Endpoint) {
        self.connection.connect(peer);
    }

    /// 연결 타임아웃과 신뢰성 큐를 함께 진행
    ///
    /// 이 호출 이후 `acks()`는 비워진다.
    pub fn update(&mut self, dt: f32) {
        self.connection.update(dt);
        self.reliability_mut().update(dt);
    }

    /// 헤더를 붙여 전송하고 성공 시 송신 기록
    pub fn send_packet(&mut self, payload: &[u8]) -> bool {
        if self.connection.peer().is_none() {
            return false;
        }
        let max_payload = self.connection.config().max_payload_size();
        if payload.len() > max_payload {
            debug!(
                "payload too large: {} bytes (max {})",
                payload.len(),
                max_payload
            );
            return false;
        }

        let reliability = self.reliability();
        let header = ReliabilityHeader::new(
            reliability.local_sequence(),
            reliability.remote_sequence(),
            reliability.generate_ack_bits(),
        );

        if header.sequence & self.packet_loss_mask != 0 {
            self.reliability_mut().packet_sent(payload.len());
            return true;
        }

        self.send_buf.clear();
        header.write(&mut self.send_buf);
        self.send_buf.put_slice(payload);
        if !self.connection.send_packet(&self.send_buf) {
            return false;
        }

        self.reliability_mut().packet_sent(payload.len());
        true
    }

    /// 헤더를 검증/처리하고 페이로드를 `buf`에 복사
    ///
    /// 헤더가 잘렸거나 페이로드가 비었거나 버퍼에 맞지 않으면 0.
    pub fn receive_packet(&mut self, buf: &mut [u8]) -> usize {
        let received = self.connection.receive_packet(&mut self.recv_buf);
        if received == 0 {
            return 0;
        }
        if received <= HEADER_SIZE {
            debug!("frame too short for reliability header: {} bytes", received);
            return 0;
        }

        let mut frame = &self.recv_buf[..received];
        let header = match ReliabilityHeader::read(&mut frame) {
            Some(header) => header,
            None => return 0,
        };

        let max_sequence = self.reliability().max_sequence();
        if header.sequence > max_sequence || header.ack > max_sequence {
            debug!(
                "sequence out of range: seq={}, ack={}, max={}",
                header.sequence, header.ack, max_sequence
            );
            return 0;
        }

        let payload_len = frame.len();
        if payload_len > buf.len() {
            debug!(
                "payload of {} bytes does not fit receive buffer of {}",
                payload_len,
                buf.len()
            );
            return 0;
        }
        buf[..payload_len].copy_from_slice(frame);

        let reliability = &mut self.connection.hooks_mut().reliability;
        reliability.packet_received(header.sequence, payload_len);
        reliability.process_ack(header.ack, header.ack_bits);
        payload_len
    }

    /// 테스트용 손실 마스크 설정 (0이면 비활성)
    pub fn set_packet_loss_mask(&mut self, mask: u32) {
        self.packet_loss_mask = mask;
    }

    pub fn reliability(&self) -> &ReliabilitySystem {
        &self.connection.hooks().reliability
    }

    fn reliability_mut(&mut self) -> &mut ReliabilitySystem {
        &mut self.connection.hooks_mut().reliability
    }

    /// 마지막 `update` 이후 새로 ack된 시퀀스
    pub fn acks(&self) -> &[u32] {
        self.reliability().acks()
    }

    pub fn stats(&self) -> ReliabilityStats {
        self.reliability().stats()
    }

    pub fn config(&self) -> &Config {
        self.connection.config()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn mode(&self) -> Mode {
        self.connection.mode()
    }

    pub fn is_running(&self) -> bool {
        self.connection.is_running()
    }

    pub fn is_connecting(&self) -> bool {
        self.connection.is_connecting()
    }

    pub fn is_connect_failed(&self) -> bool {
        self.connection.is_connect_failed()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn is_listening(&self) -> bool {
        self.connection.is_listening()
    }

    pub fn peer(&self) -> Option<Endpoint> {
        self.connection.peer()
    }

    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.connection.local_endpoint()
    }

    pub fn header_size(&self) -> usize {
        PACKET_OVERHEAD
    }

    pub fn hooks(&self) -> &H {
        &self.connection.hooks().user
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.connection.hooks_mut().user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{MemoryNetwork, MemoryTransport};

    const SERVER: Endpoint = Endpoint::from_octets(10, 0, 0, 1, 30000);
    const CLIENT: Endpoint = Endpoint::from_octets(10, 0, 0, 2, 30001);

    type TestConnection = ReliableConnection<(), MemoryTransport>;

    fn started(network: &MemoryNetwork, endpoint: Endpoint) -> TestConnection {
        let mut connection = TestConnection::with_hooks(Config::default(), ()).unwrap();
        connection.start_with(network.bind(endpoint)).unwrap();
        connection
    }

    fn drain(connection: &mut TestConnection) -> Vec<Vec<u8>> {
        let mut buf = [0u8; 256];
        let mut payloads = Vec::new();
        loop {
            let len = connection.receive_packet(&mut buf);
            if len == 0 {
                break;
            }
            payloads.push(buf[..len].to_vec());
        }
        payloads
    }

    #[test]
    fn test_wire_layout() {
        let network = MemoryNetwork::new();
        let mut raw = network.bind(SERVER);
        let mut client = started(&network, CLIENT);
        client.connect(SERVER);

        assert!(client.send_packet(b"abc"));

        let mut buf = [0u8; 64];
        let (len, sender) = raw.recv_from(&mut buf).unwrap();
        assert_eq!(sender, CLIENT);
        assert_eq!(len, client.header_size() + 3);
        assert_eq!(&buf[0..4], &Config::default().protocol_id.to_be_bytes());
        assert_eq!(&buf[4..16], &[0u8; 12]);
        assert_eq!(&buf[16..19], b"abc");
        assert_eq!(client.reliability().local_sequence(), 1);
        assert_eq!(client.stats().sent_packets, 1);
    }

    #[test]
    fn test_round_trip_ack() {
        let network = MemoryNetwork::new();
        let mut server = started(&network, SERVER);
        let mut client = started(&network, CLIENT);
        server.listen();
        client.connect(SERVER);

        assert!(client.send_packet(b"ping"));
        assert_eq!(drain(&mut server), vec![b"ping".to_vec()]);
        assert_eq!(server.reliability().remote_sequence(), 0);

        assert!(server.send_packet(b"pong"));
        assert_eq!(drain(&mut client), vec![b"pong".to_vec()]);

        assert_eq!(client.acks(), &[0]);
        assert_eq!(client.stats().acked_packets, 1);
        assert!(client.reliability().pending_ack_queue().is_empty());

        client.update(0.01);
        assert!(client.acks().is_empty());
    }

    #[test]
    fn test_all_packets_acked_both_ways() {
        const PACKET_COUNT: u32 = 100;

        let network = MemoryNetwork::new();
        let mut server = started(&network, SERVER);
        let mut client = started(&network, CLIENT);
        server.listen();
        client.connect(SERVER);

        let payload: Vec<u8> = (0..=255u8).collect();
        let mut client_acked = vec![false; PACKET_COUNT as usize];
        let mut server_acked = vec![false; PACKET_COUNT as usize];

        for _ in 0..(PACKET_COUNT * 2) {
            server.send_packet(&payload);
            client.send_packet(&payload);

            for received in drain(&mut client).into_iter().chain(drain(&mut server)) {
                assert_eq!(received, payload);
            }

            for (acks, acked) in [
                (client.acks(), &mut client_acked),
                (server.acks(), &mut server_acked),
            ] {
                for &ack in acks {
                    if ack < PACKET_COUNT {
                        assert!(!acked[ack as usize], "sequence {} acked twice", ack);
                        acked[ack as usize] = true;
                    }
                }
            }

            if client_acked.iter().all(|&a| a) && server_acked.iter().all(|&a| a) {
                break;
            }

            client.update(0.01);
            server.update(0.01);
        }

        assert!(client_acked.iter().all(|&a| a));
        assert!(server_acked.iter().all(|&a| a));
        assert!(client.is_connected());
        assert!(server.is_connected());
        assert_eq!(client.stats().lost_packets, 0);
    }

    #[test]
    fn test_short_frames_discarded() {
        let network = MemoryNetwork::new();
        let mut server = started(&network, SERVER);
        server.listen();
        let mut raw = network.bind(CLIENT);

        let protocol_id = Config::default().protocol_id.to_be_bytes();

        // 헤더 일부만
        let mut truncated = protocol_id.to_vec();
        truncated.extend_from_slice(&[0u8; 8]);
        assert!(raw.send_to(SERVER, &truncated));

        // 헤더만 있고 페이로드 없음
        let mut header_only = protocol_id.to_vec();
        header_only.extend_from_slice(&[0u8; 12]);
        assert!(raw.send_to(SERVER, &header_only));

        assert!(drain(&mut server).is_empty());
        assert_eq!(server.stats().received_packets, 0);
    }

    #[test]
    fn test_out_of_range_sequence_discarded() {
        let network = MemoryNetwork::new();
        let mut server = TestConnection::with_hooks(Config::wraparound_test(255), ()).unwrap();
        server.start_with(network.bind(SERVER)).unwrap();
        server.listen();
        let mut raw = network.bind(CLIENT);

        let mut datagram = Config::default().protocol_id.to_be_bytes().to_vec();
        ReliabilityHeader::new(256, 0, 0).write(&mut datagram);
        datagram.extend_from_slice(b"data");
        assert!(raw.send_to(SERVER, &datagram));

        assert!(drain(&mut server).is_empty());
        assert_eq!(server.stats().received_packets, 0);
    }

    #[test]
    fn test_packet_loss_mask() {
        let network = MemoryNetwork::new();
        let mut server = started(&network, SERVER);
        let mut client = started(&network, CLIENT);
        server.listen();
        client.connect(SERVER);
        client.set_packet_loss_mask(1);

        for _ in 0..10 {
            assert!(client.send_packet(b"data"));
        }
        assert_eq!(drain(&mut server).len(), 5);
        assert_eq!(client.stats().sent_packets, 10);

        // 짝수 시퀀스만 도착
        assert!(server.send_packet(b"ack"));
        drain(&mut client);
        assert_eq!(client.acks(), &[0, 2, 4, 6, 8]);

        for _ in 0..11 {
            client.update(0.1);
        }
        let stats = client.stats();
        assert_eq!(stats.lost_packets, 5);
        assert_eq!(stats.acked_packets, 5);
    }

    #[test]
    fn test_connect_timeout_resets_reliability() {
        let network = MemoryNetwork::new();
        let mut client = started(&network, CLIENT);
        client.connect(SERVER);

        for _ in 0..3 {
            assert!(client.send_packet(b"hello?"));
        }
        assert_eq!(client.stats().sent_packets, 3);

        client.update(5.1);
        assert!(client.is_connect_failed());
        assert_eq!(client.stats().sent_packets, 0);
        assert_eq!(client.reliability().local_sequence(), 0);
        assert!(!client.send_packet(b"no peer"));
    }

    #[test]
    fn test_stop_resets_and_forwards_hooks() {
        #[derive(Default)]
        struct Counter {
            stops: u32,
            disconnects: u32,
        }

        impl ConnectionHooks for Counter {
            fn on_stop(&mut self) {
                self.stops += 1;
            }

            fn on_disconnect(&mut self) {
                self.disconnects += 1;
            }
        }

        let network = MemoryNetwork::new();
        let mut server = started(&network, SERVER);
        let mut client =
            ReliableConnection::<Counter, MemoryTransport>::with_hooks(Config::default(), Counter::default())
                .unwrap();
        client.start_with(network.bind(CLIENT)).unwrap();
        server.listen();
        client.connect(SERVER);

        client.send_packet(b"hi");
        drain(&mut server);
        server.send_packet(b"hi");
        let mut buf = [0u8; 16];
        assert_eq!(client.receive_packet(&mut buf), 2);
        assert!(client.is_connected());

        client.stop();
        assert_eq!(client.hooks().stops, 1);
        assert_eq!(client.hooks().disconnects, 1);
        assert_eq!(client.stats(), ReliabilityStats::default());
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let network = MemoryNetwork::new();
        let mut client = started(&network, CLIENT);
        client.connect(SERVER);

        let max_payload = client.config().max_payload_size();
        assert!(!client.send_packet(&vec![0u8; max_payload + 1]));
        assert!(client.send_packet(&vec![0u8; max_payload]));
        assert_eq!(client.stats().sent_packets, 1);
    }

    #[test]
    fn test_small_receive_buffer_discards() {
        let network = MemoryNetwork::new();
        let mut server = started(&network, SERVER);
        let mut client = started(&network, CLIENT);
        server.listen();
        client.connect(SERVER);

        assert!(client.send_packet(&[7u8; 32]));
        let mut small = [0u8; 8];
        assert_eq!(server.receive_packet(&mut small), 0);
        assert_eq!(server.stats().received_packets, 0);
    }
}
