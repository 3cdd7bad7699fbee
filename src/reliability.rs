//! 신뢰성 시스템
//!
//! - 시퀀스 번호 관리 (wrap 포함)
//! - 선택적 ack 비트 생성/처리
//! - RTT 추정 (지수 이동 평균)
//! - 손실/대역폭 집계
//!
//! 재전송은 하지 않는다. ack 없이 RTT 윈도우를 넘긴 패킷은 손실로
//! 집계만 되고 추적에서 빠진다.

use tracing::trace;

use crate::header::HEADER_SIZE;
use crate::queue::{PacketQueue, PacketRecord};
use crate::seq::{bit_index, more_recent, next_sequence};
use crate::stats::ReliabilityStats;
use crate::DEFAULT_MAX_SEQUENCE;

/// RTT 지수 이동 평균 계수
const RTT_SMOOTHING: f32 = 0.1;

/// 만료 비교 허용 오차
const EPSILON: f32 = 0.001;

/// 수신 큐 유지 범위 (최신 시퀀스 기준)
const RECEIVED_WINDOW: u32 = 34;

/// ack 비트 개수
const ACK_BITS: u32 = 32;

/// 기본 RTT 윈도우
pub const DEFAULT_RTT_WINDOW: f32 = 1.0;

/// `ack` 기준으로 `received`에 대한 ack 비트 생성
///
/// `received`는 최근성 순으로 정렬되어 있어야 한다.
pub fn generate_ack_bits<'a, I>(ack: u32, received: I, max_sequence: u32) -> u32
where
    I: IntoIterator<Item = &'a PacketRecord>,
{
    let mut ack_bits = 0u32;
    for record in received {
        if record.sequence == ack || more_recent(record.sequence, ack, max_sequence) {
            break;
        }
        let bit = bit_index(record.sequence, ack, max_sequence);
        if bit < ACK_BITS {
            ack_bits |= 1 << bit;
        }
    }
    ack_bits
}

/// `ack`/`ack_bits`가 `sequence`를 확인하는지
fn is_acked(sequence: u32, ack: u32, ack_bits: u32, max_sequence: u32) -> bool {
    if sequence == ack {
        return true;
    }
    if more_recent(sequence, ack, max_sequence) {
        return false;
    }
    let bit = bit_index(sequence, ack, max_sequence);
    bit < ACK_BITS && (ack_bits >> bit) & 1 == 1
}

/// 연결 하나의 시퀀스/ack 상태
///
/// 네 개의 큐는 이 타입만 변경한다:
/// - `sent`: 송신 대역폭 샘플 (RTT 윈도우 동안 유지)
/// - `pending_ack`: ack 대기 (RTT 윈도우 초과 시 손실)
/// - `received`: ack 비트 생성용 (최신 기준 34개)
/// - `acked`: ack 대역폭 샘플 (RTT 윈도우 × 2 동안 유지)
#[derive(Debug, Clone)]
pub struct ReliabilitySystem {
    max_sequence: u32,
    local_sequence: u32,
    remote_sequence: u32,

    sent_packets: u64,
    received_packets: u64,
    lost_packets: u64,
    acked_packets: u64,

    sent_bandwidth: f32,
    acked_bandwidth: f32,
    rtt: f32,
    rtt_window: f32,

    last_lost_sequence: Option<u32>,

    /// 마지막 update 이후 새로 ack된 시퀀스
    acks: Vec<u32>,

    sent_queue: PacketQueue,
    pending_ack_queue: PacketQueue,
    received_queue: PacketQueue,
    acked_queue: PacketQueue,
}

impl Default for ReliabilitySystem {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEQUENCE)
    }
}

impl ReliabilitySystem {
    pub fn new(max_sequence: u32) -> Self {
        Self::with_rtt_window(max_sequence, DEFAULT_RTT_WINDOW)
    }

    pub fn with_rtt_window(max_sequence: u32, rtt_window: f32) -> Self {
        Self {
            max_sequence,
            local_sequence: 0,
            remote_sequence: 0,
            sent_packets: 0,
            received_packets: 0,
            lost_packets: 0,
            acked_packets: 0,
            sent_bandwidth: 0.0,
            acked_bandwidth: 0.0,
            rtt: 0.0,
            rtt_window,
            last_lost_sequence: None,
            acks: Vec::new(),
            sent_queue: PacketQueue::new(max_sequence),
            pending_ack_queue: PacketQueue::new(max_sequence),
            received_queue: PacketQueue::new(max_sequence),
            acked_queue: PacketQueue::new(max_sequence),
        }
    }

    /// 카운터와 큐 초기화 (시퀀스 공간 설정은 유지)
    pub fn reset(&mut self) {
        *self = Self::with_rtt_window(self.max_sequence, self.rtt_window);
    }

    /// 현재 `local_sequence`로 패킷을 보냈음을 기록
    pub fn packet_sent(&mut self, size: usize) {
        let sequence = self.local_sequence;
        debug_assert!(!self.sent_queue.exists(sequence));
        debug_assert!(!self.pending_ack_queue.exists(sequence));

        let record = PacketRecord::new(sequence, u32::try_from(size).unwrap_or(u32::MAX));
        self.sent_queue.insert_sorted(record);
        self.pending_ack_queue.insert_sorted(record);

        self.sent_packets += 1;
        self.local_sequence = next_sequence(sequence, self.max_sequence);
    }

    /// 수신 기록. 중복은 카운트만 하고 무시.
    pub fn packet_received(&mut self, sequence: u32, size: usize) {
        self.received_packets += 1;
        if self.received_queue.exists(sequence) {
            trace!("duplicate sequence {}", sequence);
            return;
        }

        self.received_queue
            .insert_sorted(PacketRecord::new(sequence, u32::try_from(size).unwrap_or(u32::MAX)));

        if more_recent(sequence, self.remote_sequence, self.max_sequence) {
            self.remote_sequence = sequence;
        }
    }

    /// `remote_sequence` 기준 ack 비트
    pub fn generate_ack_bits(&self) -> u32 {
        generate_ack_bits(
            self.remote_sequence,
            self.received_queue.iter(),
            self.max_sequence,
        )
    }

    /// 피어가 보낸 ack 처리
    ///
    /// 새로 ack된 시퀀스는 `acks()`에 누적되며 다음 `update`에서 비워진다.
    pub fn process_ack(&mut self, ack: u32, ack_bits: u32) {
        if self.pending_ack_queue.is_empty() {
            return;
        }

        let max = self.max_sequence;
        let acked = self
            .pending_ack_queue
            .extract_if(|record| is_acked(record.sequence, ack, ack_bits, max));

        for record in acked {
            self.rtt += (record.age - self.rtt) * RTT_SMOOTHING;

            // 작은 시퀀스 공간에서 wrap된 이전 기록 제거
            if self.acked_queue.exists(record.sequence) {
                self.acked_queue.extract_if(|r| r.sequence == record.sequence);
            }
            self.acked_queue.insert_sorted(record);

            self.acks.push(record.sequence);
            self.acked_packets += 1;
            trace!("acked sequence {} after {:.3}", record.sequence, record.age);
        }
    }

    /// 틱 처리: ack 목록 초기화, 나이 증가, 만료, 대역폭 계산
    pub fn update(&mut self, dt: f32) {
        self.acks.clear();
        self.advance_queue_time(dt);
        self.update_queues();
        self.update_stats();

        debug_assert!(self.sent_queue.verify_sorted());
        debug_assert!(self.pending_ack_queue.verify_sorted());
        debug_assert!(self.received_queue.verify_sorted());
        debug_assert!(self.acked_queue.verify_sorted());
    }

    fn advance_queue_time(&mut self, dt: f32) {
        self.sent_queue.advance(dt);
        self.received_queue.advance(dt);
        self.pending_ack_queue.advance(dt);
        self.acked_queue.advance(dt);
    }

    fn update_queues(&mut self) {
        self.sent_queue.expire_older_than(self.rtt_window + EPSILON);

        if let Some(latest) = self.received_queue.back().map(|r| r.sequence) {
            let minimum = if latest >= RECEIVED_WINDOW {
                latest - RECEIVED_WINDOW
            } else {
                self.max_sequence - (RECEIVED_WINDOW - latest - 1)
            };
            self.received_queue.trim_not_more_recent_than(minimum);
        }

        self.acked_queue
            .expire_older_than(self.rtt_window * 2.0 - EPSILON);

        for lost in self
            .pending_ack_queue
            .expire_older_than(self.rtt_window + EPSILON)
        {
            trace!("sequence {} lost", lost.sequence);
            self.last_lost_sequence = Some(lost.sequence);
            self.lost_packets += 1;
        }
    }

    fn update_stats(&mut self) {
        let sent_bytes = self.sent_queue.total_size() as f32;
        let acked_bytes: u64 = self
            .acked_queue
            .iter()
            .filter(|r| r.age >= self.rtt_window)
            .map(|r| r.size as u64)
            .sum();

        let sent_bytes_per_second = sent_bytes / self.rtt_window;
        let acked_bytes_per_second = acked_bytes as f32 / self.rtt_window;
        self.sent_bandwidth = sent_bytes_per_second * (8.0 / 1000.0);
        self.acked_bandwidth = acked_bytes_per_second * (8.0 / 1000.0);
    }

    /// 마지막 `update` 이후 새로 ack된 시퀀스 목록
    ///
    /// 다음 `update` 호출 시 비워진다. 그 전에 여러 번 ack를 처리하면 누적된다.
    pub fn acks(&self) -> &[u32] {
        &self.acks
    }

    pub fn local_sequence(&self) -> u32 {
        self.local_sequence
    }

    pub fn remote_sequence(&self) -> u32 {
        self.remote_sequence
    }

    pub fn max_sequence(&self) -> u32 {
        self.max_sequence
    }

    pub fn rtt_window(&self) -> f32 {
        self.rtt_window
    }

    pub fn sent_packets(&self) -> u64 {
        self.sent_packets
    }

    pub fn received_packets(&self) -> u64 {
        self.received_packets
    }

    pub fn lost_packets(&self) -> u64 {
        self.lost_packets
    }

    pub fn acked_packets(&self) -> u64 {
        self.acked_packets
    }

    pub fn sent_bandwidth(&self) -> f32 {
        self.sent_bandwidth
    }

    pub fn acked_bandwidth(&self) -> f32 {
        self.acked_bandwidth
    }

    pub fn round_trip_time(&self) -> f32 {
        self.rtt
    }

    /// 가장 최근에 손실 처리된 시퀀스
    pub fn last_lost_sequence(&self) -> Option<u32> {
        self.last_lost_sequence
    }

    pub fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    pub fn sent_queue(&self) -> &PacketQueue {
        &self.sent_queue
    }

    pub fn pending_ack_queue(&self) -> &PacketQueue {
        &self.pending_ack_queue
    }

    pub fn received_queue(&self) -> &PacketQueue {
        &self.received_queue
    }

    pub fn acked_queue(&self) -> &PacketQueue {
        &self.acked_queue
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> ReliabilityStats {
        ReliabilityStats {
            sent_packets: self.sent_packets,
            received_packets: self.received_packets,
            lost_packets: self.lost_packets,
            acked_packets: self.acked_packets,
            rtt: self.rtt,
            sent_bandwidth: self.sent_bandwidth,
            acked_bandwidth: self.acked_bandwidth,
        }
    }
}
