//! 신뢰성 통계 스냅샷

/// 연결별 신뢰성 통계
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReliabilityStats {
    /// 총 송신 패킷 수
    pub sent_packets: u64,

    /// 총 수신 패킷 수 (중복 포함)
    pub received_packets: u64,

    /// ack 없이 만료된 패킷 수
    pub lost_packets: u64,

    /// ack된 패킷 수
    pub acked_packets: u64,

    /// 평활화된 RTT (update의 dt 단위)
    pub rtt: f32,

    /// 최근 RTT 윈도우 동안의 송신 대역폭 (kbit/s)
    pub sent_bandwidth: f32,

    /// 최근 RTT 윈도우 동안의 ack 대역폭 (kbit/s)
    pub acked_bandwidth: f32,
}

impl ReliabilityStats {
    /// 손실률 계산
    pub fn loss_rate(&self) -> f64 {
        let total = self.acked_packets + self.lost_packets;
        if total == 0 {
            return 0.0;
        }
        self.lost_packets as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Sent: {} | Recv: {} | Acked: {} | Lost: {} ({:.2}%) | RTT: {:.1}ms | Bandwidth: {:.1}/{:.1} kbps",
            self.sent_packets,
            self.received_packets,
            self.acked_packets,
            self.lost_packets,
            self.loss_rate() * 100.0,
            self.rtt * 1000.0,
            self.sent_bandwidth,
            self.acked_bandwidth,
        )
    }
}
