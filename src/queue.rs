//! 시간 기반 패킷 큐
//!
//! 송신/수신된 패킷 기록을 시퀀스 최근성(wrap 고려) 순으로 보관한다.
//! 삽입 순서가 아니라 `seq::more_recent` 순서로 정렬되므로,
//! wrap 시점에 큰 간격이 있다는 가정이 유지되어야 한다.

use std::collections::VecDeque;

use crate::seq::more_recent;

/// 패킷 기록
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketRecord {
    /// 시퀀스 번호
    pub sequence: u32,

    /// 현재 큐에 들어온 뒤 경과 시간 (벽시계 아님)
    pub age: f32,

    /// 페이로드 크기 (바이트)
    pub size: u32,
}

impl PacketRecord {
    pub fn new(sequence: u32, size: u32) -> Self {
        Self {
            sequence,
            age: 0.0,
            size,
        }
    }
}

/// 최근성 순으로 정렬된 패킷 기록 큐 (앞쪽이 가장 오래됨)
#[derive(Debug, Clone)]
pub struct PacketQueue {
    records: VecDeque<PacketRecord>,
    max_sequence: u32,
}

impl PacketQueue {
    pub fn new(max_sequence: u32) -> Self {
        Self {
            records: VecDeque::new(),
            max_sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn exists(&self, sequence: u32) -> bool {
        self.records.iter().any(|r| r.sequence == sequence)
    }

    pub fn front(&self) -> Option<&PacketRecord> {
        self.records.front()
    }

    /// 가장 최근 기록
    pub fn back(&self) -> Option<&PacketRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PacketRecord> + '_ {
        self.records.iter()
    }

    /// 최근성 순서를 유지하며 삽입
    ///
    /// 같은 시퀀스가 이미 있으면 호출자 버그. 대부분의 삽입은 맨 뒤로 간다.
    pub fn insert_sorted(&mut self, record: PacketRecord) {
        debug_assert!(!self.exists(record.sequence));

        let max = self.max_sequence;
        match (self.records.front(), self.records.back()) {
            (None, _) | (_, None) => self.records.push_back(record),
            (Some(front), Some(back)) => {
                if !more_recent(record.sequence, front.sequence, max) {
                    self.records.push_front(record);
                } else if more_recent(record.sequence, back.sequence, max) {
                    self.records.push_back(record);
                } else {
                    let index = self
                        .records
                        .iter()
                        .position(|r| more_recent(r.sequence, record.sequence, max))
                        .unwrap_or(self.records.len());
                    self.records.insert(index, record);
                }
            }
        }
    }

    /// 모든 기록의 나이 증가
    pub fn advance(&mut self, dt: f32) {
        for record in self.records.iter_mut() {
            record.age += dt;
        }
    }

    /// 앞쪽부터 `age > limit`인 기록 제거, 제거된 기록 반환
    ///
    /// 같은 큐 안에서 나이는 최근성 순서와 일치한다고 가정 (송신 큐).
    pub fn expire_older_than(&mut self, limit: f32) -> Vec<PacketRecord> {
        let mut expired = Vec::new();
        while let Some(front) = self.records.front() {
            if front.age <= limit {
                break;
            }
            if let Some(record) = self.records.pop_front() {
                expired.push(record);
            }
        }
        expired
    }

    /// `minimum`보다 최근이 아닌 기록을 앞쪽부터 제거
    pub fn trim_not_more_recent_than(&mut self, minimum: u32) -> usize {
        let max = self.max_sequence;
        let mut removed = 0;
        while let Some(front) = self.records.front() {
            if more_recent(front.sequence, minimum, max) {
                break;
            }
            self.records.pop_front();
            removed += 1;
        }
        removed
    }

    /// 조건을 만족하는 기록을 모두 꺼냄 (순서 유지)
    pub fn extract_if<F>(&mut self, mut predicate: F) -> Vec<PacketRecord>
    where
        F: FnMut(&PacketRecord) -> bool,
    {
        let mut extracted = Vec::new();
        self.records.retain(|record| {
            if predicate(record) {
                extracted.push(*record);
                false
            } else {
                true
            }
        });
        extracted
    }

    /// 바이트 합계
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size as u64).sum()
    }

    /// 정렬 검증 (디버그용)
    pub fn verify_sorted(&self) -> bool {
        let max = self.max_sequence;
        self.records.iter().all(|r| r.sequence <= max)
            && self
                .records
                .iter()
                .zip(self.records.iter().skip(1))
                .all(|(prev, next)| more_recent(next.sequence, prev.sequence, max))
    }
}
