//! 시퀀스 번호 wrap 산술
//!
//! 시퀀스 공간은 `0..=max_sequence` 원형이며, 두 값의 차이가
//! `max_sequence / 2` 이하라는 가정 아래에서만 비교가 의미를 가진다.

/// `s1`이 `s2`보다 최근인지 (반 범위 윈도우)
#[inline]
pub fn more_recent(s1: u32, s2: u32, max_sequence: u32) -> bool {
    let half = max_sequence / 2;
    (s1 > s2 && s1 - s2 <= half) || (s2 > s1 && s2 - s1 > half)
}

/// 다음 시퀀스 (`max_sequence` 초과 시 0으로)
#[inline]
pub fn next_sequence(sequence: u32, max_sequence: u32) -> u32 {
    if sequence >= max_sequence {
        0
    } else {
        sequence + 1
    }
}

/// `ack` 기준 ack 비트 위치
///
/// `sequence`는 `ack`보다 이전이어야 한다. 결과가 31을 넘으면 표현 불가.
#[inline]
pub fn bit_index(sequence: u32, ack: u32, max_sequence: u32) -> u32 {
    debug_assert!(sequence != ack);
    debug_assert!(!more_recent(sequence, ack, max_sequence));

    if sequence > ack {
        // ack가 wrap된 경우
        ack.wrapping_add(max_sequence.wrapping_sub(sequence))
    } else {
        ack - 1 - sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u32 = u32::MAX;

    #[test]
    fn test_more_recent_is_irreflexive() {
        for max in [255, 1023, 0xFFFF, MAX] {
            for s in [0, 1, max / 2, max - 1, max] {
                assert!(!more_recent(s, s, max));
            }
        }
    }

    #[test]
    fn test_more_recent_is_antisymmetric() {
        let max: u32 = 255;
        for s1 in 0..=max {
            for s2 in 0..=max {
                if s1 == s2 || s1.abs_diff(s2) == max / 2 {
                    continue;
                }
                assert_ne!(
                    more_recent(s1, s2, max),
                    more_recent(s2, s1, max),
                    "s1={} s2={}",
                    s1,
                    s2
                );
            }
        }
    }

    #[test]
    fn test_more_recent_wraps() {
        assert!(more_recent(1, 0, MAX));
        assert!(!more_recent(0, 1, MAX));
        assert!(more_recent(0, MAX, MAX));
        assert!(more_recent(5, MAX - 5, MAX));
        assert!(!more_recent(MAX - 5, 5, MAX));
        assert!(more_recent(2, 254, 255));
    }

    #[test]
    fn test_next_sequence_wraps() {
        assert_eq!(next_sequence(0, MAX), 1);
        assert_eq!(next_sequence(MAX, MAX), 0);
        assert_eq!(next_sequence(254, 255), 255);
        assert_eq!(next_sequence(255, 255), 0);
    }

    #[test]
    fn test_bit_index() {
        assert_eq!(bit_index(99, 100, MAX), 0);
        assert_eq!(bit_index(68, 100, MAX), 31);
        assert_eq!(bit_index(67, 100, MAX), 32);

        // ack가 wrap 직후
        assert_eq!(bit_index(MAX, 0, MAX), 0);
        assert_eq!(bit_index(MAX - 1, 0, MAX), 1);
        assert_eq!(bit_index(MAX, 1, MAX), 1);
        assert_eq!(bit_index(255, 0, 255), 0);
        assert_eq!(bit_index(250, 2, 255), 7);
    }
}
