//! 시뮬레이션 시간 커서.
//!
//! 고정된 `[start, end)` 구간 위를 `speed`초 단위로 전진하는 정수 인덱스입니다.
//! 인덱스는 항상 `speed`의 배수이며 `start + index < end`를 만족합니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, BacktestResult};

/// 시뮬레이션 기간. 생성 이후 변경되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// 시작 시각 (포함)
    pub start: DateTime<Utc>,
    /// 종료 시각 (제외)
    pub end: DateTime<Utc>,
    /// 한 단계당 시뮬레이션 초
    pub speed: u32,
}

impl Span {
    /// 기간을 검증하고 생성합니다.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, speed: u32) -> BacktestResult<Self> {
        if speed == 0 {
            return Err(BacktestError::InvalidSpan("speed must be positive".into()));
        }
        if (end - start).num_seconds() < 1 {
            return Err(BacktestError::InvalidSpan(format!(
                "start ({}) must be at least one second before end ({})",
                start, end
            )));
        }
        Ok(Self { start, end, speed })
    }

    /// 기간 길이(초).
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// 도달 가능한 마지막 인덱스 (`end`보다 작은 최대 `speed` 배수).
    pub fn last_index(&self) -> i64 {
        let speed = i64::from(self.speed);
        ((self.duration_secs() - 1) / speed) * speed
    }

    /// 인덱스를 시뮬레이션 시각으로 변환합니다.
    pub fn time_at(&self, index: i64) -> DateTime<Utc> {
        self.start + Duration::seconds(index)
    }

    /// 시각을 `speed`에 맞춰 내림 정렬하고 구간 안으로 제한한 인덱스.
    pub fn align(&self, time: DateTime<Utc>) -> i64 {
        let speed = i64::from(self.speed);
        let offset = (time - self.start).num_seconds();
        (offset.div_euclid(speed) * speed).clamp(0, self.last_index())
    }

    /// 유효한 커서 인덱스인지 확인합니다.
    pub fn contains_index(&self, index: i64) -> bool {
        index >= 0 && index <= self.last_index() && index % i64::from(self.speed) == 0
    }
}

/// 현재 시뮬레이션 위치.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// 시작 시각으로부터의 초
    pub index: i64,
    /// 시뮬레이션 시각 (`start + index`)
    pub time: DateTime<Utc>,
}

/// 시뮬레이션 시계.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    span: Span,
    index: i64,
    exhausted: bool,
}

impl Clock {
    /// 시작 위치의 시계를 생성합니다.
    pub fn new(span: Span) -> Self {
        Self {
            span,
            index: 0,
            exhausted: false,
        }
    }

    /// 저장된 위치에서 시계를 복원합니다.
    pub fn restore(span: Span, index: i64, exhausted: bool) -> BacktestResult<Self> {
        if !span.contains_index(index) {
            return Err(BacktestError::InvalidSpan(format!(
                "index {} is not a valid cursor for span {} - {} (speed {})",
                index, span.start, span.end, span.speed
            )));
        }
        Ok(Self {
            span,
            index,
            exhausted,
        })
    }

    /// 시뮬레이션 기간.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// 현재 커서.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            index: self.index,
            time: self.span.time_at(self.index),
        }
    }

    /// 현재 시뮬레이션 시각.
    pub fn now(&self) -> DateTime<Utc> {
        self.span.time_at(self.index)
    }

    /// 구간 끝에 도달해 더 진행할 수 없는지 확인합니다.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// 남은 전진 가능 단계 수.
    pub fn remaining_steps(&self) -> u64 {
        ((self.span.last_index() - self.index) / i64::from(self.span.speed)) as u64
    }

    /// `speed`초 전진합니다. 다음 위치가 `end`에 닿으면 제자리에 머물고 `None`을 반환합니다.
    pub fn next(&mut self) -> Option<Cursor> {
        if self.exhausted {
            return None;
        }
        let next = self.index + i64::from(self.span.speed);
        if next > self.span.last_index() {
            self.exhausted = true;
            return None;
        }
        self.index = next;
        Some(self.cursor())
    }

    /// `steps`번의 `next()`와 같은 결과로 한 번에 전진합니다. 실제 전진한 단계 수를 반환합니다.
    pub fn fast_forward(&mut self, steps: u64) -> u64 {
        if self.exhausted {
            return 0;
        }
        let advanced = steps.min(self.remaining_steps());
        self.index += advanced as i64 * i64::from(self.span.speed);
        if advanced < steps {
            self.exhausted = true;
        }
        advanced
    }

    /// 지정 시각으로 이동합니다 (`speed` 배수로 내림, 구간 안으로 제한).
    pub fn go_to(&mut self, time: DateTime<Utc>) -> Cursor {
        self.index = self.span.align(time);
        self.exhausted = false;
        self.cursor()
    }

    /// 시작 위치로 되돌립니다.
    pub fn reset(&mut self) {
        self.index = 0;
        self.exhausted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn span(speed: u32) -> Span {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 10, 0).unwrap();
        Span::new(start, end, speed).unwrap()
    }

    #[test]
    fn test_span_validation() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(Span::new(start, start, 60).is_err());
        assert!(Span::new(start, start + Duration::hours(1), 0).is_err());
        assert!(Span::new(start + Duration::hours(1), start, 60).is_err());
    }

    #[test]
    fn test_last_index() {
        // 600초 구간, 60초 단위 → 마지막 유효 인덱스 540
        assert_eq!(span(60).last_index(), 540);
        // 600초 구간, 70초 단위 → 560
        assert_eq!(span(70).last_index(), 560);
    }

    #[test]
    fn test_next_until_exhausted() {
        let mut clock = Clock::new(span(60));
        let mut steps = 0;
        while clock.next().is_some() {
            steps += 1;
        }
        assert_eq!(steps, 9);
        assert!(clock.is_exhausted());
        assert_eq!(clock.cursor().index, 540);
        assert!(clock.now() < clock.span().end);
        assert!(clock.next().is_none());
    }

    #[test]
    fn test_fast_forward_matches_next() {
        for steps in [0u64, 1, 5, 9, 10, 50] {
            let mut a = Clock::new(span(60));
            let mut b = Clock::new(span(60));
            a.fast_forward(steps);
            for _ in 0..steps {
                b.next();
            }
            assert_eq!(a, b, "steps = {}", steps);
        }
    }

    #[test]
    fn test_go_to_aligns_and_clamps() {
        let mut clock = Clock::new(span(60));
        let start = clock.span().start;

        let cursor = clock.go_to(start + Duration::seconds(150));
        assert_eq!(cursor.index, 120);

        let cursor = clock.go_to(start - Duration::days(3));
        assert_eq!(cursor.index, 0);

        let cursor = clock.go_to(start + Duration::days(3));
        assert_eq!(cursor.index, 540);
        assert!(!clock.is_exhausted());
    }

    #[test]
    fn test_reset() {
        let mut clock = Clock::new(span(60));
        clock.fast_forward(100);
        assert!(clock.is_exhausted());
        clock.reset();
        assert_eq!(clock.cursor().index, 0);
        assert!(!clock.is_exhausted());
    }

    #[test]
    fn test_restore_rejects_misaligned_index() {
        assert!(Clock::restore(span(60), 61, false).is_err());
        assert!(Clock::restore(span(60), 600, false).is_err());
        let clock = Clock::restore(span(60), 120, false).unwrap();
        assert_eq!(clock.cursor().index, 120);
    }
}
