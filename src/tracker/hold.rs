use std::time::{Duration, Instant};

use tracing::debug;

/// 精度が閾値を超えている間だけ進むホールドタイマー
///
/// 閾値以下になった瞬間に 0 へ戻る（デバウンスなし）。
#[derive(Debug, Clone)]
pub struct HoldTimer {
    threshold: f32,
    started: Option<Instant>,
}

impl HoldTimer {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            started: None,
        }
    }

    /// 1フレーム分の精度を反映し、現在のホールド時間を返す
    pub fn update(&mut self, accuracy: f32, now: Instant) -> Duration {
        if accuracy > self.threshold {
            if self.started.is_none() {
                debug!("hold started at accuracy {:.1}", accuracy);
                self.started = Some(now);
            }
        } else if self.started.take().is_some() {
            debug!("hold broken at accuracy {:.1}", accuracy);
        }
        self.elapsed(now)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_holding(&self) -> bool {
        self.started.is_some()
    }

    pub fn reset(&mut self) {
        self.started = None;
    }
}

/// min(100, hold / target × 100)
pub fn duration_score(hold: Duration, target_seconds: f32) -> f32 {
    if target_seconds <= 0.0 {
        return 0.0;
    }
    (hold.as_secs_f32() / target_seconds * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_above_threshold() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(70.0);
        assert_eq!(timer.update(70.0, t0), Duration::ZERO);
        assert!(!timer.is_holding());
        assert_eq!(timer.update(71.0, t0), Duration::ZERO);
        assert!(timer.is_holding());
        assert_eq!(
            timer.update(90.0, t0 + Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_monotonic_while_held() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(70.0);
        let mut prev = Duration::ZERO;
        for i in 0..20 {
            let held = timer.update(85.0, t0 + Duration::from_millis(100 * i));
            assert!(held >= prev);
            prev = held;
        }
        assert_eq!(prev, Duration::from_millis(1900));
    }

    #[test]
    fn test_single_dip_resets() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(70.0);
        timer.update(90.0, t0);
        timer.update(90.0, t0 + Duration::from_secs(5));
        assert_eq!(timer.update(70.0, t0 + Duration::from_secs(6)), Duration::ZERO);
        assert!(!timer.is_holding());
        // 再開は新しい起点から
        timer.update(90.0, t0 + Duration::from_secs(7));
        assert_eq!(
            timer.elapsed(t0 + Duration::from_secs(8)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_duration_score_capped() {
        assert_eq!(duration_score(Duration::from_secs(5), 10.0), 50.0);
        assert_eq!(duration_score(Duration::from_secs(30), 10.0), 100.0);
        assert_eq!(duration_score(Duration::ZERO, 10.0), 0.0);
        assert_eq!(duration_score(Duration::from_secs(5), 0.0), 0.0);
    }
}
