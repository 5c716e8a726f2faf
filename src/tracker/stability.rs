use std::collections::VecDeque;

use crate::pose::LandmarkFrame;

/// 直近フレームの固定長 FIFO
#[derive(Debug, Clone)]
pub struct FrameHistory {
    frames: VecDeque<LandmarkFrame>,
    depth: usize,
}

impl FrameHistory {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            frames: VecDeque::with_capacity(depth),
            depth,
        }
    }

    pub fn push(&mut self, frame: LandmarkFrame) {
        if self.frames.len() == self.depth {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn latest(&self) -> Option<&LandmarkFrame> {
        self.frames.back()
    }

    /// 直近 `window` フレームの安定度（0〜100）
    ///
    /// 連続するフレーム間で共通するラベルの平均移動量を求め、その平均を
    /// 100 から引く。ウィンドウが埋まるまでは 0。
    pub fn stability(&self, window: usize) -> f32 {
        if window < 2 || self.frames.len() < window {
            return 0.0;
        }
        let start = self.frames.len() - window;
        let recent: Vec<&LandmarkFrame> = self.frames.range(start..).collect();

        let mut total = 0.0f32;
        let mut pairs = 0usize;
        for pair in recent.windows(2) {
            if let Some(d) = mean_displacement(pair[0], pair[1]) {
                total += d;
                pairs += 1;
            }
        }
        if pairs == 0 {
            return 0.0;
        }
        (100.0 - total / pairs as f32).clamp(0.0, 100.0)
    }
}

/// 両フレームに存在するラベルの平均移動量。共通ラベルがなければ None
fn mean_displacement(prev: &LandmarkFrame, next: &LandmarkFrame) -> Option<f32> {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for lm in next.iter() {
        if let Some(before) = prev.get(&lm.label) {
            sum += lm.distance_to(before);
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    fn frame(dx: f32) -> LandmarkFrame {
        LandmarkFrame::from_landmarks(vec![
            Landmark::new("left_shoulder", 100.0 + dx, 100.0, 0.9),
            Landmark::new("right_shoulder", 200.0 + dx, 100.0, 0.9),
        ])
        .unwrap()
    }

    fn jittering(amplitude: f32, n: usize) -> FrameHistory {
        let mut h = FrameHistory::new(30);
        for i in 0..n {
            let dx = if i % 2 == 0 { 0.0 } else { amplitude };
            h.push(frame(dx));
        }
        h
    }

    #[test]
    fn test_bounded_fifo() {
        let mut h = FrameHistory::new(3);
        for i in 0..5 {
            h.push(frame(i as f32));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.latest().unwrap().get("left_shoulder").unwrap().x, 104.0);
    }

    #[test]
    fn test_zero_until_window_full() {
        let h = jittering(0.0, 9);
        assert_eq!(h.stability(10), 0.0);
        let h = jittering(0.0, 10);
        assert_eq!(h.stability(10), 100.0);
    }

    #[test]
    fn test_decreases_with_displacement() {
        let low = jittering(2.0, 10).stability(10);
        let high = jittering(10.0, 10).stability(10);
        assert!((low - 98.0).abs() < 1e-4);
        assert!((high - 90.0).abs() < 1e-4);
        assert!(high < low);
    }

    #[test]
    fn test_never_negative() {
        assert_eq!(jittering(500.0, 10).stability(10), 0.0);
    }

    #[test]
    fn test_only_recent_window_counts() {
        let mut h = jittering(50.0, 10);
        for _ in 0..10 {
            h.push(frame(0.0));
        }
        assert_eq!(h.stability(10), 100.0);
    }
}
