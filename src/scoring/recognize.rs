//! Auto-recognition: guess which of five reference stances a frame shows.
//!
//! Each stance is a short list of heuristic checks. The candidate score is
//! the fraction of its checks that pass; a check whose landmarks are missing
//! counts as failed.

use serde::Serialize;
use tracing::debug;

use super::geometry::{distance, landmark_angle};
use crate::config::RecognitionConfig;
use crate::pose::{Landmark, LandmarkFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Mountain,
    TPose,
    Tree,
    Warrior2,
    ArmsUp,
}

impl Stance {
    pub const ALL: [Stance; 5] = [
        Stance::Mountain,
        Stance::TPose,
        Stance::Tree,
        Stance::Warrior2,
        Stance::ArmsUp,
    ];

    /// 対応する組み込みテンプレートのキー（あれば）
    pub fn template_key(&self) -> Option<&'static str> {
        match self {
            Stance::Mountain => Some("mountain"),
            Stance::TPose => Some("t_pose"),
            Stance::Tree => Some("tree"),
            Stance::Warrior2 => Some("warrior_2"),
            Stance::ArmsUp => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StanceScore {
    pub stance: Stance,
    /// 0.0〜1.0
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Recognition {
    Match { stance: Stance, confidence: f32 },
    NoConfidentMatch { best: StanceScore },
}

impl Recognition {
    pub fn stance(&self) -> Option<Stance> {
        match self {
            Recognition::Match { stance, .. } => Some(*stance),
            Recognition::NoConfidentMatch { .. } => None,
        }
    }
}

pub struct Recognizer {
    config: RecognitionConfig,
    min_confidence: f32,
}

impl Recognizer {
    pub fn new(config: RecognitionConfig, min_confidence: f32) -> Self {
        Self {
            config,
            min_confidence,
        }
    }

    /// 最も一致度の高い候補。下限未満なら NoConfidentMatch
    pub fn recognize(&self, frame: &LandmarkFrame) -> Recognition {
        let ranked = self.rank(frame);
        let best = ranked[0];
        debug!("recognition best {:?} {:.2}", best.stance, best.confidence);
        if best.confidence >= self.config.confidence_floor {
            Recognition::Match {
                stance: best.stance,
                confidence: best.confidence,
            }
        } else {
            Recognition::NoConfidentMatch { best }
        }
    }

    /// 全候補を一致度の降順で返す（同点は定義順）
    pub fn rank(&self, frame: &LandmarkFrame) -> Vec<StanceScore> {
        let probe = Probe {
            frame,
            min_confidence: self.min_confidence,
            config: &self.config,
        };
        let mut scores: Vec<StanceScore> = Stance::ALL
            .iter()
            .map(|&stance| {
                let checks = probe.checks(stance);
                let passed = checks.iter().filter(|&&ok| ok).count();
                StanceScore {
                    stance,
                    confidence: passed as f32 / checks.len() as f32,
                }
            })
            .collect();
        scores.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        scores
    }
}

struct Probe<'a> {
    frame: &'a LandmarkFrame,
    min_confidence: f32,
    config: &'a RecognitionConfig,
}

impl Probe<'_> {
    fn get(&self, label: &str) -> Option<&Landmark> {
        self.frame.confident(label, self.min_confidence)
    }

    fn pair(&self, a: &str, b: &str) -> Option<(&Landmark, &Landmark)> {
        Some((self.get(a)?, self.get(b)?))
    }

    fn level(&self, a: &str, b: &str) -> bool {
        self.pair(a, b)
            .map(|(pa, pb)| (pa.y - pb.y).abs() < self.config.level_tolerance)
            .unwrap_or(false)
    }

    /// 画像座標なので y が小さいほうが上
    fn above(&self, a: &str, b: &str) -> bool {
        self.pair(a, b).map(|(pa, pb)| pa.y < pb.y).unwrap_or(false)
    }

    fn ankle_gap(&self) -> Option<f32> {
        self.pair("left_ankle", "right_ankle")
            .map(|(l, r)| distance((l.x, l.y), (r.x, r.y)))
    }

    /// 腕と体幹のなす角（腰-肩-手首）
    fn arm_angle(&self, side: &str) -> Option<f32> {
        let hip = self.get(&format!("{}_hip", side))?;
        let shoulder = self.get(&format!("{}_shoulder", side))?;
        let wrist = self.get(&format!("{}_wrist", side))?;
        Some(landmark_angle(hip, shoulder, wrist))
    }

    fn knee_angle(&self, side: &str) -> Option<f32> {
        let hip = self.get(&format!("{}_hip", side))?;
        let knee = self.get(&format!("{}_knee", side))?;
        let ankle = self.get(&format!("{}_ankle", side))?;
        Some(landmark_angle(hip, knee, ankle))
    }

    fn arm_down(&self, side: &str) -> bool {
        self.arm_angle(side)
            .map(|a| a < self.config.arm_down_max_deg)
            .unwrap_or(false)
    }

    fn arm_horizontal(&self, side: &str) -> bool {
        let slack = self.config.arm_down_max_deg / 2.0;
        self.arm_angle(side)
            .map(|a| (a - 90.0).abs() <= slack)
            .unwrap_or(false)
    }

    fn checks(&self, stance: Stance) -> Vec<bool> {
        let tol = self.config.level_tolerance;
        let together = self.config.feet_together;
        match stance {
            Stance::Mountain => vec![
                self.level("left_shoulder", "right_shoulder"),
                self.level("left_hip", "right_hip"),
                self.level("left_ankle", "right_ankle"),
                self.ankle_gap().map(|d| d < together).unwrap_or(false),
                self.arm_down("left"),
                self.arm_down("right"),
            ],
            Stance::TPose => vec![
                self.level("left_shoulder", "right_shoulder"),
                self.level("left_wrist", "right_wrist"),
                self.level("left_wrist", "left_shoulder"),
                self.level("right_wrist", "right_shoulder"),
                self.arm_horizontal("left"),
                self.arm_horizontal("right"),
            ],
            Stance::Tree => {
                // どちらかの足首がもう一方より明確に高い
                let raised = self
                    .pair("left_ankle", "right_ankle")
                    .map(|(l, r)| (l.y - r.y).abs() > tol * 2.0)
                    .unwrap_or(false);
                vec![
                    self.level("left_shoulder", "right_shoulder"),
                    self.level("left_hip", "right_hip"),
                    raised,
                    self.above("left_hip", "left_ankle") && self.above("right_hip", "right_ankle"),
                    self.above("left_wrist", "left_hip") && self.above("right_wrist", "right_hip"),
                ]
            }
            Stance::Warrior2 => {
                let bent = ["left", "right"]
                    .iter()
                    .any(|side| self.knee_angle(side).map(|a| a < 130.0).unwrap_or(false));
                vec![
                    self.ankle_gap().map(|d| d > together * 3.0).unwrap_or(false),
                    self.level("left_ankle", "right_ankle"),
                    self.level("left_wrist", "right_wrist"),
                    self.arm_horizontal("left"),
                    self.arm_horizontal("right"),
                    bent,
                ]
            }
            Stance::ArmsUp => vec![
                self.above("left_wrist", "left_shoulder"),
                self.above("right_wrist", "right_shoulder"),
                self.level("left_shoulder", "right_shoulder"),
                self.above("left_hip", "left_ankle") && self.above("right_hip", "right_ankle"),
                self.ankle_gap().map(|d| d < together).unwrap_or(false),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(points: &[(&str, f32, f32)]) -> LandmarkFrame {
        LandmarkFrame::from_landmarks(
            points
                .iter()
                .map(|&(label, x, y)| Landmark::new(label, x, y, 0.9)),
        )
        .unwrap()
    }

    fn recognizer() -> Recognizer {
        Recognizer::new(RecognitionConfig::default(), 0.5)
    }

    fn mountain_frame() -> LandmarkFrame {
        frame(&[
            ("nose", 200.0, 50.0),
            ("left_shoulder", 170.0, 100.0),
            ("right_shoulder", 230.0, 102.0),
            ("left_elbow", 166.0, 200.0),
            ("right_elbow", 234.0, 200.0),
            ("left_wrist", 165.0, 310.0),
            ("right_wrist", 235.0, 310.0),
            ("left_hip", 180.0, 300.0),
            ("right_hip", 220.0, 301.0),
            ("left_knee", 182.0, 400.0),
            ("right_knee", 218.0, 400.0),
            ("left_ankle", 180.0, 500.0),
            ("right_ankle", 220.0, 502.0),
        ])
    }

    #[test]
    fn test_mountain_recognized() {
        let result = recognizer().recognize(&mountain_frame());
        match result {
            Recognition::Match { stance, confidence } => {
                assert_eq!(stance, Stance::Mountain);
                assert!(confidence >= 0.6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sparse_frame_not_confident() {
        let f = frame(&[("left_shoulder", 170.0, 100.0), ("right_shoulder", 230.0, 102.0)]);
        let result = recognizer().recognize(&f);
        assert!(matches!(result, Recognition::NoConfidentMatch { .. }));
        assert_eq!(result.stance(), None);
    }

    #[test]
    fn test_empty_frame_not_confident() {
        let result = recognizer().recognize(&LandmarkFrame::empty());
        match result {
            Recognition::NoConfidentMatch { best } => assert_eq!(best.confidence, 0.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_t_pose_recognized() {
        let f = frame(&[
            ("left_shoulder", 170.0, 100.0),
            ("right_shoulder", 230.0, 100.0),
            ("left_wrist", 20.0, 105.0),
            ("right_wrist", 380.0, 98.0),
            ("left_hip", 180.0, 300.0),
            ("right_hip", 220.0, 300.0),
            ("left_ankle", 180.0, 500.0),
            ("right_ankle", 220.0, 500.0),
        ]);
        assert_eq!(recognizer().recognize(&f).stance(), Some(Stance::TPose));
    }

    #[test]
    fn test_rank_sorted_descending() {
        let ranked = recognizer().rank(&mountain_frame());
        assert_eq!(ranked.len(), 5);
        for pair in ranked.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_raising_the_floor_rejects() {
        let config = RecognitionConfig {
            confidence_floor: 1.01,
            ..RecognitionConfig::default()
        };
        let result = Recognizer::new(config, 0.5).recognize(&mountain_frame());
        match result {
            Recognition::NoConfidentMatch { best } => assert_eq!(best.stance, Stance::Mountain),
            other => panic!("unexpected {:?}", other),
        }
    }
}
