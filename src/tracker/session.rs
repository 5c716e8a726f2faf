//! Temporal scoring state machine.
//!
//! A session is `Idle` until a template is selected, then `Tracking`: every
//! non-empty frame is evaluated, appended to a bounded history and folded into
//! the stability, hold and total scores. Empty frames are skipped so the last
//! snapshot stays in place.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use super::hold::{duration_score, HoldTimer};
use super::stability::FrameHistory;
use crate::config::ScoringConfig;
use crate::error::{PoseError, PoseResult};
use crate::pose::LandmarkFrame;
use crate::scoring::{CheckStatus, EvaluationResult, Evaluator};
use crate::template::{Template, TemplateCatalog, TemplateKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Tracking,
}

/// 外部（描画・実績）向けのスコア
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSnapshot {
    pub template_key: String,
    pub score: f32,
    pub best_score: f32,
    pub accuracy: f32,
    pub stability: f32,
    pub duration_score: f32,
    pub hold_seconds: f32,
    pub holding: bool,
    pub repetitions: u32,
    pub feedback: Vec<String>,
    pub frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spread {
    Open,
    Closed,
}

/// 動的テンプレートの回数カウンタ: 全開 → 全閉 で1回
#[derive(Debug, Clone, Default)]
struct RepCounter {
    phase: Option<Spread>,
    count: u32,
}

impl RepCounter {
    fn observe(&mut self, result: &EvaluationResult) {
        let evaluable = result.evaluable_count();
        if evaluable == 0 {
            return;
        }
        let all_pass = result
            .per_constraint
            .iter()
            .all(|c| c.status == CheckStatus::Satisfied);
        let none_pass = result.satisfied_count() == 0;

        let next = if all_pass {
            Spread::Open
        } else if none_pass {
            Spread::Closed
        } else {
            return;
        };
        if self.phase == Some(Spread::Open) && next == Spread::Closed {
            self.count += 1;
            debug!("repetition {}", self.count);
        }
        self.phase = Some(next);
    }
}

pub struct ScoringSession {
    config: ScoringConfig,
    evaluator: Evaluator,
    template: Option<Arc<Template>>,
    history: FrameHistory,
    hold: HoldTimer,
    reps: RepCounter,
    best_score: f32,
    frames: u64,
    last_result: Option<EvaluationResult>,
    last_snapshot: Option<ScoreSnapshot>,
}

impl ScoringSession {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            evaluator: Evaluator::from_config(&config),
            history: FrameHistory::new(config.history_depth),
            hold: HoldTimer::new(config.hold_threshold),
            config,
            template: None,
            reps: RepCounter::default(),
            best_score: 0.0,
            frames: 0,
            last_result: None,
            last_snapshot: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.template.is_some() {
            SessionState::Tracking
        } else {
            SessionState::Idle
        }
    }

    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    /// テンプレートを選び直すと履歴も含めて初期化される
    pub fn select_template(&mut self, template: Arc<Template>) {
        info!("tracking template {}", template.key);
        self.reset();
        self.template = Some(template);
    }

    pub fn select_by_key(&mut self, catalog: &TemplateCatalog, key: &str) -> PoseResult<()> {
        let template = catalog
            .lookup(key)
            .ok_or_else(|| PoseError::InvalidTemplateReference(key.to_string()))?;
        self.select_template(template);
        Ok(())
    }

    /// 選択中のテンプレートは残したまま計測状態だけ消す
    pub fn reset(&mut self) {
        self.history.clear();
        self.hold.reset();
        self.reps = RepCounter::default();
        self.best_score = 0.0;
        self.frames = 0;
        self.last_result = None;
        self.last_snapshot = None;
    }

    /// Idle に戻す（検出停止時）
    pub fn clear(&mut self) {
        self.reset();
        self.template = None;
    }

    /// 1フレーム分の評価
    ///
    /// Idle なら `InvalidTemplateReference`、空フレームなら
    /// `NoLandmarksDetected` を返し、状態は変えない。
    pub fn update(&mut self, frame: LandmarkFrame, now: Instant) -> PoseResult<ScoreSnapshot> {
        let template = self
            .template
            .clone()
            .ok_or_else(|| PoseError::InvalidTemplateReference("<none selected>".into()))?;
        if frame.is_empty() {
            return Err(PoseError::NoLandmarksDetected);
        }

        let result = self.evaluator.evaluate(&frame, &template);
        self.history.push(frame);
        self.frames += 1;

        let accuracy = result.accuracy;
        let stability = self.history.stability(self.config.stability_window);
        let held = self.hold.update(accuracy, now);
        let duration = duration_score(held, template.target_hold_seconds);
        if template.kind == TemplateKind::Dynamic {
            self.reps.observe(&result);
        }

        let score = (accuracy * self.config.accuracy_weight
            + stability * self.config.stability_weight
            + duration * self.config.duration_weight)
            .clamp(0.0, 100.0);
        self.best_score = self.best_score.max(score);

        let snapshot = ScoreSnapshot {
            template_key: template.key.clone(),
            score,
            best_score: self.best_score,
            accuracy,
            stability,
            duration_score: duration,
            hold_seconds: held.as_secs_f32(),
            holding: self.hold.is_holding(),
            repetitions: self.reps.count,
            feedback: result.feedback.clone(),
            frames: self.frames,
        };
        self.last_result = Some(result);
        self.last_snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> Option<&ScoreSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn last_result(&self) -> Option<&EvaluationResult> {
        self.last_result.as_ref()
    }

    pub fn best_score(&self) -> f32 {
        self.best_score
    }

    /// 最後に評価したフレーム
    pub fn latest_frame(&self) -> Option<&LandmarkFrame> {
        self.history.latest()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;
    use std::time::Duration;

    fn catalog() -> TemplateCatalog {
        TemplateCatalog::builtin().unwrap()
    }

    /// プランク（肩 Δy = `shoulder_dy`）
    fn plank(shoulder_dy: f32) -> LandmarkFrame {
        LandmarkFrame::from_landmarks(vec![
            Landmark::new("left_shoulder", 100.0, 300.0, 0.9),
            Landmark::new("right_shoulder", 100.0, 300.0 + shoulder_dy, 0.9),
            Landmark::new("left_hip", 300.0, 300.0, 0.9),
            Landmark::new("right_hip", 300.0, 305.0, 0.9),
            Landmark::new("left_ankle", 500.0, 310.0, 0.9),
        ])
        .unwrap()
    }

    fn jack(wrists: f32, ankles: f32) -> LandmarkFrame {
        LandmarkFrame::from_landmarks(vec![
            Landmark::new("left_wrist", 200.0 - wrists / 2.0, 100.0, 0.9),
            Landmark::new("right_wrist", 200.0 + wrists / 2.0, 100.0, 0.9),
            Landmark::new("left_ankle", 200.0 - ankles / 2.0, 500.0, 0.9),
            Landmark::new("right_ankle", 200.0 + ankles / 2.0, 500.0, 0.9),
        ])
        .unwrap()
    }

    fn tracking(key: &str) -> ScoringSession {
        let mut session = ScoringSession::new(ScoringConfig::default());
        session.select_by_key(&catalog(), key).unwrap();
        session
    }

    #[test]
    fn test_idle_rejects_frames() {
        let mut session = ScoringSession::new(ScoringConfig::default());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(
            session.update(plank(5.0), Instant::now()),
            Err(PoseError::InvalidTemplateReference(_))
        ));
        assert!(session.select_by_key(&catalog(), "handstand").is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_empty_frame_keeps_last_snapshot() {
        let mut session = tracking("plank");
        let t0 = Instant::now();
        let first = session.update(plank(5.0), t0).unwrap();
        assert_eq!(
            session.update(LandmarkFrame::empty(), t0 + Duration::from_millis(33)),
            Err(PoseError::NoLandmarksDetected)
        );
        assert_eq!(session.snapshot(), Some(&first));
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn test_stable_hold_scores() {
        let mut session = tracking("plank");
        let t0 = Instant::now();
        let mut last = None;
        for i in 0..10u64 {
            last = Some(session.update(plank(5.0), t0 + Duration::from_secs(i)).unwrap());
        }
        let snap = last.unwrap();
        assert_eq!(snap.accuracy, 100.0);
        assert_eq!(snap.stability, 100.0);
        assert!(snap.holding);
        assert!((snap.hold_seconds - 9.0).abs() < 1e-4);
        // plank の目標は 30 秒 → 30%
        assert!((snap.duration_score - 30.0).abs() < 1e-3);
        let expected = 0.5 * 100.0 + 0.3 * 100.0 + 0.2 * 30.0;
        assert!((snap.score - expected).abs() < 1e-3);
    }

    #[test]
    fn test_dip_resets_hold_but_not_best() {
        let mut session = tracking("plank");
        let t0 = Instant::now();
        for i in 0..10u64 {
            session.update(plank(5.0), t0 + Duration::from_secs(i)).unwrap();
        }
        let best = session.best_score();
        // 肩の Δy 40px → shoulders_level 失敗（精度 75 > 70 なので継続）
        let snap = session.update(plank(40.0), t0 + Duration::from_secs(10)).unwrap();
        assert_eq!(snap.accuracy, 75.0);
        assert!(snap.holding);
        // 腰も崩すと精度 50 ≤ 70 → 即リセット
        let mut frame = plank(40.0).to_vec();
        frame.retain(|l| l.label != "right_hip");
        frame.push(Landmark::new("right_hip", 300.0, 400.0, 0.9));
        let snap = session
            .update(
                LandmarkFrame::from_landmarks(frame).unwrap(),
                t0 + Duration::from_secs(11),
            )
            .unwrap();
        assert!(snap.accuracy <= 70.0);
        assert_eq!(snap.hold_seconds, 0.0);
        assert!(!snap.holding);
        assert_eq!(snap.best_score, best);
        assert!(snap.score < best);
    }

    #[test]
    fn test_history_bounded_and_reselect_clears() {
        let mut session = tracking("plank");
        let t0 = Instant::now();
        for i in 0..50u64 {
            session.update(plank(5.0), t0 + Duration::from_millis(33 * i)).unwrap();
        }
        assert_eq!(session.history_len(), 30);
        session.select_by_key(&catalog(), "tree").unwrap();
        assert_eq!(session.history_len(), 0);
        assert_eq!(session.best_score(), 0.0);
        assert!(session.snapshot().is_none());
        assert_eq!(session.template().unwrap().key, "tree");
    }

    #[test]
    fn test_jumping_jack_repetitions() {
        let mut session = tracking("jumping_jack");
        let t0 = Instant::now();
        let mut reps = 0;
        for (i, (w, a)) in [(50.0, 40.0), (260.0, 150.0), (50.0, 40.0), (260.0, 150.0), (150.0, 150.0), (50.0, 40.0)]
            .iter()
            .enumerate()
        {
            reps = session
                .update(jack(*w, *a), t0 + Duration::from_millis(300 * i as u64))
                .unwrap()
                .repetitions;
        }
        assert_eq!(reps, 2);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut session = tracking("plank");
        let snap = session.update(plank(5.0), Instant::now()).unwrap();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["template_key"], "plank");
        assert_eq!(json["accuracy"], 100.0);
    }
}
