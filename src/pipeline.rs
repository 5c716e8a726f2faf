//! Periodic tick driver: pull a frame, detect, score.
//!
//! One detection is in flight at a time. A detection that is merely slower
//! than the tick period still completes and is scored; the interval skips the
//! ticks it overran. A result is discarded only when its generation was
//! invalidated while it ran (template switch, reset, stop) or when the backend
//! stops answering within `detect_timeout_ms`. The stop flag is checked before
//! each tick and after every await.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::camera::{Frame, FrameSource};
use crate::config::DetectionConfig;
use crate::error::{PoseError, PoseResult};
use crate::pose::{BackendDescriptor, Detection, DetectionAdapter, LandmarkFrame};
use crate::template::TemplateCatalog;
use crate::tracker::{ScoreSnapshot, ScoringSession};

/// 検出の停止フラグ。何度 stop しても同じ
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            info!("detection stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// 検出あり / プレビューのみ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    Detect,
    Preview,
}

/// 同時に1つだけ検出を走らせ、古い世代の結果を捨てるためのゲート
///
/// クローンは同じ状態を共有するので、別タスクから `invalidate` できる。
#[derive(Debug, Clone, Default)]
pub struct TickGate {
    generation: Arc<AtomicU64>,
    in_flight: Arc<AtomicBool>,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 検出中なら None
    pub fn begin(&self) -> Option<InFlight> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Some(InFlight {
            gate: self.clone(),
            generation,
        })
    }

    /// 世代を進め、進行中の検出結果を無効にする
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// 進行中の検出。drop されるとゲートが空く（ティックが途中で捨てられても同じ）
#[derive(Debug)]
pub struct InFlight {
    gate: TickGate,
    generation: u64,
}

impl InFlight {
    /// 開始後に invalidate されていなければ true
    pub fn is_current(&self) -> bool {
        self.gate.generation.load(Ordering::Acquire) == self.generation
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
    }
}

/// 1ティックの結果
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Stopped,
    /// プレビューのみ。検出はしない
    Preview(Frame),
    NotReady,
    NoBackend,
    /// 人物なし。前回のスコアを維持
    Skipped,
    /// 世代切れ・応答なしの結果を捨てた
    Discarded,
    Busy,
    Scored(ScoreSnapshot),
    Rejected(PoseError),
}

pub struct Pipeline<S: FrameSource> {
    adapter: DetectionAdapter,
    session: ScoringSession,
    source: S,
    config: DetectionConfig,
    mode: TickMode,
    gate: TickGate,
    stop: StopHandle,
    /// 最後に採点したランドマーク（描画用）。停止後も残る
    last_landmarks: Option<LandmarkFrame>,
}

impl<S: FrameSource> Pipeline<S> {
    pub fn new(
        adapter: DetectionAdapter,
        session: ScoringSession,
        source: S,
        config: DetectionConfig,
    ) -> Self {
        Self {
            adapter,
            session,
            source,
            config,
            mode: TickMode::Detect,
            gate: TickGate::new(),
            stop: StopHandle::new(),
            last_landmarks: None,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// 別タスクから進行中の検出結果を無効にするためのハンドル
    pub fn gate(&self) -> TickGate {
        self.gate.clone()
    }

    pub fn session(&self) -> &ScoringSession {
        &self.session
    }

    pub fn last_landmarks(&self) -> Option<&LandmarkFrame> {
        self.last_landmarks.as_ref()
    }

    pub fn mode(&self) -> TickMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TickMode) {
        if self.mode != mode {
            debug!("tick mode -> {:?}", mode);
            self.mode = mode;
        }
    }

    pub async fn initialize(&mut self) -> PoseResult<BackendDescriptor> {
        self.adapter.initialize().await
    }

    /// テンプレート選択。進行中の検出結果は捨てる
    pub fn select_template(&mut self, catalog: &TemplateCatalog, key: &str) -> PoseResult<()> {
        self.session.select_by_key(catalog, key)?;
        self.gate.invalidate();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.gate.invalidate();
    }

    /// 現在のモードのティック周期
    pub fn period(&self) -> Duration {
        let fps = match self.mode {
            TickMode::Detect => self.config.detect_fps,
            TickMode::Preview => self.config.preview_fps,
        };
        Duration::from_secs_f64(1.0 / fps.max(1) as f64)
    }

    fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.config.detect_timeout_ms.max(1))
    }

    pub async fn tick(&mut self) -> TickOutcome {
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }
        let frame = self.source.latest();

        if self.mode == TickMode::Preview {
            return match frame {
                Some(f) if f.is_ready() => TickOutcome::Preview(f),
                _ => TickOutcome::NotReady,
            };
        }

        // 初期化は検出の期限の外で行う（プローブ側のタイムアウトが効く）
        if !self.adapter.ensure_backend().await {
            return TickOutcome::NoBackend;
        }
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }

        let Some(in_flight) = self.gate.begin() else {
            return TickOutcome::Busy;
        };
        let limit = self.detect_timeout();
        let detection = timeout(limit, self.adapter.detect_frame(frame.as_ref())).await;
        let current = in_flight.is_current();
        drop(in_flight);

        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }
        let detection = match detection {
            Ok(d) if current => d,
            Ok(_) => {
                debug!("stale detection discarded");
                return TickOutcome::Discarded;
            }
            Err(_) => {
                warn!("detection gave no answer within {:?}; discarded", limit);
                return TickOutcome::Discarded;
            }
        };

        match detection {
            Detection::NotReady => TickOutcome::NotReady,
            Detection::NoBackend => TickOutcome::NoBackend,
            Detection::Landmarks(landmarks) => {
                let kept = landmarks.clone();
                match self.session.update(landmarks, Instant::now().into_std()) {
                    Ok(snapshot) => {
                        self.last_landmarks = Some(kept);
                        TickOutcome::Scored(snapshot)
                    }
                    Err(PoseError::NoLandmarksDetected) => TickOutcome::Skipped,
                    Err(e) => TickOutcome::Rejected(e),
                }
            }
        }
    }

    /// 停止されるまでティックを回し、スコアを送る
    ///
    /// バックエンドが尽きたら `NoBackend`、テンプレート未選択なら
    /// `InvalidTemplateReference` で終わる。受信側が閉じたら停止する。
    /// どの終わり方でもセッションは破棄される（最後のランドマークは残る）。
    pub async fn run(&mut self, tx: mpsc::Sender<ScoreSnapshot>) -> PoseResult<()> {
        let result = self.run_ticks(tx).await;
        self.stop.stop();
        self.gate.invalidate();
        self.session.clear();
        result
    }

    async fn run_ticks(&mut self, tx: mpsc::Sender<ScoreSnapshot>) -> PoseResult<()> {
        let mut period = self.period();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.stop.is_stopped() {
                return Ok(());
            }

            match self.tick().await {
                TickOutcome::Stopped => return Ok(()),
                TickOutcome::Scored(snapshot) => {
                    if tx.send(snapshot).await.is_err() {
                        debug!("snapshot receiver closed");
                        self.stop.stop();
                        return Ok(());
                    }
                }
                TickOutcome::NoBackend => {
                    warn!("no detection backend left");
                    self.stop.stop();
                    return Err(PoseError::NoBackend);
                }
                TickOutcome::Rejected(e) => {
                    warn!("scoring rejected frame: {}", e);
                    self.stop.stop();
                    return Err(e);
                }
                TickOutcome::Preview(_)
                | TickOutcome::NotReady
                | TickOutcome::Skipped
                | TickOutcome::Discarded
                | TickOutcome::Busy => {}
            }

            let next = self.period();
            if next != period {
                period = next;
                ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }
        }
    }
}
