//! Detection adapter: picks a backend and turns its output into one canonical
//! landmark frame per cycle.
//!
//! All coordinates leaving this module are pixels in the display space. The
//! display shows the camera feed mirrored, so the single horizontal mirror
//! step happens here and nowhere else.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::backend::{BackendDescriptor, BackendProbe, NormalizedPoint, PoseBackend, RawDetection};
use super::keypoint::{KeypointIndex, Landmark, LandmarkFrame, HAND_LABELS};
use crate::camera::Frame;
use crate::config::DetectionConfig;
use crate::error::{PoseError, PoseResult};

const BLAZEPOSE_COUNT: usize = 33;

/// 1サイクルの検出結果
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// 正規化済みランドマーク（人物なし・不正応答の場合は空）
    Landmarks(LandmarkFrame),
    /// フレームがまだ準備できていない。このサイクルはスキップ
    NotReady,
    /// 利用可能なバックエンドが一つもない
    NoBackend,
}

struct ActiveBackend {
    index: usize,
    backend: Box<dyn PoseBackend>,
}

pub struct DetectionAdapter {
    /// 優先順にソート済み
    probes: Vec<BackendProbe>,
    active: Option<ActiveBackend>,
    /// 次に初期化を試す候補。切り替え途中で中断されてもここから再開する
    next_candidate: usize,
    exhausted: bool,
    config: DetectionConfig,
    min_confidence: f32,
}

impl DetectionAdapter {
    pub fn new(mut probes: Vec<BackendProbe>, config: DetectionConfig, min_confidence: f32) -> Self {
        probes.sort_by_key(|p| p.descriptor.priority);
        Self {
            probes,
            active: None,
            next_candidate: 0,
            exhausted: false,
            config,
            min_confidence,
        }
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.config.probe_timeout_ms)
    }

    /// 各候補を時間制限付きで初期化し、使えたものを優先順に返す
    ///
    /// 可否の確認だけで、初期化したインスタンスはその場で捨てる。検出に使う
    /// バックエンドは `initialize` / `ensure_backend` が改めて作る。
    pub async fn probe_backends(&self) -> Vec<BackendDescriptor> {
        let limit = self.probe_timeout();
        let mut available = Vec::new();
        for probe in &self.probes {
            match timeout(limit, probe.initialize()).await {
                Ok(Ok(_)) => available.push(probe.descriptor.clone()),
                Ok(Err(e)) => debug!("probe {}: {}", probe.descriptor.name, e),
                Err(_) => warn!("probe {} timed out after {:?}", probe.descriptor.name, limit),
            }
        }
        available
    }

    /// 優先順で最初に初期化できたバックエンドを有効にする
    pub async fn initialize(&mut self) -> PoseResult<BackendDescriptor> {
        self.exhausted = false;
        self.next_candidate = 0;
        self.activate_from(0).await
    }

    pub fn active_backend(&self) -> Option<&BackendDescriptor> {
        self.active
            .as_ref()
            .map(|a| &self.probes[a.index].descriptor)
    }

    /// 有効なバックエンドがなければ初期化を試みる。候補が尽きていれば false
    pub async fn ensure_backend(&mut self) -> bool {
        if self.active.is_some() {
            return true;
        }
        !self.exhausted && self.activate_from(self.next_candidate).await.is_ok()
    }

    async fn activate_from(&mut self, start: usize) -> PoseResult<BackendDescriptor> {
        self.active = None;
        let limit = self.probe_timeout();
        for index in start..self.probes.len() {
            self.next_candidate = index;
            let probe = &self.probes[index];
            match timeout(limit, probe.initialize()).await {
                Ok(Ok(backend)) => {
                    info!("detection backend: {}", probe.descriptor.name);
                    let descriptor = probe.descriptor.clone();
                    self.active = Some(ActiveBackend { index, backend });
                    return Ok(descriptor);
                }
                Ok(Err(e)) => warn!("backend {} unavailable: {}", probe.descriptor.name, e),
                Err(_) => warn!(
                    "backend {} did not initialize within {:?}",
                    probe.descriptor.name, limit
                ),
            }
        }
        self.next_candidate = self.probes.len();
        self.exhausted = true;
        Err(PoseError::NoBackend)
    }

    /// 1フレーム分を検出し、正規座標のランドマークに変換する
    ///
    /// 推論中にバックエンドが利用不能になった場合は次の候補に切り替える。
    pub async fn detect_frame(&mut self, frame: Option<&Frame>) -> Detection {
        let frame = match frame {
            Some(f) if f.is_ready() => f,
            _ => return Detection::NotReady,
        };

        if !self.ensure_backend().await {
            return Detection::NoBackend;
        }

        loop {
            let Some(active) = self.active.as_mut() else {
                return Detection::NoBackend;
            };
            let index = active.index;
            let result = active.backend.infer(frame).await;
            match result {
                Ok(raw) => {
                    let landmarks = normalize(
                        &raw,
                        frame.width,
                        frame.height,
                        &self.config,
                        self.min_confidence,
                    );
                    return Detection::Landmarks(landmarks);
                }
                Err(e @ PoseError::BackendUnavailable { .. }) => {
                    warn!("{}; falling back", e);
                    if self.activate_from(index + 1).await.is_err() {
                        return Detection::NoBackend;
                    }
                }
                Err(e) => {
                    warn!("detection dropped: {}", e);
                    return Detection::Landmarks(LandmarkFrame::empty());
                }
            }
        }
    }
}

/// バックエンド固有の出力を正規ランドマークフレームに変換する
///
/// 配列長が合わない応答は空フレームになる。座標が有限でない点は捨てる。
pub fn normalize(
    raw: &RawDetection,
    width: u32,
    height: u32,
    config: &DetectionConfig,
    min_confidence: f32,
) -> LandmarkFrame {
    let w = width as f32;
    let h = height as f32;
    let mut points: Vec<Landmark> = Vec::new();

    let mut push = |label: &str, px: f32, py: f32, score: Option<f32>| {
        if !px.is_finite() || !py.is_finite() {
            return;
        }
        let confidence = score
            .filter(|s| s.is_finite())
            .unwrap_or(config.fallback_confidence)
            .clamp(0.0, 1.0);
        let x = if config.mirror_x { w - px } else { px };
        points.push(Landmark::new(label, x, py, confidence).with_visible(confidence >= min_confidence));
    };

    match raw {
        RawDetection::MoveNet { keypoints } => {
            if keypoints.len() != KeypointIndex::COUNT {
                warn!("movenet: expected {} keypoints, got {}", KeypointIndex::COUNT, keypoints.len());
                return LandmarkFrame::empty();
            }
            for (kp, [y, x, score]) in KeypointIndex::ALL.iter().zip(keypoints) {
                push(kp.label(), x * w, y * h, Some(*score));
            }
        }
        RawDetection::BlazePose { landmarks } => {
            if landmarks.len() != BLAZEPOSE_COUNT {
                warn!("blazepose: expected {} landmarks, got {}", BLAZEPOSE_COUNT, landmarks.len());
                return LandmarkFrame::empty();
            }
            for (i, p) in landmarks.iter().enumerate() {
                if let Some(kp) = KeypointIndex::from_blazepose_index(i) {
                    push(kp.label(), p.x * w, p.y * h, p.score);
                }
            }
        }
        RawDetection::PoseNet { keypoints } => {
            let mut seen = HashSet::new();
            for k in keypoints {
                let Some(kp) = KeypointIndex::from_part_name(&k.part) else {
                    debug!("posenet: ignoring part {}", k.part);
                    continue;
                };
                if seen.insert(kp) {
                    push(kp.label(), k.x, k.y, k.score);
                }
            }
        }
        RawDetection::Hand { landmarks } => {
            if landmarks.len() != HAND_LABELS.len() {
                warn!("hand: expected {} landmarks, got {}", HAND_LABELS.len(), landmarks.len());
                return LandmarkFrame::empty();
            }
            for (label, NormalizedPoint { x, y, score }) in HAND_LABELS.iter().zip(landmarks) {
                push(label, x * w, y * h, *score);
            }
        }
        RawDetection::Empty => {}
    }

    LandmarkFrame::from_landmarks(points).unwrap_or_else(|e| {
        warn!("normalize: {}", e);
        LandmarkFrame::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::backend::{BackendKind, PartKeypoint};
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct FixedBackend {
        descriptor: BackendDescriptor,
        result: PoseResult<RawDetection>,
    }

    impl PoseBackend for FixedBackend {
        fn descriptor(&self) -> &BackendDescriptor {
            &self.descriptor
        }

        fn infer<'a>(&'a mut self, _frame: &'a Frame) -> BoxFuture<'a, PoseResult<RawDetection>> {
            let result = self.result.clone();
            async move { result }.boxed()
        }
    }

    fn fixed_probe(name: &str, priority: u32, result: PoseResult<RawDetection>) -> BackendProbe {
        let descriptor = BackendDescriptor::new(name, BackendKind::PoseNet, priority);
        let d = descriptor.clone();
        BackendProbe::new(descriptor, move || {
            let backend = FixedBackend {
                descriptor: d.clone(),
                result: result.clone(),
            };
            async move { Ok(Box::new(backend) as Box<dyn PoseBackend>) }
        })
    }

    fn failing_probe(name: &str, priority: u32) -> BackendProbe {
        let descriptor = BackendDescriptor::new(name, BackendKind::BlazePose, priority);
        let n = name.to_string();
        BackendProbe::new(descriptor, move || {
            let n = n.clone();
            async move {
                Err(PoseError::BackendUnavailable {
                    backend: n,
                    reason: "not installed".into(),
                })
            }
        })
    }

    fn hanging_probe(name: &str, priority: u32) -> BackendProbe {
        let descriptor = BackendDescriptor::new(name, BackendKind::MoveNet, priority);
        let d = descriptor.clone();
        BackendProbe::new(descriptor, move || {
            let d = d.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Box::new(FixedBackend {
                    descriptor: d,
                    result: Ok(RawDetection::Empty),
                }) as Box<dyn PoseBackend>)
            }
        })
    }

    fn delayed_probe(name: &str, priority: u32, delay: Duration) -> BackendProbe {
        let descriptor = BackendDescriptor::new(name, BackendKind::PoseNet, priority);
        let d = descriptor.clone();
        BackendProbe::new(descriptor, move || {
            let d = d.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(Box::new(FixedBackend {
                    descriptor: d,
                    result: Ok(nose_detection()),
                }) as Box<dyn PoseBackend>)
            }
        })
    }

    fn nose_detection() -> RawDetection {
        RawDetection::PoseNet {
            keypoints: vec![PartKeypoint {
                part: "nose".into(),
                x: 100.0,
                y: 50.0,
                score: Some(0.95),
            }],
        }
    }

    fn movenet_all(y: f32, x: f32, score: f32) -> RawDetection {
        RawDetection::MoveNet {
            keypoints: vec![[y, x, score]; KeypointIndex::COUNT],
        }
    }

    #[test]
    fn test_movenet_mirrored_to_display_pixels() {
        let config = DetectionConfig::default();
        let frame = normalize(&movenet_all(0.5, 0.25, 0.8), 640, 480, &config, 0.5);
        assert_eq!(frame.len(), KeypointIndex::COUNT);
        let nose = frame.get("nose").unwrap();
        assert!((nose.x - 480.0).abs() < 1e-3);
        assert!((nose.y - 240.0).abs() < 1e-3);
        assert!(nose.visible);
    }

    #[test]
    fn test_mirroring_disabled() {
        let config = DetectionConfig {
            mirror_x: false,
            ..DetectionConfig::default()
        };
        let frame = normalize(&movenet_all(0.5, 0.25, 0.8), 640, 480, &config, 0.5);
        assert!((frame.get("nose").unwrap().x - 160.0).abs() < 1e-3);
    }

    #[test]
    fn test_missing_confidence_uses_fallback() {
        let config = DetectionConfig::default();
        let landmarks = vec![
            NormalizedPoint {
                x: 0.5,
                y: 0.5,
                score: None
            };
            BLAZEPOSE_COUNT
        ];
        let frame = normalize(&RawDetection::BlazePose { landmarks }, 100, 100, &config, 0.5);
        assert_eq!(frame.len(), KeypointIndex::COUNT);
        for lm in frame.iter() {
            assert_eq!(lm.confidence, config.fallback_confidence);
        }
    }

    #[test]
    fn test_malformed_length_yields_empty_frame() {
        let config = DetectionConfig::default();
        let raw = RawDetection::MoveNet {
            keypoints: vec![[0.5, 0.5, 0.9]; 5],
        };
        assert!(normalize(&raw, 640, 480, &config, 0.5).is_empty());
        let raw = RawDetection::Hand { landmarks: vec![] };
        assert!(normalize(&raw, 640, 480, &config, 0.5).is_empty());
    }

    #[test]
    fn test_non_finite_points_dropped() {
        let config = DetectionConfig::default();
        let mut keypoints = vec![[0.5, 0.5, 0.9]; KeypointIndex::COUNT];
        keypoints[0] = [f32::NAN, 0.5, 0.9];
        let frame = normalize(&RawDetection::MoveNet { keypoints }, 640, 480, &config, 0.5);
        assert!(frame.get("nose").is_none());
        assert_eq!(frame.len(), KeypointIndex::COUNT - 1);
    }

    #[test]
    fn test_posenet_pixels_and_unknown_parts() {
        let config = DetectionConfig::default();
        let raw = RawDetection::PoseNet {
            keypoints: vec![
                PartKeypoint { part: "leftWrist".into(), x: 100.0, y: 200.0, score: Some(0.3) },
                PartKeypoint { part: "tail".into(), x: 1.0, y: 1.0, score: Some(0.9) },
            ],
        };
        let frame = normalize(&raw, 640, 480, &config, 0.5);
        assert_eq!(frame.len(), 1);
        let wrist = frame.get("left_wrist").unwrap();
        assert!((wrist.x - 540.0).abs() < 1e-3);
        assert_eq!(wrist.y, 200.0);
        assert!(!wrist.visible);
    }

    #[test]
    fn test_hand_labels() {
        let config = DetectionConfig::default();
        let landmarks = vec![NormalizedPoint { x: 0.1, y: 0.2, score: Some(0.7) }; HAND_LABELS.len()];
        let frame = normalize(&RawDetection::Hand { landmarks }, 200, 100, &config, 0.5);
        assert_eq!(frame.len(), HAND_LABELS.len());
        assert!(frame.get("thumb_tip").is_some());
    }

    #[tokio::test]
    async fn test_not_ready_frame_skipped() {
        let mut adapter = DetectionAdapter::new(
            vec![fixed_probe("posenet", 0, Ok(nose_detection()))],
            DetectionConfig::default(),
            0.5,
        );
        assert_eq!(adapter.detect_frame(None).await, Detection::NotReady);
        let bad = Frame::new(4, 4, vec![0u8; 3]);
        assert_eq!(adapter.detect_frame(Some(&bad)).await, Detection::NotReady);
    }

    #[tokio::test]
    async fn test_probe_order_follows_priority() {
        let adapter = DetectionAdapter::new(
            vec![
                fixed_probe("third", 2, Ok(RawDetection::Empty)),
                fixed_probe("first", 0, Ok(RawDetection::Empty)),
                failing_probe("second", 1),
            ],
            DetectionConfig::default(),
            0.5,
        );
        let names: Vec<String> = adapter
            .probe_backends()
            .await
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["first", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_falls_through() {
        let mut adapter = DetectionAdapter::new(
            vec![
                hanging_probe("slow", 0),
                failing_probe("missing", 1),
                fixed_probe("posenet", 2, Ok(nose_detection())),
            ],
            DetectionConfig::default(),
            0.5,
        );
        let chosen = adapter.initialize().await.unwrap();
        assert_eq!(chosen.name, "posenet");
        assert_eq!(adapter.active_backend().unwrap().name, "posenet");
    }

    #[tokio::test]
    async fn test_detect_frame_normalizes() {
        let mut adapter = DetectionAdapter::new(
            vec![fixed_probe("posenet", 0, Ok(nose_detection()))],
            DetectionConfig::default(),
            0.5,
        );
        let frame = Frame::blank(640, 480);
        match adapter.detect_frame(Some(&frame)).await {
            Detection::Landmarks(lm) => {
                let nose = lm.get("nose").unwrap();
                assert!((nose.x - 540.0).abs() < 1e-3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runtime_unavailable_falls_back() {
        let unavailable = Err(PoseError::BackendUnavailable {
            backend: "gpu".into(),
            reason: "context lost".into(),
        });
        let mut adapter = DetectionAdapter::new(
            vec![
                fixed_probe("gpu", 0, unavailable),
                fixed_probe("cpu", 1, Ok(nose_detection())),
            ],
            DetectionConfig::default(),
            0.5,
        );
        let frame = Frame::blank(640, 480);
        let detection = adapter.detect_frame(Some(&frame)).await;
        assert!(matches!(detection, Detection::Landmarks(ref lm) if lm.len() == 1));
        assert_eq!(adapter.active_backend().unwrap().name, "cpu");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_fallback_resumes_at_next_candidate() {
        let unavailable = Err(PoseError::BackendUnavailable {
            backend: "gpu".into(),
            reason: "context lost".into(),
        });
        let mut adapter = DetectionAdapter::new(
            vec![
                fixed_probe("gpu", 0, unavailable),
                delayed_probe("cpu", 1, Duration::from_millis(100)),
            ],
            DetectionConfig::default(),
            0.5,
        );
        adapter.initialize().await.unwrap();
        assert_eq!(adapter.active_backend().unwrap().name, "gpu");

        // cpu の初期化中に検出を打ち切る
        let frame = Frame::blank(640, 480);
        let cut = timeout(Duration::from_millis(50), adapter.detect_frame(Some(&frame))).await;
        assert!(cut.is_err());
        assert!(adapter.active_backend().is_none());

        // 落ちた gpu には戻らない
        assert!(adapter.ensure_backend().await);
        assert_eq!(adapter.active_backend().unwrap().name, "cpu");
        assert!(matches!(
            adapter.detect_frame(Some(&frame)).await,
            Detection::Landmarks(ref lm) if lm.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_malformed_response_is_empty_frame() {
        let mut adapter = DetectionAdapter::new(
            vec![fixed_probe("posenet", 0, Err(PoseError::MalformedFrame("bad tensor".into())))],
            DetectionConfig::default(),
            0.5,
        );
        let frame = Frame::blank(8, 8);
        assert_eq!(
            adapter.detect_frame(Some(&frame)).await,
            Detection::Landmarks(LandmarkFrame::empty())
        );
        // バックエンドは維持される
        assert!(adapter.active_backend().is_some());
    }

    #[tokio::test]
    async fn test_no_backend() {
        let mut adapter = DetectionAdapter::new(
            vec![failing_probe("a", 0), failing_probe("b", 1)],
            DetectionConfig::default(),
            0.5,
        );
        assert_eq!(adapter.initialize().await, Err(PoseError::NoBackend));
        let frame = Frame::blank(8, 8);
        assert_eq!(adapter.detect_frame(Some(&frame)).await, Detection::NoBackend);
    }
}
