use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;

use super::backend::{BackendDescriptor, BackendKind, BackendProbe, PoseBackend, RawDetection};
use crate::camera::Frame;
use crate::error::{PoseError, PoseResult};

/// 記録済みの検出結果を順に返すバックエンド
///
/// 記録を使い切ると `BackendUnavailable` を返す。
pub struct ReplayBackend {
    descriptor: BackendDescriptor,
    frames: Arc<Vec<RawDetection>>,
    cursor: usize,
}

impl ReplayBackend {
    pub fn new(frames: Vec<RawDetection>) -> Self {
        Self::shared(Arc::new(frames))
    }

    fn shared(frames: Arc<Vec<RawDetection>>) -> Self {
        Self {
            descriptor: BackendDescriptor::new("replay", BackendKind::Replay, 0),
            frames,
            cursor: 0,
        }
    }

    /// JSON 配列 (`[{"backend": "move_net", ...}, ...]`) から読み込む
    pub fn from_json_str(json: &str) -> Result<Vec<RawDetection>> {
        let frames: Vec<RawDetection> =
            serde_json::from_str(json).context("Failed to parse replay recording")?;
        Ok(frames)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<RawDetection>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// 初期化のたびに先頭から再生する候補を作る
    pub fn probe(frames: Vec<RawDetection>, priority: u32) -> BackendProbe {
        let frames = Arc::new(frames);
        let mut descriptor = BackendDescriptor::new("replay", BackendKind::Replay, priority);
        descriptor.landmark_count = frames
            .iter()
            .find_map(|f| match f {
                RawDetection::MoveNet { keypoints } => Some(keypoints.len()),
                RawDetection::BlazePose { landmarks } | RawDetection::Hand { landmarks } => {
                    Some(landmarks.len())
                }
                RawDetection::PoseNet { keypoints } => Some(keypoints.len()),
                RawDetection::Empty => None,
            })
            .unwrap_or(descriptor.landmark_count);
        let d = descriptor.clone();
        BackendProbe::new(descriptor, move || {
            let mut backend = ReplayBackend::shared(frames.clone());
            backend.descriptor = d.clone();
            async move { Ok(Box::new(backend) as Box<dyn PoseBackend>) }
        })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len() - self.cursor
    }
}

impl PoseBackend for ReplayBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn infer<'a>(&'a mut self, _frame: &'a Frame) -> BoxFuture<'a, PoseResult<RawDetection>> {
        let next = self.frames.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        let name = self.descriptor.name.clone();
        async move {
            next.ok_or(PoseError::BackendUnavailable {
                backend: name,
                reason: "recording exhausted".into(),
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_unavailable() {
        let mut backend = ReplayBackend::new(vec![RawDetection::Empty, RawDetection::Empty]);
        let frame = Frame::blank(2, 2);
        assert_eq!(backend.remaining(), 2);
        assert_eq!(backend.infer(&frame).await, Ok(RawDetection::Empty));
        assert_eq!(backend.infer(&frame).await, Ok(RawDetection::Empty));
        assert!(matches!(
            backend.infer(&frame).await,
            Err(PoseError::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn test_parse_recording() {
        let json = r#"[
            {"backend": "empty"},
            {"backend": "move_net", "keypoints": [[0.5, 0.5, 0.9]]}
        ]"#;
        let frames = ReplayBackend::from_json_str(json).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[1], RawDetection::MoveNet { .. }));
        assert!(ReplayBackend::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_bundled_mountain_recording() {
        use crate::config::{DetectionConfig, RecognitionConfig};
        use crate::pose::normalize;
        use crate::scoring::{Recognizer, Stance};

        let frames = ReplayBackend::from_json_str(include_str!("../../demos/mountain.json")).unwrap();
        assert_eq!(frames.len(), 61);
        assert_eq!(frames[20], RawDetection::Empty);

        let frame = normalize(&frames[0], 640, 480, &DetectionConfig::default(), 0.5);
        assert_eq!(frame.len(), 17);
        let recognizer = Recognizer::new(RecognitionConfig::default(), 0.5);
        assert_eq!(recognizer.recognize(&frame).stance(), Some(Stance::Mountain));
    }

    #[tokio::test]
    async fn test_probe_restarts_recording() {
        let probe = ReplayBackend::probe(vec![RawDetection::Empty], 3);
        assert_eq!(probe.descriptor.priority, 3);
        let frame = Frame::blank(2, 2);
        for _ in 0..2 {
            let mut backend = probe.initialize().await.unwrap();
            assert_eq!(backend.infer(&frame).await, Ok(RawDetection::Empty));
        }
    }
}
