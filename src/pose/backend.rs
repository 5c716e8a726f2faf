//! Detection backend boundary.
//!
//! Each backend reports landmarks in its own native shape ([`RawDetection`]).
//! Those shapes never leave the `pose` module: the adapter turns them into a
//! canonical [`LandmarkFrame`](super::LandmarkFrame).

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::camera::Frame;
use crate::error::PoseResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    MoveNet,
    BlazePose,
    PoseNet,
    HandLandmarker,
    Replay,
}

/// バックエンドの能力記述子
#[derive(Debug, Clone, PartialEq)]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    /// 小さいほど優先
    pub priority: u32,
    /// 出力するランドマーク数
    pub landmark_count: usize,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, kind: BackendKind, priority: u32) -> Self {
        let landmark_count = match kind {
            BackendKind::MoveNet | BackendKind::PoseNet | BackendKind::Replay => 17,
            BackendKind::BlazePose => 33,
            BackendKind::HandLandmarker => 21,
        };
        Self {
            name: name.into(),
            kind,
            priority,
            landmark_count,
        }
    }
}

/// 正規化座標 (0.0〜1.0) の点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
    /// visibility / score。返さないバックエンドもある
    #[serde(default)]
    pub score: Option<f32>,
}

/// ピクセル座標の名前付き部位 (PoseNet 形式)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartKeypoint {
    pub part: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub score: Option<f32>,
}

/// バックエンド固有の出力形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum RawDetection {
    /// MoveNet: 17 × [y, x, score]、正規化座標
    MoveNet { keypoints: Vec<[f32; 3]> },
    /// BlazePose: 33点、正規化座標
    BlazePose { landmarks: Vec<NormalizedPoint> },
    /// PoseNet: ピクセル座標、部位名付き
    PoseNet { keypoints: Vec<PartKeypoint> },
    /// 手: 21点、正規化座標
    Hand { landmarks: Vec<NormalizedPoint> },
    /// 人物なし
    Empty,
}

/// 推論バックエンド
pub trait PoseBackend: Send {
    fn descriptor(&self) -> &BackendDescriptor;

    /// 1フレーム分の推論。利用不能になった場合は `BackendUnavailable` を返す
    fn infer<'a>(&'a mut self, frame: &'a Frame) -> BoxFuture<'a, PoseResult<RawDetection>>;
}

type BackendFactory =
    Box<dyn Fn() -> BoxFuture<'static, PoseResult<Box<dyn PoseBackend>>> + Send + Sync>;

/// バックエンド候補: 記述子 + 初期化処理
pub struct BackendProbe {
    pub descriptor: BackendDescriptor,
    factory: BackendFactory,
}

impl BackendProbe {
    pub fn new<F, Fut>(descriptor: BackendDescriptor, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PoseResult<Box<dyn PoseBackend>>> + Send + 'static,
    {
        Self {
            descriptor,
            factory: Box::new(move || factory().boxed()),
        }
    }

    /// バックエンドを初期化する。タイムアウトは呼び出し側が付ける
    pub fn initialize(&self) -> BoxFuture<'static, PoseResult<Box<dyn PoseBackend>>> {
        (self.factory)()
    }
}

impl fmt::Debug for BackendProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendProbe")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
