use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::backend::{BackendDescriptor, BackendKind, BackendProbe, PoseBackend, RawDetection};
use super::keypoint::KeypointIndex;
use super::preprocess::preprocess_for_movenet;
use crate::camera::Frame;
use crate::error::{PoseError, PoseResult};

/// ONNX Runtime で MoveNet を動かすバックエンド
pub struct MoveNetDetector {
    descriptor: BackendDescriptor,
    session: Arc<Mutex<Session>>,
}

impl MoveNetDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self {
            descriptor: BackendDescriptor::new("movenet-onnx", BackendKind::MoveNet, 0),
            session: Arc::new(Mutex::new(session)),
        })
    }

    /// モデル読み込みをブロッキングスレッドで行う候補
    pub fn probe(model_path: PathBuf, priority: u32) -> BackendProbe {
        let descriptor = BackendDescriptor::new("movenet-onnx", BackendKind::MoveNet, priority);
        let d = descriptor.clone();
        BackendProbe::new(descriptor, move || {
            let path = model_path.clone();
            let d = d.clone();
            async move {
                let loaded = tokio::task::spawn_blocking(move || MoveNetDetector::new(&path))
                    .await
                    .map_err(|e| unavailable(&d.name, e))?;
                let mut detector = loaded.map_err(|e| unavailable(&d.name, e))?;
                detector.descriptor = d;
                Ok(Box::new(detector) as Box<dyn PoseBackend>)
            }
        })
    }
}

fn unavailable(name: &str, reason: impl std::fmt::Display) -> PoseError {
    PoseError::BackendUnavailable {
        backend: name.to_string(),
        reason: format!("{:#}", reason),
    }
}

/// 入力: [1, 192, 192, 3] の f32 テンソル
/// 出力: 17 × [y, x, confidence]
fn run_movenet(session: &mut Session, input: Array4<f32>) -> Result<Vec<[f32; 3]>> {
    let input_tensor = Tensor::from_array(input)?;
    let outputs = session
        .run(ort::inputs!["serving_default_input_0" => input_tensor])
        .context("Inference failed")?;

    // MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)
    let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
        .try_extract_array()
        .context("Failed to extract output tensor")?;

    if output.shape() != [1, 1, KeypointIndex::COUNT, 3] {
        anyhow::bail!("unexpected output shape {:?}", output.shape());
    }

    let keypoints = (0..KeypointIndex::COUNT)
        .map(|i| [output[[0, 0, i, 0]], output[[0, 0, i, 1]], output[[0, 0, i, 2]]])
        .collect();
    Ok(keypoints)
}

impl PoseBackend for MoveNetDetector {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn infer<'a>(&'a mut self, frame: &'a Frame) -> BoxFuture<'a, PoseResult<RawDetection>> {
        async move {
            let input = preprocess_for_movenet(frame)?;
            let session = self.session.clone();
            let name = self.descriptor.name.clone();
            let result = tokio::task::spawn_blocking(move || {
                let mut guard = session
                    .lock()
                    .map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
                run_movenet(&mut guard, input)
            })
            .await
            .map_err(|e| unavailable(&name, e))?;

            match result {
                Ok(keypoints) => Ok(RawDetection::MoveNet { keypoints }),
                Err(e) => Err(PoseError::MalformedFrame(format!("{:#}", e))),
            }
        }
        .boxed()
    }
}
