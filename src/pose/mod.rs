pub mod adapter;
pub mod backend;
#[cfg(feature = "onnx")]
pub mod detector;
pub mod keypoint;
#[cfg(feature = "onnx")]
pub mod preprocess;
pub mod replay;

pub use adapter::{normalize, Detection, DetectionAdapter};
pub use backend::{
    BackendDescriptor, BackendKind, BackendProbe, NormalizedPoint, PartKeypoint, PoseBackend,
    RawDetection,
};
#[cfg(feature = "onnx")]
pub use detector::MoveNetDetector;
pub use keypoint::{KeypointIndex, Landmark, LandmarkCatalog, LandmarkFrame};
#[cfg(feature = "onnx")]
pub use preprocess::preprocess_for_movenet;
pub use replay::ReplayBackend;
