pub mod evaluator;
pub mod geometry;
pub mod recognize;

pub use evaluator::{CheckOutcome, CheckStatus, EvaluationResult, Evaluator};
pub use recognize::{Recognition, Recognizer, Stance, StanceScore};
