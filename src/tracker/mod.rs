pub mod hold;
pub mod session;
pub mod stability;

pub use hold::{duration_score, HoldTimer};
pub use session::{ScoreSnapshot, ScoringSession, SessionState};
pub use stability::FrameHistory;
