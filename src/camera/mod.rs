pub mod capture;

pub use capture::{BlankSource, Frame, FrameSlot, FrameSource};
