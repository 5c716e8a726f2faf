pub mod authoring;
pub mod viewport;

pub use authoring::{EditorEvent, KeypointEditor, PendingPlacement, PointerButton, Tool};
pub use viewport::Viewport;
