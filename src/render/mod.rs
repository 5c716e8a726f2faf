pub mod skeleton;

pub use skeleton::{
    connections, skeleton_edges, visible_segments, Segment, HAND_CONNECTIONS, SKELETON_CONNECTIONS,
};
