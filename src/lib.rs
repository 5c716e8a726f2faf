pub mod camera;
pub mod config;
pub mod editor;
pub mod error;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod scoring;
pub mod template;
pub mod tracker;
