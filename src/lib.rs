//! Signed-distance-field scene graphs compiled to a ray-marching GLSL shader.

pub mod config;
pub mod graph;
pub mod registry;
pub mod renderer;
pub mod scene;
pub mod signature;
pub mod types;
