//! Resource-graph composition over wgpu.
//!
//! Builds GPU objects (samplers, buffers, shader modules, pipelines,
//! textures, bind groups) as nodes of the reactive graph from
//! `voluma-provider`, so a window resize, a settings change, or an asset
//! reload re-creates exactly the affected resources, lazily, on the next
//! frame's access.
//!
//! # Invariants
//! - Nodes are created once at startup; change flows through `set` on the
//!   source nodes, never by restructuring the graph.
//! - Asynchronous creation (shader compile, pipeline build) is cached as the
//!   in-flight future itself and resolved by the draw step.
//! - The per-frame swapchain view is never cached across frames.

mod camera;
mod frame;
mod graph;
pub mod shaders;

pub use camera::OrbitCamera;
pub use frame::{FrameApp, FrameLoop};
pub use graph::{
    RenderError, RenderSettings, SceneGraph, ScenePaths, SurfaceParams, Uniforms, VOLUME_DESC,
};
