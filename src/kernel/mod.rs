//! Kernel layer - live objects, traversal and rendering.
//!
//! This module provides:
//! - [`MitsubaObjectWrapper`] - Backend object plus its parameter index
//! - [`mi_traverse`] - Index a live object graph
//! - [`mi_render`] / [`mi_render_parallel`] - Build-or-update render loops

mod render;
mod traverse;
mod wrapper;

pub use render::{
    mi_render, mi_render_parallel, mi_render_shared, mi_render_with, mi_render_wrapper, RenderOptions,
    RenderResults,
};
pub use traverse::mi_traverse;
pub use wrapper::{MitsubaObjectWrapper, ParameterHandle, SceneParameters, SharedWrapper, WrapperState};
