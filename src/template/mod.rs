//! Template layer - context-independent scene descriptions.
//!
//! This module provides:
//! - [`KernelDictTemplate`] - Frozen path → parameter mapping
//! - [`UpdateMapTemplate`] - Updatable projection of a template
//! - [`ParameterPatch`] - Resolved update map, ready to apply
//! - [`ShapeToken`] - Staleness token of the non-updatable structure

mod kernel_dict;
mod shape;
mod update_map;

pub use kernel_dict::{KernelDictTemplate, KernelDictTemplateBuilder};
pub use shape::ShapeToken;
pub use update_map::{ParameterPatch, UpdateMapTemplate};
