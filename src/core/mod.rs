//! Core layer - parameter model and kernel traits.
//!
//! This module provides:
//! - [`KernelContext`] - Per-render evaluation axes (spectral index, units)
//! - [`InitParameter`] / [`UpdateParameter`] - Template entries
//! - [`ObjectType`] / [`TypeIdLookupStrategy`] - Type-id resolution
//! - Abstract traits for rendering kernels and their live objects

mod context;
mod lookup;
mod params;
mod traits;

pub use context::{KernelContext, SpectralIndex, UnitContext};
pub use lookup::{lookup_type_id, supported_plugins, ObjectType, TypeIdLookupStrategy};
pub use params::{EvalFn, Evaluator, InitParameter, ParamFlags, Parameter, UpdateParameter};
pub use traits::{Kernel, KernelObject, NodeId, NodeInfo, ParamInfo, RawBuffer};
