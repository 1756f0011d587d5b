//! Utility types shared by every layer.
//!
//! - [`Value`] / [`KernelDict`] - Kernel literals and the wire dictionary
//! - [`path`] - Dot-separated parameter paths
//! - [`Error`] / [`Result`] - Error handling

mod error;
pub mod path;
mod value;

pub use error::*;
pub use value::*;
