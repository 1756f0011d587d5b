//! # kdict
//!
//! Kernel dictionary templates and incremental parameter updates for
//! physically-based rendering kernels.
//!
//! A scene is described once as a [`KernelDictTemplate`]: flat dotted paths
//! mapped to parameters that are either fixed at build time or re-evaluated
//! per render context (spectral bin, units, keyword axes). The first render
//! resolves the whole template and builds a kernel object; later renders only
//! resolve the updatable subset and patch the live object in place.
//!
//! ## Modules
//!
//! - [`util`] - Values, kernel dictionaries, paths, errors
//! - [`core`] - Context, parameter model, type-id lookup, kernel traits
//! - [`template`] - Kernel dictionary templates and update maps
//! - [`kernel`] - Object wrapper, traversal and render loops
//! - [`memory`] - In-memory reference kernel
//! - [`settings`] - Persistent render defaults
//! - [`logging`] - Tracing setup
//!
//! ## Example
//!
//! ```ignore
//! use kdict::prelude::*;
//!
//! let mut b = KernelDictTemplate::builder();
//! b.insert_value("type", "scene")?;
//! b.insert_value("surface.type", "rectangle")?;
//! b.insert_value("surface.bsdf.type", "diffuse")?;
//! b.insert(
//!     "surface.bsdf.reflectance",
//!     UpdateParameter::new(|ctx| Ok(ctx.wavelength()? / 1000.0), ParamFlags::SPECTRAL),
//! )?;
//! let template = b.build();
//!
//! let kernel = MemoryKernel::new();
//! let mut wrapper = MitsubaObjectWrapper::new();
//! let ctxs = [KernelContext::mono(550.0), KernelContext::mono(650.0)];
//! let results = mi_render(&kernel, &template, &ctxs, &mut wrapper, &RenderOptions::default())?;
//! ```

pub mod util;
pub mod core;
pub mod template;
pub mod kernel;
pub mod memory;
pub mod settings;
pub mod logging;

// Re-export commonly used types
pub use util::{Error, KernelDict, Result, Value};
pub use core::{InitParameter, KernelContext, ParamFlags, UpdateParameter};
pub use template::{KernelDictTemplate, UpdateMapTemplate};
pub use kernel::{mi_render, mi_render_parallel, mi_traverse, MitsubaObjectWrapper};

/// Crate version with build date and time.
pub fn version_string() -> String {
    format!(
        "{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("KDICT_BUILD_DATE"),
        env!("KDICT_BUILD_TIME")
    )
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, KernelDict, Result, Value};
    pub use crate::core::{
        Evaluator, InitParameter, Kernel, KernelContext, KernelObject, ObjectType, ParamFlags,
        SpectralIndex, TypeIdLookupStrategy, UnitContext, UpdateParameter,
    };
    pub use crate::template::{KernelDictTemplate, ParameterPatch, UpdateMapTemplate};
    pub use crate::kernel::{
        mi_render, mi_render_parallel, mi_render_shared, mi_render_with, mi_render_wrapper, mi_traverse,
        MitsubaObjectWrapper, RenderOptions, RenderResults, WrapperState,
    };
    pub use crate::memory::MemoryKernel;
    pub use crate::settings::Settings;
}
