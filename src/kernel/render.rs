//! Render entry points.
//!
//! [`mi_render`] drives one wrapper across a sequence of contexts: the first
//! context (or any shape change) builds the kernel object, later ones only
//! patch it. [`mi_render_parallel`] trades memory for speed and builds one
//! object per context on the rayon pool.

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, info_span};

use super::{MitsubaObjectWrapper, SharedWrapper};
use crate::core::{Kernel, KernelContext, KernelObject, NodeId, ParamFlags, RawBuffer};
use crate::settings::Settings;
use crate::template::KernelDictTemplate;
use crate::util::{Error, Result};

/// Per-call render configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    /// Samples per pixel.
    pub spp: u32,
    /// Sensors to render by name; all sensors when `None`.
    pub sensors: Option<Vec<String>>,
    /// Update parameters re-evaluated between contexts.
    pub update_flags: ParamFlags,
    /// Base seed. Each (context, sensor) render gets its own seed derived from it.
    pub seed: u64,
    /// Build one wrapper per context on the rayon pool in [`mi_render_with`].
    pub parallel: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl RenderOptions {
    /// Options from persisted settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            spp: settings.spp,
            sensors: settings.sensors.clone(),
            update_flags: settings.update_flags,
            seed: settings.seed,
            parallel: settings.parallel,
        }
    }

    pub fn with_spp(mut self, spp: u32) -> Self {
        self.spp = spp;
        self
    }

    pub fn with_sensors<S: Into<String>>(mut self, sensors: impl IntoIterator<Item = S>) -> Self {
        self.sensors = Some(sensors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_update_flags(mut self, flags: ParamFlags) -> Self {
        self.update_flags = flags;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Seed of the `ordinal`-th (context, sensor) render.
    pub fn seed_for(&self, ordinal: usize) -> u64 {
        self.seed.wrapping_add(ordinal as u64)
    }
}

/// Raw buffers keyed by spectral index id, then sensor name.
pub type RenderResults = IndexMap<String, IndexMap<String, RawBuffer>>;

/// Result keys of `ctxs`; two contexts sharing an index id are rejected.
fn result_keys(ctxs: &[KernelContext]) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::with_capacity(ctxs.len());
    for ctx in ctxs {
        let key = ctx.index_id();
        if keys.contains(&key) {
            return Err(Error::DuplicateContext(key));
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Render `template` for every context through one wrapper.
///
/// Per context: the wrapper is built when it is not current for `template`
/// (first render, stale, shape change), otherwise the update map is resolved
/// for `options.update_flags` and applied. Errors propagate unchanged; a
/// failed resolve never reaches the kernel. An update error that calls for a
/// rebuild marks the wrapper stale, so the next call builds afresh.
///
/// Results are keyed by [`KernelContext::index_id`]; contexts sharing an id
/// fail with [`Error::DuplicateContext`] before anything is rendered.
#[tracing::instrument(level = "info", skip_all, fields(kernel = kernel.name(), contexts = ctxs.len()))]
pub fn mi_render<K: Kernel>(
    kernel: &K,
    template: &KernelDictTemplate,
    ctxs: &[KernelContext],
    wrapper: &mut MitsubaObjectWrapper<K::Object>,
    options: &RenderOptions,
) -> Result<RenderResults> {
    let keys = result_keys(ctxs)?;
    let mut results = RenderResults::new();

    for (i, (ctx, index_id)) in ctxs.iter().zip(keys).enumerate() {
        let span = info_span!("context", index = %index_id);
        let _enter = span.enter();

        wrapper.refresh(template);
        if wrapper.is_current_for(template) {
            match wrapper.update(ctx, options.update_flags) {
                Ok(patch) => debug!(values = patch.len(), "updated kernel object"),
                Err(e) => {
                    if e.requires_rebuild() {
                        wrapper.mark_stale();
                    }
                    return Err(e);
                }
            }
        } else {
            wrapper.build(kernel, template, ctx)?;
        }

        let buffers = render_sensors(kernel, wrapper, options, i)?;
        results.insert(index_id, buffers);
    }

    info!(renders = results.values().map(IndexMap::len).sum::<usize>(), "render complete");
    Ok(results)
}

/// Render a wrapper that was not built from a template (e.g. traversed).
///
/// Every context goes through the wrapper's own update map.
#[tracing::instrument(level = "info", skip_all, fields(kernel = kernel.name(), contexts = ctxs.len()))]
pub fn mi_render_wrapper<K: Kernel>(
    kernel: &K,
    wrapper: &mut MitsubaObjectWrapper<K::Object>,
    ctxs: &[KernelContext],
    options: &RenderOptions,
) -> Result<RenderResults> {
    let keys = result_keys(ctxs)?;
    let mut results = RenderResults::new();
    for (i, (ctx, index_id)) in ctxs.iter().zip(keys).enumerate() {
        wrapper.update(ctx, options.update_flags)?;
        results.insert(index_id, render_sensors(kernel, wrapper, options, i)?);
    }
    Ok(results)
}

/// Render every context concurrently, one wrapper each.
///
/// Seeds match those of [`mi_render`] over the same contexts.
#[tracing::instrument(level = "info", skip_all, fields(kernel = kernel.name(), contexts = ctxs.len()))]
pub fn mi_render_parallel<K: Kernel>(
    kernel: &K,
    template: &KernelDictTemplate,
    ctxs: &[KernelContext],
    options: &RenderOptions,
) -> Result<RenderResults> {
    let keys = result_keys(ctxs)?;
    let rendered: Vec<IndexMap<String, RawBuffer>> = ctxs
        .par_iter()
        .enumerate()
        .map(|(i, ctx)| -> Result<IndexMap<String, RawBuffer>> {
            let mut wrapper = MitsubaObjectWrapper::new();
            wrapper.build(kernel, template, ctx)?;
            render_sensors(kernel, &wrapper, options, i)
        })
        .collect::<Result<_>>()?;

    Ok(keys.into_iter().zip(rendered).collect())
}

/// Dispatch on [`RenderOptions::parallel`].
///
/// Sequential renders go through `wrapper`; parallel renders build their own
/// wrappers and leave it untouched.
pub fn mi_render_with<K: Kernel>(
    kernel: &K,
    template: &KernelDictTemplate,
    ctxs: &[KernelContext],
    wrapper: &mut MitsubaObjectWrapper<K::Object>,
    options: &RenderOptions,
) -> Result<RenderResults> {
    if options.parallel {
        mi_render_parallel(kernel, template, ctxs, options)
    } else {
        mi_render(kernel, template, ctxs, wrapper, options)
    }
}

/// [`mi_render`] on a wrapper behind a lock, held for the whole call.
pub fn mi_render_shared<K: Kernel>(
    kernel: &K,
    template: &KernelDictTemplate,
    ctxs: &[KernelContext],
    wrapper: &SharedWrapper<K::Object>,
    options: &RenderOptions,
) -> Result<RenderResults> {
    let mut guard = wrapper.lock();
    mi_render(kernel, template, ctxs, &mut guard, options)
}

fn render_sensors<K: Kernel>(
    kernel: &K,
    wrapper: &MitsubaObjectWrapper<K::Object>,
    options: &RenderOptions,
    ctx_ordinal: usize,
) -> Result<IndexMap<String, RawBuffer>> {
    let obj = wrapper.object().ok_or(Error::Unbuilt)?;
    let sensors = select_sensors(obj, options.sensors.as_deref())?;

    let mut buffers = IndexMap::with_capacity(sensors.len());
    for (j, (name, sensor)) in sensors.iter().enumerate() {
        let seed = options.seed_for(ctx_ordinal * sensors.len() + j);
        debug!(sensor = name.as_str(), spp = options.spp, seed, "rendering sensor");
        let buffer = kernel.render(obj, *sensor, options.spp, seed)?;
        buffers.insert(name.clone(), buffer);
    }
    Ok(buffers)
}

fn select_sensors<O: KernelObject>(obj: &O, requested: Option<&[String]>) -> Result<Vec<(String, NodeId)>> {
    let named: Vec<(String, NodeId)> = obj
        .sensors()
        .into_iter()
        .map(|n| (obj.node_name(n).unwrap_or_default(), n))
        .collect();

    match requested {
        None => Ok(named),
        Some(names) => names
            .iter()
            .map(|name| {
                named
                    .iter()
                    .find(|(n, _)| n == name)
                    .cloned()
                    .ok_or_else(|| Error::Kernel(format!("scene has no sensor '{name}'")))
            })
            .collect(),
    }
}
