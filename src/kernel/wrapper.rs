//! Live kernel object wrapper.
//!
//! A [`MitsubaObjectWrapper`] owns a backend object together with the index
//! needed to patch it: backend parameter id → node attribute. It moves through
//! `Unbuilt → Built → Stale → Built` as templates change shape.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, info_span};

use super::mi_traverse;
use crate::core::{Kernel, KernelContext, KernelObject, NodeId, ObjectType, ParamFlags};
use crate::template::{KernelDictTemplate, ParameterPatch, ShapeToken, UpdateMapTemplate};
use crate::util::{Error, Result};

/// Lifecycle of a wrapper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapperState {
    /// No backend object.
    #[default]
    Unbuilt,
    /// Object matches the template it was built from.
    Built,
    /// Template shape changed; the object must be rebuilt before updates.
    Stale,
}

/// Location of an updatable attribute in the object graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterHandle {
    pub node: NodeId,
    /// Attribute name, relative to the node.
    pub name: String,
    pub object_type: ObjectType,
}

/// Index of the updatable attributes of a live object.
#[derive(Clone, Debug, Default)]
pub struct SceneParameters {
    index: IndexMap<String, ParameterHandle>,
    nodes: Vec<NodeId>,
}

impl SceneParameters {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: String, handle: ParameterHandle) {
        self.index.insert(id, handle);
    }

    pub(crate) fn push_node(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    /// Handle of a parameter id.
    pub fn get(&self, id: &str) -> Option<&ParameterHandle> {
        self.index.get(id)
    }

    /// Check if a parameter id is indexed.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of indexed parameters.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterate over parameters in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterHandle)> {
        self.index.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameter ids in traversal order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Nodes visited by traversal, each once.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

/// Backend object plus its parameter index.
pub struct MitsubaObjectWrapper<O> {
    obj: Option<O>,
    parameters: SceneParameters,
    umap_template: Option<UpdateMapTemplate>,
    shape: Option<ShapeToken>,
    state: WrapperState,
    build_count: u64,
}

/// Wrapper shared between threads; holders serialise updates and renders.
pub type SharedWrapper<O> = Arc<Mutex<MitsubaObjectWrapper<O>>>;

impl<O> Default for MitsubaObjectWrapper<O> {
    fn default() -> Self {
        Self {
            obj: None,
            parameters: SceneParameters::new(),
            umap_template: None,
            shape: None,
            state: WrapperState::Unbuilt,
            build_count: 0,
        }
    }
}

impl<O> fmt::Debug for MitsubaObjectWrapper<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MitsubaObjectWrapper")
            .field("state", &self.state)
            .field("parameters", &self.parameters.len())
            .field("shape", &self.shape)
            .field("build_count", &self.build_count)
            .finish_non_exhaustive()
    }
}

impl<O: KernelObject> MitsubaObjectWrapper<O> {
    /// Create an unbuilt wrapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a traversed object. No template shape is attached.
    pub(crate) fn from_traversal(obj: O, parameters: SceneParameters, umap_template: UpdateMapTemplate) -> Self {
        Self {
            obj: Some(obj),
            parameters,
            umap_template: Some(umap_template),
            shape: None,
            state: WrapperState::Built,
            build_count: 0,
        }
    }

    /// Fully resolve `template`, load it and index the result.
    ///
    /// Every update map entry must land on an indexed parameter, otherwise
    /// the build fails with [`Error::UnknownParameter`]. Any error leaves the
    /// wrapper untouched.
    pub fn build<K>(&mut self, kernel: &K, template: &KernelDictTemplate, ctx: &KernelContext) -> Result<()>
    where
        K: Kernel<Object = O>,
    {
        let span = info_span!("build", kernel = kernel.name(), index = %ctx.index_id());
        let _enter = span.enter();

        let dict = template.resolve(ctx)?;
        let obj = kernel.load_dict(&dict)?;
        let traversed = mi_traverse(obj, Some(template.extract_update_map()))?;
        traversed.check_update_ids()?;

        *self = Self {
            shape: Some(template.shape_token()),
            build_count: self.build_count + 1,
            ..traversed
        };
        info!(
            parameters = self.parameters.len(),
            builds = self.build_count,
            "built kernel object"
        );
        Ok(())
    }

    fn check_update_ids(&self) -> Result<()> {
        let Some(umap) = &self.umap_template else {
            return Ok(());
        };
        for (key, _) in umap.iter() {
            let id = umap.parameter_id(key)?;
            if !self.parameters.contains(id) {
                debug!(path = key, parameter_id = id, "update target not indexed");
                return Err(Error::UnknownParameter { path: id.to_string() });
            }
        }
        Ok(())
    }

    /// Force a rebuild before the next update.
    pub fn mark_stale(&mut self) {
        if self.state == WrapperState::Built {
            debug!("wrapper marked stale");
            self.state = WrapperState::Stale;
        }
    }

    /// Mark the wrapper stale if `template` no longer matches its shape.
    pub fn refresh(&mut self, template: &KernelDictTemplate) -> WrapperState {
        if self.state == WrapperState::Built && self.shape != Some(template.shape_token()) {
            debug!(template = template.shape_token().value(), "template shape changed");
            self.state = WrapperState::Stale;
        }
        self.state
    }

    /// Whether `template` can drive this wrapper by updates alone.
    ///
    /// True when the wrapper is built and was built from a template with the
    /// same shape token. Any other case requires [`build`](Self::build).
    pub fn is_current_for(&self, template: &KernelDictTemplate) -> bool {
        self.state == WrapperState::Built && self.shape == Some(template.shape_token())
    }

    /// Write a patch into the object.
    ///
    /// Every id is checked against the index, and every value against the
    /// current attribute type, before the first write. On failure the object
    /// is left unchanged.
    pub fn apply(&mut self, patch: &ParameterPatch) -> Result<()> {
        match self.state {
            WrapperState::Unbuilt => return Err(Error::Unbuilt),
            WrapperState::Stale => return Err(Error::StaleWrapper),
            WrapperState::Built => {}
        }
        let obj = self.obj.as_mut().ok_or(Error::Unbuilt)?;

        let mut writes = Vec::with_capacity(patch.len());
        for (id, value) in patch.iter() {
            let handle = self
                .parameters
                .get(id)
                .ok_or_else(|| Error::UnknownParameter { path: id.to_string() })?;
            if let Some(current) = obj.read(handle.node, &handle.name) {
                if !current.is_compatible(value) {
                    return Err(Error::TypeMismatch {
                        path: id.to_string(),
                        expected: current.type_name().to_string(),
                        actual: value.type_name().to_string(),
                    });
                }
            }
            writes.push((handle, value));
        }

        let mut touched: Vec<NodeId> = Vec::new();
        for (handle, value) in writes {
            obj.write(handle.node, &handle.name, value.clone())?;
            if !touched.contains(&handle.node) {
                touched.push(handle.node);
            }
        }
        obj.commit(&touched)?;

        debug!(values = patch.len(), nodes = touched.len(), "applied patch");
        Ok(())
    }

    /// Resolve the update map for `ctx` and apply it.
    ///
    /// Only entries whose flags intersect `flags` are resolved.
    pub fn update(&mut self, ctx: &KernelContext, flags: ParamFlags) -> Result<ParameterPatch> {
        match self.state {
            WrapperState::Unbuilt => return Err(Error::Unbuilt),
            WrapperState::Stale => return Err(Error::StaleWrapper),
            WrapperState::Built => {}
        }
        let patch = self
            .umap_template
            .as_ref()
            .ok_or(Error::Unbuilt)?
            .resolve_flags(ctx, flags)?;
        self.apply(&patch)?;
        Ok(patch)
    }

    /// Current state.
    pub fn state(&self) -> WrapperState {
        self.state
    }

    /// Number of full builds performed through this wrapper.
    pub fn build_count(&self) -> u64 {
        self.build_count
    }

    /// Backend object, if built.
    pub fn object(&self) -> Option<&O> {
        self.obj.as_ref()
    }

    /// Parameter index.
    pub fn parameters(&self) -> &SceneParameters {
        &self.parameters
    }

    /// Update map with traversal-resolved ids.
    pub fn umap_template(&self) -> Option<&UpdateMapTemplate> {
        self.umap_template.as_ref()
    }

    /// Replace the update map, e.g. with one from [`UpdateMapTemplate::bind`].
    pub fn set_umap_template(&mut self, umap_template: UpdateMapTemplate) {
        self.umap_template = Some(umap_template);
    }

    /// Shape token of the template the object was built from.
    pub fn shape_token(&self) -> Option<ShapeToken> {
        self.shape
    }

    /// Take the backend object out, leaving the wrapper unbuilt.
    pub fn into_object(self) -> Option<O> {
        self.obj
    }

    /// Move into a [`SharedWrapper`].
    pub fn into_shared(self) -> SharedWrapper<O> {
        Arc::new(Mutex::new(self))
    }
}
