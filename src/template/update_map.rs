//! Update maps and parameter patches.
//!
//! An [`UpdateMapTemplate`] is the updatable subset of a template. Resolving
//! it yields a [`ParameterPatch`] keyed by backend parameter id, which is then
//! written into a live object through its wrapper.

use indexmap::IndexMap;

use crate::core::{Evaluator, KernelContext, KernelObject, ParamFlags, Parameter, UpdateParameter};
use crate::kernel::MitsubaObjectWrapper;
use crate::util::{Error, Result, Value};

/// Resolved update: backend parameter id → literal, in resolution order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterPatch {
    values: IndexMap<String, Value>,
}

impl ParameterPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value.
    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(id.into(), value.into());
    }

    /// Get a value.
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for ParameterPatch {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

/// Updatable parameters, keyed by template path.
///
/// Non-updatable paths that entries reference are carried along as sources:
/// they are evaluated to resolve references but never patched.
#[derive(Clone, Debug, Default)]
pub struct UpdateMapTemplate {
    entries: IndexMap<String, UpdateParameter>,
    sources: IndexMap<String, Evaluator>,
}

impl UpdateMapTemplate {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: impl IntoIterator<Item = (String, UpdateParameter)>) -> Self {
        Self { entries: entries.into_iter().collect(), sources: IndexMap::new() }
    }

    pub(crate) fn with_sources(mut self, sources: IndexMap<String, Evaluator>) -> Self {
        self.sources = sources;
        self
    }

    /// Non-updatable paths kept to resolve references.
    pub fn sources(&self) -> impl Iterator<Item = (&str, &Evaluator)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert an entry; init parameters are rejected.
    pub fn insert(&mut self, key: impl Into<String>, param: impl Into<Parameter>) -> Result<()> {
        let key = key.into();
        let param = param.into().into_update(&key)?;
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicatePath(key));
        }
        self.entries.insert(key, param);
        Ok(())
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &str) -> Option<UpdateParameter> {
        self.entries.shift_remove(key)
    }

    /// Get an entry.
    pub fn get(&self, key: &str) -> Option<&UpdateParameter> {
        self.entries.get(key)
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&str, &mut UpdateParameter)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UpdateParameter)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// New map with one entry driven by another evaluator.
    pub fn bind(&self, key: &str, evaluator: Evaluator) -> Result<Self> {
        let mut out = self.clone();
        let entry = out
            .entries
            .get_mut(key)
            .ok_or_else(|| Error::UnknownParameter { path: key.to_string() })?;
        *entry = entry.clone().with_evaluator(evaluator);
        Ok(out)
    }

    /// Backend id an entry is written to.
    ///
    /// Entries carrying a lookup strategy need a traversal to have resolved
    /// their id; other entries fall back to their template path.
    pub fn parameter_id<'a>(&'a self, key: &'a str) -> Result<&'a str> {
        let param = self
            .entries
            .get(key)
            .ok_or_else(|| Error::unresolved(key, "no such path"))?;
        match (param.parameter_id(), param.lookup_strategy()) {
            (Some(id), _) => Ok(id),
            (None, Some(lookup)) => Err(Error::unresolved(
                key,
                format!("no {} node with id '{}' was traversed", lookup.node_type, lookup.node_id),
            )),
            (None, None) => Ok(key),
        }
    }

    /// Resolve every entry.
    pub fn resolve(&self, ctx: &KernelContext) -> Result<ParameterPatch> {
        self.resolve_flags(ctx, ParamFlags::ALL)
    }

    /// Resolve the entries whose flags intersect `flags`.
    pub fn resolve_flags(&self, ctx: &KernelContext, flags: ParamFlags) -> Result<ParameterPatch> {
        let mut patch = ParameterPatch::new();
        for (key, param) in &self.entries {
            if !param.flags().intersects(flags) {
                continue;
            }
            let id = self.parameter_id(key)?;
            let value = self.eval_path(key, param.evaluator(), ctx, &mut Vec::new())?;
            patch.insert(id, value);
        }
        Ok(patch)
    }

    fn lookup_evaluator(&self, key: &str) -> Option<(&str, &Evaluator)> {
        self.entries
            .get_key_value(key)
            .map(|(k, p)| (k.as_str(), p.evaluator()))
            .or_else(|| self.sources.get_key_value(key).map(|(k, e)| (k.as_str(), e)))
    }

    fn eval_path<'a>(
        &'a self,
        key: &'a str,
        evaluator: &'a Evaluator,
        ctx: &KernelContext,
        stack: &mut Vec<&'a str>,
    ) -> Result<Value> {
        match evaluator {
            Evaluator::Reference(target) => {
                if stack.contains(&key) {
                    let mut cycle: Vec<String> = stack.iter().map(|k| k.to_string()).collect();
                    cycle.push(key.to_string());
                    return Err(Error::CyclicTemplate { cycle });
                }
                let (target_key, target_eval) = self
                    .lookup_evaluator(target)
                    .ok_or_else(|| Error::unresolved(key, format!("reference to undefined path '{target}'")))?;
                stack.push(key);
                let value = self.eval_path(target_key, target_eval, ctx, stack);
                stack.pop();
                value
            }
            evaluator => evaluator.eval(ctx).map_err(|e| e.at_path(key)),
        }
    }

    /// Write a patch into a wrapped object.
    ///
    /// Every id is validated before anything is written: an unknown id fails
    /// with [`Error::UnknownParameter`] and leaves the object untouched.
    pub fn apply<O: KernelObject>(wrapper: &mut MitsubaObjectWrapper<O>, patch: &ParameterPatch) -> Result<()> {
        wrapper.apply(patch)
    }
}
