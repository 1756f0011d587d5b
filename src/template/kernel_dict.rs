//! Kernel dictionary templates.
//!
//! A [`KernelDictTemplate`] is the context-independent description of a
//! kernel scene: an ordered mapping from flat dotted paths to
//! [`Parameter`]s. Resolving it against a [`KernelContext`] evaluates every
//! entry and nests the results into the [`KernelDict`] the kernel consumes.
//!
//! Templates are frozen once built. Changes go through
//! [`KernelDictTemplate::to_builder`] and yield a new template (and a new
//! [`ShapeToken`] if the non-updatable structure changed).

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::{ShapeToken, UpdateMapTemplate};
use crate::core::{lookup_type_id, Evaluator, InitParameter, KernelContext, ObjectType, Parameter, UpdateParameter};
use crate::util::{path, Error, KernelDict, Result, Value};

/// Mutable template under construction.
#[derive(Clone, Debug, Default)]
pub struct KernelDictTemplateBuilder {
    entries: IndexMap<String, Parameter>,
}

impl KernelDictTemplateBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter. Paths are unique.
    pub fn insert(&mut self, key: impl Into<String>, param: impl Into<Parameter>) -> Result<&mut Self> {
        let key = key.into();
        path::validate(&key)?;
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicatePath(key));
        }
        self.entries.insert(key, param.into());
        Ok(self)
    }

    /// Insert a literal value (an init-time constant).
    pub fn insert_value(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<&mut Self> {
        self.insert(key, InitParameter::constant(value))
    }

    /// Insert every entry of another template under `prefix`.
    ///
    /// Reference targets are relative to the inserted template and are
    /// prefixed as well.
    pub fn insert_template(&mut self, prefix: &str, template: &KernelDictTemplate) -> Result<&mut Self> {
        for (key, param) in template.iter() {
            let param = match param {
                Parameter::Init(p) => match p.evaluator() {
                    Evaluator::Reference(target) => {
                        Parameter::Init(InitParameter::reference(path::join(prefix, target)))
                    }
                    _ => Parameter::Init(p.clone()),
                },
                Parameter::Update(p) => match p.evaluator() {
                    Evaluator::Reference(target) => Parameter::Update(
                        p.clone().with_evaluator(Evaluator::Reference(path::join(prefix, target))),
                    ),
                    _ => Parameter::Update(p.clone()),
                },
            };
            self.insert(path::join(prefix, key), param)?;
        }
        Ok(self)
    }

    /// Remove a parameter, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Parameter> {
        self.entries.shift_remove(key)
    }

    /// Remove every parameter under a prefix (the prefix itself included).
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|k, _| k != prefix && !k.starts_with(&format!("{prefix}{}", path::SEP)));
        before - self.entries.len()
    }

    /// Number of entries so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze into a template.
    pub fn build(self) -> KernelDictTemplate {
        let shape = ShapeToken::of(&self.entries);
        KernelDictTemplate {
            inner: Arc::new(TemplateInner { entries: self.entries, shape }),
        }
    }
}

#[derive(Debug)]
struct TemplateInner {
    entries: IndexMap<String, Parameter>,
    shape: ShapeToken,
}

/// Frozen, shareable kernel dictionary template.
#[derive(Clone, Debug)]
pub struct KernelDictTemplate {
    inner: Arc<TemplateInner>,
}

impl Default for KernelDictTemplate {
    fn default() -> Self {
        KernelDictTemplateBuilder::new().build()
    }
}

impl KernelDictTemplate {
    /// Start a new template.
    pub fn builder() -> KernelDictTemplateBuilder {
        KernelDictTemplateBuilder::new()
    }

    /// Copy the entries into a builder.
    pub fn to_builder(&self) -> KernelDictTemplateBuilder {
        KernelDictTemplateBuilder { entries: self.inner.entries.clone() }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Get an entry.
    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.inner.entries.get(key)
    }

    /// Check if a path exists.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.inner.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Token of the non-updatable structure.
    pub fn shape_token(&self) -> ShapeToken {
        self.inner.shape
    }

    /// Whether two handles share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolve to a nested kernel dictionary.
    pub fn resolve(&self, ctx: &KernelContext) -> Result<KernelDict> {
        let flat = self.resolve_flat(ctx)?;
        let mut dict = KernelDict::new();
        for (key, value) in flat {
            dict.insert_path(&key, value)?;
        }
        validate_types(&dict, None, true)?;
        Ok(dict)
    }

    /// Resolve to flat dotted paths, in insertion order.
    pub fn resolve_flat(&self, ctx: &KernelContext) -> Result<IndexMap<String, Value>> {
        let mut resolver = Resolver {
            entries: &self.inner.entries,
            ctx,
            cache: FxHashMap::default(),
            stack: Vec::new(),
        };

        let mut out = IndexMap::with_capacity(self.len());
        for key in self.inner.entries.keys() {
            let value = resolver.resolve(key)?;
            out.insert(key.clone(), value);
        }
        Ok(out)
    }

    /// Restrict to updatable entries, preserving paths and order.
    ///
    /// Non-updatable paths reachable through references from those entries
    /// go along as sources so the map resolves the same values as the
    /// template.
    pub fn extract_update_map(&self) -> UpdateMapTemplate {
        let entries = &self.inner.entries;
        let updatable: Vec<(&String, &UpdateParameter)> = entries
            .iter()
            .filter_map(|(k, p)| match p {
                Parameter::Update(u) if u.is_updatable() => Some((k, u)),
                _ => None,
            })
            .collect();

        let mut sources: IndexMap<String, Evaluator> = IndexMap::new();
        let mut pending: Vec<&str> = updatable
            .iter()
            .filter_map(|&(_, u)| u.evaluator().reference_target())
            .collect();
        while let Some(target) = pending.pop() {
            // Dangling targets are reported when the map is resolved
            let Some((key, param)) = entries.get_key_value(target) else {
                continue;
            };
            if param.is_updatable() || sources.contains_key(key) {
                continue;
            }
            if let Some(next) = param.evaluator().reference_target() {
                pending.push(next);
            }
            sources.insert(key.clone(), param.evaluator().clone());
        }

        UpdateMapTemplate::from_entries(updatable.into_iter().map(|(k, u)| (k.clone(), u.clone())))
            .with_sources(sources)
    }

    /// Update parameters, including those with empty flags.
    pub fn update_parameters(&self) -> impl Iterator<Item = (&str, &UpdateParameter)> {
        self.iter().filter_map(|(k, p)| p.as_update().map(|u| (k, u)))
    }
}

/// Insertion-order resolution with on-demand references.
struct Resolver<'a> {
    entries: &'a IndexMap<String, Parameter>,
    ctx: &'a KernelContext,
    cache: FxHashMap<&'a str, Value>,
    stack: Vec<&'a str>,
}

impl<'a> Resolver<'a> {
    fn resolve(&mut self, key: &str) -> Result<Value> {
        if let Some(v) = self.cache.get(key) {
            return Ok(v.clone());
        }

        let entries: &'a IndexMap<String, Parameter> = self.entries;
        let (key, param) = entries
            .get_key_value(key)
            .ok_or_else(|| Error::unresolved(key, "no such path"))?;
        let key = key.as_str();

        if let Some(pos) = self.stack.iter().position(|k| *k == key) {
            let mut cycle: Vec<String> = self.stack[pos..].iter().map(|k| k.to_string()).collect();
            cycle.push(key.to_string());
            return Err(Error::CyclicTemplate { cycle });
        }

        let value = match param.evaluator() {
            Evaluator::Reference(target) => {
                if !entries.contains_key(target.as_str()) {
                    return Err(Error::unresolved(key, format!("reference to undefined path '{target}'")));
                }
                self.stack.push(key);
                let value = self.resolve(target);
                self.stack.pop();
                value?
            }
            evaluator => evaluator.eval(self.ctx).map_err(|e| e.at_path(key))?,
        };

        tracing::trace!(path = key, value = %value, "resolved parameter");
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}

/// Check every object's plugin kind against the supported type table.
fn validate_types(dict: &KernelDict, role: Option<ObjectType>, top_level: bool) -> Result<()> {
    let plugin = dict.plugin();
    if let Some(kind) = plugin {
        if !dict.is_reference() {
            lookup_type_id(kind, role)?;
        }
    }

    // Children of the scene root (or of an untyped root) are keyed by id
    let keyed_by_id = top_level && matches!(plugin, None | Some("scene"));

    for (key, value) in dict.iter() {
        if let Value::Dict(child) = value {
            if child.plugin().is_some() {
                let child_role = if keyed_by_id { None } else { ObjectType::from_slot(key) };
                validate_types(child, child_role, false)?;
            } else {
                // Untyped nested dict: its keys are still attribute names
                validate_untyped(child)?;
            }
        }
    }
    Ok(())
}

fn validate_untyped(dict: &KernelDict) -> Result<()> {
    for (key, value) in dict.iter() {
        if let Value::Dict(child) = value {
            if child.plugin().is_some() {
                validate_types(child, ObjectType::from_slot(key), false)?;
            } else {
                validate_untyped(child)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParamFlags;

    fn surface_template() -> KernelDictTemplate {
        let mut b = KernelDictTemplate::builder();
        b.insert_value("type", "scene").unwrap();
        b.insert_value("surface.type", "rectangle").unwrap();
        b.insert_value("surface.bsdf.type", "diffuse").unwrap();
        b.insert_value("surface.bsdf.reflectance.type", "uniform").unwrap();
        b.insert(
            "surface.bsdf.reflectance.value",
            UpdateParameter::new(|ctx| Ok(ctx.wavelength()? / 1000.0), ParamFlags::SPECTRAL),
        )
        .unwrap();
        b.build()
    }

    #[test]
    fn test_resolve_nests() {
        let dict = surface_template().resolve(&KernelContext::mono(500.0)).unwrap();
        assert_eq!(dict.plugin(), Some("scene"));
        assert_eq!(dict.get_path("surface.bsdf.type"), Some(&Value::from("diffuse")));
        assert_eq!(dict.get_path("surface.bsdf.reflectance.value"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_resolve_deterministic() {
        let template = surface_template();
        let ctx = KernelContext::mono(650.0);
        assert_eq!(template.resolve(&ctx).unwrap(), template.resolve(&ctx).unwrap());
    }

    #[test]
    fn test_duplicate_path() {
        let mut b = KernelDictTemplate::builder();
        b.insert_value("bsdf.type", "diffuse").unwrap();
        let err = b.insert_value("bsdf.type", "rpv").unwrap_err();
        assert!(matches!(err, Error::DuplicatePath(ref p) if p == "bsdf.type"));
    }

    #[test]
    fn test_missing_axis_names_path() {
        let err = surface_template().resolve(&KernelContext::new()).unwrap_err();
        match err {
            Error::ContextMismatch { path, axis } => {
                assert_eq!(path, "surface.bsdf.reflectance.value");
                assert_eq!(axis, "spectral index");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_evaluator_failure_is_unresolved() {
        let mut b = KernelDictTemplate::builder();
        b.insert("phase.g", InitParameter::new(|_| -> Result<f64> { Err(Error::other("g out of range")) }))
            .unwrap();
        let err = b.build().resolve_flat(&KernelContext::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedParameter { ref path, .. } if path == "phase.g"));
    }

    #[test]
    fn test_forward_reference() {
        let mut b = KernelDictTemplate::builder();
        b.insert("a.radius", InitParameter::reference("b.radius")).unwrap();
        b.insert_value("b.radius", 2.0).unwrap();
        let flat = b.build().resolve_flat(&KernelContext::new()).unwrap();
        assert_eq!(flat["a.radius"], Value::Float(2.0));
        // Output order stays insertion order
        assert_eq!(flat.keys().next().map(String::as_str), Some("a.radius"));
    }

    #[test]
    fn test_cyclic_reference() {
        let mut b = KernelDictTemplate::builder();
        b.insert("a", InitParameter::reference("b")).unwrap();
        b.insert("b", InitParameter::reference("c")).unwrap();
        b.insert("c", InitParameter::reference("a")).unwrap();
        let err = b.build().resolve_flat(&KernelContext::new()).unwrap_err();
        match err {
            Error::CyclicTemplate { cycle } => assert_eq!(cycle, ["a", "b", "c", "a"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dangling_reference() {
        let mut b = KernelDictTemplate::builder();
        b.insert("a", InitParameter::reference("missing")).unwrap();
        let err = b.build().resolve_flat(&KernelContext::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedParameter { ref path, .. } if path == "a"));
    }

    #[test]
    fn test_unsupported_type() {
        let mut b = KernelDictTemplate::builder();
        b.insert_value("shape.type", "teapot").unwrap();
        let err = b.build().resolve(&KernelContext::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { ref kind, .. } if kind == "teapot"));

        // Known kind in the wrong slot
        let mut b = KernelDictTemplate::builder();
        b.insert_value("shape.type", "rectangle").unwrap();
        b.insert_value("shape.bsdf.type", "hg").unwrap();
        let err = b.build().resolve(&KernelContext::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { ref kind, .. } if kind == "hg"));
    }

    #[test]
    fn test_insert_template_prefixes() {
        let mut inner = KernelDictTemplate::builder();
        inner.insert_value("type", "hg").unwrap();
        inner.insert_value("g", 0.3).unwrap();
        inner.insert("g_copy", InitParameter::reference("g")).unwrap();
        let inner = inner.build();

        let mut outer = KernelDictTemplate::builder();
        outer.insert_value("medium.type", "homogeneous").unwrap();
        outer.insert_template("medium.phase", &inner).unwrap();
        let dict = outer.build().resolve(&KernelContext::new()).unwrap();
        assert_eq!(dict.get_path("medium.phase.g_copy"), Some(&Value::Float(0.3)));
    }

    #[test]
    fn test_to_builder_produces_new_template() {
        let original = surface_template();
        let mut b = original.to_builder();
        b.remove("surface.bsdf.reflectance.value");
        b.insert_value("surface.bsdf.reflectance.value", 0.3).unwrap();
        let modified = b.build();

        assert!(original.get("surface.bsdf.reflectance.value").unwrap().is_updatable());
        assert!(!modified.get("surface.bsdf.reflectance.value").unwrap().is_updatable());
        assert_ne!(original.shape_token(), modified.shape_token());
    }

    #[test]
    fn test_remove_prefix() {
        let mut b = surface_template().to_builder();
        assert_eq!(b.remove_prefix("surface.bsdf.reflectance"), 2);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_extract_update_map() {
        let umap = surface_template().extract_update_map();
        assert_eq!(umap.len(), 1);
        assert!(umap.get("surface.bsdf.reflectance.value").is_some());
    }

    #[test]
    fn test_update_map_follows_init_references() {
        let mut b = surface_template().to_builder();
        b.insert("surface.bsdf.base", InitParameter::new(|ctx| Ok(ctx.wavelength()? / 1000.0)))
            .unwrap();
        b.insert("surface.bsdf.tint", InitParameter::reference("surface.bsdf.base"))
            .unwrap();
        b.insert(
            "surface.bsdf.albedo_copy",
            UpdateParameter::from_evaluator(Evaluator::Reference("surface.bsdf.tint".into()), ParamFlags::SPECTRAL),
        )
        .unwrap();
        let template = b.build();

        let ctx = KernelContext::mono(550.0);
        let flat = template.resolve_flat(&ctx).unwrap();
        let umap = template.extract_update_map();
        let patch = umap.resolve(&ctx).unwrap();

        assert_eq!(umap.len(), 2);
        let sources: Vec<&str> = umap.sources().map(|(k, _)| k).collect();
        assert_eq!(sources, ["surface.bsdf.tint", "surface.bsdf.base"]);
        assert_eq!(patch.get("surface.bsdf.albedo_copy"), Some(&Value::Float(0.55)));
        assert_eq!(patch.get("surface.bsdf.albedo_copy"), flat.get("surface.bsdf.albedo_copy"));
        assert!(patch.get("surface.bsdf.base").is_none());
    }
}
