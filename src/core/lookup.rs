//! Type-id resolution.
//!
//! The kernel's object graph is typed: every object is an instance of a
//! plugin (its *kind*, e.g. `"rpv"`) implementing a backend interface (its
//! [`ObjectType`], e.g. BSDF). This module maps kinds to types and resolves
//! template parameters to backend parameter ids.

use std::fmt;

use super::ParamFlags;
use crate::util::{path, Error, Result};

/// Backend object interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Bsdf,
    Emitter,
    Film,
    Integrator,
    Medium,
    PhaseFunction,
    ReconstructionFilter,
    Sampler,
    Scene,
    Sensor,
    Shape,
    Texture,
    Volume,
}

impl ObjectType {
    /// Display name of the interface.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bsdf => "BSDF",
            Self::Emitter => "Emitter",
            Self::Film => "Film",
            Self::Integrator => "Integrator",
            Self::Medium => "Medium",
            Self::PhaseFunction => "PhaseFunction",
            Self::ReconstructionFilter => "ReconstructionFilter",
            Self::Sampler => "Sampler",
            Self::Scene => "Scene",
            Self::Sensor => "Sensor",
            Self::Shape => "Shape",
            Self::Texture => "Texture",
            Self::Volume => "Volume",
        }
    }

    /// Role implied by the key an object is attached under.
    ///
    /// Only meaningful for nested keys: top-level keys are object ids.
    pub fn from_slot(key: &str) -> Option<Self> {
        match key {
            "bsdf" => Some(Self::Bsdf),
            "phase" => Some(Self::PhaseFunction),
            "medium" | "interior" | "exterior" => Some(Self::Medium),
            "film" => Some(Self::Film),
            "sampler" => Some(Self::Sampler),
            "rfilter" => Some(Self::ReconstructionFilter),
            "emitter" => Some(Self::Emitter),
            "integrator" => Some(Self::Integrator),
            k if k.starts_with("bsdf_") => Some(Self::Bsdf),
            k if k.starts_with("phase_") => Some(Self::PhaseFunction),
            _ => None,
        }
    }

    /// Flags given to parameters rebuilt from a live object of this type.
    pub fn default_update_flags(self) -> ParamFlags {
        match self {
            Self::Shape | Self::Sensor => ParamFlags::GEOMETRIC,
            _ => ParamFlags::SPECTRAL,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Supported plugin kinds.
const PLUGINS: &[(&str, ObjectType)] = &[
    // BSDFs
    ("diffuse", ObjectType::Bsdf),
    ("rpv", ObjectType::Bsdf),
    ("rtls", ObjectType::Bsdf),
    ("hapke", ObjectType::Bsdf),
    ("bilambertian", ObjectType::Bsdf),
    ("blendbsdf", ObjectType::Bsdf),
    ("conductor", ObjectType::Bsdf),
    ("roughconductor", ObjectType::Bsdf),
    ("dielectric", ObjectType::Bsdf),
    ("roughdielectric", ObjectType::Bsdf),
    ("plastic", ObjectType::Bsdf),
    ("twosided", ObjectType::Bsdf),
    ("mask", ObjectType::Bsdf),
    ("null", ObjectType::Bsdf),
    // Phase functions
    ("isotropic", ObjectType::PhaseFunction),
    ("hg", ObjectType::PhaseFunction),
    ("rayleigh", ObjectType::PhaseFunction),
    ("tabphase", ObjectType::PhaseFunction),
    ("blendphase", ObjectType::PhaseFunction),
    // Media
    ("homogeneous", ObjectType::Medium),
    ("heterogeneous", ObjectType::Medium),
    // Shapes
    ("rectangle", ObjectType::Shape),
    ("disk", ObjectType::Shape),
    ("sphere", ObjectType::Shape),
    ("cube", ObjectType::Shape),
    ("cylinder", ObjectType::Shape),
    ("obj", ObjectType::Shape),
    ("ply", ObjectType::Shape),
    ("shapegroup", ObjectType::Shape),
    ("instance", ObjectType::Shape),
    // Textures
    ("uniform", ObjectType::Texture),
    ("interpolated", ObjectType::Texture),
    ("bitmap", ObjectType::Texture),
    // Volumes
    ("gridvolume", ObjectType::Volume),
    ("constvolume", ObjectType::Volume),
    ("sphericalcoordsvolume", ObjectType::Volume),
    // Emitters
    ("directional", ObjectType::Emitter),
    ("constant", ObjectType::Emitter),
    ("astroobject", ObjectType::Emitter),
    ("area", ObjectType::Emitter),
    // Sensors
    ("distant", ObjectType::Sensor),
    ("distantflux", ObjectType::Sensor),
    ("hdistant", ObjectType::Sensor),
    ("mdistant", ObjectType::Sensor),
    ("radiancemeter", ObjectType::Sensor),
    ("mradiancemeter", ObjectType::Sensor),
    ("perspective", ObjectType::Sensor),
    // Films, samplers, filters
    ("hdrfilm", ObjectType::Film),
    ("independent", ObjectType::Sampler),
    ("stratified", ObjectType::Sampler),
    ("multijitter", ObjectType::Sampler),
    ("box", ObjectType::ReconstructionFilter),
    ("gaussian", ObjectType::ReconstructionFilter),
    ("tent", ObjectType::ReconstructionFilter),
    // Integrators
    ("path", ObjectType::Integrator),
    ("volpath", ObjectType::Integrator),
    ("volpathmis", ObjectType::Integrator),
    ("piecewise_volpath", ObjectType::Integrator),
    // Scene root
    ("scene", ObjectType::Scene),
];

/// Every supported `(kind, type)` pair.
pub fn supported_plugins() -> impl Iterator<Item = (&'static str, ObjectType)> {
    PLUGINS.iter().copied()
}

/// Resolve a plugin kind to its backend type.
///
/// When `role` is given (the slot the object is attached to), the kind must
/// implement it. Anything outside the supported table fails with
/// [`Error::UnsupportedType`].
pub fn lookup_type_id(kind: &str, role: Option<ObjectType>) -> Result<ObjectType> {
    let object_type = PLUGINS
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, t)| *t)
        .ok_or_else(|| Error::unsupported(kind, role.map(ObjectType::name)))?;

    match role {
        Some(r) if r != object_type => Err(Error::unsupported(kind, Some(r.name()))),
        _ => Ok(object_type),
    }
}

/// Locates the backend id of a template parameter during traversal.
///
/// The strategy matches the traversed node whose type and id equal
/// `node_type` / `node_id`, then appends `parameter_relpath` to that node's
/// path in the backend parameter index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeIdLookupStrategy {
    pub node_type: ObjectType,
    pub node_id: String,
    pub parameter_relpath: String,
}

impl TypeIdLookupStrategy {
    /// Create a strategy.
    pub fn new(node_type: ObjectType, node_id: impl Into<String>, parameter_relpath: impl Into<String>) -> Self {
        Self {
            node_type,
            node_id: node_id.into(),
            parameter_relpath: parameter_relpath.into(),
        }
    }

    /// Backend parameter id if the node matches.
    pub fn lookup(&self, node_type: ObjectType, node_id: Option<&str>, node_relpath: &str) -> Option<String> {
        (node_type == self.node_type && node_id == Some(self.node_id.as_str()))
            .then(|| path::join(node_relpath, &self.parameter_relpath))
    }
}
