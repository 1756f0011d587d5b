//! Literal values understood by the rendering kernel.
//!
//! A [`KernelDict`] is the wire format handed to the kernel's scene
//! constructor: an ordered mapping whose nested mappings carrying a `"type"`
//! key describe kernel objects.

use std::fmt;

use glam::{DMat4, DVec3};
use indexmap::IndexMap;
use serde::Serialize;

use super::{path, Error, Result};

/// Key holding an object's plugin name.
pub const TYPE_KEY: &str = "type";

/// Key holding an explicit object id.
pub const ID_KEY: &str = "id";

/// Plugin name of object references.
pub const REF_TYPE: &str = "ref";

/// Kernel literal.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// 3-vector (points, directions, RGB triplets).
    Vector(DVec3),
    /// Array of floats (spectral grids, volume data).
    FloatArray(Vec<f64>),
    /// 4x4 transform matrix.
    Transform(DMat4),
    /// Nested dictionary.
    Dict(KernelDict),
}

impl Value {
    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Vector(_) => "vector",
            Self::FloatArray(_) => "float array",
            Self::Transform(_) => "transform",
            Self::Dict(_) => "dict",
        }
    }

    /// Whether two values can replace each other in a live object.
    ///
    /// Ints and floats are interchangeable; arrays must keep their length.
    pub fn is_compatible(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => true,
            (Self::FloatArray(a), Self::FloatArray(b)) => a.len() == b.len(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    /// Get as float if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as string if possible.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as dictionary if possible.
    pub fn as_dict(&self) -> Option<&KernelDict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Whether this value describes a kernel object (dict with a `type`).
    pub fn is_object(&self) -> bool {
        self.as_dict().is_some_and(|d| d.plugin().is_some())
    }

    /// Sum of all numeric components, used by checksums.
    pub fn numeric_sum(&self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
            Self::String(_) => 0.0,
            Self::Vector(v) => v.x + v.y + v.z,
            Self::FloatArray(a) => a.iter().sum(),
            Self::Transform(m) => m.to_cols_array().iter().sum(),
            Self::Dict(d) => d.values().map(Value::numeric_sum).sum(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Vector(v) => write!(f, "[{}, {}, {}]", v.x, v.y, v.z),
            Self::FloatArray(a) => write!(f, "<{} floats>", a.len()),
            Self::Transform(_) => write!(f, "<transform>"),
            Self::Dict(d) => write!(f, "<dict: {} keys>", d.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DVec3> for Value {
    fn from(v: DVec3) -> Self {
        Self::Vector(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatArray(v)
    }
}

impl From<DMat4> for Value {
    fn from(v: DMat4) -> Self {
        Self::Transform(v)
    }
}

impl From<KernelDict> for Value {
    fn from(v: KernelDict) -> Self {
        Self::Dict(v)
    }
}

/// Ordered kernel dictionary.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KernelDict {
    entries: IndexMap<String, Value>,
}

impl KernelDict {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object dictionary with the given plugin name.
    pub fn object(plugin: &str) -> Self {
        let mut dict = Self::new();
        dict.insert(TYPE_KEY, plugin);
        dict
    }

    /// Create a reference to a previously declared object.
    pub fn reference(id: &str) -> Self {
        let mut dict = Self::object(REF_TYPE);
        dict.insert(ID_KEY, id);
        dict
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Get a mutable value by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Remove a key, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Plugin name, if this dictionary describes an object.
    pub fn plugin(&self) -> Option<&str> {
        self.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// Explicit object id, if any.
    pub fn id(&self) -> Option<&str> {
        self.get(ID_KEY).and_then(Value::as_str)
    }

    /// Whether this dictionary is an object reference.
    pub fn is_reference(&self) -> bool {
        self.plugin() == Some(REF_TYPE)
    }

    /// Look up a value by dotted path.
    pub fn get_path(&self, key_path: &str) -> Option<&Value> {
        let mut segments = path::split(key_path).into_iter();
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_dict()?.get(segment)?;
        }
        Some(current)
    }

    /// Insert a value at a dotted path, creating intermediate dictionaries.
    ///
    /// Fails with [`Error::PathConflict`] when an intermediate segment already
    /// holds a non-dictionary value, or when the leaf is already a dictionary
    /// populated through longer paths.
    pub fn insert_path(&mut self, full_path: &str, value: Value) -> Result<()> {
        let segments = path::split(full_path);
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| Error::PathConflict(full_path.to_string()))?;

        let mut current = self;
        for segment in parents {
            let entry = current
                .entries
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Dict(KernelDict::new()));
            current = match entry {
                Value::Dict(d) => d,
                _ => return Err(Error::PathConflict(full_path.to_string())),
            };
        }

        if let Some(Value::Dict(_)) = current.get(leaf) {
            return Err(Error::PathConflict(full_path.to_string()));
        }
        current.entries.insert((*leaf).to_string(), value);
        Ok(())
    }

    /// Flatten nested dictionaries into dotted paths.
    pub fn flatten(&self) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        flatten_into(self, "", &mut out);
        out
    }

    /// Build a nested dictionary from flat dotted paths.
    pub fn from_flat<'a>(flat: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Self> {
        let mut dict = Self::new();
        for (key, value) in flat {
            dict.insert_path(key, value)?;
        }
        Ok(dict)
    }

    /// Serialise to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn flatten_into(dict: &KernelDict, prefix: &str, out: &mut IndexMap<String, Value>) {
    for (key, value) in dict.iter() {
        let full = path::join(prefix, key);
        match value {
            Value::Dict(d) if !d.is_empty() => flatten_into(d, &full, out),
            v => {
                out.insert(full, v.clone());
            }
        }
    }
}

impl FromIterator<(String, Value)> for KernelDict {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_path_nests() {
        let mut dict = KernelDict::new();
        dict.insert_path("surface.type", "rectangle".into()).unwrap();
        dict.insert_path("surface.bsdf.type", "diffuse".into()).unwrap();
        dict.insert_path("surface.bsdf.reflectance.value", 0.5.into()).unwrap();

        let surface = dict.get("surface").and_then(Value::as_dict).unwrap();
        assert_eq!(surface.plugin(), Some("rectangle"));
        assert_eq!(dict.get_path("surface.bsdf.reflectance.value"), Some(&Value::Float(0.5)));
        assert!(dict.get_path("surface.bsdf.missing").is_none());
    }

    #[test]
    fn test_insert_path_conflict() {
        let mut dict = KernelDict::new();
        dict.insert_path("bsdf.reflectance", 0.5.into()).unwrap();
        let err = dict.insert_path("bsdf.reflectance.value", 0.5.into()).unwrap_err();
        assert!(matches!(err, Error::PathConflict(_)));

        let err = dict.insert_path("bsdf", 1.0.into()).unwrap_err();
        assert!(matches!(err, Error::PathConflict(_)));
    }

    #[test]
    fn test_flatten_preserves_order() {
        let dict = KernelDict::from_flat([
            ("b.type", Value::from("hg")),
            ("b.g", Value::from(0.3)),
            ("a.type", Value::from("diffuse")),
        ])
        .unwrap();
        let keys: Vec<String> = dict.flatten().into_keys().collect();
        assert_eq!(keys, ["b.type", "b.g", "a.type"]);
    }

    #[test]
    fn test_reference() {
        let r = KernelDict::reference("bsdf_surface");
        assert!(r.is_reference());
        assert_eq!(r.id(), Some("bsdf_surface"));
    }

    #[test]
    fn test_compatibility() {
        assert!(Value::Int(1).is_compatible(&Value::Float(0.5)));
        assert!(!Value::Float(0.5).is_compatible(&Value::from("x")));
        assert!(!Value::from(vec![1.0, 2.0]).is_compatible(&Value::from(vec![1.0])));
    }

    #[test]
    fn test_json() {
        let dict = KernelDict::object("diffuse").with("reflectance", KernelDict::object("uniform").with("value", 0.5));
        let json = dict.to_json_pretty().unwrap();
        assert!(json.contains("\"type\": \"diffuse\""));
        assert!(json.contains("0.5"));
    }
}
