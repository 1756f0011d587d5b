//! Arena-backed object graph.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::core::{KernelObject, NodeId, NodeInfo, ObjectType, ParamInfo};
use crate::util::{path, Error, KernelDict, Result, Value, ID_KEY, TYPE_KEY};

/// Largest film side accepted by [`MemoryObject::film_size`].
pub const MAX_FILM_SIZE: usize = 1 << 16;

#[derive(Clone, Debug)]
struct Attribute {
    value: Value,
    updatable: bool,
}

#[derive(Clone, Debug)]
struct Node {
    plugin: String,
    object_type: ObjectType,
    id: Option<String>,
    params: IndexMap<String, Attribute>,
    children: Vec<(String, NodeId)>,
    version: u64,
    /// Derived state, refreshed on commit.
    checksum: f64,
}

impl Node {
    fn compute_checksum(&self) -> f64 {
        self.params.values().map(|a| a.value.numeric_sum()).sum()
    }
}

/// Live scene built by [`MemoryKernel`](super::MemoryKernel).
///
/// Shared sub-objects (`{"type": "ref", "id": ..}`) are stored once and
/// linked from every parent. String attributes are fixed at load time; every
/// other attribute accepts writes.
#[derive(Clone, Debug)]
pub struct MemoryObject {
    nodes: Vec<Node>,
    root: NodeId,
    sensors: Vec<NodeId>,
    commits: u64,
}

impl MemoryObject {
    pub(crate) fn load(dict: &KernelDict, registry: &FxHashMap<String, ObjectType>) -> Result<Self> {
        let mut loader = Loader {
            registry,
            nodes: Vec::new(),
            ids: FxHashMap::default(),
            sensors: Vec::new(),
        };
        let root = loader.add_object(dict, None)?;
        Ok(Self {
            nodes: loader.nodes,
            root,
            sensors: loader.sensors,
            commits: 0,
        })
    }

    /// Number of distinct objects.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node declared with the given id.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.id.as_deref() == Some(id))
    }

    /// Number of commits a node has seen.
    pub fn version(&self, node: NodeId) -> Option<u64> {
        self.nodes.get(node).map(|n| n.version)
    }

    /// Number of commit calls.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Sum of the committed node checksums.
    pub fn checksum(&self) -> f64 {
        self.nodes.iter().map(|n| n.checksum).sum()
    }

    /// Film resolution of a sensor, `(1, 1)` without a film.
    ///
    /// Fails when a side exceeds [`MAX_FILM_SIZE`] or the pixel count
    /// overflows.
    pub fn film_size(&self, sensor: NodeId) -> Result<(usize, usize)> {
        let film = self.nodes.get(sensor).and_then(|s| {
            s.children
                .iter()
                .map(|(_, c)| *c)
                .find(|c| self.nodes[*c].object_type == ObjectType::Film)
        });
        let dim = |name: &str| -> Result<usize> {
            let v = film
                .and_then(|f| self.nodes[f].params.get(name))
                .and_then(|a| a.value.as_f64())
                .unwrap_or(1.0);
            if !v.is_finite() || v > MAX_FILM_SIZE as f64 {
                return Err(Error::Kernel(format!("film {name} {v} out of range (max {MAX_FILM_SIZE})")));
            }
            Ok(v.max(1.0) as usize)
        };
        let (width, height) = (dim("width")?, dim("height")?);
        width
            .checked_mul(height)
            .ok_or_else(|| Error::Kernel(format!("film of {width}x{height} pixels is too large")))?;
        Ok((width, height))
    }

    fn attribute_path(&self, node: NodeId, name: &str) -> String {
        path::join(&self.node_name(node).unwrap_or_default(), name)
    }
}

impl KernelObject for MemoryObject {
    fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, node: NodeId) -> Option<NodeInfo<'_>> {
        let n = self.nodes.get(node)?;
        Some(NodeInfo {
            plugin: &n.plugin,
            object_type: n.object_type,
            id: n.id.as_deref(),
            params: n
                .params
                .iter()
                .map(|(name, a)| ParamInfo { name, value: &a.value, updatable: a.updatable })
                .collect(),
            children: n.children.iter().map(|(k, c)| (k.as_str(), *c)).collect(),
        })
    }

    fn read(&self, node: NodeId, name: &str) -> Option<&Value> {
        self.nodes.get(node)?.params.get(name).map(|a| &a.value)
    }

    fn write(&mut self, node: NodeId, name: &str, value: Value) -> Result<()> {
        let full = self.attribute_path(node, name);
        let attr = self
            .nodes
            .get_mut(node)
            .and_then(|n| n.params.get_mut(name))
            .ok_or_else(|| Error::Kernel(format!("no attribute '{full}'")))?;
        if !attr.updatable {
            return Err(Error::NotUpdatable { path: full });
        }
        if !attr.value.is_compatible(&value) {
            return Err(Error::TypeMismatch {
                path: full,
                expected: attr.value.type_name().to_string(),
                actual: value.type_name().to_string(),
            });
        }
        attr.value = value;
        Ok(())
    }

    fn commit(&mut self, touched: &[NodeId]) -> Result<()> {
        for &id in touched {
            let node = self
                .nodes
                .get_mut(id)
                .ok_or_else(|| Error::Kernel(format!("dangling node handle {id}")))?;
            node.checksum = node.compute_checksum();
            node.version += 1;
        }
        self.commits += 1;
        Ok(())
    }

    fn sensors(&self) -> Vec<NodeId> {
        self.sensors.clone()
    }
}

struct Loader<'a> {
    registry: &'a FxHashMap<String, ObjectType>,
    nodes: Vec<Node>,
    ids: FxHashMap<String, NodeId>,
    sensors: Vec<NodeId>,
}

impl Loader<'_> {
    fn add_object(&mut self, dict: &KernelDict, implied_id: Option<&str>) -> Result<NodeId> {
        let plugin = dict
            .plugin()
            .ok_or_else(|| Error::Kernel("object has no type".into()))?;
        let object_type = *self
            .registry
            .get(plugin)
            .ok_or_else(|| Error::Kernel(format!("unknown plugin '{plugin}'")))?;
        let id = dict.id().or(implied_id).map(str::to_string);

        let node = self.nodes.len();
        self.nodes.push(Node {
            plugin: plugin.to_string(),
            object_type,
            id: id.clone(),
            params: IndexMap::new(),
            children: Vec::new(),
            version: 0,
            checksum: 0.0,
        });
        if let Some(id) = id {
            if self.ids.insert(id.clone(), node).is_some() {
                return Err(Error::Kernel(format!("duplicate object id '{id}'")));
            }
        }
        if object_type == ObjectType::Sensor {
            self.sensors.push(node);
        }

        // Objects directly under the scene take their key as id
        let keyed_by_id = object_type == ObjectType::Scene;
        for (key, value) in dict.iter() {
            if key == TYPE_KEY || key == ID_KEY {
                continue;
            }
            self.add_entry(node, key, value, keyed_by_id)?;
        }

        let checksum = self.nodes[node].compute_checksum();
        self.nodes[node].checksum = checksum;
        Ok(node)
    }

    fn add_entry(&mut self, node: NodeId, key: &str, value: &Value, keyed_by_id: bool) -> Result<()> {
        match value {
            Value::Dict(child) if child.is_reference() => {
                let target = child
                    .id()
                    .ok_or_else(|| Error::Kernel(format!("reference '{key}' has no id")))?;
                let target = *self
                    .ids
                    .get(target)
                    .ok_or_else(|| Error::Kernel(format!("reference to undeclared object '{target}'")))?;
                self.nodes[node].children.push((key.to_string(), target));
            }
            Value::Dict(child) if child.plugin().is_some() => {
                let child_node = self.add_object(child, keyed_by_id.then_some(key))?;
                self.nodes[node].children.push((key.to_string(), child_node));
            }
            Value::Dict(child) => {
                // Untyped groups flatten into dotted attribute names
                for (sub, v) in child.iter() {
                    self.add_entry(node, &path::join(key, sub), v, false)?;
                }
            }
            v => {
                let updatable = !matches!(v, Value::String(_));
                self.nodes[node]
                    .params
                    .insert(key.to_string(), Attribute { value: v.clone(), updatable });
            }
        }
        Ok(())
    }
}
