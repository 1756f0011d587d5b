//! Abstract traits for rendering kernels and their live objects.
//!
//! These traits define the interface between the template layer and the
//! rendering kernel. The kernel is a black box: it builds objects from a
//! [`KernelDict`], exposes their object graph for traversal, accepts writes
//! to individual parameters and renders sensors into raw buffers.

use super::ObjectType;
use crate::util::{KernelDict, Result, Value};

/// Handle to a node of a live object graph.
///
/// Handles are identities: two paths reaching the same shared sub-object
/// yield the same handle.
pub type NodeId = usize;

/// Attribute exposed by a node.
#[derive(Clone, Copy, Debug)]
pub struct ParamInfo<'a> {
    /// Attribute name, relative to its node.
    pub name: &'a str,
    /// Current value.
    pub value: &'a Value,
    /// Whether the kernel accepts writes to it after construction.
    pub updatable: bool,
}

/// Read-only view of a node.
#[derive(Clone, Debug)]
pub struct NodeInfo<'a> {
    /// Plugin kind (e.g. `"diffuse"`).
    pub plugin: &'a str,
    /// Interface the kernel instantiated the plugin as.
    pub object_type: ObjectType,
    /// Explicit object id, if any.
    pub id: Option<&'a str>,
    /// Attributes in declaration order.
    pub params: Vec<ParamInfo<'a>>,
    /// Child objects in declaration order, keyed by slot name.
    pub children: Vec<(&'a str, NodeId)>,
}

// ============================================================================
// Object Trait
// ============================================================================

/// Live object built by a kernel.
pub trait KernelObject: Send {
    /// Root node of the graph.
    fn root(&self) -> NodeId;

    /// View of a node, `None` for a dangling handle.
    fn node(&self, node: NodeId) -> Option<NodeInfo<'_>>;

    /// Current value of an attribute.
    fn read(&self, node: NodeId, name: &str) -> Option<&Value>;

    /// Overwrite an attribute.
    ///
    /// Derived state is not refreshed until [`KernelObject::commit`].
    fn write(&mut self, node: NodeId, name: &str, value: Value) -> Result<()>;

    /// Recompute derived state of the touched nodes.
    fn commit(&mut self, touched: &[NodeId]) -> Result<()>;

    /// Sensor nodes in declaration order.
    fn sensors(&self) -> Vec<NodeId>;

    /// Name of a node: its id if any, else its plugin kind.
    fn node_name(&self, node: NodeId) -> Option<String> {
        self.node(node)
            .map(|info| info.id.unwrap_or(info.plugin).to_string())
    }
}

// ============================================================================
// Kernel Trait
// ============================================================================

/// Raw image buffer returned by a render call.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBuffer {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    /// Row-major, channel-interleaved samples.
    pub data: Vec<f32>,
}

impl RawBuffer {
    /// Buffer filled with a single value.
    pub fn filled(width: usize, height: usize, channels: usize, value: f32) -> Self {
        Self { width, height, channels, data: vec![value; width * height * channels] }
    }

    /// Sample at pixel `(x, y)`, channel `c`.
    pub fn get(&self, x: usize, y: usize, c: usize) -> Option<f32> {
        if x >= self.width || y >= self.height || c >= self.channels {
            return None;
        }
        self.data.get((y * self.width + x) * self.channels + c).copied()
    }
}

/// Rendering kernel.
pub trait Kernel: Send + Sync {
    /// Live object type.
    type Object: KernelObject;

    /// Kernel name, for logs.
    fn name(&self) -> &str;

    /// Build a live object from a kernel dictionary.
    fn load_dict(&self, dict: &KernelDict) -> Result<Self::Object>;

    /// Render one sensor of a scene.
    ///
    /// Long-running and synchronous; cancellation surfaces as an error.
    fn render(&self, scene: &Self::Object, sensor: NodeId, spp: u32, seed: u64) -> Result<RawBuffer>;
}
