//! In-memory reference kernel.
//!
//! [`MemoryKernel`] implements the [`Kernel`] trait without any radiative
//! transfer: it builds a typed object graph from a kernel dictionary, accepts
//! parameter writes, and "renders" a sensor as a constant image holding the
//! sum of the committed node checksums. Two scenes with equal parameters
//! render equal buffers, which makes it a reference for update-vs-rebuild
//! checks. Load and render calls are counted.

mod object;

pub use object::{MemoryObject, MAX_FILM_SIZE};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::core::{supported_plugins, Kernel, KernelObject, NodeId, ObjectType, RawBuffer};
use crate::util::{Error, KernelDict, Result};

/// Call counters of a [`MemoryKernel`].
#[derive(Debug, Default)]
pub struct KernelStats {
    loads: AtomicU64,
    renders: AtomicU64,
    seeds: Mutex<Vec<u64>>,
}

impl KernelStats {
    /// Number of `load_dict` calls.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of successful `render` calls.
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    /// Seeds of successful renders, in call order.
    pub fn seeds(&self) -> Vec<u64> {
        self.seeds.lock().clone()
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.loads.store(0, Ordering::Relaxed);
        self.renders.store(0, Ordering::Relaxed);
        self.seeds.lock().clear();
    }
}

/// Reference kernel with an in-memory object graph.
#[derive(Debug)]
pub struct MemoryKernel {
    registry: FxHashMap<String, ObjectType>,
    stats: KernelStats,
    cancelled: AtomicBool,
}

impl Default for MemoryKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKernel {
    /// Kernel knowing every supported plugin.
    pub fn new() -> Self {
        Self {
            registry: supported_plugins().map(|(k, t)| (k.to_string(), t)).collect(),
            stats: KernelStats::default(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Register an extra plugin.
    pub fn with_plugin(mut self, name: impl Into<String>, object_type: ObjectType) -> Self {
        self.registry.insert(name.into(), object_type);
        self
    }

    /// Call counters.
    pub fn stats(&self) -> &KernelStats {
        &self.stats
    }

    /// Make subsequent renders fail until [`resume`](Self::resume).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Accept renders again.
    pub fn resume(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}

impl Kernel for MemoryKernel {
    type Object = MemoryObject;

    fn name(&self) -> &str {
        "memory"
    }

    fn load_dict(&self, dict: &KernelDict) -> Result<MemoryObject> {
        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        let obj = MemoryObject::load(dict, &self.registry)?;
        debug!(nodes = obj.node_count(), "loaded scene");
        Ok(obj)
    }

    fn render(&self, scene: &MemoryObject, sensor: NodeId, spp: u32, seed: u64) -> Result<RawBuffer> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(Error::Kernel("render cancelled".into()));
        }
        if !scene.sensors().contains(&sensor) {
            return Err(Error::Kernel(format!("node {sensor} is not a sensor")));
        }
        if spp == 0 {
            return Err(Error::Kernel("spp must be positive".into()));
        }

        let (width, height) = scene.film_size(sensor)?;
        self.stats.renders.fetch_add(1, Ordering::Relaxed);
        self.stats.seeds.lock().push(seed);
        Ok(RawBuffer::filled(width, height, 1, scene.checksum() as f32))
    }
}
