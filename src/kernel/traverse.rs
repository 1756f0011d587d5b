//! Object graph traversal.

use rustc_hash::FxHashSet;
use tracing::{debug, info, trace, warn};

use super::{MitsubaObjectWrapper, ParameterHandle, SceneParameters};
use crate::core::{lookup_type_id, KernelObject, NodeId, ObjectType, UpdateParameter};
use crate::template::UpdateMapTemplate;
use crate::util::{path, Error, Result};

/// Visited node, kept for lookup strategies.
struct Visit {
    object_type: ObjectType,
    id: Option<String>,
    path: String,
}

/// Walk a live object and wrap it with its parameter index.
///
/// Nodes are named by their id when they have one, else by `parent.key`.
/// Shared sub-objects are visited once. Attributes of objects whose
/// `(plugin, type)` pair is not supported are left out of the index.
///
/// Lookup strategies of `umap_template` are matched against the visited
/// nodes to fill in backend parameter ids. Without a map, one is rebuilt from
/// the index: a constant entry per updatable attribute holding its current
/// value.
#[tracing::instrument(level = "debug", skip_all)]
pub fn mi_traverse<O: KernelObject>(
    obj: O,
    umap_template: Option<UpdateMapTemplate>,
) -> Result<MitsubaObjectWrapper<O>> {
    let mut parameters = SceneParameters::new();
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    let mut visits: Vec<Visit> = Vec::new();
    let mut stack: Vec<(NodeId, String)> = vec![(obj.root(), String::new())];

    while let Some((node, parent_path)) = stack.pop() {
        if !visited.insert(node) {
            trace!(node, path = %parent_path, "already visited");
            continue;
        }
        let info = obj
            .node(node)
            .ok_or_else(|| Error::Kernel(format!("dangling node handle {node}")))?;
        let node_path = match info.id {
            Some(id) => id.to_string(),
            None => parent_path,
        };

        if lookup_type_id(info.plugin, Some(info.object_type)).is_ok() {
            for param in info.params.iter().filter(|p| p.updatable) {
                parameters.insert(
                    path::join(&node_path, param.name),
                    ParameterHandle {
                        node,
                        name: param.name.to_string(),
                        object_type: info.object_type,
                    },
                );
            }
        } else {
            warn!(
                plugin = info.plugin,
                object_type = %info.object_type,
                path = %node_path,
                "ignoring parameters of unsupported object"
            );
        }

        // Reverse so children are visited in declaration order
        for (key, child) in info.children.iter().rev() {
            stack.push((*child, path::join(&node_path, key)));
        }
        parameters.push_node(node);
        visits.push(Visit {
            object_type: info.object_type,
            id: info.id.map(str::to_string),
            path: node_path,
        });
    }

    let umap = match umap_template {
        Some(mut umap) => {
            for (key, param) in umap.entries_mut() {
                if param.lookup_strategy().is_none() {
                    continue;
                }
                let found = param.lookup_strategy().and_then(|lookup| {
                    visits
                        .iter()
                        .find_map(|v| lookup.lookup(v.object_type, v.id.as_deref(), &v.path))
                });
                match &found {
                    Some(id) => debug!(path = key, parameter_id = id.as_str(), "resolved lookup"),
                    None => debug!(path = key, "lookup matched no node"),
                }
                param.set_parameter_id(found);
            }
            umap
        }
        None => {
            let mut umap = UpdateMapTemplate::new();
            for (id, handle) in parameters.iter() {
                let value = obj
                    .read(handle.node, &handle.name)
                    .cloned()
                    .ok_or_else(|| Error::Kernel(format!("indexed attribute '{id}' cannot be read")))?;
                let param = UpdateParameter::constant(value, handle.object_type.default_update_flags())
                    .with_parameter_id(id);
                umap.insert(id, param)?;
            }
            umap
        }
    };

    info!(
        nodes = parameters.nodes().len(),
        parameters = parameters.len(),
        "traversed kernel object"
    );
    Ok(MitsubaObjectWrapper::from_traversal(obj, parameters, umap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Kernel, KernelContext, ParamFlags, TypeIdLookupStrategy};
    use crate::memory::MemoryKernel;
    use crate::util::{KernelDict, Value};

    fn shared_scene() -> KernelDict {
        KernelDict::object("scene")
            .with(
                "shared_bsdf",
                KernelDict::object("diffuse").with(
                    "reflectance",
                    KernelDict::object("uniform").with("value", 0.5),
                ),
            )
            .with(
                "left",
                KernelDict::object("rectangle").with("bsdf", KernelDict::reference("shared_bsdf")),
            )
            .with(
                "right",
                KernelDict::object("disk").with("bsdf", KernelDict::reference("shared_bsdf")),
            )
    }

    #[test]
    fn test_shared_visited_once() {
        let kernel = MemoryKernel::new();
        let obj = kernel.load_dict(&shared_scene()).unwrap();
        let wrapper = mi_traverse(obj, None).unwrap();
        let params = wrapper.parameters();

        // scene, shared_bsdf, its texture, left, right
        assert_eq!(params.nodes().len(), 5);
        let ids: Vec<&str> = params.keys().filter(|k| k.ends_with("reflectance.value")).collect();
        assert_eq!(ids, ["shared_bsdf.reflectance.value"]);
    }

    #[test]
    fn test_reconstructed_map() {
        let kernel = MemoryKernel::new();
        let obj = kernel.load_dict(&shared_scene()).unwrap();
        let wrapper = mi_traverse(obj, None).unwrap();
        let umap = wrapper.umap_template().unwrap();

        let entry = umap.get("shared_bsdf.reflectance.value").unwrap();
        assert_eq!(entry.flags(), ParamFlags::SPECTRAL);
        assert_eq!(entry.parameter_id(), Some("shared_bsdf.reflectance.value"));

        let patch = umap.resolve(&KernelContext::new()).unwrap();
        assert_eq!(patch.get("shared_bsdf.reflectance.value"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_unsupported_ignored() {
        let kernel = MemoryKernel::new().with_plugin("custom_brdf", ObjectType::Bsdf);
        let dict = KernelDict::object("scene").with(
            "surface",
            KernelDict::object("rectangle").with(
                "bsdf",
                KernelDict::object("custom_brdf")
                    .with("albedo", 0.3)
                    .with("reflectance", KernelDict::object("uniform").with("value", 0.2)),
            ),
        );
        let obj = kernel.load_dict(&dict).unwrap();
        let wrapper = mi_traverse(obj, None).unwrap();

        assert!(!wrapper.parameters().contains("surface.bsdf.albedo"));
        // Children of an ignored object are still walked
        assert!(wrapper.parameters().contains("surface.bsdf.reflectance.value"));
    }

    #[test]
    fn test_lookup_fills_ids() {
        let kernel = MemoryKernel::new();
        let dict = KernelDict::object("scene").with(
            "surface",
            KernelDict::object("rectangle").with(
                "bsdf",
                KernelDict::object("diffuse")
                    .with("id", "surface_bsdf")
                    .with("reflectance", KernelDict::object("uniform").with("value", 0.5)),
            ),
        );
        let obj = kernel.load_dict(&dict).unwrap();

        let mut umap = UpdateMapTemplate::new();
        let lookup = TypeIdLookupStrategy::new(ObjectType::Bsdf, "surface_bsdf", "reflectance.value");
        umap.insert(
            "surface.bsdf.reflectance.value",
            UpdateParameter::constant(0.7, ParamFlags::SPECTRAL).with_lookup(lookup),
        )
        .unwrap();

        let mut wrapper = mi_traverse(obj, Some(umap)).unwrap();
        let entry = wrapper.umap_template().unwrap().get("surface.bsdf.reflectance.value").unwrap();
        assert_eq!(entry.parameter_id(), Some("surface_bsdf.reflectance.value"));

        let patch = wrapper.update(&KernelContext::new(), ParamFlags::ALL).unwrap();
        assert_eq!(patch.get("surface_bsdf.reflectance.value"), Some(&Value::Float(0.7)));
    }
}
