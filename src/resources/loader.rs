//! Turns model descriptors into scene content.
//!
//! Loading is split in two steps. [`ModelLoader::load_each`] fetches and parses
//! every descriptor concurrently and yields one [`LoadOutcome`] per descriptor,
//! successful or not, as soon as it resolves. [`ModelLoader::attach`] then
//! inserts a successful outcome into the scene on the frame it arrives on;
//! failed outcomes are logged and dropped.

use std::{collections::HashMap, sync::Arc};

use futures::{Stream, future::join_all, stream::FuturesUnordered};
use log::{debug, error, info};

use crate::{
    data_structures::{
        driver::{AnimationDriver, DriverId, DriverPool},
        instance::Instance,
        material::TextureId,
        scene_graph::{Layer, MaterialId, Node, NodeId, Scene},
    },
    registry::{MaterialOverride, ModelDescriptor},
    resources::{AssetSource, GltfAsset, animation::AnimationClip, load_model_gltf},
};

/// The result of loading one descriptor.
#[derive(Debug)]
pub struct LoadOutcome {
    pub descriptor: ModelDescriptor,
    pub result: anyhow::Result<GltfAsset>,
}

/// A part that made it into the scene.
#[derive(Clone, Debug)]
pub struct LoadedPart {
    pub root: NodeId,
    pub path: String,
    pub layer: Layer,
    pub driver: Option<DriverId>,
    pub clip: Option<Arc<AnimationClip>>,
}

#[derive(Clone, Debug)]
pub struct ModelLoader {
    base_path: String,
}

impl ModelLoader {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Loads every descriptor concurrently. The outcomes keep the order of `descriptors`.
    pub async fn load_all<S: AssetSource>(&self, source: &S, descriptors: &[ModelDescriptor]) -> Vec<LoadOutcome> {
        join_all(descriptors.iter().map(|descriptor| self.load(source, descriptor.clone()))).await
    }

    /// Loads every descriptor concurrently, yielding each outcome as soon as it resolves.
    pub fn load_each<'a, S: AssetSource>(
        &'a self,
        source: &'a S,
        descriptors: &'a [ModelDescriptor],
    ) -> impl Stream<Item = LoadOutcome> + Unpin + 'a {
        descriptors
            .iter()
            .map(|descriptor| self.load(source, descriptor.clone()))
            .collect::<FuturesUnordered<_>>()
    }

    pub async fn load<S: AssetSource>(&self, source: &S, descriptor: ModelDescriptor) -> LoadOutcome {
        let path = format!("{}{}", self.base_path, descriptor.path);
        let result = load_model_gltf(source, &path).await;
        LoadOutcome { descriptor, result }
    }

    /**
     * Inserts a loaded asset below a fresh root node named after its file.
     *
     * Every mesh node gets shadow flags and the descriptor's layer, overridden
     * materials are replaced by patched copies, and the first clip (if any) is
     * bound to a new driver in `pool`. Returns `None` after logging when the
     * outcome is a failure.
     */
    pub fn attach(outcome: LoadOutcome, scene: &mut Scene, pool: &mut DriverPool) -> Option<LoadedPart> {
        let LoadOutcome { descriptor, result } = outcome;
        let asset = match result {
            Ok(asset) => asset,
            Err(e) => {
                error!("An error occurred while loading the model {}: {e:#}", descriptor.path);
                return None;
            }
        };

        let textures: Vec<TextureId> = asset.images.iter().map(|image| scene.add_texture(image.clone())).collect();
        let materials: Vec<MaterialId> = asset
            .materials
            .iter()
            .map(|material| {
                let mut material = material.clone();
                let remap = |id: Option<TextureId>| id.and_then(|t| textures.get(t.0).copied());
                material.base_color_texture = remap(material.base_color_texture);
                material.normal_texture = remap(material.normal_texture);
                scene.add_material(material)
            })
            .collect();

        let root = scene.add_node(
            None,
            Node::named(&descriptor.path).with_transform(Instance::from_euler(
                descriptor.position,
                descriptor.rotation,
                descriptor.scale,
            )),
        );

        let mut ids: HashMap<usize, NodeId> = HashMap::new();
        let mut stack: Vec<(usize, NodeId)> = asset.roots.iter().rev().map(|r| (*r, root)).collect();
        while let Some((index, parent)) = stack.pop() {
            let Some(source) = asset.nodes.get(index) else {
                continue;
            };
            if ids.contains_key(&index) {
                continue;
            }
            let mut node = Node::new(source.name.clone()).with_transform(source.transform);
            if let Some(mesh) = &source.mesh {
                let mut mesh = mesh.clone();
                for primitive in &mut mesh.primitives {
                    primitive
                        .material
                        .for_each_mut(|id| *id = materials.get(id.0).copied().unwrap_or(*id));
                }
                node.mesh = Some(mesh);
                node.cast_shadow = true;
                node.receive_shadow = true;
                node.layer = descriptor.layer;
            }
            let id = scene.add_node(Some(parent), node);
            ids.insert(index, id);
            stack.extend(source.children.iter().rev().map(|child| (*child, id)));
        }

        apply_overrides(scene, root, &descriptor.materials);
        scene.update_world_transforms();

        let clip = asset.clips.into_iter().next().map(Arc::new);
        let driver = clip.as_ref().map(|clip| {
            let targets = clip.channels.iter().map(|c| ids.get(&c.target).copied()).collect();
            let mut driver = AnimationDriver::new(clip.clone(), targets);
            driver.set_loop(descriptor.animation.loop_mode);
            driver.set_speed(descriptor.animation.speed);
            if descriptor.animation.autoplay {
                driver.play();
            }
            pool.insert(driver)
        });

        info!(
            "Loaded {} ({} nodes, animation: {})",
            descriptor.path,
            ids.len(),
            clip.as_ref().map_or("none", |c| c.name.as_str())
        );

        Some(LoadedPart {
            root,
            path: descriptor.path,
            layer: descriptor.layer,
            driver,
            clip,
        })
    }
}

/// Replaces each material matching an override, once per sub-mesh, with a patched copy.
fn apply_overrides(scene: &mut Scene, root: NodeId, overrides: &[MaterialOverride]) {
    let mut matched = vec![false; overrides.len()];
    for id in scene.descendants(root) {
        let Some(mut mesh) = scene.node_mut(id).and_then(|node| node.mesh.take()) else {
            continue;
        };
        for primitive in &mut mesh.primitives {
            primitive.material.for_each_mut(|material_id| {
                let Some(current) = scene.material(*material_id) else {
                    return;
                };
                if let Some(index) = overrides.iter().position(|o| o.name == current.name) {
                    let patched = current.overridden(&overrides[index].properties);
                    *material_id = scene.add_material(patched);
                    matched[index] = true;
                }
            });
        }
        if let Some(node) = scene.node_mut(id) {
            node.mesh = Some(mesh);
        }
    }
    for (material, matched) in overrides.iter().zip(matched) {
        if !matched {
            debug!("Material override {:?} matched no material", material.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        material::{Material, MaterialProperty},
        scene_graph::{MaterialSlot, Mesh},
    };

    #[test]
    fn failed_outcome_adds_nothing() {
        let mut scene = Scene::new();
        let mut pool = DriverPool::new();
        let outcome = LoadOutcome {
            descriptor: ModelDescriptor::part("missing.gltf"),
            result: Err(anyhow::anyhow!("not found")),
        };
        assert!(ModelLoader::attach(outcome, &mut scene, &mut pool).is_none());
        assert!(scene.roots().is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn overrides_patch_only_matching_materials_once() {
        let mut scene = Scene::new();
        let window = scene.add_material(Material::new("EX_Window"));
        let paint = scene.add_material(Material::new("EX_Lack_Front"));
        let root = scene.add_node(None, Node::named("part"));
        let mut mesh = Mesh::quad(1.0, 1.0, window);
        mesh.primitives.push(Mesh::quad(1.0, 1.0, paint).primitives.remove(0));
        scene.add_node(Some(root), Node::named("body").with_mesh(mesh));
        let materials_before = scene.materials().len();

        apply_overrides(
            &mut scene,
            root,
            &[
                MaterialOverride::new("EX_Window", &[MaterialProperty::Opacity(0.3)]),
                MaterialOverride::new("Nothing", &[MaterialProperty::Opacity(0.0)]),
            ],
        );

        assert_eq!(scene.materials().len(), materials_before + 1);
        let body = scene.find_by_name("body").and_then(|id| scene.node(id)).expect("body");
        let primitives = &body.mesh.as_ref().expect("mesh").primitives;
        let MaterialSlot::Single(patched) = primitives[0].material else {
            panic!("single slot expected");
        };
        assert_ne!(patched, window);
        assert_eq!(scene.material(patched).map(|m| m.opacity), Some(0.3));
        assert_eq!(primitives[1].material, MaterialSlot::Single(paint));
    }
}
