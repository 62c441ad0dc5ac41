//! Scene graph and hierarchical scene organization.
//!
//! The scene is an arena of [`Node`]s addressed by stable [`NodeId`]s. Nodes
//! form a forest: every loaded part contributes one root whose subtree mirrors
//! the glTF node hierarchy. Materials and decoded textures are owned by the
//! scene as well so that primitives only hold ids.
//!
//! Nodes are never removed; ids stay valid for the whole session.

use std::{ops::Range, sync::Arc};

use cgmath::{EuclideanSpace, Point3};

use crate::data_structures::{
    instance::Instance,
    material::{Material, TextureId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// Interaction layer of a node. Ray casts only consider nodes whose layer is
/// part of the caster's [`Layers`] mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Layer(u8);

impl Layer {
    pub const DEFAULT: Layer = Layer(0);
    pub const DOOR: Layer = Layer(1);
    pub const OBJECTS: Layer = Layer(2);
    pub const GROUND: Layer = Layer(3);
    pub const UI: Layer = Layer(4);

    /// Layers are bits in a 32 bit mask; anything above 31 wraps into range.
    pub const fn new(channel: u8) -> Self {
        Layer(channel % 32)
    }

    pub const fn channel(self) -> u8 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layers(u32);

impl Layers {
    pub const NONE: Layers = Layers(0);
    pub const ALL: Layers = Layers(u32::MAX);

    pub const fn only(layer: Layer) -> Self {
        Layers(1 << layer.0)
    }

    pub const fn with(self, layer: Layer) -> Self {
        Layers(self.0 | (1 << layer.0))
    }

    pub const fn contains(self, layer: Layer) -> bool {
        self.0 & (1 << layer.0) != 0
    }
}

/// Axis aligned bounding box in the local space of a primitive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn from_points(points: &[[f32; 3]]) -> Option<Self> {
        let first = Point3::from(*points.first()?);
        let (min, max) = points.iter().skip(1).fold((first, first), |(min, max), p| {
            (
                Point3::new(min.x.min(p[0]), min.y.min(p[1]), min.z.min(p[2])),
                Point3::new(max.x.max(p[0]), max.y.max(p[1]), max.z.max(p[2])),
            )
        });
        Some(Self { min, max })
    }

    pub fn center(&self) -> Point3<f32> {
        Point3::from_vec((self.min.to_vec() + self.max.to_vec()) * 0.5)
    }
}

/// One material applied to a sub-range of a primitive's index buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialGroup {
    pub range: Range<u32>,
    pub material: MaterialId,
}

/// The material(s) a primitive is drawn with.
///
/// glTF primitives always carry a single material; `Multi` covers geometry
/// whose index buffer is split into groups with their own materials.
#[derive(Clone, Debug, PartialEq)]
pub enum MaterialSlot {
    Single(MaterialId),
    Multi(Vec<MaterialGroup>),
}

impl MaterialSlot {
    pub fn ids(&self) -> Vec<MaterialId> {
        match self {
            MaterialSlot::Single(id) => vec![*id],
            MaterialSlot::Multi(groups) => groups.iter().map(|g| g.material).collect(),
        }
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut MaterialId)) {
        match self {
            MaterialSlot::Single(id) => f(id),
            MaterialSlot::Multi(groups) => groups.iter_mut().for_each(|g| f(&mut g.material)),
        }
    }
}

/// A drawable sub-element of a mesh.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: MaterialSlot,
    pub bounds: Option<Aabb>,
}

impl Primitive {
    pub fn new(
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        tex_coords: Vec<[f32; 2]>,
        indices: Vec<u32>,
        material: MaterialSlot,
    ) -> Self {
        let bounds = Aabb::from_points(&positions);
        Self {
            positions,
            normals,
            tex_coords,
            indices,
            material,
            bounds,
        }
    }

    /// Triangles as vertex triples. Non-indexed primitives use consecutive vertices.
    pub fn triangles(&self) -> Vec<[[f32; 3]; 3]> {
        let fetch = |i: u32| self.positions.get(i as usize).copied();
        if self.indices.is_empty() {
            return self
                .positions
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect();
        }
        self.indices
            .chunks_exact(3)
            .filter_map(|c| Some([fetch(c[0])?, fetch(c[1])?, fetch(c[2])?]))
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    /// A `width` x `height` rectangle in the XY plane, centred on the origin and facing +Z.
    pub fn quad(width: f32, height: f32, material: MaterialId) -> Self {
        let (w, h) = (width / 2.0, height / 2.0);
        let primitive = Primitive::new(
            vec![[-w, -h, 0.0], [w, -h, 0.0], [w, h, 0.0], [-w, h, 0.0]],
            vec![[0.0, 0.0, 1.0]; 4],
            vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
            vec![0, 1, 2, 0, 2, 3],
            MaterialSlot::Single(material),
        );
        Self {
            name: None,
            primitives: vec![primitive],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: Option<String>,
    pub local: Instance,
    pub mesh: Option<Mesh>,
    pub layer: Layer,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    world: Instance,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            local: Instance::default(),
            mesh: None,
            layer: Layer::DEFAULT,
            cast_shadow: false,
            receive_shadow: false,
            world: Instance::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn named(name: &str) -> Self {
        Self::new(Some(name.to_string()))
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_transform(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn world(&self) -> &Instance {
        &self.world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    materials: Vec<Material>,
    textures: Vec<Arc<image::RgbaImage>>,
    // bumped on every structural change so that hosts know when to re-upload
    generation: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node` below `parent`, or as a new root when `parent` is `None`.
    pub fn add_node(&mut self, parent: Option<NodeId>, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        node.children.clear();
        self.nodes.push(node);
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        self.generation += 1;
        id
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        self.generation += 1;
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_texture(&mut self, image: Arc<image::RgbaImage>) -> TextureId {
        self.textures.push(image);
        self.generation += 1;
        TextureId(self.textures.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn texture(&self, id: TextureId) -> Option<&Arc<image::RgbaImage>> {
        self.textures.get(id.0)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `id` followed by all of its descendants, depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current.0) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// First node called `name`, searching every root depth first in insertion order.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .flat_map(|root| self.descendants(*root))
            .find(|id| self.nodes[id.0].name.as_deref() == Some(name))
    }

    /// Recomputes every world transform as `parent_world * local`.
    pub fn update_world_transforms(&mut self) {
        let mut stack: Vec<(NodeId, Instance)> = self
            .roots
            .iter()
            .rev()
            .map(|root| (*root, Instance::default()))
            .collect();
        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.world = &parent_world * &node.local;
            let world = node.world;
            stack.extend(node.children.iter().rev().map(|child| (*child, world)));
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;

    #[test]
    fn layers_mask_membership() {
        let mask = Layers::only(Layer::DOOR).with(Layer::UI);
        assert!(mask.contains(Layer::DOOR));
        assert!(mask.contains(Layer::UI));
        assert!(!mask.contains(Layer::OBJECTS));
        assert!(!Layers::NONE.contains(Layer::DEFAULT));
        assert_eq!(Layer::new(33), Layer::new(1));
    }

    #[test]
    fn find_by_name_searches_depth_first_across_roots() {
        let mut scene = Scene::new();
        let a = scene.add_node(None, Node::named("a"));
        let b = scene.add_node(Some(a), Node::named("target"));
        let c = scene.add_node(None, Node::named("target"));
        assert_eq!(scene.find_by_name("target"), Some(b));
        assert_ne!(scene.find_by_name("target"), Some(c));
        assert_eq!(scene.find_by_name("missing"), None);
        assert_eq!(scene.roots(), &[a, c]);
        assert_eq!(scene.descendants(a), vec![a, b]);
    }

    #[test]
    fn world_transforms_follow_the_hierarchy() {
        let mut scene = Scene::new();
        let root = scene.add_node(
            None,
            Node::named("root").with_transform(Instance::from(Vector3::new(1.0, 0.0, 0.0))),
        );
        let child = scene.add_node(
            Some(root),
            Node::named("child").with_transform(Instance::from(Vector3::new(0.0, 2.0, 0.0))),
        );
        scene.update_world_transforms();
        let world = scene.node(child).map(|n| n.world().position);
        assert_eq!(world, Some(Vector3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn quad_bounds_and_triangles() {
        let mesh = Mesh::quad(2.0, 1.0, MaterialId(0));
        let primitive = &mesh.primitives[0];
        let bounds = primitive.bounds.expect("quad has vertices");
        assert_eq!(bounds.min, Point3::new(-1.0, -0.5, 0.0));
        assert_eq!(bounds.max, Point3::new(1.0, 0.5, 0.0));
        assert_eq!(primitive.triangles().len(), 2);
    }

    #[test]
    fn structural_changes_bump_generation() {
        let mut scene = Scene::new();
        let before = scene.generation();
        scene.add_material(Material::new("m"));
        scene.add_node(None, Node::named("n"));
        assert_eq!(scene.generation(), before + 2);
    }
}
