//! Object picking and selection.
//!
//! This module implements CPU ray picking: the pointer position (or an
//! immersive controller ray) is turned into a world-space ray, tested against
//! the meshes of every registered interactive object, and the closest hit wins.
//!
//! The routing step works as follows:
//! 1. Build a ray from the controller, or unproject the pointer through the camera
//! 2. Test it against interactive meshes whose layer is in the router's mask,
//!    using a bounding box check before the per-triangle test
//! 3. Mark the hit object hovered or selected and every other object idle
//! 4. Report the hit's door once per select press
//!
//! Select is edge triggered: holding the button keeps the hit object selected
//! but only dispatches a single interaction. A press that starts over empty
//! space is dispatched once the held pointer reaches an object.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3};

use crate::{
    camera::{Camera, Projection, Ray},
    data_structures::scene_graph::{Aabb, Layer, Layers, NodeId, Scene},
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    /// Normalized device coordinates, `None` until the first pointer event.
    pub ndc: Option<[f32; 2]>,
    pub select_held: bool,
    select_pending: bool,
}

impl PointerState {
    fn press(&mut self) {
        if !self.select_held {
            self.select_pending = true;
        }
        self.select_held = true;
    }

    fn release(&mut self) {
        self.select_held = false;
        self.select_pending = false;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    Hovered,
    Selected,
}

/// Something the pointer can hit: the subtree at `node`, which toggles `door` when selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interactive {
    pub node: NodeId,
    pub door: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    /// Registration index of the hit object.
    pub index: usize,
    pub node: NodeId,
    pub door: NodeId,
    pub distance: f32,
}

#[derive(Debug)]
pub struct InteractionRouter {
    pointer: PointerState,
    interactives: Vec<Interactive>,
    states: Vec<UiState>,
    mask: Layers,
}

impl Default for InteractionRouter {
    fn default() -> Self {
        Self::new(Layers::only(Layer::DOOR).with(Layer::UI))
    }
}

impl InteractionRouter {
    pub fn new(mask: Layers) -> Self {
        Self {
            pointer: PointerState::default(),
            interactives: Vec::new(),
            states: Vec::new(),
            mask,
        }
    }

    /// Registers an interactive object and returns its index. Earlier registrations win ties.
    pub fn register(&mut self, node: NodeId, door: NodeId) -> usize {
        self.interactives.push(Interactive { node, door });
        self.states.push(UiState::Idle);
        self.interactives.len() - 1
    }

    pub fn interactives(&self) -> &[Interactive] {
        &self.interactives
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn ui_state(&self, index: usize) -> UiState {
        self.states.get(index).copied().unwrap_or_default()
    }

    pub fn ui_state_of(&self, node: NodeId) -> UiState {
        self.interactives
            .iter()
            .position(|i| i.node == node)
            .map_or(UiState::Idle, |index| self.ui_state(index))
    }

    pub fn pointer_moved(&mut self, ndc: [f32; 2]) {
        self.pointer.ndc = Some(ndc);
    }

    pub fn pointer_down(&mut self, ndc: [f32; 2]) {
        self.pointer.ndc = Some(ndc);
        self.pointer.press();
    }

    pub fn pointer_up(&mut self) {
        self.pointer.release();
    }

    pub fn touch_start(&mut self, ndc: [f32; 2]) {
        self.pointer_down(ndc);
    }

    /// Lifting the finger also forgets the position, so nothing stays hovered.
    pub fn touch_end(&mut self) {
        self.pointer.ndc = None;
        self.pointer.release();
    }

    /// Controller triggers select without moving the pointer.
    pub fn controller_select(&mut self, pressed: bool) {
        if pressed {
            self.pointer.press();
        } else {
            self.pointer.release();
        }
    }

    /// Closest hit along `ray` among the registered objects, ties going to the first registered.
    pub fn raycast(&self, ray: &Ray, scene: &Scene) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        for (index, interactive) in self.interactives.iter().enumerate() {
            let Some(distance) = self.distance_to(ray, scene, interactive.node) else {
                continue;
            };
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(Hit {
                    index,
                    node: interactive.node,
                    door: interactive.door,
                    distance,
                });
            }
        }
        best
    }

    fn distance_to(&self, ray: &Ray, scene: &Scene, root: NodeId) -> Option<f32> {
        scene
            .descendants(root)
            .into_iter()
            .filter_map(|id| scene.node(id))
            .filter(|node| self.mask.contains(node.layer))
            .filter_map(|node| {
                let mesh = node.mesh.as_ref()?;
                let local = LocalRay::new(ray, &node.world().to_matrix())?;
                mesh.primitives
                    .iter()
                    .filter(|p| p.bounds.is_none_or(|b| local.hits_aabb(&b)))
                    .flat_map(|p| p.triangles())
                    .filter_map(|triangle| local.hits_triangle(&triangle))
                    .min_by(f32::total_cmp)
            })
            .min_by(f32::total_cmp)
    }

    /**
     * Runs one frame of pointer routing.
     *
     * # Arguments
     *
     * * `camera`, `projection` unproject the pointer position
     * * `scene` provides the meshes and world transforms to test against
     * * `controller_ray` replaces the pointer ray while an immersive session is active
     *
     * # Returns
     *
     * The door to interact with, if a select press landed on an object this frame.
     */
    pub fn route(
        &mut self,
        camera: &Camera,
        projection: &Projection,
        scene: &Scene,
        controller_ray: Option<Ray>,
    ) -> Option<Hit> {
        let ray = controller_ray.or_else(|| {
            self.pointer
                .ndc
                .and_then(|ndc| Ray::from_ndc(ndc, camera, projection))
        });
        let hit = ray.and_then(|ray| self.raycast(&ray, scene));

        self.states.iter_mut().for_each(|s| *s = UiState::Idle);
        if let Some(hit) = hit {
            self.states[hit.index] = if self.pointer.select_held {
                UiState::Selected
            } else {
                UiState::Hovered
            };
        }

        // A press that missed stays pending until it lands or the button is released
        let hit = hit.filter(|_| self.pointer.select_pending)?;
        self.pointer.select_pending = false;
        Some(hit)
    }
}

/// A world ray expressed in a node's local space. Distances along it stay world distances.
struct LocalRay {
    origin: Point3<f32>,
    direction: Vector3<f32>,
}

impl LocalRay {
    fn new(ray: &Ray, world: &Matrix4<f32>) -> Option<Self> {
        let inverse = world.invert()?;
        Some(Self {
            origin: Point3::from_homogeneous(inverse * ray.origin.to_homogeneous()),
            direction: (inverse * ray.direction.extend(0.0)).truncate(),
        })
    }

    /// Slab test.
    fn hits_aabb(&self, aabb: &Aabb) -> bool {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let inv = 1.0 / self.direction[axis];
            let t0 = (aabb.min[axis] - self.origin[axis]) * inv;
            let t1 = (aabb.max[axis] - self.origin[axis]) * inv;
            let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            // NaN from a zero direction inside the slab keeps the previous bounds
            t_min = t_min.max(near);
            t_max = t_max.min(far);
        }
        t_min <= t_max
    }

    /// Möller–Trumbore with both faces counted.
    fn hits_triangle(&self, triangle: &[[f32; 3]; 3]) -> Option<f32> {
        let [v0, v1, v2] = triangle.map(Vector3::from);
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let p = self.direction.cross(edge2);
        let determinant = edge1.dot(p);
        if determinant.abs() < f32::EPSILON {
            return None;
        }
        let inverse = 1.0 / determinant;
        let t_vec = self.origin.to_vec() - v0;
        let u = t_vec.dot(p) * inverse;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = t_vec.cross(edge1);
        let v = self.direction.dot(q) * inverse;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inverse;
        (t > f32::EPSILON).then_some(t)
    }
}
