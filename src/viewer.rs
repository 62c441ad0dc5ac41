//! The viewer: everything one running product view owns.
//!
//! A [`Viewer`] is created once at startup. Loaded parts are attached as
//! they arrive, pointer events are fed in as normalized device coordinates,
//! and [`Viewer::advance`] runs one frame:
//!
//! 1. orbit camera
//! 2. animation drivers, then door transitions
//! 3. poses into the scene, world transforms
//! 4. pointer routing (which may start a door transition)
//! 5. indicator lights and the button panel

use std::collections::HashMap;

use cgmath::{Rad, Vector3};
use instant::Duration;
use log::info;

use crate::{
    camera::{Camera, OrbitController, Projection, Ray},
    config::{GroundConfig, ViewerConfig},
    data_structures::{
        driver::{DriverId, DriverPool},
        instance::Instance,
        material::{Material, Side},
        panel::ButtonPanel,
        scene_graph::{Layer, Mesh, Node, NodeId, Scene},
    },
    door::{DoorState, DoorStateMachine, Interaction},
    indicator::{apply_emission, emission},
    pick::InteractionRouter,
    registry::ModelDescriptor,
    resources::{
        AssetSource,
        loader::{LoadOutcome, LoadedPart, ModelLoader},
    },
};

#[derive(Debug)]
pub struct Viewer {
    config: ViewerConfig,
    scene: Scene,
    camera: Camera,
    projection: Projection,
    orbit: OrbitController,
    drivers: DriverPool,
    parts: Vec<LoadedPart>,
    doors: DoorStateMachine,
    door_drivers: HashMap<NodeId, Option<DriverId>>,
    router: InteractionRouter,
    panel: Option<ButtonPanel>,
    panel_bound: bool,
    controller_ray: Option<Ray>,
}

fn add_ground(scene: &mut Scene, ground: &GroundConfig) -> NodeId {
    let material = scene.add_material(
        Material {
            side: Side::Double,
            ..Material::new("Ground")
        }
        .with_color(ground.color),
    );
    let mut node = Node::named("Ground")
        .with_mesh(Mesh::quad(ground.size, ground.size, material))
        .with_transform(Instance::from_euler(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        ))
        .with_layer(Layer::GROUND);
    node.receive_shadow = true;
    scene.add_node(None, node)
}

impl Viewer {
    pub fn new(config: ViewerConfig, width: u32, height: u32) -> Self {
        let mut scene = Scene::new();
        if let Some(ground) = &config.ground {
            add_ground(&mut scene, ground);
        }
        let panel = config.show_panel.then(|| ButtonPanel::build(&mut scene));
        scene.update_world_transforms();

        let camera = Camera::new(config.camera.eye, config.camera.target);
        let projection = Projection::new(
            width,
            height,
            Rad::from(config.camera.fovy),
            config.camera.znear,
            config.camera.zfar,
        );
        let orbit = OrbitController::new(&camera, &config.camera);

        Self {
            doors: DoorStateMachine::new(config.door.clone()),
            config,
            scene,
            camera,
            projection,
            orbit,
            drivers: DriverPool::new(),
            parts: Vec::new(),
            door_drivers: HashMap::new(),
            router: InteractionRouter::default(),
            panel,
            panel_bound: false,
            controller_ray: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn drivers(&self) -> &DriverPool {
        &self.drivers
    }

    pub fn parts(&self) -> &[LoadedPart] {
        &self.parts
    }

    pub fn doors(&self) -> &DoorStateMachine {
        &self.doors
    }

    pub fn router(&self) -> &InteractionRouter {
        &self.router
    }

    pub fn panel(&self) -> Option<&ButtonPanel> {
        self.panel.as_ref()
    }

    pub fn loader(&self) -> ModelLoader {
        ModelLoader::new(self.config.base_path.clone())
    }

    /// Root nodes of every loaded door.
    pub fn door_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.parts.iter().filter(|p| p.layer == Layer::DOOR).map(|p| p.root)
    }

    /**
     * Adds one load result to the scene. Door parts become interactive; the
     * first one is also what the panel button toggles. Returns the part's root,
     * or `None` when the load had failed.
     */
    pub fn attach(&mut self, outcome: LoadOutcome) -> Option<NodeId> {
        let part = ModelLoader::attach(outcome, &mut self.scene, &mut self.drivers)?;
        let root = part.root;
        if part.layer == Layer::DOOR {
            self.router.register(root, root);
            self.door_drivers.insert(root, part.driver);
            if let Some(panel) = self.panel.as_ref().filter(|_| !self.panel_bound) {
                self.router.register(panel.button(), root);
                self.panel_bound = true;
            }
        }
        self.parts.push(part);
        Some(root)
    }

    /// Loads and attaches `descriptors`, returning how many parts made it into the scene.
    pub async fn load<S: AssetSource>(&mut self, source: &S, descriptors: &[ModelDescriptor]) -> usize {
        let outcomes = self.loader().load_all(source, descriptors).await;
        let loaded = outcomes
            .into_iter()
            .filter_map(|outcome| self.attach(outcome))
            .count();
        info!("{loaded} of {} parts loaded", descriptors.len());
        loaded
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
    }

    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.orbit.rotate(dx, dy);
    }

    pub fn zoom(&mut self, amount: f32) {
        self.orbit.zoom(amount);
    }

    pub fn pointer_moved(&mut self, ndc: [f32; 2]) {
        self.router.pointer_moved(ndc);
    }

    pub fn pointer_down(&mut self, ndc: [f32; 2]) {
        self.router.pointer_down(ndc);
    }

    pub fn pointer_up(&mut self) {
        self.router.pointer_up();
    }

    pub fn touch_start(&mut self, ndc: [f32; 2]) {
        self.router.touch_start(ndc);
    }

    pub fn touch_end(&mut self) {
        self.router.touch_end();
    }

    /// Immersive controller ray; `None` hands picking back to the pointer.
    pub fn set_controller_ray(&mut self, ray: Option<Ray>) {
        self.controller_ray = ray;
    }

    pub fn controller_select(&mut self, pressed: bool) {
        self.router.controller_select(pressed);
    }

    pub fn door_state(&self, door: NodeId) -> DoorState {
        self.doors.state(door)
    }

    pub fn toggle_door(&mut self, door: NodeId) -> Interaction {
        let driver = self.door_drivers.get(&door).copied().flatten();
        self.doors.interact(door, driver, &mut self.drivers)
    }

    /// Casts through `ndc` right away and toggles the door that was hit, if any.
    pub fn interact(&mut self, ndc: [f32; 2]) -> Option<Interaction> {
        self.scene.update_world_transforms();
        let ray = Ray::from_ndc(ndc, &self.camera, &self.projection)?;
        let hit = self.router.raycast(&ray, &self.scene)?;
        Some(self.toggle_door(hit.door))
    }

    pub fn advance(&mut self, dt: Duration) {
        self.orbit.update(&mut self.camera);

        self.drivers.advance(dt);
        self.doors.tick(dt, &mut self.drivers);
        self.drivers.apply(&mut self.scene);
        self.scene.update_world_transforms();

        if let Some(hit) = self
            .router
            .route(&self.camera, &self.projection, &self.scene, self.controller_ray)
        {
            self.toggle_door(hit.door);
        }

        let emissions: Vec<_> = self
            .doors
            .records()
            .map(|(_, record)| emission(record.state, record.blink_timer, &self.config.indicator))
            .collect();
        for light in emissions {
            apply_emission(&mut self.scene, &self.config.indicator, light);
        }

        if let Some(panel) = &mut self.panel {
            let state = self.router.ui_state_of(panel.button());
            panel.sync(&mut self.scene, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pick::UiState;

    #[test]
    fn new_viewer_has_ground_and_panel() {
        let viewer = Viewer::new(ViewerConfig::default(), 800, 600);
        let ground = viewer.scene().find_by_name("Ground").expect("ground");
        assert_eq!(viewer.scene().node(ground).map(|n| n.layer), Some(Layer::GROUND));
        assert!(viewer.panel().is_some());
        assert!(viewer.router().interactives().is_empty());
    }

    #[test]
    fn bare_viewer_advances_without_parts() {
        let mut viewer = Viewer::new(
            ViewerConfig {
                ground: None,
                show_panel: false,
                ..Default::default()
            },
            800,
            600,
        );
        viewer.pointer_down([0.0, 0.0]);
        viewer.advance(Duration::from_millis(16));
        assert!(viewer.scene().roots().is_empty());
        assert_eq!(viewer.interact([0.0, 0.0]), None);
    }

    #[test]
    fn unknown_door_reports_no_animation() {
        let mut viewer = Viewer::new(ViewerConfig::default(), 800, 600);
        let ground = viewer.scene().find_by_name("Ground").expect("ground");
        assert_eq!(viewer.toggle_door(ground), Interaction::NoAnimation);
        assert_eq!(viewer.door_state(ground), DoorState::Closed);
        assert_eq!(viewer.panel().map(|p| p.state()), Some(UiState::Idle));
    }
}
