use cab_viewer::{
    camera::{Camera, Projection, Ray},
    data_structures::{
        instance::Instance,
        material::Material,
        scene_graph::{Layer, Mesh, Node, NodeId, Scene},
    },
    pick::{InteractionRouter, UiState},
};
use cgmath::{Deg, Point3, Vector3};

fn quad_at(scene: &mut Scene, name: &str, z: f32, layer: Layer) -> NodeId {
    let material = scene.add_material(Material::new(name));
    scene.add_node(
        None,
        Node::named(name)
            .with_mesh(Mesh::quad(1.0, 1.0, material))
            .with_transform(Instance::from(Vector3::new(0.0, 0.0, z)))
            .with_layer(layer),
    )
}

fn looking_down_z() -> Ray {
    Ray::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -1.0))
}

#[test]
fn nearer_object_wins_whatever_the_registration_order() {
    let mut scene = Scene::new();
    let far = quad_at(&mut scene, "far", -5.0, Layer::DOOR);
    let near = quad_at(&mut scene, "near", -2.0, Layer::DOOR);
    scene.update_world_transforms();

    let mut router = InteractionRouter::default();
    router.register(far, far);
    router.register(near, near);

    let hit = router.raycast(&looking_down_z(), &scene).expect("hit");
    assert_eq!(hit.door, near);
    assert_eq!(hit.index, 1);
    assert!((hit.distance - 2.0).abs() < 1e-5);
}

#[test]
fn objects_outside_the_mask_neither_hit_nor_occlude() {
    let mut scene = Scene::new();
    let door = quad_at(&mut scene, "door", -5.0, Layer::DOOR);
    let wall = quad_at(&mut scene, "wall", -2.0, Layer::OBJECTS);
    scene.update_world_transforms();

    let mut router = InteractionRouter::default();
    router.register(wall, wall);
    router.register(door, door);

    let hit = router.raycast(&looking_down_z(), &scene).expect("hit");
    assert_eq!(hit.door, door);
    assert!((hit.distance - 5.0).abs() < 1e-5);
}

#[test]
fn press_routes_to_the_pointed_object_and_hover_follows() {
    let mut scene = Scene::new();
    let door = quad_at(&mut scene, "door", 0.0, Layer::DOOR);
    scene.update_world_transforms();

    // aimed off the quad's diagonal
    let camera = Camera::new((0.2, -0.15, 5.0), (0.2, -0.15, 0.0));
    let projection = Projection::new(800, 600, Deg(45.0), 0.1, 100.0);
    let mut router = InteractionRouter::default();
    router.register(door, door);

    router.pointer_moved([0.0, 0.0]);
    assert_eq!(router.route(&camera, &projection, &scene, None), None);
    assert_eq!(router.ui_state_of(door), UiState::Hovered);

    router.pointer_down([0.0, 0.0]);
    let hit = router.route(&camera, &projection, &scene, None).expect("selected");
    assert_eq!(hit.door, door);
    assert!((hit.distance - 5.0).abs() < 1e-4);
    assert_eq!(router.ui_state_of(door), UiState::Selected);

    // still held: no second selection
    assert_eq!(router.route(&camera, &projection, &scene, None), None);

    router.pointer_up();
    router.pointer_moved([0.9, 0.9]);
    assert_eq!(router.route(&camera, &projection, &scene, None), None);
    assert_eq!(router.ui_state_of(door), UiState::Idle);
}
