use std::time::Duration;

use cab_viewer::{
    ModelDescriptor, Viewer, ViewerConfig,
    data_structures::{material::MaterialProperty, scene_graph::Layer},
    registry::MaterialOverride,
    resources::loader::ModelLoader,
};
use futures::StreamExt;
use log::Level;

use crate::common::test_utils::{DelayedSource, cab_source, capture_logs, door_model};

mod common;

const BASE: &str = "models/";

fn config() -> ViewerConfig {
    ViewerConfig {
        base_path: BASE.to_string(),
        ground: None,
        show_panel: false,
        ..Default::default()
    }
}

fn material_of<'a>(viewer: &'a Viewer, node: &str) -> &'a cab_viewer::data_structures::material::Material {
    let scene = viewer.scene();
    let id = scene.find_by_name(node).expect("node");
    let mesh = scene.node(id).and_then(|n| n.mesh.as_ref()).expect("mesh");
    let material = mesh.primitives[0].material.ids()[0];
    scene.material(material).expect("material")
}

#[tokio::test]
async fn missing_part_is_skipped_and_the_rest_load() {
    let logs = capture_logs();
    let source = cab_source(BASE);
    let descriptors = vec![
        ModelDescriptor::part("body.gltf"),
        ModelDescriptor::part("missing.gltf"),
        ModelDescriptor::part("door.gltf").door(1.0),
    ];

    let mut viewer = Viewer::new(config(), 800, 600);
    let loaded = viewer.load(&source, &descriptors).await;

    assert_eq!(loaded, 2);
    assert_eq!(viewer.scene().roots().len(), 2);
    let paths: Vec<&str> = viewer.parts().iter().map(|p| p.path.as_str()).collect();
    assert_eq!(paths, ["body.gltf", "door.gltf"]);
    assert_eq!(viewer.door_nodes().count(), 1);
    assert_eq!(viewer.router().interactives().len(), 1);
    assert!(logs.contains(Level::Error, "missing.gltf"));
}

#[tokio::test]
async fn slow_part_does_not_hold_back_the_others() {
    let source = DelayedSource::new(cab_source(BASE), "models/door.gltf", Duration::from_millis(200));
    let descriptors = vec![ModelDescriptor::part("door.gltf").door(1.0), ModelDescriptor::part("body.gltf")];
    let loader = ModelLoader::new(BASE);
    let mut outcomes = loader.load_each(&source, &descriptors);
    let mut viewer = Viewer::new(config(), 800, 600);

    let first = outcomes.next().await.expect("first outcome");
    assert_eq!(first.descriptor.path, "body.gltf");
    assert!(viewer.attach(first).is_some());
    assert_eq!(viewer.parts().len(), 1);
    assert_eq!(viewer.door_nodes().count(), 0);

    let second = outcomes.next().await.expect("second outcome");
    assert_eq!(second.descriptor.path, "door.gltf");
    assert!(viewer.attach(second).is_some());
    assert_eq!(viewer.door_nodes().count(), 1);
    assert!(outcomes.next().await.is_none());
}

#[tokio::test]
async fn outcomes_keep_registry_order() {
    let source = cab_source(BASE);
    let descriptors = vec![
        ModelDescriptor::part("door.gltf").door(1.0),
        ModelDescriptor::part("nope.gltf"),
        ModelDescriptor::part("body.gltf"),
    ];

    let outcomes = ModelLoader::new(BASE).load_all(&source, &descriptors).await;

    let paths: Vec<&str> = outcomes.iter().map(|o| o.descriptor.path.as_str()).collect();
    assert_eq!(paths, ["door.gltf", "nope.gltf", "body.gltf"]);
    assert!(outcomes[0].result.is_ok());
    let err = outcomes[1].result.as_ref().expect_err("missing file");
    assert!(format!("{err:#}").contains("models/nope.gltf"));
    assert!(outcomes[2].result.is_ok());
}

#[tokio::test]
async fn parts_are_placed_and_layered() {
    let source = cab_source(BASE);
    let descriptors = vec![ModelDescriptor::part("body.gltf"), ModelDescriptor::part("door.gltf").door(1.0)];
    let mut viewer = Viewer::new(config(), 800, 600);
    viewer.load(&source, &descriptors).await;

    let scene = viewer.scene();
    let body = scene.find_by_name("Body").expect("body");
    let window = scene.find_by_name("Window").expect("window");
    let door = scene.find_by_name("Door").expect("door");

    assert_eq!(scene.node(body).map(|n| n.layer), Some(Layer::OBJECTS));
    assert_eq!(scene.node(door).map(|n| n.layer), Some(Layer::DOOR));
    let window = scene.node(window).expect("window node");
    assert!(window.cast_shadow && window.receive_shadow);
    let world = window.world().position;
    assert!((world.x + 1.2).abs() < 1e-5);
    assert!((world.y - 0.045).abs() < 1e-5);
}

#[tokio::test]
async fn glass_override_patches_only_the_named_material() {
    let source = cab_source(BASE);
    let descriptors = vec![ModelDescriptor::part("body.gltf").with_materials(vec![
        MaterialOverride::new(
            "EX_Window",
            &[
                MaterialProperty::Transparent(true),
                MaterialProperty::Opacity(0.3),
                MaterialProperty::Roughness(0.1),
            ],
        ),
        MaterialOverride::new("Not_In_This_File", &[MaterialProperty::Opacity(0.5)]),
    ])];
    let mut viewer = Viewer::new(config(), 800, 600);
    viewer.load(&source, &descriptors).await;

    let glass = material_of(&viewer, "Window");
    assert_eq!(glass.name, "EX_Window");
    assert!(glass.transparent);
    assert_eq!(glass.opacity, 0.3);
    assert_eq!(glass.roughness, 0.1);
    assert!(glass.is_translucent());

    let paint = material_of(&viewer, "Body");
    assert_eq!(paint.name, "Body_Paint");
    assert_eq!(paint.opacity, 1.0);
    assert!(!paint.transparent);
}

#[tokio::test]
async fn door_driver_waits_for_interaction() {
    let source = cab_source(BASE);
    let mut viewer = Viewer::new(config(), 800, 600);
    viewer.load(&source, &[ModelDescriptor::part("door.gltf").door(1.0)]).await;

    let part = &viewer.parts()[0];
    let clip = part.clip.as_ref().expect("door clip");
    assert_eq!(clip.name, "Open");
    assert_eq!(clip.duration, 3.0);
    let driver = viewer.drivers().get(part.driver.expect("driver")).expect("driver");
    assert!(!driver.is_active());
    assert_eq!(driver.time(), 0.0);
}

#[test]
fn test_model_is_valid_gltf() {
    let json = door_model().json();
    let gltf = gltf::Gltf::from_slice(json.as_bytes()).expect("valid document");
    assert_eq!(gltf.nodes().count(), 2);
    assert_eq!(gltf.animations().count(), 1);
    assert_eq!(gltf.materials().count(), 2);
}
