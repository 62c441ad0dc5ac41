use cgmath::Vector3;

use crate::{
    data_structures::{
        instance::Instance,
        material::{Color, Material, Side},
        scene_graph::{Layer, MaterialId, Mesh, Node, NodeId, Scene},
    },
    pick::UiState,
};

/// Look of a button in one [`UiState`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ButtonStyle {
    /// Distance the button floats in front of its container.
    pub offset: f32,
    pub background: Color,
    pub opacity: f32,
}

impl ButtonStyle {
    pub fn of(state: UiState) -> Self {
        match state {
            UiState::Idle => ButtonStyle {
                offset: 0.035,
                background: Color::from_hex(0x666666),
                opacity: 0.3,
            },
            UiState::Hovered => ButtonStyle {
                offset: 0.035,
                background: Color::from_hex(0x999999),
                opacity: 1.0,
            },
            UiState::Selected => ButtonStyle {
                offset: 0.02,
                background: Color::from_hex(0x777777),
                opacity: 1.0,
            },
        }
    }
}

/**
 * A small floating panel holding the "Door" button.
 *
 * The container is a translucent backing plate tilted towards the viewer; the
 * button is a quad on the UI layer in front of it whose material and offset
 * follow the router's [`UiState`] for it.
 */
#[derive(Clone, Debug)]
pub struct ButtonPanel {
    container: NodeId,
    button: NodeId,
    material: MaterialId,
    state: Option<UiState>,
}

impl ButtonPanel {
    const BUTTON_SIZE: (f32, f32) = (0.4, 0.15);
    const PADDING: f32 = 0.04;

    pub fn build(scene: &mut Scene) -> Self {
        let backing = scene.add_material(
            Material {
                transparent: true,
                opacity: 0.8,
                side: Side::Double,
                ..Material::new("PanelBacking")
            }
            .with_color(Color::from_hex(0x222222)),
        );
        let (width, height) = Self::BUTTON_SIZE;
        let container = scene.add_node(
            None,
            Node::named("ButtonPanel")
                .with_mesh(Mesh::quad(width + 2.0 * Self::PADDING, height + 2.0 * Self::PADDING, backing))
                .with_transform(Instance::from_euler(
                    Vector3::new(0.0, 0.6, -1.2),
                    Vector3::new(-0.55, 0.0, 0.0),
                    Vector3::new(1.0, 1.0, 1.0),
                )),
        );

        let material = scene.add_material(Material {
            side: Side::Double,
            ..Material::new("DoorButton")
        });
        let button = scene.add_node(
            Some(container),
            Node::named("DoorButton").with_mesh(Mesh::quad(width, height, material)).with_layer(Layer::UI),
        );

        let mut panel = Self {
            container,
            button,
            material,
            state: None,
        };
        panel.sync(scene, UiState::Idle);
        panel
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn button(&self) -> NodeId {
        self.button
    }

    pub fn state(&self) -> UiState {
        self.state.unwrap_or_default()
    }

    /// Restyles the button if `state` differs from the last synced one.
    pub fn sync(&mut self, scene: &mut Scene, state: UiState) {
        if self.state == Some(state) {
            return;
        }
        let style = ButtonStyle::of(state);
        if let Some(node) = scene.node_mut(self.button) {
            node.local.position.z = style.offset;
        }
        if let Some(material) = scene.material_mut(self.material) {
            let [r, g, b] = style.background.to_array();
            material.base_color = [r, g, b, material.base_color[3]];
            material.opacity = style.opacity;
            material.transparent = style.opacity < 1.0;
        }
        self.state = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_places_button_on_ui_layer_in_idle_style() {
        let mut scene = Scene::new();
        let panel = ButtonPanel::build(&mut scene);
        let button = scene.node(panel.button()).expect("button");
        assert_eq!(button.layer, Layer::UI);
        assert_eq!(button.parent(), Some(panel.container()));
        assert_eq!(button.local.position.z, 0.035);
        assert_eq!(panel.state(), UiState::Idle);
    }

    #[test]
    fn button_name_does_not_shadow_door_parts() {
        let mut scene = Scene::new();
        let panel = ButtonPanel::build(&mut scene);
        assert_eq!(scene.find_by_name("DoorButton"), Some(panel.button()));
        assert_eq!(scene.find_by_name("Door"), None);
    }

    #[test]
    fn sync_applies_state_styles() {
        let mut scene = Scene::new();
        let mut panel = ButtonPanel::build(&mut scene);
        panel.sync(&mut scene, UiState::Selected);
        let button = scene.node(panel.button()).expect("button");
        assert_eq!(button.local.position.z, 0.02);
        let material = scene.material(panel.material).expect("material");
        assert_eq!(material.base_color[..3], Color::from_hex(0x777777).to_array());
        assert!(!material.transparent);

        panel.sync(&mut scene, UiState::Idle);
        let material = scene.material(panel.material).expect("material");
        assert_eq!(material.opacity, 0.3);
        assert!(material.is_translucent());
    }
}
