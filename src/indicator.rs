//! Door indicator lights.
//!
//! The light surfaces blink green while a door opens and red while it closes,
//! and glow steady white (open) or gray (closed) otherwise.

use log::debug;

use crate::{
    config::IndicatorConfig,
    data_structures::{material::Color, scene_graph::Scene},
    door::DoorState,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emission {
    pub color: Color,
    pub intensity: f32,
}

/// The light output for a door in `state` that has been transitioning for `timer` seconds.
pub fn emission(state: DoorState, timer: f32, config: &IndicatorConfig) -> Emission {
    let blink = || {
        if (timer * config.blink_frequency).sin() > 0.0 {
            config.bright
        } else {
            config.dim
        }
    };
    match state {
        DoorState::Opening => Emission {
            color: config.opening,
            intensity: blink(),
        },
        DoorState::Closing => Emission {
            color: config.closing,
            intensity: blink(),
        },
        DoorState::Open => Emission {
            color: config.open,
            intensity: config.bright,
        },
        DoorState::Closed => Emission {
            color: config.closed,
            intensity: config.bright,
        },
    }
}

/**
 * Writes `emission` into every material named `config.light_material` below
 * the configured target objects, whether a sub-mesh uses it alone or as one
 * of several material groups. Returns the number of materials updated.
 */
pub fn apply_emission(scene: &mut Scene, config: &IndicatorConfig, emission: Emission) -> usize {
    let mut updated = 0;
    for target in &config.targets {
        let Some(root) = scene.find_by_name(target) else {
            debug!("Indicator target {target:?} is not in the scene");
            continue;
        };
        let materials: Vec<_> = scene
            .descendants(root)
            .into_iter()
            .filter_map(|id| scene.node(id)?.mesh.as_ref())
            .flat_map(|mesh| mesh.primitives.iter().flat_map(|p| p.material.ids()))
            .collect();
        for id in materials {
            if let Some(material) = scene.material_mut(id).filter(|m| m.name == config.light_material) {
                material.emissive = emission.color;
                material.emissive_intensity = emission.intensity;
                updated += 1;
            }
        }
    }
    updated
}
