//! The model parts that make up the CAB vehicle.
//!
//! Descriptors are plain data: which file to load, where to put it, which
//! authored materials to patch and how its first animation clip should play.
//! The two variants correspond to the two published asset drops.

use std::{fmt, str::FromStr};

use cgmath::Vector3;

use crate::data_structures::{
    driver::LoopMode,
    material::{Color, MaterialKind, MaterialProperty, Side},
    scene_graph::Layer,
};

/// Replaces every material called `name` with a patched copy.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialOverride {
    pub name: String,
    pub properties: Vec<MaterialProperty>,
}

impl MaterialOverride {
    pub fn new(name: &str, properties: &[MaterialProperty]) -> Self {
        Self {
            name: name.to_string(),
            properties: properties.to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationPolicy {
    pub autoplay: bool,
    pub loop_mode: LoopMode,
    pub speed: f32,
}

impl Default for AnimationPolicy {
    fn default() -> Self {
        Self {
            autoplay: true,
            loop_mode: LoopMode::Repeat,
            speed: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelDescriptor {
    /// Relative to the viewer's asset base path.
    pub path: String,
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
    /// Euler angles in radians.
    pub rotation: Vector3<f32>,
    pub materials: Vec<MaterialOverride>,
    pub animation: AnimationPolicy,
    pub layer: Layer,
}

impl ModelDescriptor {
    /// A part with the placement every CAB file shares.
    pub fn part(path: &str) -> Self {
        Self {
            path: path.to_string(),
            position: Vector3::new(-1.2, 0.045, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            materials: Vec::new(),
            animation: AnimationPolicy::default(),
            layer: Layer::OBJECTS,
        }
    }

    pub fn with_materials(mut self, materials: Vec<MaterialOverride>) -> Self {
        self.materials = materials;
        self
    }

    /// Marks the part as a door: interactive, and only animated on demand.
    pub fn door(mut self, speed: f32) -> Self {
        self.layer = Layer::DOOR;
        self.animation = AnimationPolicy {
            autoplay: false,
            loop_mode: LoopMode::Repeat,
            speed,
        };
        self
    }

    pub fn is_door(&self) -> bool {
        self.layer == Layer::DOOR
    }
}

fn glass_v1(name: &str) -> MaterialOverride {
    MaterialOverride::new(
        name,
        &[
            MaterialProperty::Transparent(true),
            MaterialProperty::Opacity(0.3),
            MaterialProperty::Roughness(0.1),
        ],
    )
}

/// First asset drop: glass overrides only, door `241202_CAB_Door.gltf`.
pub fn cab_v1() -> Vec<ModelDescriptor> {
    let glass = || vec![glass_v1("EX_Window"), glass_v1("Glas_Matrix")];
    vec![
        ModelDescriptor::part("241126_CAB_Exterior.gltf").with_materials(glass()),
        ModelDescriptor::part("241126_CAB_Interior-S.gltf").with_materials(glass()),
        ModelDescriptor::part("241126_CAB_Tires_Back.gltf"),
        ModelDescriptor::part("241126_CAB_Tires_FL.gltf"),
        ModelDescriptor::part("241126_CAB_Tires_FR.gltf"),
        ModelDescriptor::part("241202_CAB_Door.gltf")
            .with_materials(vec![glass_v1("EX_Window")])
            .door(0.5),
    ]
}

fn physical(name: &str, properties: &[MaterialProperty]) -> MaterialOverride {
    let mut all = vec![MaterialProperty::Kind(MaterialKind::Physical)];
    all.extend_from_slice(properties);
    MaterialOverride {
        name: name.to_string(),
        properties: all,
    }
}

fn physical_overrides() -> Vec<MaterialOverride> {
    use MaterialProperty as P;
    let glass = |metalness| {
        [
            P::Transparent(true),
            P::Opacity(0.3),
            P::Roughness(0.1),
            P::Metalness(metalness),
            P::EnvMapIntensity(2.0),
            P::Side(Side::Double),
        ]
    };
    let paint = |roughness, metalness| {
        [
            P::Transparent(false),
            P::Roughness(roughness),
            P::Metalness(metalness),
            P::EnvMapIntensity(2.0),
            P::Side(Side::Double),
        ]
    };
    vec![
        physical("EX_Window", &glass(0.9)),
        physical("Glas_Matrix", &glass(0.5)),
        physical(
            "M_Light_Door",
            &[
                P::Emissive(Color::from_hex(0xFF0000)),
                P::EmissiveIntensity(100.0),
                P::Roughness(1.0),
                P::Metalness(0.0),
            ],
        ),
        physical("EX_Lack_Seite", &paint(0.1, 0.8)),
        physical("EX_Lack_Front", &paint(0.1, 0.8)),
        physical("Radkappen", &paint(0.8, 1.0)),
    ]
}

/// Second asset drop: eight parts sharing one physical-material override list,
/// door `241206_CAB_Door.gltf`.
pub fn cab_v2() -> Vec<ModelDescriptor> {
    const PARTS: [&str; 8] = [
        "241126_CAB_Exterior.gltf",
        "241126_CAB_Interior-S.gltf",
        "241126_CAB_Tires_Back.gltf",
        "241126_CAB_Tires_FL.gltf",
        "241126_CAB_Tires_FR.gltf",
        "241206_CAB_Door.gltf",
        "241210_CAB_Rolling-Chassis.gltf",
        "241206_CAB_Light-Door.gltf",
    ];
    PARTS
        .iter()
        .map(|path| {
            let part = ModelDescriptor::part(path).with_materials(physical_overrides());
            if *path == "241206_CAB_Door.gltf" {
                part.door(1.0)
            } else {
                part
            }
        })
        .collect()
}

/// The interactive subset of a registry.
pub fn door_descriptors(registry: &[ModelDescriptor]) -> impl Iterator<Item = &ModelDescriptor> {
    registry.iter().filter(|d| d.is_door())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variant {
    V1,
    #[default]
    V2,
}

impl Variant {
    pub fn descriptors(self) -> Vec<ModelDescriptor> {
        match self {
            Variant::V1 => cab_v1(),
            Variant::V2 => cab_v2(),
        }
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(Variant::V1),
            "v2" | "2" => Ok(Variant::V2),
            other => anyhow::bail!("Unknown registry variant {other:?}, expected v1 or v2"),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::V1 => write!(f, "v1"),
            Variant::V2 => write!(f, "v2"),
        }
    }
}
