//! Materials as the viewer sees them: plain CPU-side PBR parameters.
//!
//! Materials are identified by their authored name. The loader patches them
//! with [`MaterialProperty`] overrides and the indicator lights rewrite their
//! emissive term every frame; the render host mirrors them into uniforms.

use std::fmt;

/// Linear RGB colour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB` as used by the asset authors.
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        write!(f, "#{:02x}{:02x}{:02x}", to_u8(self.r), to_u8(self.g), to_u8(self.b))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaterialKind {
    #[default]
    Standard,
    Physical,
}

/// Which faces of a primitive are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Index of a decoded image in the owning [`crate::data_structures::scene_graph::Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// A single material property an override can set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialProperty {
    Kind(MaterialKind),
    Transparent(bool),
    Opacity(f32),
    Roughness(f32),
    Metalness(f32),
    EnvMapIntensity(f32),
    Emissive(Color),
    EmissiveIntensity(f32),
    Side(Side),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    pub base_color: [f32; 4],
    pub base_color_texture: Option<TextureId>,
    pub normal_texture: Option<TextureId>,
    pub roughness: f32,
    pub metalness: f32,
    pub emissive: Color,
    pub emissive_intensity: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub env_map_intensity: f32,
    pub side: Side,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.base_color = [color.r, color.g, color.b, self.base_color[3]];
        self
    }

    pub fn set(&mut self, property: MaterialProperty) {
        match property {
            MaterialProperty::Kind(kind) => self.kind = kind,
            MaterialProperty::Transparent(transparent) => self.transparent = transparent,
            MaterialProperty::Opacity(opacity) => self.opacity = opacity,
            MaterialProperty::Roughness(roughness) => self.roughness = roughness,
            MaterialProperty::Metalness(metalness) => self.metalness = metalness,
            MaterialProperty::EnvMapIntensity(intensity) => self.env_map_intensity = intensity,
            MaterialProperty::Emissive(color) => self.emissive = color,
            MaterialProperty::EmissiveIntensity(intensity) => self.emissive_intensity = intensity,
            MaterialProperty::Side(side) => self.side = side,
        }
    }

    /**
     * Builds the replacement material for an override: a fresh PBR material that
     * keeps the name, base colour and texture maps of `self`, renders both faces
     * and then carries every property of the override on top.
     */
    pub fn overridden(&self, properties: &[MaterialProperty]) -> Material {
        let mut material = Material {
            name: self.name.clone(),
            base_color: self.base_color,
            base_color_texture: self.base_color_texture,
            normal_texture: self.normal_texture,
            side: Side::Double,
            ..Default::default()
        };
        properties.iter().for_each(|property| material.set(*property));
        material
    }

    pub fn is_translucent(&self) -> bool {
        self.transparent && self.opacity < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: MaterialKind::Standard,
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            normal_texture: None,
            roughness: 1.0,
            metalness: 0.0,
            emissive: Color::BLACK,
            emissive_intensity: 1.0,
            opacity: 1.0,
            transparent: false,
            env_map_intensity: 1.0,
            side: Side::Front,
        }
    }
}
