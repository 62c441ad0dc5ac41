//! Viewer configuration.
//!
//! Everything tunable lives here so that hosts and tests can construct a
//! [`ViewerConfig`] with `..Default::default()` and change a single knob.

use instant::Duration;

use crate::data_structures::material::Color;

/// Door transition timing.
#[derive(Clone, Debug, PartialEq)]
pub struct DoorConfig {
    /// Wall-clock length of an opening or closing transition.
    pub duration: Duration,
    pub forward_scale: f32,
    /// Playback speed while closing. Negative and smaller in magnitude than `forward_scale`.
    pub reverse_scale: f32,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(3000),
            forward_scale: 1.0,
            reverse_scale: -0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorConfig {
    /// Angular frequency of the blink, in radians per second.
    pub blink_frequency: f32,
    pub bright: f32,
    pub dim: f32,
    pub opening: Color,
    pub closing: Color,
    pub open: Color,
    pub closed: Color,
    /// Material name that marks a light surface.
    pub light_material: String,
    /// Objects whose subtrees carry the light material.
    pub targets: Vec<String>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            blink_frequency: 15.0,
            bright: 1.0,
            dim: 0.2,
            opening: Color::from_hex(0x00FF00),
            closing: Color::from_hex(0xFF0000),
            open: Color::from_hex(0xFFFFFF),
            closed: Color::from_hex(0xAAAAAA),
            light_material: "M_Light_Door".to_string(),
            targets: vec!["Door_Button_1".to_string(), "Lichtstreifen".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub fovy: cgmath::Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub eye: cgmath::Point3<f32>,
    pub target: cgmath::Point3<f32>,
    /// Fraction of the remaining orbit velocity removed per update.
    pub damping: f32,
    /// Largest angle between the view direction and straight down, in radians.
    pub max_polar_angle: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy: cgmath::Deg(35.0),
            znear: 0.1,
            zfar: 1000.0,
            eye: cgmath::Point3::new(-4.0, 2.0, -4.0),
            target: cgmath::Point3::new(0.0, 0.8, 0.0),
            damping: 0.05,
            max_polar_angle: std::f32::consts::FRAC_PI_2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroundConfig {
    pub size: f32,
    pub color: Color,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            size: 25.0,
            color: Color::from_hex(0xA0A0A0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LightConfig {
    pub direction_from: cgmath::Point3<f32>,
    pub directional_intensity: f32,
    pub ambient_intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction_from: cgmath::Point3::new(2.0, 5.0, 2.0),
            directional_intensity: 1.0,
            ambient_intensity: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    /// Prefix joined with every descriptor path before fetching.
    pub base_path: String,
    pub clear_color: Color,
    pub door: DoorConfig,
    pub indicator: IndicatorConfig,
    pub camera: CameraConfig,
    pub ground: Option<GroundConfig>,
    pub light: LightConfig,
    pub show_panel: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_path: "assets/models/".to_string(),
            clear_color: Color::from_hex(0xF0F0F0),
            door: DoorConfig::default(),
            indicator: IndicatorConfig::default(),
            camera: CameraConfig::default(),
            ground: Some(GroundConfig::default()),
            light: LightConfig::default(),
            show_panel: true,
        }
    }
}
