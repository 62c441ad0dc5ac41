//! Engine data structures: scene graphs, transforms, materials and animation playback.
//!
//! This module contains the core data types for scene representation:
//!
//! - `instance` holds per-node transformation data
//! - `material` contains CPU-side material parameters and overridable properties
//! - `scene_graph` enables hierarchical scene organization with interaction layers
//! - `driver` advances animation clips and writes their poses into the scene
//! - `panel` is the in-scene button panel
//! - `texture` contains GPU texture wrapper and creation utilities (render host only)

pub mod driver;
pub mod instance;
pub mod material;
pub mod panel;
pub mod scene_graph;
#[cfg(feature = "host")]
pub mod texture;
