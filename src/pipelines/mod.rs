//! Render pipeline definitions: opaque and alpha blended scene geometry.

pub mod basic;
pub mod light;
pub mod transparent;
