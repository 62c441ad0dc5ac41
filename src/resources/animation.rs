//! Keyframe animation data read from glTF files and sampled at arbitrary times.

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};
use log::warn;

use crate::data_structures::instance::Instance;

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    /// Cubic spline output triples `(in-tangent, value, out-tangent)`; only the value is sampled.
    CubicSpline,
}

impl From<gltf::animation::Interpolation> for Interpolation {
    fn from(value: gltf::animation::Interpolation) -> Self {
        match value {
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        }
    }
}

/// Keyframes driving one property of one node.
///
/// `target` is the node's index inside its glTF document; the loader maps it
/// to the scene node once the hierarchy is built.
#[derive(Clone, Debug)]
pub struct Channel {
    pub target: usize,
    pub keyframes: Keyframes,
    pub timestamps: Vec<f32>,
    pub interpolation: Interpolation,
}

/// An animation clip: a named set of channels sharing one timeline.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.timestamps.last().copied())
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            channels,
            duration,
        }
    }
}

impl Channel {
    /// Writes the value at `time` into the matching component of `local`.
    pub fn sample_into(&self, time: f32, local: &mut Instance) {
        match &self.keyframes {
            Keyframes::Translation(values) => {
                if let Some(v) = self.sample_vec(values, time) {
                    local.position = v;
                }
            }
            Keyframes::Scale(values) => {
                if let Some(v) = self.sample_vec(values, time) {
                    local.scale = v;
                }
            }
            Keyframes::Rotation(values) => {
                if let Some(q) = self.sample_quat(values, time) {
                    local.rotation = q;
                }
            }
            Keyframes::Other => {}
        }
    }

    fn value_at<T: Copy>(&self, values: &[T], key: usize) -> Option<T> {
        match self.interpolation {
            Interpolation::CubicSpline => values.get(key * 3 + 1).copied(),
            _ => values.get(key).copied(),
        }
    }

    /// Index of the key at or before `time` and the blend factor towards the next one.
    fn locate(&self, time: f32) -> Option<(usize, usize, f32)> {
        let times = &self.timestamps;
        let last = times.len().checked_sub(1)?;
        if time <= times[0] {
            return Some((0, 0, 0.0));
        }
        if time >= times[last] {
            return Some((last, last, 0.0));
        }
        let next = times.partition_point(|t| *t <= time);
        let prev = next - 1;
        let span = times[next] - times[prev];
        let factor = if span > 0.0 {
            (time - times[prev]) / span
        } else {
            0.0
        };
        Some((prev, next, factor))
    }

    fn sample_vec(&self, values: &[Vector3<f32>], time: f32) -> Option<Vector3<f32>> {
        let (prev, next, factor) = self.locate(time)?;
        let a = self.value_at(values, prev)?;
        if self.interpolation == Interpolation::Step {
            return Some(a);
        }
        let b = self.value_at(values, next)?;
        Some(a.lerp(b, factor))
    }

    fn sample_quat(&self, values: &[Quaternion<f32>], time: f32) -> Option<Quaternion<f32>> {
        let (prev, next, factor) = self.locate(time)?;
        let a = self.value_at(values, prev)?;
        if self.interpolation == Interpolation::Step {
            return Some(a);
        }
        let b = self.value_at(values, next)?;
        // take the short way round
        let b = if a.dot(b) < 0.0 { -b } else { b };
        Some(a.nlerp(b, factor).normalize())
    }
}

/// Reads every animation of a document. Morph target channels are not supported and skipped.
pub fn read_animations(document: &gltf::Document, buffers: &[Vec<u8>]) -> Vec<AnimationClip> {
    document
        .animations()
        .map(|animation| {
            let name = animation.name().unwrap_or("Default").to_string();
            let channels = animation
                .channels()
                .filter_map(|channel| {
                    let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
                    let timestamps: Vec<f32> = match reader.read_inputs() {
                        Some(inputs) => inputs.collect(),
                        None => {
                            warn!("No timestamps found in channel {} of {}", channel.index(), name);
                            return None;
                        }
                    };
                    let keyframes = match reader.read_outputs()? {
                        gltf::animation::util::ReadOutputs::Translations(t) => {
                            Keyframes::Translation(t.map(Into::into).collect())
                        }
                        gltf::animation::util::ReadOutputs::Rotations(r) => {
                            Keyframes::Rotation(r.into_f32().map(|[x, y, z, w]| Quaternion::new(w, x, y, z)).collect())
                        }
                        gltf::animation::util::ReadOutputs::Scales(s) => {
                            Keyframes::Scale(s.map(Into::into).collect())
                        }
                        gltf::animation::util::ReadOutputs::MorphTargetWeights(_) => {
                            warn!("Skipping morph target channel {} of {}", channel.index(), name);
                            return None;
                        }
                    };
                    Some(Channel {
                        target: channel.target().node().index(),
                        keyframes,
                        timestamps,
                        interpolation: channel.sampler().interpolation().into(),
                    })
                })
                .collect();
            AnimationClip::new(name, channels)
        })
        .collect()
}
