//! Animation playback.
//!
//! An [`AnimationDriver`] owns the playback head of one clip bound to the
//! nodes of one loaded part. All drivers live in a [`DriverPool`] that the
//! viewer advances once per frame and then applies to the scene.

use std::sync::Arc;

use instant::Duration;

use crate::{
    data_structures::scene_graph::{NodeId, Scene},
    resources::animation::AnimationClip,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    #[default]
    Repeat,
    /// Play to the end (or start, when running backwards), then hold the last pose.
    Once,
}

#[derive(Clone, Debug)]
pub struct AnimationDriver {
    clip: Arc<AnimationClip>,
    // one entry per clip channel
    targets: Vec<Option<NodeId>>,
    time: f32,
    speed: f32,
    loop_mode: LoopMode,
    paused: bool,
    active: bool,
    finished: bool,
}

impl AnimationDriver {
    pub fn new(clip: Arc<AnimationClip>, targets: Vec<Option<NodeId>>) -> Self {
        Self {
            clip,
            targets,
            time: 0.0,
            speed: 1.0,
            loop_mode: LoopMode::Repeat,
            paused: false,
            active: false,
            finished: false,
        }
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    pub fn duration(&self) -> f32 {
        self.clip.duration
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A driver only writes poses into the scene once it has been played.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn set_loop(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn play(&mut self) {
        self.active = true;
        self.paused = false;
        self.finished = false;
    }

    /// Head back to the start of the clip, unpaused and not finished.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.paused = false;
        self.finished = false;
    }

    /// Moves the head, clamped to the clip.
    pub fn seek(&mut self, time: f32) {
        self.time = time.clamp(0.0, self.duration());
    }

    pub fn advance(&mut self, dt: Duration) {
        if !self.active || self.paused {
            return;
        }
        let duration = self.duration();
        self.time += dt.as_secs_f32() * self.speed;
        match self.loop_mode {
            LoopMode::Repeat if duration > 0.0 => self.time = self.time.rem_euclid(duration),
            LoopMode::Repeat => self.time = 0.0,
            LoopMode::Once => {
                if self.time >= duration && self.speed > 0.0 {
                    self.time = duration;
                    self.finish();
                } else if self.time <= 0.0 && self.speed < 0.0 {
                    self.time = 0.0;
                    self.finish();
                }
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.paused = true;
    }

    /// Writes the pose at the current head into the local transforms of the bound nodes.
    pub fn apply(&self, scene: &mut Scene) {
        if !self.active {
            return;
        }
        for (channel, target) in self.clip.channels.iter().zip(&self.targets) {
            if let Some(node) = target.and_then(|id| scene.node_mut(id)) {
                channel.sample_into(self.time, &mut node.local);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DriverId(usize);

#[derive(Debug, Default)]
pub struct DriverPool {
    drivers: Vec<AnimationDriver>,
}

impl DriverPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, driver: AnimationDriver) -> DriverId {
        self.drivers.push(driver);
        DriverId(self.drivers.len() - 1)
    }

    pub fn get(&self, id: DriverId) -> Option<&AnimationDriver> {
        self.drivers.get(id.0)
    }

    pub fn get_mut(&mut self, id: DriverId) -> Option<&mut AnimationDriver> {
        self.drivers.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn advance(&mut self, dt: Duration) {
        self.drivers.iter_mut().for_each(|driver| driver.advance(dt));
    }

    pub fn apply(&self, scene: &mut Scene) {
        self.drivers.iter().for_each(|driver| driver.apply(scene));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::{
        data_structures::scene_graph::Node,
        resources::animation::{Channel, Interpolation, Keyframes},
    };

    fn slide(duration: f32) -> Arc<AnimationClip> {
        Arc::new(AnimationClip::new(
            "Open",
            vec![Channel {
                target: 0,
                keyframes: Keyframes::Translation(vec![
                    Vector3::new(0.0, 0.0, 0.0),
                    Vector3::new(duration, 0.0, 0.0),
                ]),
                timestamps: vec![0.0, duration],
                interpolation: Interpolation::Linear,
            }],
        ))
    }

    #[test]
    fn inactive_driver_does_not_move() {
        let mut driver = AnimationDriver::new(slide(2.0), vec![None]);
        driver.advance(Duration::from_millis(500));
        assert_eq!(driver.time(), 0.0);
    }

    #[test]
    fn repeat_wraps_around() {
        let mut driver = AnimationDriver::new(slide(2.0), vec![None]);
        driver.play();
        driver.advance(Duration::from_millis(2500));
        assert!((driver.time() - 0.5).abs() < 1e-5);
        assert!(!driver.is_finished());
    }

    #[test]
    fn once_clamps_and_pauses_at_either_end() {
        let mut driver = AnimationDriver::new(slide(2.0), vec![None]);
        driver.set_loop(LoopMode::Once);
        driver.play();
        driver.advance(Duration::from_secs(3));
        assert_eq!(driver.time(), 2.0);
        assert!(driver.is_finished() && driver.is_paused());

        driver.set_speed(-1.0);
        driver.play();
        driver.advance(Duration::from_secs(5));
        assert_eq!(driver.time(), 0.0);
        assert!(driver.is_finished());
    }

    #[test]
    fn pool_applies_pose_to_bound_node() {
        let mut scene = Scene::new();
        let node = scene.add_node(None, Node::named("door"));
        let mut pool = DriverPool::new();
        let id = pool.insert(AnimationDriver::new(slide(2.0), vec![Some(node)]));
        if let Some(driver) = pool.get_mut(id) {
            driver.play();
        }
        pool.advance(Duration::from_secs(1));
        pool.apply(&mut scene);
        let position = scene.node(node).map(|n| n.local.position);
        assert_eq!(position, Some(Vector3::new(1.0, 0.0, 0.0)));
    }
}
