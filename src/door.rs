//! Door state machine.
//!
//! Every interactive door cycles `Closed -> Opening -> Open -> Closing -> Closed`.
//! Transitions start on interaction and complete once the configured duration
//! has elapsed on the frame clock; interactions during a transition are ignored.
//! Door records are keyed by the door's scene node and created on first use.

use std::{collections::BTreeMap, fmt};

use instant::Duration;
use log::{error, info};

use crate::{
    config::DoorConfig,
    data_structures::{
        driver::{DriverId, DriverPool, LoopMode},
        scene_graph::NodeId,
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DoorState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

impl DoorState {
    pub fn is_transitioning(self) -> bool {
        matches!(self, DoorState::Opening | DoorState::Closing)
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DoorState::Closed => "CLOSED",
            DoorState::Opening => "OPENING",
            DoorState::Open => "OPEN",
            DoorState::Closing => "CLOSING",
        };
        f.write_str(name)
    }
}

/// What an interaction did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interaction {
    /// A transition into the given state began.
    Started(DoorState),
    /// The door is mid-transition; nothing changed.
    Busy(DoorState),
    /// The door has no animation to play; nothing changed.
    NoAnimation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DoorRecord {
    pub state: DoorState,
    /// Time spent in the current transition.
    pub elapsed: Duration,
    /// Seconds accumulated while transitioning, drives the indicator blink.
    pub blink_timer: f32,
    pub driver: DriverId,
}

impl DoorRecord {
    fn new(driver: DriverId) -> Self {
        Self {
            state: DoorState::Closed,
            elapsed: Duration::ZERO,
            blink_timer: 0.0,
            driver,
        }
    }
}

#[derive(Debug, Default)]
pub struct DoorStateMachine {
    config: DoorConfig,
    doors: BTreeMap<NodeId, DoorRecord>,
}

impl DoorStateMachine {
    pub fn new(config: DoorConfig) -> Self {
        Self {
            config,
            doors: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &DoorConfig {
        &self.config
    }

    pub fn state(&self, door: NodeId) -> DoorState {
        self.doors.get(&door).map(|r| r.state).unwrap_or_default()
    }

    pub fn record(&self, door: NodeId) -> Option<&DoorRecord> {
        self.doors.get(&door)
    }

    /// Door records in ascending node order.
    pub fn records(&self) -> impl Iterator<Item = (NodeId, &DoorRecord)> {
        self.doors.iter().map(|(id, record)| (*id, record))
    }

    /**
     * Toggles `door`. A closed door starts opening from the first frame of its
     * clip at forward speed; an open door starts closing from the last frame at
     * reverse speed. Both play once and hold the final pose.
     */
    pub fn interact(&mut self, door: NodeId, driver: Option<DriverId>, pool: &mut DriverPool) -> Interaction {
        let Some(driver_id) = driver.filter(|id| pool.get(*id).is_some()) else {
            error!("Door {door:?} has no animation to play");
            return Interaction::NoAnimation;
        };
        let record = self.doors.entry(door).or_insert_with(|| DoorRecord::new(driver_id));
        let Some(driver) = pool.get_mut(record.driver) else {
            error!("Door {door:?} lost its animation driver");
            return Interaction::NoAnimation;
        };

        let next = match record.state {
            state @ (DoorState::Opening | DoorState::Closing) => {
                info!("Door {door:?} is busy ({state}), ignoring interaction");
                return Interaction::Busy(state);
            }
            DoorState::Closed => {
                driver.reset();
                driver.set_loop(LoopMode::Once);
                driver.set_speed(self.config.forward_scale);
                driver.seek(0.0);
                driver.play();
                DoorState::Opening
            }
            DoorState::Open => {
                driver.set_loop(LoopMode::Once);
                driver.set_speed(self.config.reverse_scale);
                driver.seek(driver.duration());
                driver.play();
                DoorState::Closing
            }
        };
        info!("Door {door:?}: {} -> {next}", record.state);
        record.state = next;
        record.elapsed = Duration::ZERO;
        Interaction::Started(next)
    }

    /**
     * Advances running transitions by `dt`. A closing door's head is walked back
     * by `dt` on top of its reverse playback and held at zero. Once a transition
     * has run for the configured duration it completes: the driver is snapped to
     * the terminal pose and paused, and the timers restart.
     *
     * Returns the doors that completed a transition during this tick.
     */
    pub fn tick(&mut self, dt: Duration, pool: &mut DriverPool) -> Vec<(NodeId, DoorState)> {
        let mut completed = Vec::new();
        for (door, record) in self.doors.iter_mut() {
            if !record.state.is_transitioning() {
                continue;
            }
            record.elapsed += dt;
            record.blink_timer += dt.as_secs_f32();
            let Some(driver) = pool.get_mut(record.driver) else {
                continue;
            };

            if record.state == DoorState::Closing {
                let head = driver.time() - dt.as_secs_f32();
                driver.seek(head);
                if head <= 0.0 {
                    driver.set_paused(true);
                }
            }

            if record.elapsed >= self.config.duration {
                let (state, head) = match record.state {
                    DoorState::Opening => (DoorState::Open, driver.duration()),
                    _ => (DoorState::Closed, 0.0),
                };
                driver.seek(head);
                driver.set_paused(true);
                info!("Door {door:?}: {} -> {state}", record.state);
                record.state = state;
                record.elapsed = Duration::ZERO;
                record.blink_timer = 0.0;
                completed.push((*door, state));
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cgmath::Vector3;

    use super::*;
    use crate::{
        data_structures::{driver::AnimationDriver, scene_graph::Scene},
        resources::animation::{AnimationClip, Channel, Interpolation, Keyframes},
    };

    const FRAME: Duration = Duration::from_millis(16);

    fn setup() -> (DoorStateMachine, DriverPool, NodeId, DriverId) {
        let mut scene = Scene::new();
        let door = scene.add_node(None, crate::data_structures::scene_graph::Node::named("door"));
        let clip = AnimationClip::new(
            "Open",
            vec![Channel {
                target: 0,
                keyframes: Keyframes::Translation(vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)]),
                timestamps: vec![0.0, 3.0],
                interpolation: Interpolation::Linear,
            }],
        );
        let mut pool = DriverPool::new();
        let driver = pool.insert(AnimationDriver::new(Arc::new(clip), vec![Some(door)]));
        (DoorStateMachine::new(DoorConfig::default()), pool, door, driver)
    }

    fn run(doors: &mut DoorStateMachine, pool: &mut DriverPool, total: Duration) -> Vec<DoorState> {
        let mut seen = Vec::new();
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            pool.advance(FRAME);
            seen.extend(doors.tick(FRAME, pool).into_iter().map(|(_, s)| s));
            elapsed += FRAME;
        }
        seen
    }

    #[test]
    fn full_cycle_visits_every_state_in_order() {
        let (mut doors, mut pool, door, driver) = setup();
        let mut states = vec![doors.state(door)];

        assert_eq!(doors.interact(door, Some(driver), &mut pool), Interaction::Started(DoorState::Opening));
        states.push(doors.state(door));
        states.extend(run(&mut doors, &mut pool, Duration::from_millis(3100)));

        assert_eq!(doors.interact(door, Some(driver), &mut pool), Interaction::Started(DoorState::Closing));
        states.push(doors.state(door));
        states.extend(run(&mut doors, &mut pool, Duration::from_millis(3100)));

        assert_eq!(
            states,
            vec![DoorState::Closed, DoorState::Opening, DoorState::Open, DoorState::Closing, DoorState::Closed]
        );
    }

    #[test]
    fn opening_completes_exactly_at_duration() {
        let (mut doors, mut pool, door, driver) = setup();
        doors.interact(door, Some(driver), &mut pool);
        doors.tick(Duration::from_millis(2999), &mut pool);
        assert_eq!(doors.state(door), DoorState::Opening);
        doors.tick(Duration::from_millis(1), &mut pool);
        assert_eq!(doors.state(door), DoorState::Open);
        let head = pool.get(driver).map(|d| (d.time(), d.is_paused()));
        assert_eq!(head, Some((3.0, true)));
    }

    #[test]
    fn interaction_while_busy_changes_nothing() {
        let (mut doors, mut pool, door, driver) = setup();
        doors.interact(door, Some(driver), &mut pool);
        run(&mut doors, &mut pool, Duration::from_millis(500));
        let before = (doors.record(door).cloned(), pool.get(driver).map(|d| (d.time(), d.speed())));

        assert_eq!(doors.interact(door, Some(driver), &mut pool), Interaction::Busy(DoorState::Opening));

        let after = (doors.record(door).cloned(), pool.get(driver).map(|d| (d.time(), d.speed())));
        assert_eq!(before, after);
    }

    #[test]
    fn closing_clamps_head_at_zero() {
        let (mut doors, mut pool, door, driver) = setup();
        doors.interact(door, Some(driver), &mut pool);
        run(&mut doors, &mut pool, Duration::from_millis(3100));
        doors.interact(door, Some(driver), &mut pool);
        assert_eq!(pool.get(driver).map(|d| (d.time(), d.speed())), Some((3.0, -0.25)));

        run(&mut doors, &mut pool, Duration::from_millis(3000));

        assert_eq!(doors.state(door), DoorState::Closed);
        let head = pool.get(driver).map(|d| d.time()).unwrap_or(f32::NAN);
        assert!(head <= 0.0);
        assert_eq!(head, 0.0);
    }

    #[test]
    fn door_without_animation_is_left_alone() {
        let (mut doors, mut pool, door, _) = setup();
        assert_eq!(doors.interact(door, None, &mut pool), Interaction::NoAnimation);
        assert!(doors.record(door).is_none());
        assert_eq!(doors.state(door), DoorState::Closed);
    }

    #[test]
    fn records_come_in_node_order() {
        let (mut doors, mut pool, first, driver) = setup();
        let mut scene = Scene::new();
        scene.add_node(None, crate::data_structures::scene_graph::Node::named("first"));
        let second = scene.add_node(None, crate::data_structures::scene_graph::Node::named("second"));
        assert!(first < second);
        let clip = pool.get(driver).map(|d| d.clip().clone()).expect("clip");
        let other = pool.insert(AnimationDriver::new(clip, vec![Some(second)]));

        doors.interact(second, Some(other), &mut pool);
        doors.interact(first, Some(driver), &mut pool);

        let order: Vec<NodeId> = doors.records().map(|(door, _)| door).collect();
        assert_eq!(order, [first, second]);
    }

    #[test]
    fn blink_timer_accumulates_only_while_transitioning() {
        let (mut doors, mut pool, door, driver) = setup();
        doors.tick(Duration::from_secs(1), &mut pool);
        doors.interact(door, Some(driver), &mut pool);
        doors.tick(Duration::from_millis(500), &mut pool);
        let timer = doors.record(door).map(|r| r.blink_timer);
        assert_eq!(timer, Some(0.5));
        doors.tick(Duration::from_millis(2500), &mut pool);
        assert_eq!(doors.record(door).map(|r| r.blink_timer), Some(0.0));
    }
}
