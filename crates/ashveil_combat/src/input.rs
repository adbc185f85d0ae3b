//! Mapped input drop-off point.
//!
//! Raw input capture and axis mapping live in the host; whatever device
//! layer runs outside writes the already-mapped values here once per fixed
//! tick. Headless tests mock input through this component directly.

use bevy::prelude::*;

/// Input state for the controlled combatant, sampled at the top of the
/// fixed tick. Button flags are level-triggered (held), `toggle_*` flags
/// are edge-triggered and cleared by the core after consumption.
#[derive(Component, Debug, Clone, Default)]
pub struct PlayerInput {
    /// World-space movement direction (camera-relative mapping is the
    /// host's job), normalized or zero.
    pub move_dir: Vec3,
    /// Combined stick deflection in [0, 1].
    pub move_amount: f32,

    // Action buttons (held)
    pub rt: bool,
    pub rb: bool,
    pub lt: bool,
    pub lb: bool,

    pub run: bool,
    pub roll: bool,
    pub item: bool,

    // Edge-triggered toggles
    pub toggle_two_handed: bool,
    pub toggle_lock_on: bool,
}

impl PlayerInput {
    /// Any of the four action buttons held this tick.
    pub fn any_action_button(&self) -> bool {
        self.rt || self.rb || self.lt || self.lb
    }
}
