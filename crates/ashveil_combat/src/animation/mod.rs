//! Animation surface: the core's view of the host animation system.
//!
//! # Architecture
//!
//! **ECS (this crate):**
//! - `Animator`: typed bool/float parameters + a queue of playback commands
//! - Systems read gating parameters (`CanMove`, `Interacting`) and push
//!   locomotion parameters every tick
//!
//! **Host engine (external):**
//! - Drains the command queue (`drain_commands`) and feeds its AnimationTree
//! - Owns clip playback; writes `CanMove`/`Interacting` back as clips
//!   start and finish
//! - Applies root motion, scaled by `root_motion_multiplier` (consumed
//!   once per fixed tick)
//!
//! Headless tests play the host's role by setting parameters directly and
//! inspecting the queued commands.

use bevy::prelude::*;

/// Animation clip names shared with the host's clip library.
pub mod clips {
    pub const ROLL: &str = "Rolls";
    pub const PARRY_ATTACK: &str = "parry_attack";
    pub const BACKSTAB_ATTACK: &str = "backstab_attack";
    pub const ADVERSARY_ATTACK: &str = "oh_attack_1";
    pub const ATTACK_INTERRUPT: &str = "attack_interrupt";
    pub const PARRY_RECEIVED: &str = "parry_received";
    pub const BACKSTABBED: &str = "backstabbed";
    pub const DAMAGE_1: &str = "damage_1";
    pub const DAMAGE_2: &str = "damage_2";
}

/// Boolean animator parameters recognized by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolParam {
    OnGround,
    Blocking,
    IsLeft,
    Mirror,
    LockOn,
    Run,
    CanMove,
    Interacting,
    TwoHanded,
}

const BOOL_PARAM_COUNT: usize = 9;

/// Float animator parameters recognized by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatParam {
    Vertical,
    Horizontal,
    AnimSpeed,
}

const FLOAT_PARAM_COUNT: usize = 3;

/// Playback command queued for the host animation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimCommand {
    /// Hard-start a clip (no blending) — item use, damage reactions.
    Play { clip: String },
    /// Blend into a clip over `blend` seconds — actions, rolls.
    CrossFade { clip: String, blend: f32 },
}

/// Per-combatant animation surface.
///
/// One instance per combatant; the player and every adversary drive their
/// own. `enabled == false` means the surface has been handed off to the
/// ragdoll takeover and ignores further playback requests.
#[derive(Component, Debug, Clone)]
pub struct Animator {
    bools: [bool; BOOL_PARAM_COUNT],
    floats: [f32; FLOAT_PARAM_COUNT],
    commands: Vec<AnimCommand>,
    /// Root motion applied by the host while true.
    pub root_motion: bool,
    /// Root-motion speed multiplier, consumed once per fixed tick.
    pub root_motion_multiplier: f32,
    pub enabled: bool,
}

impl Default for Animator {
    fn default() -> Self {
        let mut animator = Self {
            bools: [false; BOOL_PARAM_COUNT],
            floats: [0.0; FLOAT_PARAM_COUNT],
            commands: Vec::new(),
            root_motion: false,
            root_motion_multiplier: 1.0,
            enabled: true,
        };
        // Fresh spawn: clip layer permits movement, playback speed is neutral.
        animator.set_bool(BoolParam::CanMove, true);
        animator.set_float(FloatParam::AnimSpeed, 1.0);
        animator
    }
}

impl Animator {
    pub fn set_bool(&mut self, param: BoolParam, value: bool) {
        self.bools[param as usize] = value;
    }

    pub fn get_bool(&self, param: BoolParam) -> bool {
        self.bools[param as usize]
    }

    pub fn set_float(&mut self, param: FloatParam, value: f32) {
        self.floats[param as usize] = value;
    }

    /// Smoothed parameter write: exponential approach toward `target` with
    /// time constant `smooth_time` over a `dt` step.
    pub fn set_float_smooth(&mut self, param: FloatParam, target: f32, smooth_time: f32, dt: f32) {
        let current = self.floats[param as usize];
        let alpha = if smooth_time <= 0.0 {
            1.0
        } else {
            1.0 - (-dt / smooth_time).exp()
        };
        self.floats[param as usize] = current + (target - current) * alpha;
    }

    pub fn get_float(&self, param: FloatParam) -> f32 {
        self.floats[param as usize]
    }

    /// Hard-start a clip.
    pub fn play(&mut self, clip: &str) {
        if !self.enabled {
            return;
        }
        self.commands.push(AnimCommand::Play {
            clip: clip.to_owned(),
        });
    }

    /// Blend into a clip.
    pub fn cross_fade(&mut self, clip: &str, blend: f32) {
        if !self.enabled {
            return;
        }
        self.commands.push(AnimCommand::CrossFade {
            clip: clip.to_owned(),
            blend,
        });
    }

    pub fn set_root_motion(&mut self, on: bool) {
        self.root_motion = on;
    }

    /// Called at the top of each movement tick before roll handling; the
    /// multiplier only survives one fixed tick.
    pub fn reset_root_motion_multiplier(&mut self) {
        self.root_motion_multiplier = 1.0;
    }

    /// Pending playback commands (host/test inspection without draining).
    pub fn commands(&self) -> &[AnimCommand] {
        &self.commands
    }

    /// Hand the queued commands to the host layer.
    pub fn drain_commands(&mut self) -> Vec<AnimCommand> {
        std::mem::take(&mut self.commands)
    }
}
