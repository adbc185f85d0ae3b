//! Ashveil combat-resolution core.
//!
//! ECS-симуляция на Bevy 0.16: решает, кадр за кадром, может ли боец
//! двигаться, какое действие он выполняет, и исход атак/блоков/
//! парирований/бэкстабов между контролируемым бойцом и противниками.
//!
//! HYBRID ARCHITECTURE:
//! - ECS = strategic layer (combat state, lockouts, vitality)
//! - Host engine = tactical layer (clip playback, hitboxes, physics step),
//!   reached only through the `Animator` command queue, the interaction
//!   events, and the rapier velocity mirror.

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

pub mod actions;
pub mod adversary;
pub mod animation;
pub mod events;
pub mod geometry;
pub mod input;
pub mod logger;
pub mod physics;
pub mod player;
pub mod stats;

// Re-export основных типов
pub use actions::{ActionCatalog, ActionKind, ActionSlot};
pub use adversary::{spawn_adversary, AdversaryPlugin, Vitality, VitalityConfig};
pub use animation::{clips, AnimCommand, Animator, BoolParam, FloatParam};
pub use events::{AttackProfile, BackstabLanded, HitLanded, ParryLanded, ParryProbe};
pub use geometry::BodyCollider;
pub use input::PlayerInput;
pub use logger::{init_logger, log, log_error, log_info, log_warning};
pub use physics::PhysicsBody;
pub use player::{spawn_player, PlayerConfig, PlayerPlugin, PlayerState};
pub use stats::{calculate_base_damage, CharacterStats, WeaponStats};

/// Frame-cadence ordering: the controlled combatant's upkeep runs before
/// the adversaries react, every rendered frame.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSet {
    Player,
    Adversary,
}

/// Главный plugin симуляции (обе машины состояний + movement).
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для combat tick
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .configure_sets(Update, (FrameSet::Player, FrameSet::Adversary).chain())
            .add_plugins((PlayerPlugin, AdversaryPlugin));

        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }
    }
}

/// Детерминистичный RNG resource (seeded).
///
/// The only randomness in the core is the defender's generic
/// reaction-clip roll, so a fixed seed makes whole runs reproducible.
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Minimal Bevy App для headless симуляции.
///
/// Time advances by exactly one 60Hz step per `app.update()`, so every
/// run of the same build is tick-for-tick identical.
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    logger::init_logger();

    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_micros(
            16_667,
        )))
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0));

    app
}
