//! Physics-lite movement: custom velocity integration plus rapier sync.
//!
//! Архитектура:
//! - Rapier для коллизий (RigidBody::KinematicPositionBased)
//! - Velocity интегрируем сами, rapier `Velocity`/`Damping` только
//!   синхронизируются для полного бэкенда
//! - Headless режим: прямая интеграция velocity → Transform
//!
//! The world simulation itself is external; this module is the velocity-set
//! surface plus the downward ground probe the controlled combatant needs.

use bevy::prelude::*;
use bevy_rapier3d::prelude::{Damping, Velocity};

/// Resting drag while grounded and not moving.
pub const REST_DRAG: f32 = 4.0;

/// Custom velocity state for a combatant body.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct PhysicsBody {
    pub velocity: Vec3,
    /// Linear drag coefficient; 0 while moving or airborne.
    pub drag: f32,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            drag: REST_DRAG,
        }
    }
}

/// Downward ground probe from `to_ground` above the feet, reaching
/// `to_ground + 0.3` — returns the ground height to snap to on a hit.
///
/// Headless stand-in for the host's downward ray: the walkable plane sits
/// at y = 0.
pub fn ground_probe(position: Vec3, to_ground: f32) -> Option<f32> {
    let origin_height = position.y + to_ground;
    let reach = to_ground + 0.3;
    if origin_height <= reach {
        Some(0.0)
    } else {
        None
    }
}

/// System: интеграция velocity → Transform (headless, без rapier step).
///
/// Applies drag damping first, then `position += velocity * dt`.
pub fn integrate_velocity_to_transform(
    mut query: Query<(&mut PhysicsBody, &mut Transform)>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for (mut body, mut transform) in query.iter_mut() {
        if body.drag > 0.0 {
            let damping = 1.0 / (1.0 + body.drag * delta);
            body.velocity.x *= damping;
            body.velocity.z *= damping;
        }
        transform.translation += body.velocity * delta;
    }
}

/// System: синхронизация нашего состояния в rapier компоненты.
///
/// A full physics backend reads `Velocity`/`Damping`; headless runs carry
/// them inert.
pub fn sync_body_to_rapier(mut query: Query<(&PhysicsBody, &mut Velocity, &mut Damping)>) {
    for (body, mut velocity, mut damping) in query.iter_mut() {
        velocity.linvel = body.velocity;
        damping.linear_damping = body.drag;
    }
}
