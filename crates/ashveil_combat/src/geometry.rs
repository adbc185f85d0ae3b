//! Interaction geometry: distance/angle gating shared by attacker- and
//! defender-side checks, plus the forward ray cast used as the world
//! point-query surface.
//!
//! The ray cast scans registered `BodyCollider` spheres instead of asking
//! a physics backend — the core only consumes the point-query capability,
//! so candidates come straight from an ECS query at the call site.

use bevy::prelude::*;

/// Collision layer bits. Masks are plain bit-ands over `BodyCollider::layer`.
pub const LAYER_PLAYER: u32 = 1 << 8;
pub const LAYER_HOSTILE: u32 = 1 << 9;

/// Ray-castable body registration: a sphere proxy for the combatant's torso.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct BodyCollider {
    pub radius: f32,
    pub layer: u32,
}

impl Default for BodyCollider {
    fn default() -> Self {
        Self {
            radius: 0.4,
            layer: LAYER_HOSTILE,
        }
    }
}

/// Nearest hit of a forward ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: Entity,
    pub point: Vec3,
    pub distance: f32,
}

/// Forward ray cast over candidate bodies, nearest hit wins.
///
/// `dir` must be normalized. Candidates outside `mask` or behind the
/// origin are skipped. Returns `None` when nothing is in range — callers
/// treat that as "check fails, fall through".
pub fn raycast_forward(
    origin: Vec3,
    dir: Vec3,
    max_distance: f32,
    mask: u32,
    candidates: impl IntoIterator<Item = (Entity, Vec3, BodyCollider)>,
) -> Option<RayHit> {
    let mut nearest: Option<RayHit> = None;

    for (entity, center, collider) in candidates {
        if collider.layer & mask == 0 {
            continue;
        }

        let along = (center - origin).dot(dir);
        if along < 0.0 || along > max_distance {
            continue;
        }

        let closest = origin + dir * along;
        if closest.distance(center) > collider.radius {
            continue;
        }

        match nearest {
            Some(hit) if hit.distance <= along => {}
            _ => {
                nearest = Some(RayHit {
                    entity,
                    point: closest,
                    distance: along,
                });
            }
        }
    }

    nearest
}

/// Horizontal (Y-zeroed) normalized direction from one point to another.
/// Zero when the points coincide in the horizontal plane.
pub fn horizontal_between(from: Vec3, to: Vec3) -> Vec3 {
    let mut dir = to - from;
    dir.y = 0.0;
    dir.normalize_or_zero()
}

/// Angle in degrees between two directions. Degenerate inputs give NaN,
/// which fails every cone comparison — exactly the silent-skip the
/// interaction checks want.
pub fn angle_deg(a: Vec3, b: Vec3) -> f32 {
    if a == Vec3::ZERO || b == Vec3::ZERO {
        return f32::NAN;
    }
    a.angle_between(b).to_degrees()
}

/// Strict cone test: the boundary angle itself fails.
pub fn within_cone(forward: Vec3, dir: Vec3, max_deg: f32) -> bool {
    angle_deg(forward, dir) < max_deg
}

/// Rotation that faces `dir` (Y-up). Callers guard against zero `dir`.
pub fn look_rotation(dir: Vec3) -> Quat {
    Transform::IDENTITY.looking_to(dir, Vec3::Y).rotation
}
