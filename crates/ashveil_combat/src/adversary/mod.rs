//! Adversary vitality state machine.
//!
//! Owns health, poise, invincibility windows, the parry-eligibility
//! window, and the one-way transition into the ragdoll/dead state.
//! Reacts to being attacked (`HitLanded`), parried (`ParryLanded`),
//! backstabbed (`BackstabLanded`), and probed for a parry interrupt
//! (`ParryProbe`).
//!
//! Runs at frame cadence (`Update`), not on the fixed tick — reaction
//! latency tracks the rendered frame, and lockout windows on both sides
//! make the resulting cross-cadence races harmless.

use bevy::prelude::*;
use bevy_rapier3d::prelude::{Collider, Damping, RigidBody, Velocity};
use rand::Rng;

use crate::animation::{clips, Animator, BoolParam};
use crate::events::{BackstabLanded, HitLanded, ParryLanded, ParryProbe};
use crate::geometry::{self, BodyCollider, LAYER_HOSTILE};
use crate::stats::{calculate_base_damage, CharacterStats};
use crate::DeterministicRng;

// ============================================================================
// Components
// ============================================================================

/// Vitality state of one hostile combatant.
///
/// `is_dead` is terminal: once set, health/poise/invincibility cease to
/// matter and the entity belongs to the external ragdoll takeover.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Vitality {
    pub health: i32,
    /// Stance damage; decays linearly, floored at 0.
    pub poise: f32,
    /// This combatant can be parry-interrupted at all.
    pub can_be_parried: bool,
    /// Defender-controlled invitation: an attacker's counter check only
    /// passes while this is open. Not the same thing as `parried_by`.
    pub parry_window_open: bool,
    pub invincible: bool,
    /// Hard stun (parried/backstabbed aftermath); unlatches when the clip
    /// layer permits movement again.
    pub suppressed: bool,
    /// Mirror of the animator's `CanMove`, refreshed each tick.
    pub can_move: bool,
    pub is_dead: bool,
    /// Who landed the last successful parry probe. Result only — cleared
    /// as soon as the window closes.
    pub parried_by: Option<Entity>,
    /// Accumulator for the placeholder periodic attack.
    pub action_timer: f32,
}

impl Vitality {
    pub fn new(health: i32) -> Self {
        Self {
            health,
            poise: 0.0,
            can_be_parried: true,
            parry_window_open: false,
            invincible: false,
            suppressed: false,
            can_move: false,
            is_dead: false,
            parried_by: None,
            action_timer: 0.0,
        }
    }
}

impl Default for Vitality {
    fn default() -> Self {
        Self::new(VitalityConfig::default().spawn_health)
    }
}

/// Tuning for one adversary. The spawn health default is deliberately
/// "effectively unkillable" — a placeholder to tune per encounter, not a
/// contract.
#[derive(Component, Debug, Clone, Copy, Reflect, serde::Serialize, serde::Deserialize)]
#[reflect(Component)]
pub struct VitalityConfig {
    pub spawn_health: i32,
    /// Poise lost per second.
    pub poise_degrade_rate: f32,
    /// Poise above this plays a stagger reaction even mid-action.
    pub poise_break_threshold: f32,
    /// Seconds between placeholder attacks.
    pub action_interval: f32,
}

impl Default for VitalityConfig {
    fn default() -> Self {
        Self {
            spawn_health: 100_000,
            poise_degrade_rate: 2.0,
            poise_break_threshold: 100.0,
            action_interval: 3.0,
        }
    }
}

/// Marker: final pose is committing; the animation surface shuts off
/// after one grace frame and the ragdoll takes over.
#[derive(Component, Debug)]
pub struct RagdollHandoff {
    grace_frames: u8,
}

impl Default for RagdollHandoff {
    fn default() -> Self {
        Self { grace_frames: 1 }
    }
}

// ============================================================================
// Systems
// ============================================================================

/// System: per-frame vitality tick.
///
/// Order within one tick: refresh `can_move` → suppression unlatch →
/// death transition → invincibility unlatch → stale `parried_by` cleanup
/// → periodic placeholder action. Poise decay runs in its own system so
/// it applies regardless of which branch this tick took.
pub fn adversary_frame_tick(
    time: Res<Time>,
    mut commands: Commands,
    mut query: Query<(Entity, &mut Vitality, &mut Animator, &VitalityConfig)>,
) {
    let delta = time.delta_secs();

    for (entity, mut vitality, mut animator, config) in query.iter_mut() {
        if vitality.is_dead {
            continue;
        }

        vitality.can_move = animator.get_bool(BoolParam::CanMove);

        if vitality.suppressed {
            // Edge-triggered unlatch: stay suppressed until the clip layer
            // hands movement back.
            vitality.suppressed = !vitality.can_move;
            continue;
        }

        if vitality.health <= 0 {
            vitality.is_dead = true;
            commands.entity(entity).insert(RagdollHandoff::default());
            crate::logger::log_info(&format!(
                "💀 Adversary {:?} died, ragdoll takeover queued",
                entity
            ));
        }

        if vitality.invincible {
            vitality.invincible = !vitality.can_move;
        }

        if vitality.parried_by.is_some() && !vitality.parry_window_open {
            vitality.parried_by = None;
        }

        if vitality.can_move {
            vitality.parry_window_open = false;
            animator.set_root_motion(false);

            // Placeholder periodic attack — stands in for a real AI
            // decision layer, which is out of scope here.
            vitality.action_timer += delta;
            if vitality.action_timer > config.action_interval {
                vitality.action_timer = 0.0;
                animator.play(clips::ADVERSARY_ATTACK);
                animator.set_root_motion(true);
                animator.set_bool(BoolParam::CanMove, false);
                // The opening frames of the swing invite a parry.
                vitality.parry_window_open = true;
            }
        }
    }
}

/// System: poise decays every tick regardless of state, floored at 0.
pub fn decay_poise(time: Res<Time>, mut query: Query<(&mut Vitality, &VitalityConfig)>) {
    let delta = time.delta_secs();

    for (mut vitality, config) in query.iter_mut() {
        if vitality.is_dead {
            continue;
        }
        vitality.poise = (vitality.poise - config.poise_degrade_rate * delta).max(0.0);
    }
}

/// System: apply weapon hits (DoDamage).
///
/// No-op while invincible. Poise rises by the damage dealt; a reaction
/// clip plays only if the defender could act or its stance just broke.
pub fn apply_hits(
    mut events: EventReader<HitLanded>,
    mut targets: Query<(&mut Vitality, &CharacterStats, &mut Animator, &VitalityConfig)>,
    mut rng: ResMut<DeterministicRng>,
) {
    for hit in events.read() {
        let Ok((mut vitality, stats, mut animator, config)) = targets.get_mut(hit.target) else {
            continue;
        };
        if vitality.is_dead || vitality.invincible {
            continue;
        }

        let damage = calculate_base_damage(&hit.profile.weapon, stats, 1.0);
        vitality.poise += damage as f32;
        vitality.health -= damage;

        if animator.get_bool(BoolParam::CanMove) || vitality.poise > config.poise_break_threshold
        {
            if hit.profile.override_damage_anim && !hit.profile.damage_anim.is_empty() {
                animator.play(&hit.profile.damage_anim);
            } else {
                let roll = rng.rng.gen_range(0..100);
                let clip = if roll > 50 { clips::DAMAGE_1 } else { clips::DAMAGE_2 };
                animator.play(clip);
            }
        }

        vitality.invincible = true;
        animator.set_root_motion(true);
        animator.set_bool(BoolParam::CanMove, false);

        crate::logger::log(&format!(
            "💥 Hit landed on {:?}: damage {}, health {}, poise {:.1}",
            hit.target, damage, vitality.health, vitality.poise
        ));
    }
}

/// System: apply landed parry counters (IsGettingParried).
///
/// Bypasses invincibility entirely — a landed parry always connects.
pub fn apply_parry_hits(
    mut events: EventReader<ParryLanded>,
    mut targets: Query<(&mut Vitality, &CharacterStats, &mut Animator)>,
) {
    for event in events.read() {
        let Ok((mut vitality, stats, mut animator)) = targets.get_mut(event.target) else {
            continue;
        };
        if vitality.is_dead {
            continue;
        }

        let damage =
            calculate_base_damage(&event.profile.weapon, stats, event.profile.parry_multiplier);
        vitality.health -= damage;
        vitality.suppressed = true;
        animator.set_bool(BoolParam::CanMove, false);
        animator.play(clips::PARRY_RECEIVED);

        crate::logger::log(&format!(
            "🗡️ Parry counter on {:?}: damage {}, health {}",
            event.target, damage, vitality.health
        ));
    }
}

/// System: apply landed backstabs (IsGettingBackstabbed).
///
/// Same shape as the parry counter, with its own multiplier and clip.
pub fn apply_backstab_hits(
    mut events: EventReader<BackstabLanded>,
    mut targets: Query<(&mut Vitality, &CharacterStats, &mut Animator)>,
) {
    for event in events.read() {
        let Ok((mut vitality, stats, mut animator)) = targets.get_mut(event.target) else {
            continue;
        };
        if vitality.is_dead {
            continue;
        }

        let damage = calculate_base_damage(
            &event.profile.weapon,
            stats,
            event.profile.backstab_multiplier,
        );
        vitality.health -= damage;
        vitality.suppressed = true;
        animator.set_bool(BoolParam::CanMove, false);
        animator.play(clips::BACKSTABBED);

        crate::logger::log(&format!(
            "🗡️ Backstab on {:?}: damage {}, health {}",
            event.target, damage, vitality.health
        ));
    }
}

/// System: resolve parry probes (CheckForParry).
///
/// Gated by parryability, an open window, and not being invincible; the
/// prober must be roughly in front (dot of defender forward with the
/// direction to the prober ≥ 0). Success interrupts the defender and
/// records the prober in `parried_by`.
pub fn check_for_parry(
    mut events: EventReader<ParryProbe>,
    mut targets: Query<(&mut Vitality, &mut Animator)>,
    transforms: Query<&Transform>,
) {
    for probe in events.read() {
        let Ok((mut vitality, mut animator)) = targets.get_mut(probe.target) else {
            continue;
        };
        if vitality.is_dead {
            continue;
        }
        if !vitality.can_be_parried || !vitality.parry_window_open || vitality.invincible {
            continue;
        }

        let (Ok(attacker_tf), Ok(target_tf)) =
            (transforms.get(probe.attacker), transforms.get(probe.target))
        else {
            continue;
        };

        let to_attacker =
            geometry::horizontal_between(target_tf.translation, attacker_tf.translation);
        if target_tf.forward().dot(to_attacker) < 0.0 {
            continue;
        }

        vitality.invincible = true;
        vitality.parried_by = Some(probe.attacker);
        animator.play(clips::ATTACK_INTERRUPT);
        animator.set_root_motion(true);
        animator.set_bool(BoolParam::CanMove, false);

        crate::logger::log(&format!(
            "🛡️ Parry probe landed: {:?} interrupted by {:?}",
            probe.target, probe.attacker
        ));
    }
}

/// System: ragdoll handoff, one frame after the death transition so the
/// final pose commits before the animation surface shuts off.
pub fn ragdoll_handoff(
    mut commands: Commands,
    mut query: Query<(Entity, &mut RagdollHandoff, &mut Animator)>,
) {
    for (entity, mut handoff, mut animator) in query.iter_mut() {
        if handoff.grace_frames > 0 {
            handoff.grace_frames -= 1;
            continue;
        }
        animator.enabled = false;
        commands.entity(entity).remove::<RagdollHandoff>();
        crate::logger::log(&format!("Animation surface off for {:?}", entity));
    }
}

// ============================================================================
// Plugin + spawn helper
// ============================================================================

/// Registers the vitality systems at frame cadence.
///
/// Порядок выполнения:
/// 1. event appliers (hits, parries, backstabs, probes)
/// 2. adversary_frame_tick — state transitions
/// 3. decay_poise — unconditional decay
/// 4. ragdoll_handoff — deferred animator shutdown
pub struct AdversaryPlugin;

impl Plugin for AdversaryPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<HitLanded>()
            .add_event::<ParryLanded>()
            .add_event::<BackstabLanded>()
            .add_event::<ParryProbe>();

        app.add_systems(
            Update,
            (
                apply_hits,
                apply_parry_hits,
                apply_backstab_hits,
                check_for_parry,
                adversary_frame_tick,
                decay_poise,
                ragdoll_handoff,
            )
                .chain()
                .in_set(crate::FrameSet::Adversary),
        );
    }
}

/// Spawn a hostile combatant: vitality + stats + animation surface +
/// ray-castable body, with inert rapier components for a full backend.
pub fn spawn_adversary(commands: &mut Commands, position: Vec3, config: VitalityConfig) -> Entity {
    commands
        .spawn((
            Transform::from_translation(position),
            Vitality::new(config.spawn_health),
            config,
            CharacterStats::default(),
            Animator::default(),
            BodyCollider {
                radius: 0.4,
                layer: LAYER_HOSTILE,
            },
            RigidBody::KinematicPositionBased,
            Collider::capsule_y(0.5, 0.4),
            Velocity::default(),
            Damping {
                linear_damping: 0.0,
                angular_damping: 999.0,
            },
        ))
        .id()
}
