//! Combatant action state machine (the controlled combatant).
//!
//! Per fixed tick, in a fixed order: entry gating → action detection →
//! item use → lockout timing → movement-unlock gate → roll handling →
//! locomotion → facing → animation parameter sync. Early exits at the
//! lockout and movement gates skip everything after them, so no phase
//! ever reads state derived later in the same tick.
//!
//! Parry-counter and backstab checks run attacker-side here; the defender
//! learns about them through `ParryLanded`/`BackstabLanded` events.

use bevy::prelude::*;
use bevy_rapier3d::prelude::{Collider, Damping, RigidBody, Velocity};

use crate::actions::{ActionCatalog, ActionKind, ActionSlot};
use crate::adversary::Vitality;
use crate::animation::{clips, Animator, BoolParam, FloatParam};
use crate::events::{AttackProfile, BackstabLanded, ParryLanded};
use crate::geometry::{self, BodyCollider, LAYER_HOSTILE, LAYER_PLAYER};
use crate::input::PlayerInput;
use crate::physics::{self, PhysicsBody, REST_DRAG};
use crate::FrameSet;

/// Ray origin height for the interaction probes (chest, not feet).
const CHEST_HEIGHT: f32 = 1.0;
/// Parry-counter probe range.
const PARRY_RAY_RANGE: f32 = 3.0;
/// Backstab probe range — nearly touching.
const BACKSTAB_RAY_RANGE: f32 = 1.0;
/// Parry-counter facing cone (strict).
const PARRY_MAX_ANGLE: f32 = 60.0;
/// Backstab facing cone (strict, deliberately forgiving).
const BACKSTAB_MAX_ANGLE: f32 = 150.0;
/// Blend time for action cross-fades.
const CROSS_FADE_BLEND: f32 = 0.2;

// ============================================================================
// Components
// ============================================================================

/// Action/locomotion state of the controlled combatant.
///
/// Invariant: `in_action == true` implies `can_move == false`. The
/// inverse does not hold — the clip layer can veto movement on its own
/// through the animator's `CanMove` parameter.
#[derive(Component, Debug, Clone)]
pub struct PlayerState {
    /// World-space movement direction, copied from input each tick.
    pub move_dir: Vec3,
    pub move_amount: f32,
    pub on_ground: bool,
    pub run: bool,
    pub lock_on: bool,
    pub in_action: bool,
    pub can_move: bool,
    pub two_handed: bool,
    pub using_item: bool,
    pub can_be_parried: bool,
    pub is_blocking: bool,
    pub is_left_hand: bool,
    /// Time accumulated inside the current action lockout.
    pub action_delay: f32,
    pub current_action: Option<ActionSlot>,
    /// Weak handle into the adversary registry; cleared when the target
    /// dies or lock-on drops.
    pub lock_on_target: Option<Entity>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            move_dir: Vec3::ZERO,
            move_amount: 0.0,
            on_ground: true,
            run: false,
            lock_on: false,
            in_action: false,
            // Matches the animator default: a fresh spawn may move.
            can_move: true,
            two_handed: false,
            using_item: false,
            can_be_parried: false,
            is_blocking: false,
            is_left_hand: false,
            action_delay: 0.0,
            current_action: None,
            lock_on_target: None,
        }
    }
}

/// Tuning block for the controlled combatant.
#[derive(Component, Debug, Clone, Copy, Reflect, serde::Serialize, serde::Deserialize)]
#[reflect(Component)]
pub struct PlayerConfig {
    pub move_speed: f32,
    pub run_speed: f32,
    pub rotate_speed: f32,
    /// Root-motion multiplier for a directional roll.
    pub roll_speed: f32,
    /// Root-motion multiplier for a neutral (standing) roll.
    pub idle_roll_multiplier: f32,
    /// Reposition distance behind the defender on a landed parry counter.
    pub parry_offset: f32,
    /// Reposition distance behind the defender on a landed backstab.
    pub backstab_offset: f32,
    /// Ground probe origin height above the feet.
    pub to_ground: f32,
    /// Action lockout window in seconds.
    pub action_lockout: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            move_speed: 2.0,
            run_speed: 3.5,
            rotate_speed: 5.0,
            roll_speed: 1.0,
            idle_roll_multiplier: 1.3,
            parry_offset: 1.4,
            backstab_offset: 1.4,
            to_ground: 0.5,
            action_lockout: 0.3,
        }
    }
}

// ============================================================================
// Fixed tick
// ============================================================================

/// System: the whole per-fixed-tick resolution for each controlled
/// combatant. One system rather than a chain so the early exits of the
/// lockout and movement gates stay explicit.
pub fn player_fixed_tick(
    time: Res<Time<Fixed>>,
    mut players: Query<
        (
            Entity,
            &mut PlayerState,
            &mut PlayerInput,
            &mut Animator,
            &mut PhysicsBody,
            &ActionCatalog,
            &PlayerConfig,
        ),
        Without<Vitality>,
    >,
    mut transforms: Query<&mut Transform>,
    hostiles: Query<(Entity, &Vitality, &BodyCollider)>,
    mut parry_events: EventWriter<ParryLanded>,
    mut backstab_events: EventWriter<BackstabLanded>,
) {
    let dt = time.delta_secs();

    for (entity, mut state, mut input, mut animator, mut body, catalog, config) in
        players.iter_mut()
    {
        // --- input sampling -------------------------------------------------
        state.move_dir = input.move_dir;
        state.move_amount = input.move_amount.clamp(0.0, 1.0);
        state.run = input.run;

        if input.toggle_two_handed {
            input.toggle_two_handed = false;
            state.two_handed = !state.two_handed;
            animator.set_bool(BoolParam::TwoHanded, state.two_handed);
        }

        if input.toggle_lock_on {
            input.toggle_lock_on = false;
            state.lock_on = !state.lock_on;
            if state.lock_on_target.is_none() {
                state.lock_on = false;
            }
        }

        // --- entry gating ---------------------------------------------------
        state.is_blocking = false;
        state.using_item = animator.get_bool(BoolParam::Interacting);

        // --- action detection -----------------------------------------------
        if state.can_move && !state.using_item && input.any_action_button() {
            if let Some(slot) = catalog.action_slot(&input, state.two_handed) {
                match slot.kind {
                    ActionKind::Attack => attack_action(
                        entity,
                        &mut state,
                        &mut animator,
                        config,
                        slot,
                        &mut transforms,
                        &hostiles,
                        &mut parry_events,
                        &mut backstab_events,
                    ),
                    ActionKind::Block => {
                        state.is_blocking = true;
                        state.is_left_hand = slot.mirror;
                    }
                    ActionKind::Parry => parry_action(&mut state, &mut animator, slot),
                    // Reserved slot type
                    ActionKind::Spell => {}
                }
            }
        }

        // --- item use -------------------------------------------------------
        if state.can_move && !state.using_item && !state.is_blocking && input.item {
            if let Some(clip) = catalog.consumable_anim() {
                state.using_item = true;
                // Consumables hard-start their clip, no cross-fade.
                animator.play(clip);
            }
        }

        animator.set_bool(BoolParam::Blocking, state.is_blocking);
        animator.set_bool(BoolParam::IsLeft, state.is_left_hand);

        // --- lockout timing -------------------------------------------------
        if state.in_action {
            animator.set_root_motion(true);

            state.action_delay += dt;
            if state.action_delay > config.action_lockout {
                state.in_action = false;
                state.action_delay = 0.0;
            }
            // Locomotion stays skipped even on the expiry tick.
            continue;
        }

        // --- movement-unlock gate -------------------------------------------
        state.can_move = animator.get_bool(BoolParam::CanMove);
        if !state.can_move {
            continue;
        }

        // --- roll handling ---------------------------------------------------
        animator.reset_root_motion_multiplier();
        if input.roll && !state.using_item {
            handle_roll(entity, &mut state, &mut animator, config, &mut transforms);
        }

        animator.set_root_motion(false);

        // --- locomotion -----------------------------------------------------
        body.drag = if state.move_amount > 0.0 || !state.on_ground {
            0.0
        } else {
            REST_DRAG
        };

        if state.using_item {
            state.run = false;
            state.move_amount = state.move_amount.min(0.5);
        }
        let target_speed = if state.run {
            config.run_speed
        } else {
            config.move_speed
        };

        if state.on_ground {
            body.velocity = state.move_dir * (target_speed * state.move_amount);
        }

        if state.run {
            state.lock_on = false;
        }

        // --- facing ----------------------------------------------------------
        let lock_target_pos = state
            .lock_on_target
            .and_then(|target| transforms.get(target).ok().map(|tf| tf.translation));

        let mut player_rotation = Quat::IDENTITY;
        if let Ok(mut transform) = transforms.get_mut(entity) {
            let mut target_dir = if !state.lock_on {
                state.move_dir
            } else {
                lock_target_pos
                    .map(|pos| pos - transform.translation)
                    .unwrap_or(state.move_dir)
            };
            target_dir.y = 0.0;
            if target_dir == Vec3::ZERO {
                target_dir = *transform.forward();
            }

            // Turn rate scales with move_amount: a stationary combatant
            // does not turn, even with a rotation pending.
            let turn = (config.rotate_speed * state.move_amount * dt).min(1.0);
            let target_rotation = geometry::look_rotation(target_dir);
            transform.rotation = transform.rotation.slerp(target_rotation, turn);
            player_rotation = transform.rotation;
        }

        // --- animation parameter sync ----------------------------------------
        animator.set_bool(BoolParam::LockOn, state.lock_on);
        if !state.lock_on {
            animator.set_bool(BoolParam::Run, state.run);
            animator.set_float_smooth(FloatParam::Vertical, state.move_amount, 0.4, dt);
        } else {
            // Movement expressed in the combatant's local frame.
            let relative = player_rotation.inverse() * state.move_dir;
            animator.set_float_smooth(FloatParam::Horizontal, relative.x, 0.2, dt);
            animator.set_float_smooth(FloatParam::Vertical, -relative.z, 0.2, dt);
        }
    }
}

/// Attack dispatch: interaction checks first; a landed counter consumes
/// the attack. A slot without a clip is abandoned without state change.
#[allow(clippy::too_many_arguments)]
fn attack_action(
    entity: Entity,
    state: &mut PlayerState,
    animator: &mut Animator,
    config: &PlayerConfig,
    slot: &ActionSlot,
    transforms: &mut Query<&mut Transform>,
    hostiles: &Query<(Entity, &Vitality, &BodyCollider)>,
    parry_events: &mut EventWriter<ParryLanded>,
    backstab_events: &mut EventWriter<BackstabLanded>,
) {
    if check_for_parry_counter(
        entity,
        state,
        animator,
        config,
        slot,
        transforms,
        hostiles,
        parry_events,
    ) {
        return;
    }
    if check_for_backstab(
        entity,
        state,
        animator,
        config,
        slot,
        transforms,
        hostiles,
        backstab_events,
    ) {
        return;
    }

    if slot.target_anim.is_empty() {
        return;
    }

    state.can_move = false;
    state.in_action = true;
    state.current_action = Some(slot.clone());
    animator.set_bool(BoolParam::Mirror, slot.mirror);
    if slot.change_speed {
        animator.set_float(FloatParam::AnimSpeed, slot.anim_speed);
    }
    animator.cross_fade(&slot.target_anim, CROSS_FADE_BLEND);
}

/// Parry action dispatch: plays the slot clip with no counter-checks.
fn parry_action(state: &mut PlayerState, animator: &mut Animator, slot: &ActionSlot) {
    if slot.target_anim.is_empty() {
        return;
    }

    state.can_be_parried = slot.can_be_parried;
    state.can_move = false;
    state.in_action = true;
    animator.set_bool(BoolParam::Mirror, slot.mirror);
    if slot.change_speed {
        animator.set_float(FloatParam::AnimSpeed, slot.anim_speed);
    }
    animator.cross_fade(&slot.target_anim, CROSS_FADE_BLEND);
}

/// Attacker-side parry counter: short forward probe, window gate, facing
/// cone, then reposition + mirrored facing snap + `ParryLanded`.
#[allow(clippy::too_many_arguments)]
fn check_for_parry_counter(
    entity: Entity,
    state: &mut PlayerState,
    animator: &mut Animator,
    config: &PlayerConfig,
    slot: &ActionSlot,
    transforms: &mut Query<&mut Transform>,
    hostiles: &Query<(Entity, &Vitality, &BodyCollider)>,
    parry_events: &mut EventWriter<ParryLanded>,
) -> bool {
    if !slot.can_parry {
        return false;
    }

    let Ok(player_tf) = transforms.get(entity) else {
        return false;
    };
    let player_pos = player_tf.translation;
    let forward = *player_tf.forward();
    let origin = player_pos + Vec3::Y * CHEST_HEIGHT;

    let Some(hit) = probe_hostiles(origin, forward, PARRY_RAY_RANGE, transforms, hostiles) else {
        return false;
    };

    // The defender must have invited a parry; a closed window means this
    // is just an attack.
    let Ok((_, vitality, _)) = hostiles.get(hit.entity) else {
        return false;
    };
    if !vitality.parry_window_open {
        return false;
    }

    let (target_pos, target_forward) = match transforms.get(hit.entity) {
        Ok(tf) => (tf.translation, *tf.forward()),
        Err(_) => return false,
    };

    let mut dir = geometry::horizontal_between(player_pos, target_pos);
    if dir == Vec3::ZERO {
        // Coincident bodies: treat the defender's back as the approach.
        dir = -target_forward;
    }
    if !geometry::within_cone(forward, dir, PARRY_MAX_ANGLE) {
        return false;
    }

    if let Ok([mut player_t, mut target_t]) = transforms.get_many_mut([entity, hit.entity]) {
        // Slide behind the defender along the reversed approach direction
        // and snap the two facings to mirror each other.
        player_t.translation = target_pos - dir * config.parry_offset;
        player_t.rotation = geometry::look_rotation(dir);
        target_t.rotation = geometry::look_rotation(-dir);
    }

    parry_events.write(ParryLanded {
        attacker: entity,
        target: hit.entity,
        profile: AttackProfile::from(slot),
    });

    state.lock_on = false;
    state.lock_on_target = None;
    state.can_move = false;
    state.in_action = true;
    animator.set_bool(BoolParam::Mirror, slot.mirror);
    animator.cross_fade(clips::PARRY_ATTACK, CROSS_FADE_BLEND);

    crate::logger::log(&format!(
        "🗡️ Parry counter landed: {:?} → {:?}",
        entity, hit.entity
    ));
    true
}

/// Attacker-side backstab: near-touching probe, wide facing cone, then
/// reposition behind the defender + facing copy + `BackstabLanded`.
#[allow(clippy::too_many_arguments)]
fn check_for_backstab(
    entity: Entity,
    state: &mut PlayerState,
    animator: &mut Animator,
    config: &PlayerConfig,
    slot: &ActionSlot,
    transforms: &mut Query<&mut Transform>,
    hostiles: &Query<(Entity, &Vitality, &BodyCollider)>,
    backstab_events: &mut EventWriter<BackstabLanded>,
) -> bool {
    if !slot.can_backstab {
        return false;
    }

    let Ok(player_tf) = transforms.get(entity) else {
        return false;
    };
    let player_pos = player_tf.translation;
    let player_rotation = player_tf.rotation;
    let forward = *player_tf.forward();
    let origin = player_pos + Vec3::Y * CHEST_HEIGHT;

    let Some(hit) = probe_hostiles(origin, forward, BACKSTAB_RAY_RANGE, transforms, hostiles)
    else {
        return false;
    };

    let (target_pos, target_forward) = match transforms.get(hit.entity) {
        Ok(tf) => (tf.translation, *tf.forward()),
        Err(_) => return false,
    };

    let to_player = geometry::horizontal_between(target_pos, player_pos);
    if !geometry::within_cone(target_forward, to_player, BACKSTAB_MAX_ANGLE) {
        return false;
    }

    if let Ok([mut player_t, mut target_t]) = transforms.get_many_mut([entity, hit.entity]) {
        // Step in behind the defender and force it to face our way.
        player_t.translation = target_pos - target_forward * config.backstab_offset;
        target_t.rotation = player_rotation;
    }

    backstab_events.write(BackstabLanded {
        attacker: entity,
        target: hit.entity,
        profile: AttackProfile::from(slot),
    });

    state.lock_on = false;
    state.lock_on_target = None;
    state.can_move = false;
    state.in_action = true;
    animator.set_bool(BoolParam::Mirror, slot.mirror);
    animator.cross_fade(clips::BACKSTAB_ATTACK, CROSS_FADE_BLEND);

    crate::logger::log(&format!(
        "🗡️ Backstab landed: {:?} → {:?}",
        entity, hit.entity
    ));
    true
}

/// Forward probe against living hostiles, chest height on both ends.
fn probe_hostiles(
    origin: Vec3,
    forward: Vec3,
    range: f32,
    transforms: &Query<&mut Transform>,
    hostiles: &Query<(Entity, &Vitality, &BodyCollider)>,
) -> Option<geometry::RayHit> {
    let candidates: Vec<_> = hostiles
        .iter()
        .filter(|(_, vitality, _)| !vitality.is_dead)
        .filter_map(|(hostile, _, collider)| {
            transforms
                .get(hostile)
                .ok()
                .map(|tf| (hostile, tf.translation + Vec3::Y * CHEST_HEIGHT, *collider))
        })
        .collect();

    geometry::raycast_forward(origin, forward, range, LAYER_HOSTILE, candidates)
}

/// Roll: direction binarized to forward/neutral, never strafing.
fn handle_roll(
    entity: Entity,
    state: &mut PlayerState,
    animator: &mut Animator,
    config: &PlayerConfig,
    transforms: &mut Query<&mut Transform>,
) {
    let vertical = if state.move_amount > 0.3 { 1.0 } else { 0.0 };
    let horizontal = 0.0;

    if vertical != 0.0 {
        if let Ok(mut transform) = transforms.get_mut(entity) {
            let dir = if state.move_dir == Vec3::ZERO {
                *transform.forward()
            } else {
                state.move_dir
            };
            transform.rotation = geometry::look_rotation(dir);
        }
        animator.root_motion_multiplier = config.roll_speed;
    } else {
        animator.root_motion_multiplier = config.idle_roll_multiplier;
    }

    animator.set_float(FloatParam::Vertical, vertical);
    animator.set_float(FloatParam::Horizontal, horizontal);

    state.can_move = false;
    state.in_action = true;
    animator.cross_fade(clips::ROLL, CROSS_FADE_BLEND);
}

// ============================================================================
// Frame tick
// ============================================================================

/// System: frame-cadence upkeep — ground probe + `OnGround` parameter
/// push, and stale lock-on cleanup when the target has died.
pub fn player_frame_tick(
    mut players: Query<(Entity, &mut PlayerState, &mut Animator, &PlayerConfig)>,
    mut transforms: Query<&mut Transform>,
    vitals: Query<&Vitality>,
) {
    for (entity, mut state, mut animator, config) in players.iter_mut() {
        if let Ok(mut transform) = transforms.get_mut(entity) {
            match physics::ground_probe(transform.translation, config.to_ground) {
                Some(ground_y) => {
                    transform.translation.y = ground_y;
                    state.on_ground = true;
                }
                None => state.on_ground = false,
            }
        }
        animator.set_bool(BoolParam::OnGround, state.on_ground);

        if let Some(target) = state.lock_on_target {
            let gone = vitals.get(target).map(|v| v.is_dead).unwrap_or(true);
            if gone {
                state.lock_on_target = None;
                state.lock_on = false;
            }
        }
    }
}

// ============================================================================
// Plugin + spawn helper
// ============================================================================

/// Registers the action state machine and the physics-lite movement
/// systems on the fixed tick.
///
/// Порядок выполнения:
/// 1. player_fixed_tick — вся логика контролируемого бойца
/// 2. integrate_velocity_to_transform — headless интеграция
/// 3. sync_body_to_rapier — зеркало в rapier компоненты
pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ParryLanded>().add_event::<BackstabLanded>();

        app.add_systems(
            FixedUpdate,
            (
                player_fixed_tick,
                physics::integrate_velocity_to_transform,
                physics::sync_body_to_rapier,
            )
                .chain(),
        );

        app.add_systems(Update, player_frame_tick.in_set(FrameSet::Player));
    }
}

/// Spawn the controlled combatant with the default sword-and-board
/// loadout. The composition root: everything the state machine needs is
/// wired here, no lookups later.
pub fn spawn_player(commands: &mut Commands, position: Vec3) -> Entity {
    commands
        .spawn((
            Transform::from_translation(position),
            PlayerState::default(),
            PlayerInput::default(),
            PlayerConfig::default(),
            ActionCatalog::sword_and_shield(),
            Animator::default(),
            PhysicsBody::default(),
            BodyCollider {
                radius: 0.4,
                layer: LAYER_PLAYER,
            },
            RigidBody::KinematicPositionBased,
            Collider::capsule_y(0.5, 0.4),
            Velocity::default(),
            Damping {
                linear_damping: REST_DRAG,
                angular_damping: 999.0,
            },
        ))
        .id()
}
