//! Combat interaction events.
//!
//! Entry points between combatants and between the core and the host:
//! the player tick writes `ParryLanded`/`BackstabLanded`; the host's
//! weapon-hitbox layer writes `HitLanded` when a swing connects; the
//! host's parry-collider layer writes `ParryProbe` while a parry clip is
//! active. The adversary side consumes all of them.

use bevy::prelude::*;

use crate::actions::ActionSlot;
use crate::stats::WeaponStats;

/// The slice of an action a defender needs to resolve being hit.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackProfile {
    pub weapon: WeaponStats,
    pub parry_multiplier: f32,
    pub backstab_multiplier: f32,
    pub override_damage_anim: bool,
    pub damage_anim: String,
}

impl From<&ActionSlot> for AttackProfile {
    fn from(slot: &ActionSlot) -> Self {
        Self {
            weapon: slot.weapon,
            parry_multiplier: slot.parry_multiplier,
            backstab_multiplier: slot.backstab_multiplier,
            override_damage_anim: slot.override_damage_anim,
            damage_anim: slot.damage_anim.clone(),
        }
    }
}

/// A weapon hitbox connected with a defender (host hitbox layer → core).
#[derive(Event, Debug, Clone)]
pub struct HitLanded {
    pub attacker: Entity,
    pub target: Entity,
    pub profile: AttackProfile,
}

/// Attacker landed a parry counter; `parry_multiplier` applies.
#[derive(Event, Debug, Clone)]
pub struct ParryLanded {
    pub attacker: Entity,
    pub target: Entity,
    pub profile: AttackProfile,
}

/// Attacker landed a backstab; `backstab_multiplier` applies.
#[derive(Event, Debug, Clone)]
pub struct BackstabLanded {
    pub attacker: Entity,
    pub target: Entity,
    pub profile: AttackProfile,
}

/// An attacker's active parry is probing this defender for an interrupt
/// (host parry-collider layer → core).
#[derive(Event, Debug, Clone)]
pub struct ParryProbe {
    pub attacker: Entity,
    pub target: Entity,
}
