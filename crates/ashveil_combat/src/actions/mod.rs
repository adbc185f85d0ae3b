//! Action catalog: button → action-slot resolution.
//!
//! # Архитектура
//!
//! **ActionCatalog** — per-combatant slot tables:
//! - 4 слота по кнопкам (rb, rt, lt, lb), отдельные таблицы для
//!   one-handed / two-handed хвата
//! - consumable slot для item use (только clip id)
//! - Слоты — immutable descriptors; equipment/UI наполняют таблицы снаружи
//!
//! The core only ever *reads* slots: at most one per tick, picked by
//! button priority rb → rt → lt → lb.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::input::PlayerInput;
use crate::stats::WeaponStats;

/// What a dispatched slot does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Attack,
    Block,
    /// Reserved — dispatch is a no-op in this core.
    Spell,
    Parry,
}

/// Immutable per-action descriptor produced by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSlot {
    pub kind: ActionKind,
    /// Target clip; empty means the slot is unusable this tick.
    pub target_anim: String,
    /// Mirrored (left-hand) variant of the clip.
    pub mirror: bool,
    /// Attack may open with a parry-counter check.
    pub can_parry: bool,
    /// Attack may open with a backstab check.
    pub can_backstab: bool,
    /// Performing this action leaves the combatant parryable.
    pub can_be_parried: bool,
    pub change_speed: bool,
    pub anim_speed: f32,
    pub weapon: WeaponStats,
    pub parry_multiplier: f32,
    pub backstab_multiplier: f32,
    /// Defender plays `damage_anim` instead of a generic reaction clip.
    pub override_damage_anim: bool,
    pub damage_anim: String,
}

impl ActionSlot {
    /// Standard one-handed swing.
    pub fn attack(target_anim: &str, weapon: WeaponStats) -> Self {
        Self {
            kind: ActionKind::Attack,
            target_anim: target_anim.to_owned(),
            mirror: false,
            can_parry: true,
            can_backstab: true,
            can_be_parried: true,
            change_speed: false,
            anim_speed: 1.0,
            weapon,
            parry_multiplier: 2.5,
            backstab_multiplier: 2.0,
            override_damage_anim: false,
            damage_anim: String::new(),
        }
    }

    /// Sustained guard on the off-hand.
    pub fn block(mirror: bool) -> Self {
        Self {
            kind: ActionKind::Block,
            target_anim: String::new(),
            mirror,
            can_parry: false,
            can_backstab: false,
            can_be_parried: false,
            change_speed: false,
            anim_speed: 1.0,
            weapon: WeaponStats::unarmed(),
            parry_multiplier: 1.0,
            backstab_multiplier: 1.0,
            override_damage_anim: false,
            damage_anim: String::new(),
        }
    }

    /// Off-hand parry attempt.
    pub fn parry(target_anim: &str, mirror: bool) -> Self {
        Self {
            kind: ActionKind::Parry,
            target_anim: target_anim.to_owned(),
            mirror,
            can_parry: false,
            can_backstab: false,
            can_be_parried: true,
            change_speed: false,
            anim_speed: 1.0,
            weapon: WeaponStats::unarmed(),
            parry_multiplier: 1.0,
            backstab_multiplier: 1.0,
            override_damage_anim: false,
            damage_anim: String::new(),
        }
    }
}

/// Per-combatant action catalog (one-handed + two-handed tables and the
/// quick-use consumable). Populated at spawn by the composition root;
/// equipment screens would rewrite it from outside.
#[derive(Component, Debug, Clone, Default)]
pub struct ActionCatalog {
    one_handed: [Option<ActionSlot>; 4],
    two_handed: [Option<ActionSlot>; 4],
    /// Clip id of the equipped consumable, if any.
    consumable_anim: Option<String>,
}

/// Slot indices by button, in dispatch priority order.
const SLOT_RB: usize = 0;
const SLOT_RT: usize = 1;
const SLOT_LT: usize = 2;
const SLOT_LB: usize = 3;

impl ActionCatalog {
    /// Sword-and-board loadout used by the default player spawn.
    pub fn sword_and_shield() -> Self {
        let sword = WeaponStats::longsword();
        let heavy = WeaponStats {
            base_damage: sword.base_damage + 15,
            ..sword
        };
        let two_handed = WeaponStats {
            base_damage: sword.base_damage + sword.two_handed_bonus,
            ..sword
        };

        let mut catalog = Self::default();
        catalog.one_handed[SLOT_RB] = Some(ActionSlot::attack("oh_attack_1", sword));
        catalog.one_handed[SLOT_RT] = Some(ActionSlot::attack("oh_attack_2", heavy));
        catalog.one_handed[SLOT_LT] = Some(ActionSlot::parry("parry", true));
        catalog.one_handed[SLOT_LB] = Some(ActionSlot::block(true));

        catalog.two_handed[SLOT_RB] = Some(ActionSlot::attack("th_attack_1", two_handed));
        catalog.two_handed[SLOT_RT] = Some(ActionSlot::attack("th_attack_2", heavy));

        catalog.consumable_anim = Some("consume_item".to_owned());
        catalog
    }

    pub fn set_slot(&mut self, index: usize, two_handed: bool, slot: Option<ActionSlot>) {
        let table = if two_handed {
            &mut self.two_handed
        } else {
            &mut self.one_handed
        };
        if let Some(entry) = table.get_mut(index) {
            *entry = slot;
        }
    }

    pub fn set_consumable(&mut self, anim: Option<String>) {
        self.consumable_anim = anim;
    }

    /// At most one slot per tick: first held button in priority order
    /// rb → rt → lt → lb, from the table matching the current grip.
    pub fn action_slot(&self, input: &PlayerInput, two_handed: bool) -> Option<&ActionSlot> {
        let table = if two_handed {
            &self.two_handed
        } else {
            &self.one_handed
        };

        let index = if input.rb {
            SLOT_RB
        } else if input.rt {
            SLOT_RT
        } else if input.lt {
            SLOT_LT
        } else if input.lb {
            SLOT_LB
        } else {
            return None;
        };

        table[index].as_ref()
    }

    /// Clip id of the equipped consumable; `None` disables item use.
    pub fn consumable_anim(&self) -> Option<&str> {
        self.consumable_anim.as_deref().filter(|a| !a.is_empty())
    }
}
