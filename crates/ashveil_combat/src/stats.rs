//! Weapon/defender stats and the base damage formula.
//!
//! ECS хранит только данные; формула — чистая функция без доступа к World.
//! Randomness never enters here: reaction-clip choice is the only random
//! roll in the core and it lives on the defender side.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Offensive stats of a weapon (or an unarmed strike).
///
/// Embedded by value in action slots so a dispatched action stays valid
/// even if the equipment that produced it changes mid-swing.
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Base physical damage before multipliers.
    pub base_damage: i32,
    /// Flat bonus applied when the weapon is held in both hands.
    pub two_handed_bonus: i32,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self::longsword()
    }
}

impl WeaponStats {
    pub fn longsword() -> Self {
        Self {
            base_damage: 25,
            two_handed_bonus: 10,
        }
    }

    pub fn unarmed() -> Self {
        Self {
            base_damage: 5,
            two_handed_bonus: 0,
        }
    }
}

/// Defensive stats of whoever is being hit.
#[derive(Component, Debug, Clone, Copy, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct CharacterStats {
    /// Flat damage reduction.
    pub defense: i32,
}

impl Default for CharacterStats {
    fn default() -> Self {
        Self { defense: 0 }
    }
}

/// Base damage formula: weapon vs defender, with an interaction multiplier
/// (1.0 for a plain hit, parry/backstab multipliers otherwise).
///
/// Deterministic given its inputs. Never negative.
pub fn calculate_base_damage(
    weapon: &WeaponStats,
    defender: &CharacterStats,
    multiplier: f32,
) -> i32 {
    let raw = (weapon.base_damage as f32 * multiplier).round() as i32;
    (raw - defender.defense).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_damage_plain_hit() {
        let weapon = WeaponStats {
            base_damage: 30,
            two_handed_bonus: 0,
        };
        let defender = CharacterStats::default();
        assert_eq!(calculate_base_damage(&weapon, &defender, 1.0), 30);
    }

    #[test]
    fn test_base_damage_multiplier() {
        let weapon = WeaponStats {
            base_damage: 20,
            two_handed_bonus: 0,
        };
        let defender = CharacterStats::default();
        // Parry riposte at 2.5x
        assert_eq!(calculate_base_damage(&weapon, &defender, 2.5), 50);
    }

    #[test]
    fn test_base_damage_defense_floor() {
        let weapon = WeaponStats {
            base_damage: 10,
            two_handed_bonus: 0,
        };
        let defender = CharacterStats { defense: 50 };
        // Damage never goes negative
        assert_eq!(calculate_base_damage(&weapon, &defender, 1.0), 0);
    }
}
