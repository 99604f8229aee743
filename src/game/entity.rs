//! Arena entities: normal insects, golden insects and bonuses.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::game::constants::entity;
use crate::util::vec2::Vec2;

/// Entity identifier, unique within a world and never reused
pub type EntityId = u64;

/// Normal insect sub-types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsectKind {
    Bug,
    Cockroach,
}

impl InsectKind {
    pub const ALL: [InsectKind; 2] = [InsectKind::Bug, InsectKind::Cockroach];

    pub fn points(&self) -> i64 {
        match self {
            InsectKind::Bug => entity::BUG_POINTS,
            InsectKind::Cockroach => entity::COCKROACH_POINTS,
        }
    }
}

/// Variant-specific entity data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Insect(InsectKind),
    /// Points are fixed at spawn from the gold-rate snapshot
    GoldenInsect { points: i64 },
    /// Grants tilt control for `control_duration` on pickup
    Bonus { control_duration: Duration },
}

impl EntityKind {
    pub fn is_bonus(&self) -> bool {
        matches!(self, EntityKind::Bonus { .. })
    }

    /// Normal and golden insects; these move
    pub fn is_insect(&self) -> bool {
        !self.is_bonus()
    }

    pub fn time_to_live(&self) -> Duration {
        match self {
            EntityKind::Insect(_) => entity::INSECT_TTL,
            EntityKind::GoldenInsect { .. } => entity::GOLDEN_TTL,
            EntityKind::Bonus { .. } => entity::BONUS_TTL,
        }
    }

    pub fn size(&self) -> f32 {
        match self {
            EntityKind::Insect(_) => entity::INSECT_SIZE,
            EntityKind::GoldenInsect { .. } => entity::GOLDEN_SIZE,
            EntityKind::Bonus { .. } => entity::BONUS_SIZE,
        }
    }

    /// Score for tapping this entity
    pub fn tap_points(&self) -> i64 {
        match self {
            EntityKind::Insect(kind) => kind.points(),
            EntityKind::GoldenInsect { points } => *points,
            EntityKind::Bonus { .. } => entity::BONUS_PICKUP_POINTS,
        }
    }
}

/// A live entity owned by the world
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
    /// Per-tick displacement. Always zero for bonuses.
    pub velocity: Vec2,
    pub spawned_at: Instant,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, position: Vec2, velocity: Vec2, spawned_at: Instant) -> Self {
        let velocity = if kind.is_bonus() { Vec2::ZERO } else { velocity };
        Self {
            id,
            kind,
            position,
            velocity,
            spawned_at,
        }
    }

    pub fn size(&self) -> f32 {
        self.kind.size()
    }

    /// Strictly older than its time-to-live at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.spawned_at) > self.kind.time_to_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insect_points() {
        assert_eq!(EntityKind::Insect(InsectKind::Bug).tap_points(), 5);
        assert_eq!(EntityKind::Insect(InsectKind::Cockroach).tap_points(), 10);
        assert_eq!(EntityKind::GoldenInsect { points: 750 }.tap_points(), 750);
    }

    #[test]
    fn test_time_to_live_per_variant() {
        assert_eq!(EntityKind::Insect(InsectKind::Bug).time_to_live(), Duration::from_millis(5000));
        assert_eq!(EntityKind::GoldenInsect { points: 1 }.time_to_live(), Duration::from_millis(7000));
        let bonus = EntityKind::Bonus {
            control_duration: entity::BONUS_CONTROL_DURATION,
        };
        assert_eq!(bonus.time_to_live(), Duration::from_millis(5000));
    }

    #[test]
    fn test_bonus_never_has_velocity() {
        let bonus = Entity::new(
            1,
            EntityKind::Bonus {
                control_duration: entity::BONUS_CONTROL_DURATION,
            },
            Vec2::new(10.0, 10.0),
            Vec2::new(4.0, 4.0),
            Instant::now(),
        );
        assert_eq!(bonus.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_expiry_is_strict() {
        let t0 = Instant::now();
        let e = Entity::new(1, EntityKind::Insect(InsectKind::Bug), Vec2::ZERO, Vec2::ZERO, t0);
        assert!(!e.is_expired(t0 + entity::INSECT_TTL));
        assert!(e.is_expired(t0 + entity::INSECT_TTL + Duration::from_millis(1)));
    }
}
