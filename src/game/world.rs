//! Shared world state
//!
//! The live entity set plus score, misses, tilt mode and round phase. Every
//! periodic task and input handler mutates it through [`World`], which
//! serializes access behind a single mutex so no reader ever sees a
//! half-applied change.

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::game::constants::round;
use crate::game::entity::{Entity, EntityId, EntityKind};
use crate::game::events::{EndReason, RoundSummary};
use crate::util::vec2::Vec2;

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// No round started yet
    Idle,
    /// Tasks running, input accepted
    Running,
    /// Tasks stopped, state frozen for a later resume
    Suspended,
    /// Round over, entities cleared
    Ended,
}

/// Input mode granted by bonus pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltMode {
    Inactive,
    Active { ends_at: Instant },
}

impl TiltMode {
    pub fn is_active(&self) -> bool {
        matches!(self, TiltMode::Active { .. })
    }

    /// Time left at `now`, zero once past the end
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self {
            TiltMode::Inactive => None,
            TiltMode::Active { ends_at } => Some(ends_at.saturating_duration_since(now)),
        }
    }
}

/// Arena dimensions. Zero until the host has laid it out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

impl Arena {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Largest valid top-left corner for an entity of `size`, or `None` when
    /// the arena has no usable area for it.
    pub fn max_corner(&self, size: f32) -> Option<Vec2> {
        let max = Vec2::new(self.width - size, self.height - size);
        if max.x > 0.0 && max.y > 0.0 && max.is_finite() {
            Some(max)
        } else {
            None
        }
    }
}

/// Result of tapping an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Scored { points: i64, score: i64 },
    /// Bonus picked up; tilt mode now runs until `tilt_ends_at`
    BonusCollected {
        points: i64,
        score: i64,
        control_duration: Duration,
        tilt_ends_at: Instant,
    },
    /// Already expired, tapped or cleared. Not an error.
    AlreadyGone,
    /// Round not running; input ignored
    NotRunning,
}

/// Result of registering a miss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissOutcome {
    Counted { misses: u32, score: i64 },
    /// This miss reached the limit and ended the round
    GameOver(RoundSummary),
    /// Nothing live to miss; not counted
    NoTarget,
    NotRunning,
}

/// Read-only copy of the world for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub phase: RoundPhase,
    pub score: i64,
    pub misses: u32,
    pub tilt: TiltMode,
    pub arena: Arena,
    /// Ordered by id
    pub entities: Vec<Entity>,
}

/// The mutable world. Plain data; see [`World`] for the shared handle.
#[derive(Debug)]
pub struct WorldState {
    entities: HashMap<EntityId, Entity>,
    next_id: EntityId,
    score: i64,
    misses: u32,
    tilt: TiltMode,
    phase: RoundPhase,
    arena: Arena,
}

impl WorldState {
    pub fn new(arena: Arena) -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
            score: 0,
            misses: 0,
            tilt: TiltMode::Inactive,
            phase: RoundPhase::Idle,
            arena,
        }
    }

    /// Clear everything for a fresh round and enter Running.
    /// The id counter keeps counting so ids are never reused.
    pub fn reset_for_round(&mut self) {
        self.entities.clear();
        self.score = 0;
        self.misses = 0;
        self.tilt = TiltMode::Inactive;
        self.phase = RoundPhase::Running;
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RoundPhase::Running
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn tilt(&self) -> TiltMode {
        self.tilt
    }

    pub fn arena(&self) -> Arena {
        self.arena
    }

    pub fn set_arena(&mut self, arena: Arena) {
        self.arena = arena;
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn live_count(&self) -> usize {
        self.entities.len()
    }

    /// Normal insects only; the spawn cap applies to these
    pub fn normal_insect_count(&self) -> usize {
        self.entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Insect(_)))
            .count()
    }

    pub fn non_bonus_count(&self) -> usize {
        self.entities.values().filter(|e| e.kind.is_insect()).count()
    }

    pub fn has_live_bonus(&self) -> bool {
        self.entities.values().any(|e| e.kind.is_bonus())
    }

    /// Insert a new entity. Returns `None` when the round is not running.
    pub fn add_entity(
        &mut self,
        kind: EntityKind,
        position: Vec2,
        velocity: Vec2,
        now: Instant,
    ) -> Option<EntityId> {
        if !self.is_running() {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entities
            .insert(id, Entity::new(id, kind, position, velocity, now));
        Some(id)
    }

    /// Remove by id. Removing an absent id is a no-op.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Resolve a tap against the live set
    pub fn apply_tap(&mut self, id: EntityId, now: Instant) -> TapOutcome {
        if !self.is_running() {
            return TapOutcome::NotRunning;
        }
        let Some(entity) = self.entities.remove(&id) else {
            return TapOutcome::AlreadyGone;
        };

        let points = entity.kind.tap_points();
        self.score += points;

        match entity.kind {
            EntityKind::Bonus { control_duration } => {
                let tilt_ends_at = now + control_duration;
                self.tilt = TiltMode::Active {
                    ends_at: tilt_ends_at,
                };
                TapOutcome::BonusCollected {
                    points,
                    score: self.score,
                    control_duration,
                    tilt_ends_at,
                }
            }
            _ => TapOutcome::Scored {
                points,
                score: self.score,
            },
        }
    }

    /// Count a miss and apply the penalty. Reaching the miss limit ends the
    /// round here; this is the only place the miss path declares game over.
    pub fn register_miss(&mut self) -> MissOutcome {
        if !self.is_running() {
            return MissOutcome::NotRunning;
        }
        self.misses += 1;
        self.score -= round::MISS_PENALTY;

        if self.misses >= round::MAX_MISSES {
            if let Some(summary) = self.end_round(EndReason::MissLimit) {
                return MissOutcome::GameOver(summary);
            }
        }
        MissOutcome::Counted {
            misses: self.misses,
            score: self.score,
        }
    }

    /// A tap on empty arena space. Counts as a miss only while something
    /// is live to aim at.
    pub fn register_background_tap(&mut self) -> MissOutcome {
        if self.is_running() && self.entities.is_empty() {
            return MissOutcome::NoTarget;
        }
        self.register_miss()
    }

    pub fn set_tilt_mode(&mut self, tilt: TiltMode) {
        self.tilt = tilt;
    }

    /// Deactivate tilt mode if it has run past its end. Returns true if it did.
    pub fn expire_tilt(&mut self, now: Instant) -> bool {
        match self.tilt {
            TiltMode::Active { ends_at } if now > ends_at => {
                self.tilt = TiltMode::Inactive;
                true
            }
            _ => false,
        }
    }

    /// Remove every entity past its time-to-live
    pub fn reap_expired(&mut self, now: Instant) -> SmallVec<[EntityId; 8]> {
        let mut expired: SmallVec<[EntityId; 8]> = self
            .entities
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.id)
            .collect();
        expired.sort_unstable();
        for id in &expired {
            self.entities.remove(id);
        }
        expired
    }

    pub(crate) fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_unstable_by_key(|e| e.id);
        WorldSnapshot {
            phase: self.phase,
            score: self.score,
            misses: self.misses,
            tilt: self.tilt,
            arena: self.arena,
            entities,
        }
    }

    /// Enter Ended: clear entities and tilt. Returns the summary only on the
    /// transition itself, so a round is reported at most once.
    pub fn end_round(&mut self, reason: EndReason) -> Option<RoundSummary> {
        if !matches!(self.phase, RoundPhase::Running | RoundPhase::Suspended) {
            return None;
        }
        self.phase = RoundPhase::Ended;
        self.entities.clear();
        self.tilt = TiltMode::Inactive;
        Some(RoundSummary {
            score: self.score,
            misses: self.misses,
            reason,
        })
    }

    /// Running -> Suspended. State is kept as is.
    /// Drop the round in progress without a summary. Returns whether one
    /// was running or suspended.
    pub fn discard(&mut self) -> bool {
        let active = matches!(self.phase, RoundPhase::Running | RoundPhase::Suspended);
        self.phase = RoundPhase::Idle;
        self.entities.clear();
        self.tilt = TiltMode::Inactive;
        active
    }

    pub fn suspend(&mut self) -> bool {
        if self.phase != RoundPhase::Running {
            return false;
        }
        self.phase = RoundPhase::Suspended;
        true
    }

    /// Suspended -> Running. Spawn times and the tilt deadline move forward
    /// by `paused_for`, so lifetimes do not run while suspended.
    pub fn resume(&mut self, paused_for: Duration) -> bool {
        if self.phase != RoundPhase::Suspended {
            return false;
        }
        for entity in self.entities.values_mut() {
            entity.spawned_at += paused_for;
        }
        if let TiltMode::Active { ends_at } = self.tilt {
            self.tilt = TiltMode::Active {
                ends_at: ends_at + paused_for,
            };
        }
        self.phase = RoundPhase::Running;
        true
    }
}

/// Shared handle to the world. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct World {
    inner: Arc<Mutex<WorldState>>,
}

impl World {
    pub fn new(arena: Arena) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WorldState::new(arena))),
        }
    }

    /// Run `f` as one atomic mutation. Never hold across an `.await`.
    pub fn update<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        let mut state = self.inner.lock();
        f(&mut state)
    }

    pub fn read<R>(&self, f: impl FnOnce(&WorldState) -> R) -> R {
        let state = self.inner.lock();
        f(&state)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.read(WorldState::snapshot)
    }

    pub fn phase(&self) -> RoundPhase {
        self.read(WorldState::phase)
    }

    pub fn apply_tap(&self, id: EntityId, now: Instant) -> TapOutcome {
        self.update(|s| s.apply_tap(id, now))
    }

    pub fn register_miss(&self) -> MissOutcome {
        self.update(WorldState::register_miss)
    }

    pub fn remove_entity(&self, id: EntityId) -> Option<Entity> {
        self.update(|s| s.remove_entity(id))
    }

    pub fn set_tilt_mode(&self, tilt: TiltMode) {
        self.update(|s| s.set_tilt_mode(tilt));
    }

    pub fn set_arena(&self, arena: Arena) {
        self.update(|s| s.set_arena(arena));
    }
}
