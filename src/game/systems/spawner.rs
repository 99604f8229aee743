//! Entity spawning
//!
//! Three independent schedules: normal insects on the difficulty-derived
//! period (capped), a bonus every 15s when none is live, and a golden insect
//! every 20s regardless of the cap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::RoundContext;
use crate::game::constants::{entity, spawn};
use crate::game::difficulty::EffectiveSettings;
use crate::game::entity::{EntityId, EntityKind, InsectKind};
use crate::game::events::RoundEvent;
use crate::game::tasks::CancelToken;
use crate::game::world::WorldState;
use crate::gold::GoldRateCache;
use crate::metrics::RoundMetrics;
use crate::util::vec2::Vec2;

/// What the spawner is allowed to create this round
#[derive(Debug, Clone)]
pub struct SpawnPlan {
    pub settings: EffectiveSettings,
    /// Bonuses only exist when tilt control is enabled
    pub bonuses: bool,
    /// Golden insects read their value from here; `None` disables them
    pub gold: Option<Arc<GoldRateCache>>,
}

fn random_position<R: Rng>(rng: &mut R, max: Vec2) -> Vec2 {
    Vec2::new(rng.gen_range(0.0..=max.x), rng.gen_range(0.0..=max.y))
}

fn random_velocity<R: Rng>(rng: &mut R, bound: f32) -> Vec2 {
    Vec2::new(rng.gen_range(-bound..=bound), rng.gen_range(-bound..=bound))
}

/// Spawn one normal insect if the arena is laid out and the cap allows it
pub fn spawn_insect<R: Rng>(
    state: &mut WorldState,
    settings: &EffectiveSettings,
    rng: &mut R,
    now: Instant,
) -> Option<(EntityId, EntityKind)> {
    if state.normal_insect_count() >= settings.max_live_insects {
        return None;
    }
    let Some(max) = state.arena().max_corner(entity::INSECT_SIZE) else {
        debug!("Arena not laid out, skipping insect spawn");
        return None;
    };

    let kind = EntityKind::Insect(InsectKind::ALL[rng.gen_range(0..InsectKind::ALL.len())]);
    let position = random_position(rng, max);
    let velocity = random_velocity(rng, settings.insect_base_speed);
    state
        .add_entity(kind, position, velocity, now)
        .map(|id| (id, kind))
}

/// Spawn a bonus unless one is already live
pub fn spawn_bonus<R: Rng>(
    state: &mut WorldState,
    rng: &mut R,
    now: Instant,
) -> Option<(EntityId, EntityKind)> {
    if state.has_live_bonus() {
        return None;
    }
    let max = state.arena().max_corner(entity::BONUS_SIZE)?;

    let kind = EntityKind::Bonus {
        control_duration: entity::BONUS_CONTROL_DURATION,
    };
    let position = random_position(rng, max);
    state
        .add_entity(kind, position, Vec2::ZERO, now)
        .map(|id| (id, kind))
}

/// Spawn a golden insect worth `points`. Ignores the insect cap.
pub fn spawn_golden<R: Rng>(
    state: &mut WorldState,
    points: i64,
    rng: &mut R,
    now: Instant,
) -> Option<(EntityId, EntityKind)> {
    let max = state.arena().max_corner(entity::GOLDEN_SIZE)?;

    let kind = EntityKind::GoldenInsect { points };
    let position = random_position(rng, max);
    let velocity = random_velocity(rng, spawn::GOLDEN_BASE_SPEED);
    state
        .add_entity(kind, position, velocity, now)
        .map(|id| (id, kind))
}

fn record_spawn(ctx: &RoundContext, id: EntityId, kind: EntityKind) {
    let counter = match kind {
        EntityKind::Insect(_) => &ctx.metrics.insects_spawned,
        EntityKind::GoldenInsect { .. } => &ctx.metrics.golden_spawned,
        EntityKind::Bonus { .. } => &ctx.metrics.bonuses_spawned,
    };
    RoundMetrics::incr(counter);
    ctx.emit(RoundEvent::Spawned { id, kind });
}

/// Remove a golden insect exactly at its lifetime, ahead of the reaper
fn schedule_golden_expiry(ctx: &RoundContext, id: EntityId, mut cancel: CancelToken) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(entity::GOLDEN_TTL) => {
                if ctx.world.remove_entity(id).is_some() {
                    debug!("Golden insect {} expired", id);
                    RoundMetrics::incr(&ctx.metrics.entities_expired);
                    ctx.emit(RoundEvent::Expired { id });
                }
            }
            _ = cancel.cancelled() => {}
        }
    });
}

/// Spawner loop. Stops when cancelled or when the round leaves Running.
pub async fn run(ctx: RoundContext, plan: SpawnPlan, mut cancel: CancelToken) {
    let mut rng = StdRng::from_entropy();
    let start = Instant::now();

    let mut insects = interval_at(start + plan.settings.spawn_interval, plan.settings.spawn_interval);
    let mut bonuses = interval_at(start + spawn::BONUS_INTERVAL, spawn::BONUS_INTERVAL);
    let mut golden = interval_at(start + spawn::GOLDEN_INTERVAL, spawn::GOLDEN_INTERVAL);
    for timer in [&mut insects, &mut bonuses, &mut golden] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    info!(
        "Spawner started: every {:?}, cap {}",
        plan.settings.spawn_interval, plan.settings.max_live_insects
    );

    loop {
        let spawned = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = insects.tick() => ctx.world.update(|s| {
                spawn_insect(s, &plan.settings, &mut rng, Instant::now())
            }),
            _ = bonuses.tick(), if plan.bonuses => ctx.world.update(|s| {
                spawn_bonus(s, &mut rng, Instant::now())
            }),
            _ = golden.tick(), if plan.gold.is_some() => {
                let points = plan
                    .gold
                    .as_ref()
                    .map(|cache| cache.current().points_value())
                    .unwrap_or_default();
                let spawned = ctx.world.update(|s| spawn_golden(s, points, &mut rng, Instant::now()));
                if let Some((id, _)) = spawned {
                    schedule_golden_expiry(&ctx, id, cancel.clone());
                }
                spawned
            }
        };

        if let Some((id, kind)) = spawned {
            record_spawn(&ctx, id, kind);
        }
        if !ctx.world.read(WorldState::is_running) {
            break;
        }
    }

    debug!("Spawner stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::difficulty::{resolve, BaseSettings};
    use crate::game::world::{Arena, World};
    use crate::metrics::RoundMetrics;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn running(arena: Arena) -> WorldState {
        let mut state = WorldState::new(arena);
        state.reset_for_round();
        state
    }

    fn settings(max_insects: u32) -> EffectiveSettings {
        resolve(
            &BaseSettings {
                max_insects,
                ..BaseSettings::default()
            },
            1,
        )
    }

    #[test]
    fn test_insect_within_bounds_and_speed() {
        let mut state = running(Arena::new(400.0, 300.0));
        let settings = settings(50);
        let mut rng = StdRng::seed_from_u64(7);
        let now = Instant::now();

        for _ in 0..40 {
            let (id, kind) = spawn_insect(&mut state, &settings, &mut rng, now).unwrap();
            assert!(matches!(kind, EntityKind::Insect(_)));
            let e = state.get(id).unwrap();
            assert!(e.position.x >= 0.0 && e.position.x <= 340.0);
            assert!(e.position.y >= 0.0 && e.position.y <= 240.0);
            assert!(e.velocity.x.abs() <= settings.insect_base_speed);
            assert!(e.velocity.y.abs() <= settings.insect_base_speed);
        }
    }

    #[test]
    fn test_insect_cap_holds() {
        let mut state = running(Arena::new(800.0, 600.0));
        let settings = settings(3);
        let mut rng = StdRng::seed_from_u64(1);
        let now = Instant::now();

        for _ in 0..20 {
            spawn_insect(&mut state, &settings, &mut rng, now);
            assert!(state.normal_insect_count() <= settings.max_live_insects);
        }
        assert_eq!(state.normal_insect_count(), settings.max_live_insects);
    }

    #[test]
    fn test_golden_ignores_cap() {
        let mut state = running(Arena::new(800.0, 600.0));
        let settings = settings(1);
        let mut rng = StdRng::seed_from_u64(2);
        let now = Instant::now();

        spawn_insect(&mut state, &settings, &mut rng, now).unwrap();
        assert!(spawn_insect(&mut state, &settings, &mut rng, now).is_none());

        let (id, kind) = spawn_golden(&mut state, 750, &mut rng, now).unwrap();
        assert_eq!(kind, EntityKind::GoldenInsect { points: 750 });
        let golden = state.get(id).unwrap();
        assert!(golden.velocity.x.abs() <= spawn::GOLDEN_BASE_SPEED);
        assert_eq!(state.normal_insect_count(), 1);
    }

    #[test]
    fn test_one_bonus_at_a_time() {
        let mut state = running(Arena::new(800.0, 600.0));
        let mut rng = StdRng::seed_from_u64(3);
        let now = Instant::now();

        let (id, _) = spawn_bonus(&mut state, &mut rng, now).unwrap();
        assert_eq!(state.get(id).unwrap().velocity, Vec2::ZERO);
        assert!(spawn_bonus(&mut state, &mut rng, now).is_none());

        state.remove_entity(id);
        assert!(spawn_bonus(&mut state, &mut rng, now).is_some());
    }

    #[test]
    fn test_unlaid_arena_is_noop() {
        let mut state = running(Arena::default());
        let mut rng = StdRng::seed_from_u64(4);
        let now = Instant::now();

        assert!(spawn_insect(&mut state, &settings(10), &mut rng, now).is_none());
        assert!(spawn_bonus(&mut state, &mut rng, now).is_none());
        assert!(spawn_golden(&mut state, 1, &mut rng, now).is_none());
        assert_eq!(state.live_count(), 0);
    }

    fn context(arena: Arena) -> (RoundContext, broadcast::Receiver<RoundEvent>) {
        let world = World::new(arena);
        world.update(WorldState::reset_for_round);
        let (tx, rx) = broadcast::channel(256);
        (RoundContext::new(world, tx, Arc::new(RoundMetrics::new())), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_golden_uses_cached_rate_and_self_expires() {
        let (ctx, mut rx) = context(Arena::new(1080.0, 1920.0));
        let plan = SpawnPlan {
            settings: settings(1),
            bonuses: false,
            gold: Some(Arc::new(GoldRateCache::new())),
        };
        let token = CancelToken::new();
        let task = tokio::spawn(run(ctx.clone(), plan, token.clone()));

        tokio::time::sleep(spawn::GOLDEN_INTERVAL + Duration::from_millis(10)).await;
        let golden = ctx
            .world
            .snapshot()
            .entities
            .into_iter()
            .find(|e| matches!(e.kind, EntityKind::GoldenInsect { .. }))
            .unwrap();
        assert_eq!(golden.kind, EntityKind::GoldenInsect { points: 750 });

        tokio::time::sleep(entity::GOLDEN_TTL).await;
        assert!(ctx.world.read(|s| s.get(golden.id).is_none()));

        token.cancel();
        task.await.unwrap();

        let mut expired = false;
        while let Ok(event) = rx.try_recv() {
            if event == (RoundEvent::Expired { id: golden.id }) {
                expired = true;
            }
        }
        assert!(expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_schedules_never_fire() {
        let (ctx, _rx) = context(Arena::new(1080.0, 1920.0));
        let plan = SpawnPlan {
            settings: settings(1),
            bonuses: false,
            gold: None,
        };
        let token = CancelToken::new();
        let task = tokio::spawn(run(ctx.clone(), plan, token.clone()));

        tokio::time::sleep(Duration::from_secs(21)).await;
        let snapshot = ctx.world.snapshot();
        assert!(snapshot.entities.iter().all(|e| matches!(e.kind, EntityKind::Insect(_))));
        assert!(snapshot.entities.len() <= 1);

        token.cancel();
        task.await.unwrap();
    }
}
