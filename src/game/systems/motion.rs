//! Ambient insect motion
//!
//! Every 50ms each insect moves by its velocity and bounces off the arena
//! edges. Suspended entirely while tilt control is active.

use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::RoundContext;
use crate::game::constants::motion;
use crate::game::entity::Entity;
use crate::game::tasks::CancelToken;
use crate::game::world::WorldState;
use crate::util::vec2::Vec2;

/// Advance one entity and reflect it off any edge it reached.
/// `max` is the largest valid top-left corner for its footprint.
pub fn step_entity(entity: &mut Entity, max: Vec2) {
    let mut position = entity.position + entity.velocity;
    let mut velocity = entity.velocity;

    if position.x <= 0.0 {
        position.x = 0.0;
        velocity.x = -velocity.x;
    } else if position.x >= max.x {
        position.x = max.x;
        velocity.x = -velocity.x;
    }

    if position.y <= 0.0 {
        position.y = 0.0;
        velocity.y = -velocity.y;
    } else if position.y >= max.y {
        position.y = max.y;
        velocity.y = -velocity.y;
    }

    entity.position = position;
    entity.velocity = velocity;
}

/// One integration step over the whole world. Returns how many moved.
pub fn integrate(state: &mut WorldState) -> usize {
    if !state.is_running() || state.tilt().is_active() {
        return 0;
    }

    let arena = state.arena();
    let mut moved = 0;
    for entity in state.entities_mut() {
        if !entity.kind.is_insect() {
            continue;
        }
        let Some(max) = arena.max_corner(entity.size()) else {
            continue;
        };
        step_entity(entity, max);
        moved += 1;
    }
    moved
}

pub async fn run(ctx: RoundContext, mut cancel: CancelToken) {
    let mut ticker = interval(motion::TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                ctx.world.update(integrate);
            }
        }
    }

    debug!("Motion integrator stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::{EntityKind, InsectKind};
    use crate::game::world::{Arena, TiltMode};
    use std::time::Duration;
    use tokio::time::Instant;

    fn bug(position: Vec2, velocity: Vec2) -> Entity {
        Entity::new(
            1,
            EntityKind::Insect(InsectKind::Bug),
            position,
            velocity,
            Instant::now(),
        )
    }

    #[test]
    fn test_free_step() {
        let mut e = bug(Vec2::new(100.0, 100.0), Vec2::new(3.0, -4.0));
        step_entity(&mut e, Vec2::new(500.0, 500.0));
        assert_eq!(e.position, Vec2::new(103.0, 96.0));
        assert_eq!(e.velocity, Vec2::new(3.0, -4.0));
    }

    #[test]
    fn test_reflect_left_and_top() {
        let mut e = bug(Vec2::new(2.0, 1.0), Vec2::new(-5.0, -3.0));
        step_entity(&mut e, Vec2::new(500.0, 500.0));
        assert_eq!(e.position, Vec2::ZERO);
        assert_eq!(e.velocity, Vec2::new(5.0, 3.0));
    }

    #[test]
    fn test_reflect_right_and_bottom() {
        let mut e = bug(Vec2::new(498.0, 495.0), Vec2::new(5.0, 7.0));
        step_entity(&mut e, Vec2::new(500.0, 500.0));
        assert_eq!(e.position, Vec2::new(500.0, 500.0));
        assert_eq!(e.velocity, Vec2::new(-5.0, -7.0));
    }

    #[test]
    fn test_axes_reflect_independently() {
        let mut e = bug(Vec2::new(1.0, 250.0), Vec2::new(-4.0, 6.0));
        step_entity(&mut e, Vec2::new(500.0, 500.0));
        assert_eq!(e.position, Vec2::new(0.0, 256.0));
        assert_eq!(e.velocity, Vec2::new(4.0, 6.0));
    }

    fn world_with_bug_and_bonus() -> WorldState {
        let mut state = WorldState::new(Arena::new(560.0, 560.0));
        state.reset_for_round();
        let now = Instant::now();
        state.add_entity(
            EntityKind::Insect(InsectKind::Cockroach),
            Vec2::new(10.0, 10.0),
            Vec2::new(2.0, 2.0),
            now,
        );
        state.add_entity(
            EntityKind::Bonus {
                control_duration: Duration::from_secs(10),
            },
            Vec2::new(40.0, 40.0),
            Vec2::new(9.0, 9.0),
            now,
        );
        state
    }

    #[test]
    fn test_bonus_never_moves() {
        let mut state = world_with_bug_and_bonus();
        assert_eq!(integrate(&mut state), 1);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.entities[0].position, Vec2::new(12.0, 12.0));
        assert_eq!(snapshot.entities[1].position, Vec2::new(40.0, 40.0));
    }

    #[test]
    fn test_tilt_suspends_integration() {
        let mut state = world_with_bug_and_bonus();
        state.set_tilt_mode(TiltMode::Active {
            ends_at: Instant::now() + Duration::from_secs(5),
        });
        assert_eq!(integrate(&mut state), 0);
        assert_eq!(state.snapshot().entities[0].position, Vec2::new(10.0, 10.0));
    }

    #[test]
    fn test_unlaid_arena_skips() {
        let mut state = world_with_bug_and_bonus();
        state.set_arena(Arena::default());
        assert_eq!(integrate(&mut state), 0);
    }

    #[test]
    fn test_positions_stay_in_bounds() {
        let mut state = world_with_bug_and_bonus();
        let max = state.arena().max_corner(60.0).unwrap();
        for _ in 0..1000 {
            integrate(&mut state);
            let e = &state.snapshot().entities[0];
            assert!(e.position.x >= 0.0 && e.position.x <= max.x);
            assert!(e.position.y >= 0.0 && e.position.y <= max.y);
        }
    }
}
