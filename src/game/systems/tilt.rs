//! Tilt control
//!
//! While a bonus is in effect, orientation samples drive insect positions
//! directly. Velocities are left alone so ambient motion resumes from where
//! each insect was pushed to.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use super::RoundContext;
use crate::game::constants::tilt;
use crate::game::events::RoundEvent;
use crate::game::tasks::CancelToken;
use crate::game::world::{TiltMode, WorldState};
use crate::util::vec2::Vec2;

/// Two-axis device orientation reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub ax: f32,
    pub ay: f32,
}

impl OrientationSample {
    pub fn new(ax: f32, ay: f32) -> Self {
        Self { ax, ay }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TiltController {
    sensitivity: f32,
    enabled: bool,
}

impl TiltController {
    pub fn new(enabled: bool) -> Self {
        Self {
            sensitivity: tilt::SENSITIVITY,
            enabled,
        }
    }

    /// Push every live insect by one sample. Ignored unless tilt mode is
    /// active. Returns how many insects were moved.
    pub fn apply_orientation(&self, state: &mut WorldState, sample: OrientationSample) -> usize {
        if !self.enabled || !state.is_running() || !state.tilt().is_active() {
            return 0;
        }
        if !sample.ax.is_finite() || !sample.ay.is_finite() {
            return 0;
        }

        let arena = state.arena();
        let offset = Vec2::new(-sample.ax * self.sensitivity, sample.ay * self.sensitivity);
        let mut moved = 0;
        for entity in state.entities_mut() {
            if !entity.kind.is_insect() {
                continue;
            }
            let Some(max) = arena.max_corner(entity.size()) else {
                continue;
            };
            entity.position = (entity.position + offset).clamp(Vec2::ZERO, max);
            moved += 1;
        }
        moved
    }
}

impl Default for TiltController {
    fn default() -> Self {
        Self::new(true)
    }
}

fn whole_seconds(remaining: Duration) -> u64 {
    remaining.as_millis().div_ceil(1000) as u64
}

/// Publish the seconds left of the tilt mode ending at `ends_at`, once per
/// second. Stops when that tilt mode is gone or the group is cancelled.
pub async fn run_countdown(ctx: RoundContext, ends_at: Instant, mut cancel: CancelToken) {
    let mut ticker = interval(tilt::COUNTDOWN_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let current = ctx.world.read(WorldState::tilt);
                if current != (TiltMode::Active { ends_at }) {
                    break;
                }
                let remaining = ends_at.saturating_duration_since(Instant::now());
                ctx.emit(RoundEvent::TiltCountdown {
                    remaining_secs: whole_seconds(remaining),
                });
            }
        }
    }

    debug!("Tilt countdown stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::{EntityKind, InsectKind};
    use crate::game::world::{Arena, World};
    use crate::metrics::RoundMetrics;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    fn tilted_world() -> (WorldState, u64, u64) {
        let mut state = WorldState::new(Arena::new(600.0, 600.0));
        state.reset_for_round();
        let now = Instant::now();
        let bug = state
            .add_entity(
                EntityKind::Insect(InsectKind::Bug),
                Vec2::new(100.0, 100.0),
                Vec2::new(3.0, 4.0),
                now,
            )
            .unwrap();
        let bonus = state
            .add_entity(
                EntityKind::Bonus {
                    control_duration: Duration::from_secs(10),
                },
                Vec2::new(200.0, 200.0),
                Vec2::ZERO,
                now,
            )
            .unwrap();
        state.set_tilt_mode(TiltMode::Active {
            ends_at: now + Duration::from_secs(10),
        });
        (state, bug, bonus)
    }

    #[test]
    fn test_sample_moves_insects_only() {
        let (mut state, bug, bonus) = tilted_world();
        let moved = TiltController::default().apply_orientation(&mut state, OrientationSample::new(1.0, 2.0));

        assert_eq!(moved, 1);
        let e = state.get(bug).unwrap();
        assert_eq!(e.position, Vec2::new(85.0, 130.0));
        assert_eq!(e.velocity, Vec2::new(3.0, 4.0));
        assert_eq!(state.get(bonus).unwrap().position, Vec2::new(200.0, 200.0));
    }

    #[test]
    fn test_sample_clamped_to_arena() {
        let (mut state, bug, _) = tilted_world();
        let controller = TiltController::default();
        controller.apply_orientation(&mut state, OrientationSample::new(100.0, 100.0));
        assert_eq!(state.get(bug).unwrap().position, Vec2::new(0.0, 540.0));
    }

    #[test]
    fn test_ignored_when_inactive_or_disabled() {
        let (mut state, bug, _) = tilted_world();
        let sample = OrientationSample::new(1.0, 1.0);

        assert_eq!(TiltController::new(false).apply_orientation(&mut state, sample), 0);

        state.set_tilt_mode(TiltMode::Inactive);
        assert_eq!(TiltController::default().apply_orientation(&mut state, sample), 0);
        assert_eq!(state.get(bug).unwrap().position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_non_finite_sample_ignored() {
        let (mut state, bug, _) = tilted_world();
        let moved = TiltController::default().apply_orientation(&mut state, OrientationSample::new(f32::NAN, 0.0));
        assert_eq!(moved, 0);
        assert_eq!(state.get(bug).unwrap().position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_millis(10_000)), 10);
        assert_eq!(whole_seconds(Duration::from_millis(9_001)), 10);
        assert_eq!(whole_seconds(Duration::from_millis(1)), 1);
        assert_eq!(whole_seconds(Duration::ZERO), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_stops_with_tilt() {
        let world = World::new(Arena::new(600.0, 600.0));
        world.update(WorldState::reset_for_round);
        let ends_at = Instant::now() + Duration::from_secs(3);
        world.set_tilt_mode(TiltMode::Active { ends_at });

        let (tx, mut rx) = broadcast::channel(16);
        let ctx = RoundContext::new(world.clone(), tx, Arc::new(RoundMetrics::new()));
        let task = tokio::spawn(run_countdown(ctx, ends_at, CancelToken::new()));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        world.set_tilt_mode(TiltMode::Inactive);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(task.is_finished());

        let mut seen = Vec::new();
        while let Ok(RoundEvent::TiltCountdown { remaining_secs }) = rx.try_recv() {
            seen.push(remaining_secs);
        }
        assert_eq!(seen, vec![3, 2, 1]);
    }
}
