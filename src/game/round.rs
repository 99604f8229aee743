//! Round coordinator
//!
//! Owns the round lifecycle: Idle -> Running -> (Suspended <-> Running) ->
//! Ended. Every periodic task of a round lives in one [`TaskGroup`]; ending
//! or suspending the round cancels the group as a unit. Input handlers
//! mutate the world directly through its atomic operations.

use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::game::clock::RoundClock;
use crate::game::constants::round;
use crate::game::difficulty::{self, BaseSettings, EffectiveSettings};
use crate::game::entity::EntityId;
use crate::game::events::{EndReason, RoundEvent, RoundSummary};
use crate::game::systems::spawner::SpawnPlan;
use crate::game::systems::tilt::{OrientationSample, TiltController};
use crate::game::systems::{motion, reaper, spawner, tilt, RoundContext};
use crate::game::tasks::TaskGroup;
use crate::game::world::{Arena, MissOutcome, RoundPhase, TapOutcome, TiltMode, World, WorldSnapshot, WorldState};
use crate::gold::GoldRateCache;
use crate::metrics::RoundMetrics;
use crate::store::{record_if_best, PlayerRecord, ScoreStore};

/// Invalid lifecycle commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No round is running")]
    NotRunning,
    #[error("Round is not suspended")]
    NotSuspended,
    #[error("No round in progress")]
    NoActiveRound,
}

/// Per-engine options fixed for the coordinator's lifetime
#[derive(Debug, Clone, Copy)]
pub struct RoundOptions {
    pub base: BaseSettings,
    pub arena: Arena,
    /// Bonuses and orientation input
    pub tilt_enabled: bool,
    /// Golden insects
    pub gold_rate_enabled: bool,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            base: BaseSettings::default(),
            arena: Arena::default(),
            tilt_enabled: true,
            gold_rate_enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    player: Option<PlayerRecord>,
    settings: Option<EffectiveSettings>,
    clock: Option<RoundClock>,
    tasks: Option<TaskGroup>,
}

struct Shared {
    options: RoundOptions,
    ctx: RoundContext,
    gold: Arc<GoldRateCache>,
    store: Arc<dyn ScoreStore>,
    tilt: TiltController,
    session: Mutex<Session>,
}

/// Drives rounds for one player at a time. Cheap to clone.
#[derive(Clone)]
pub struct RoundCoordinator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RoundCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundCoordinator")
            .field("options", &self.shared.options)
            .field("phase", &self.phase())
            .finish()
    }
}

impl RoundCoordinator {
    pub fn new(options: RoundOptions, gold: Arc<GoldRateCache>, store: Arc<dyn ScoreStore>) -> Self {
        Self::with_metrics(options, gold, store, Arc::new(RoundMetrics::new()))
    }

    pub fn with_metrics(
        options: RoundOptions,
        gold: Arc<GoldRateCache>,
        store: Arc<dyn ScoreStore>,
        metrics: Arc<RoundMetrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(round::EVENT_CHANNEL_CAPACITY);
        let ctx = RoundContext::new(World::new(options.arena), events, metrics);
        Self {
            shared: Arc::new(Shared {
                options,
                ctx,
                gold,
                store,
                tilt: TiltController::new(options.tilt_enabled),
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.shared.ctx.events.subscribe()
    }

    pub fn world(&self) -> &World {
        &self.shared.ctx.world
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.shared.ctx.world.snapshot()
    }

    pub fn phase(&self) -> RoundPhase {
        self.shared.ctx.world.phase()
    }

    pub fn metrics(&self) -> &Arc<RoundMetrics> {
        &self.shared.ctx.metrics
    }

    /// Settings of the current or last round
    pub fn settings(&self) -> Option<EffectiveSettings> {
        self.shared.session.lock().settings
    }

    /// Round time left, frozen while suspended
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.shared.session.lock().clock.map(|c| c.remaining(now))
    }

    pub fn set_arena(&self, width: f32, height: f32) {
        debug!("Arena laid out at {}x{}", width, height);
        self.shared.ctx.world.set_arena(Arena::new(width, height));
    }

    /// Start a fresh round for `player`. A round still in progress is torn
    /// down first and never reported.
    pub async fn start(&self, player: PlayerRecord) -> EffectiveSettings {
        let (discarded, previous) = {
            let mut session = self.shared.session.lock();
            // Input arriving during the teardown must not reach the old round
            let discarded = self.shared.ctx.world.update(WorldState::discard);
            (discarded, session.tasks.take())
        };
        if let Some(group) = previous {
            debug!("Tearing down previous round (discarded: {})", discarded);
            group.shutdown().await;
        }

        let settings = difficulty::resolve(&self.shared.options.base, player.difficulty);
        let now = Instant::now();

        info!(
            "Round started for {} (difficulty {}): {:?}, cap {}, {:?}",
            player.full_name,
            player.difficulty,
            settings.spawn_interval,
            settings.max_live_insects,
            settings.round_duration
        );

        {
            let mut session = self.shared.session.lock();
            self.shared.ctx.world.update(WorldState::reset_for_round);
            session.player = Some(player);
            session.settings = Some(settings);
            session.clock = Some(RoundClock::start(settings.round_duration, now));
            session.tasks = Some(self.launch(settings, settings.round_duration, None));
        }

        RoundMetrics::incr(&self.shared.ctx.metrics.rounds_started);
        self.shared.ctx.emit(RoundEvent::Started { settings });
        settings
    }

    /// Running -> Suspended. Tasks stop; world, elapsed time and tilt state
    /// are kept. Returns elapsed play time.
    pub fn suspend(&self) -> Result<Duration, SessionError> {
        let now = Instant::now();
        let elapsed = {
            let mut session = self.shared.session.lock();
            if !self.shared.ctx.world.update(WorldState::suspend) {
                return Err(SessionError::NotRunning);
            }
            if let Some(group) = session.tasks.take() {
                group.cancel();
            }
            session
                .clock
                .as_mut()
                .map(|c| c.pause(now))
                .unwrap_or_default()
        };

        info!("Round suspended at {:?}", elapsed);
        RoundMetrics::incr(&self.shared.ctx.metrics.rounds_suspended);
        self.shared.ctx.emit(RoundEvent::Suspended { elapsed });
        Ok(elapsed)
    }

    /// Suspended -> Running with whatever round time was left. Returns it.
    pub fn resume(&self) -> Result<Duration, SessionError> {
        let now = Instant::now();
        let mut session = self.shared.session.lock();
        let Some(settings) = session.settings else {
            return Err(SessionError::NotSuspended);
        };
        let Some(clock) = session.clock.as_mut() else {
            return Err(SessionError::NotSuspended);
        };
        if self.phase() != RoundPhase::Suspended {
            return Err(SessionError::NotSuspended);
        }

        let paused_for = clock.resume(now);
        let remaining = clock.remaining(now);
        let tilt = self.shared.ctx.world.update(|s| {
            s.resume(paused_for);
            s.tilt()
        });
        let tilt_ends_at = match tilt {
            TiltMode::Active { ends_at } => Some(ends_at),
            TiltMode::Inactive => None,
        };

        session.tasks = Some(self.launch(settings, remaining, tilt_ends_at));
        drop(session);

        info!("Round resumed with {:?} left", remaining);
        self.shared.ctx.emit(RoundEvent::Resumed { remaining });
        Ok(remaining)
    }

    /// End the round now, from Running or Suspended
    pub fn end(&self) -> Result<RoundSummary, SessionError> {
        self.finish(EndReason::Stopped)
            .ok_or(SessionError::NoActiveRound)
    }

    /// Resolve a tap on entity `id`
    pub fn tap(&self, id: EntityId) -> TapOutcome {
        let outcome = self.shared.ctx.world.apply_tap(id, Instant::now());
        let metrics = &self.shared.ctx.metrics;

        match outcome {
            TapOutcome::Scored { points, score } => {
                RoundMetrics::incr(&metrics.taps_scored);
                self.shared.ctx.emit(RoundEvent::Scored { id, points, score });
            }
            TapOutcome::BonusCollected {
                points,
                score,
                control_duration,
                tilt_ends_at,
            } => {
                RoundMetrics::incr(&metrics.bonuses_collected);
                RoundMetrics::incr(&metrics.tilt_activations);
                self.shared.ctx.emit(RoundEvent::Scored { id, points, score });
                self.shared.ctx.emit(RoundEvent::TiltActivated {
                    duration: control_duration,
                });
                debug!("Tilt control for {:?}", control_duration);

                let ctx = self.shared.ctx.clone();
                if let Some(group) = self.shared.session.lock().tasks.as_mut() {
                    group.spawn("tilt_countdown", move |token| {
                        tilt::run_countdown(ctx, tilt_ends_at, token)
                    });
                }
            }
            TapOutcome::AlreadyGone | TapOutcome::NotRunning => {}
        }
        outcome
    }

    /// A tap that hit no entity
    pub fn tap_background(&self) -> MissOutcome {
        let outcome = self.shared.ctx.world.update(WorldState::register_background_tap);

        match outcome {
            MissOutcome::Counted { misses, score } => {
                RoundMetrics::incr(&self.shared.ctx.metrics.misses);
                self.shared.ctx.emit(RoundEvent::Missed { misses, score });
            }
            MissOutcome::GameOver(summary) => {
                RoundMetrics::incr(&self.shared.ctx.metrics.misses);
                self.shared.ctx.emit(RoundEvent::Missed {
                    misses: summary.misses,
                    score: summary.score,
                });
                self.conclude(summary);
            }
            MissOutcome::NoTarget | MissOutcome::NotRunning => {}
        }
        outcome
    }

    /// Feed one orientation sample. Returns how many insects moved.
    pub fn handle_orientation(&self, sample: OrientationSample) -> usize {
        let tilt = self.shared.tilt;
        self.shared
            .ctx
            .world
            .update(|s| tilt.apply_orientation(s, sample))
    }

    /// Feed samples from an orientation stream until it closes
    pub async fn consume_orientation(&self, mut samples: mpsc::Receiver<OrientationSample>) {
        while let Some(sample) = samples.recv().await {
            self.handle_orientation(sample);
        }
        debug!("Orientation stream closed");
    }

    /// Spawn the round's task group, with the timer set to `remaining`
    fn launch(&self, settings: EffectiveSettings, remaining: Duration, tilt_ends_at: Option<Instant>) -> TaskGroup {
        let mut group = TaskGroup::new();
        let plan = SpawnPlan {
            settings,
            bonuses: self.shared.options.tilt_enabled,
            gold: self
                .shared
                .options
                .gold_rate_enabled
                .then(|| self.shared.gold.clone()),
        };

        let ctx = self.shared.ctx.clone();
        group.spawn("spawner", move |token| spawner::run(ctx, plan, token));
        let ctx = self.shared.ctx.clone();
        group.spawn("motion", move |token| motion::run(ctx, token));
        let ctx = self.shared.ctx.clone();
        group.spawn("reaper", move |token| reaper::run(ctx, token));

        let this = self.clone();
        group.spawn("round_timer", move |mut token| async move {
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {
                    this.finish(EndReason::TimeUp);
                }
                _ = token.cancelled() => {}
            }
        });

        if let Some(ends_at) = tilt_ends_at {
            let ctx = self.shared.ctx.clone();
            group.spawn("tilt_countdown", move |token| {
                tilt::run_countdown(ctx, ends_at, token)
            });
        }

        group
    }

    /// Move the world to Ended and report. Only the first caller gets a summary.
    fn finish(&self, reason: EndReason) -> Option<RoundSummary> {
        let summary = self.shared.ctx.world.update(|s| match reason {
            // A suspended round has no running timer
            EndReason::TimeUp if !s.is_running() => None,
            _ => s.end_round(reason),
        })?;
        self.conclude(summary);
        Some(summary)
    }

    /// Cancel the group, record the score and notify observers. Called once
    /// per round after the world has entered Ended. The score is written on
    /// the blocking pool and `Ended` follows the write.
    fn conclude(&self, summary: RoundSummary) {
        let now = Instant::now();
        let player = {
            let mut session = self.shared.session.lock();
            // A restart may already own the session
            if self.shared.ctx.world.phase() == RoundPhase::Ended {
                if let Some(clock) = session.clock.as_mut() {
                    clock.pause(now);
                }
                // The timer task may be the caller, so cancel without joining
                if let Some(group) = session.tasks.take() {
                    group.cancel();
                }
            }
            session.player.clone()
        };

        let metrics = &self.shared.ctx.metrics;
        RoundMetrics::incr(&metrics.rounds_completed);
        metrics.last_score.store(summary.score, Ordering::Relaxed);
        info!(
            "Round ended ({:?}): score={}, misses={}",
            summary.reason, summary.score, summary.misses
        );

        let store = self.shared.store.clone();
        let ctx = self.shared.ctx.clone();
        let report = move || {
            if let Some(player) = player {
                match record_if_best(store.as_ref(), &player, &summary) {
                    Ok(true) => {}
                    Ok(false) => debug!("Score {} is not a new best", summary.score),
                    Err(e) => warn!("Failed to record score: {}", e),
                }
            }
            ctx.emit(RoundEvent::Ended(summary));
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(report);
            }
            Err(_) => report(),
        }
    }

    #[cfg(test)]
    fn has_tasks(&self) -> bool {
        self.shared.session.lock().tasks.is_some()
    }
}
