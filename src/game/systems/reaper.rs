//! Lifetime reaper
//!
//! Once a second: drop entities past their time-to-live and switch tilt
//! control off once its end time has passed. This is the only place tilt
//! expires on its own.

use smallvec::SmallVec;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::RoundContext;
use crate::game::constants::reaper;
use crate::game::entity::EntityId;
use crate::game::events::RoundEvent;
use crate::game::tasks::CancelToken;
use crate::game::world::WorldState;
use crate::metrics::RoundMetrics;

/// What one reaper pass removed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReapReport {
    pub expired: SmallVec<[EntityId; 8]>,
    pub tilt_expired: bool,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && !self.tilt_expired
    }
}

pub fn reap(state: &mut WorldState, now: Instant) -> ReapReport {
    if !state.is_running() {
        return ReapReport::default();
    }
    ReapReport {
        expired: state.reap_expired(now),
        tilt_expired: state.expire_tilt(now),
    }
}

pub async fn run(ctx: RoundContext, mut cancel: CancelToken) {
    let mut ticker = interval_at(Instant::now() + reaper::TICK, reaper::TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let report = ctx.world.update(|s| reap(s, Instant::now()));
                if report.is_empty() {
                    continue;
                }

                RoundMetrics::add(&ctx.metrics.entities_expired, report.expired.len() as u64);
                for id in report.expired {
                    ctx.emit(RoundEvent::Expired { id });
                }
                if report.tilt_expired {
                    debug!("Tilt control expired");
                    ctx.emit(RoundEvent::TiltDeactivated);
                }
            }
        }
    }

    debug!("Reaper stopped");
}
