//! Periodic round tasks
//!
//! Each system is a pure step function over [`WorldState`] plus an async
//! loop that runs it on its own period until the round's group is cancelled.
//!
//! [`WorldState`]: crate::game::world::WorldState

pub mod motion;
pub mod reaper;
pub mod spawner;
pub mod tilt;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::game::events::RoundEvent;
use crate::game::world::World;
use crate::metrics::RoundMetrics;

/// Handles every round task shares
#[derive(Debug, Clone)]
pub struct RoundContext {
    pub world: World,
    pub events: broadcast::Sender<RoundEvent>,
    pub metrics: Arc<RoundMetrics>,
}

impl RoundContext {
    pub fn new(world: World, events: broadcast::Sender<RoundEvent>, metrics: Arc<RoundMetrics>) -> Self {
        Self {
            world,
            events,
            metrics,
        }
    }

    /// Publish to observers. Having none is fine.
    pub fn emit(&self, event: RoundEvent) {
        let _ = self.events.send(event);
    }
}
