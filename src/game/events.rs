//! Observer notifications and round results

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::difficulty::EffectiveSettings;
use crate::game::entity::{EntityId, EntityKind};

/// Why a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Round timer ran out
    TimeUp,
    /// Miss limit reached
    MissLimit,
    /// Ended by an explicit command
    Stopped,
}

/// Final result of a completed round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub score: i64,
    pub misses: u32,
    pub reason: EndReason,
}

/// Events published to observers (renderer, HUD, logging)
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    Started { settings: EffectiveSettings },
    Spawned { id: EntityId, kind: EntityKind },
    Expired { id: EntityId },
    Scored { id: EntityId, points: i64, score: i64 },
    Missed { misses: u32, score: i64 },
    TiltActivated { duration: Duration },
    /// Whole seconds of tilt control left; display only
    TiltCountdown { remaining_secs: u64 },
    TiltDeactivated,
    Suspended { elapsed: Duration },
    Resumed { remaining: Duration },
    /// Sent exactly once per completed round
    Ended(RoundSummary),
}
