/// Spawner timing and entity catalogue
pub mod spawn {
    use std::time::Duration;

    /// Lower bound on the insect spawn period
    pub const MIN_INSECT_INTERVAL: Duration = Duration::from_millis(100);
    /// Base period before speed scaling: period = BASE / effective speed
    pub const BASE_INSECT_INTERVAL_MS: u64 = 1000;
    /// A bonus is offered this often, if none is live
    pub const BONUS_INTERVAL: Duration = Duration::from_millis(15_000);
    /// A golden insect appears this often, ignoring the insect cap
    pub const GOLDEN_INTERVAL: Duration = Duration::from_millis(20_000);
    /// Speed magnitude bound for golden insects
    pub const GOLDEN_BASE_SPEED: f32 = 2.0;
}

/// Entity footprints, lifetimes and rewards
pub mod entity {
    use std::time::Duration;

    /// Footprint (square side) of a normal insect in arena units
    pub const INSECT_SIZE: f32 = 60.0;
    /// Footprint of a golden insect
    pub const GOLDEN_SIZE: f32 = 70.0;
    /// Footprint of a bonus
    pub const BONUS_SIZE: f32 = 50.0;

    pub const INSECT_TTL: Duration = Duration::from_millis(5_000);
    pub const GOLDEN_TTL: Duration = Duration::from_millis(7_000);
    pub const BONUS_TTL: Duration = Duration::from_millis(5_000);

    pub const BUG_POINTS: i64 = 5;
    pub const COCKROACH_POINTS: i64 = 10;
    /// Score granted when a bonus is picked up
    pub const BONUS_PICKUP_POINTS: i64 = 20;
    /// Tilt control granted by a bonus
    pub const BONUS_CONTROL_DURATION: Duration = Duration::from_millis(10_000);
}

/// Motion integrator
pub mod motion {
    use std::time::Duration;

    pub const TICK: Duration = Duration::from_millis(50);
}

/// Lifetime reaper
pub mod reaper {
    use std::time::Duration;

    pub const TICK: Duration = Duration::from_millis(1_000);
}

/// Tilt control
pub mod tilt {
    use std::time::Duration;

    /// Displacement per unit of orientation reading
    pub const SENSITIVITY: f32 = 15.0;
    /// Countdown notification period
    pub const COUNTDOWN_TICK: Duration = Duration::from_millis(1_000);
}

/// Round rules
pub mod round {
    /// Reaching this many misses ends the round
    pub const MAX_MISSES: u32 = 10;
    /// Score lost per miss
    pub const MISS_PENALTY: i64 = 1;
    /// Minimum effective round length in seconds
    pub const MIN_DURATION_SECS: u64 = 10;
    /// Capacity of the observer channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
}

/// Difficulty scaling
pub mod difficulty {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 10;
    /// Round length shrinks by up to this fraction at maximum difficulty
    pub const DURATION_SHRINK: f64 = 0.5;
}

/// Gold-rate points and caching
pub mod gold {
    use std::time::Duration;

    /// Rate units per point awarded by a golden insect
    pub const RATE_PER_POINT: f64 = 10_000.0;
    /// Rate used until a fetch succeeds (per kg)
    pub const DEFAULT_RATE: f64 = 7_500_000.0;
    pub const DEFAULT_LABEL: &str = "Gold";
    /// How long a fetched rate stays fresh
    pub const CACHE_TTL: Duration = Duration::from_secs(30 * 60);
    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
}
