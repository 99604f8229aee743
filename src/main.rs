use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use insect_arena::config::EngineConfig;
use insect_arena::game::constants::gold;
use insect_arena::game::events::RoundEvent;
use insect_arena::game::round::RoundCoordinator;
use insect_arena::game::systems::tilt::OrientationSample;
use insect_arena::game::world::RoundPhase;
use insect_arena::gold::GoldRateCache;
use insect_arena::store::{JsonScoreStore, MemoryScoreStore, PlayerRecord, ScoreStore};

/// How often the headless player acts
const INPUT_PERIOD: Duration = Duration::from_millis(400);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Insect Arena v{}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: speed={}, insects={}, round={}s, difficulty={}, arena={}x{}",
        config.game_speed,
        config.max_insects,
        config.round_duration,
        config.player_difficulty,
        config.arena_width,
        config.arena_height
    );

    let store: Arc<dyn ScoreStore> = match &config.score_store_path {
        Some(path) => {
            let store = JsonScoreStore::open(path)?;
            info!("Scores stored in {}", store.path().display());
            Arc::new(store)
        }
        None => Arc::new(MemoryScoreStore::new()),
    };

    let gold_cache = Arc::new(GoldRateCache::new());
    if config.gold_rate_enabled {
        spawn_gold_refresh(&config, gold_cache.clone())?;
    }

    let player = PlayerRecord::new(
        "Demo Player",
        "-",
        "1",
        chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
        config.player_difficulty,
    );
    store.save_player(player.clone())?;

    let coordinator = RoundCoordinator::new(config.round_options(), gold_cache, store.clone());
    let events = coordinator.subscribe();
    let logger = tokio::spawn(log_events(events));

    coordinator.start(player.clone()).await;

    let (orientation_tx, orientation_rx) = mpsc::channel(16);
    let orientation = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.consume_orientation(orientation_rx).await })
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = play(&coordinator, orientation_tx) => {}
        _ = shutdown => {
            match coordinator.end() {
                Ok(summary) => info!("Round stopped early: score={}", summary.score),
                Err(e) => debug!("Nothing to stop: {}", e),
            }
        }
    }

    orientation.abort();
    if let Err(e) = logger.await {
        warn!("Event logger failed: {}", e);
    }

    match store.top_scores() {
        Ok(top) => {
            for (rank, entry) in top.iter().enumerate() {
                info!(
                    "#{} {} - {} (misses {})",
                    rank + 1,
                    entry.player.full_name,
                    entry.score.score,
                    entry.score.misses
                );
            }
        }
        Err(e) => warn!("Could not read score board: {}", e),
    }
    debug!("Final metrics:\n{}", coordinator.metrics().to_prometheus());
    info!("Stopped");

    Ok(())
}

/// Refresh the gold rate now and every cache period after
fn spawn_gold_refresh(config: &EngineConfig, cache: Arc<GoldRateCache>) -> anyhow::Result<()> {
    #[cfg(feature = "gold_feed")]
    {
        let feed = insect_arena::gold::CbrGoldFeed::new(config.gold_feed_url.clone())?;
        tokio::spawn(async move {
            let mut ticker = interval(gold::CACHE_TTL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                cache.refresh(&feed).await;
            }
        });
    }

    #[cfg(not(feature = "gold_feed"))]
    {
        let _ = (config, cache);
        info!(
            "Built without gold_feed; golden insects use the fallback rate of {:.0}",
            gold::DEFAULT_RATE
        );
    }

    Ok(())
}

/// Headless player: taps live entities, sometimes misses, tilts while a
/// bonus is in effect. Returns once the round has ended.
async fn play(coordinator: &RoundCoordinator, orientation: mpsc::Sender<OrientationSample>) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = interval(INPUT_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let snapshot = coordinator.snapshot();
        if snapshot.phase == RoundPhase::Ended {
            break;
        }

        if snapshot.tilt.is_active() {
            let sample = OrientationSample::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
            if orientation.send(sample).await.is_err() {
                warn!("Orientation consumer gone");
            }
        }

        let roll: f32 = rng.gen();
        if roll < 0.1 {
            coordinator.tap_background();
        } else if roll < 0.6 && !snapshot.entities.is_empty() {
            let target = &snapshot.entities[rng.gen_range(0..snapshot.entities.len())];
            coordinator.tap(target.id);
        }
    }
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<RoundEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(RoundEvent::Ended(summary)) => {
                info!(
                    "Final score {} with {} misses ({:?})",
                    summary.score, summary.misses, summary.reason
                );
                break;
            }
            Ok(RoundEvent::TiltActivated { duration }) => info!("Tilt control for {:?}", duration),
            Ok(RoundEvent::TiltDeactivated) => info!("Tilt control over"),
            Ok(event) => debug!("{:?}", event),
            Err(RecvError::Lagged(n)) => warn!("Event logger skipped {} events", n),
            Err(RecvError::Closed) => break,
        }
    }
}
