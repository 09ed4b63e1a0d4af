use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::content::{load_content_database, ContentDatabase, ContentPipelineError, ContentRequest};
use crate::world::{World, WorldSnapshot};
use crate::{resolve_app_paths, StartupError};

use super::metrics::{LoopMetricsSnapshot, MetricsAccumulator, MetricsHandle};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub ticks: u64,
    /// Wall-clock pacing; 0 runs as fast as possible.
    pub target_tps: u32,
    pub max_ticks_per_wake: u32,
    pub seed: u64,
    pub metrics_log_interval: Duration,
    pub content_request: ContentRequest,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            ticks: 2_000,
            target_tps: 0,
            max_ticks_per_wake: 5,
            seed: 0x5C00_1DA2,
            metrics_log_interval: Duration::from_secs(1),
            content_request: ContentRequest::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load content database: {0}")]
    ContentPipeline(#[from] ContentPipelineError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub bells_rung: u64,
    pub content_fingerprint: String,
    pub metrics: LoopMetricsSnapshot,
    pub world: WorldSnapshot,
}

pub fn run_simulation(config: &LoopConfig) -> Result<RunSummary, AppError> {
    run_simulation_with_metrics(config, MetricsHandle::default())
}

/// Resolves the project root, loads content and runs the configured ticks.
pub fn run_simulation_with_metrics(
    config: &LoopConfig,
    metrics_handle: MetricsHandle,
) -> Result<RunSummary, AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        mods_dir = %app_paths.mods_dir.display(),
        enabled_mods = ?config.content_request.enabled_mods,
        "startup"
    );
    let database = load_content_database(&app_paths, &config.content_request)?;
    Ok(run_content(&database, config, &metrics_handle))
}

/// Builds a fresh world from `database` and runs it.
pub fn run_content(
    database: &ContentDatabase,
    config: &LoopConfig,
    metrics_handle: &MetricsHandle,
) -> RunSummary {
    let mut world = World::from_content(database, config.seed);
    world.start();
    let metrics = run_world(&mut world, config, metrics_handle);
    RunSummary {
        ticks_run: world.tick_count(),
        bells_rung: world.bells_rung(),
        content_fingerprint: database.fingerprint.clone(),
        metrics,
        world: world.snapshot(),
    }
}

/// Advances an already started world by `config.ticks` ticks.
pub fn run_world(
    world: &mut World,
    config: &LoopConfig,
    metrics_handle: &MetricsHandle,
) -> LoopMetricsSnapshot {
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let max_ticks_per_wake = config.max_ticks_per_wake.max(1);
    let fixed_dt = (config.target_tps > 0)
        .then(|| Duration::from_secs_f64(1.0 / config.target_tps as f64));
    info!(
        ticks = config.ticks,
        target_tps = config.target_tps,
        max_ticks_per_wake,
        seed = config.seed,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, Instant::now());
    let mut remaining = config.ticks;
    let mut accumulator = Duration::ZERO;
    let mut last_wake = Instant::now();

    while remaining > 0 {
        let budget = match fixed_dt {
            None => u64::from(max_ticks_per_wake),
            Some(fixed_dt) => {
                let now = Instant::now();
                accumulator = accumulator.saturating_add(now.saturating_duration_since(last_wake));
                last_wake = now;

                let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_wake);
                accumulator = step_plan.remaining_accumulator;
                if step_plan.dropped_backlog > Duration::ZERO {
                    warn!(
                        dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                        max_ticks_per_wake, "sim_clamp_triggered"
                    );
                }
                if step_plan.ticks_to_run == 0 {
                    thread::sleep(fixed_dt.saturating_sub(accumulator));
                    continue;
                }
                u64::from(step_plan.ticks_to_run)
            }
        };

        let batch = budget.min(remaining);
        for _ in 0..batch {
            let started = Instant::now();
            world.tick();
            metrics_accumulator.record_tick(started.elapsed());
        }
        remaining -= batch;

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            log_metrics(snapshot, world);
        }
    }

    let snapshot = metrics_accumulator.flush(Instant::now());
    metrics_handle.publish(snapshot);
    info!(
        ticks = world.tick_count(),
        bells_rung = world.bells_rung(),
        lesson = world
            .timetable()
            .current()
            .map_or("<none>", |lesson| lesson.id.as_str()),
        "simulation_finished"
    );
    snapshot
}

fn log_metrics(snapshot: LoopMetricsSnapshot, world: &World) {
    info!(
        tps = snapshot.tps,
        tick_time_ms = snapshot.tick_time_ms,
        ticks_total = snapshot.ticks_total,
        characters = world.characters().len(),
        bells_rung = world.bells_rung(),
        "loop_metrics"
    );
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_wake: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_wake {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
