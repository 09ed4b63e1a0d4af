mod loop_runner;
mod metrics;

pub use loop_runner::{
    run_content, run_simulation, run_simulation_with_metrics, run_world, AppError, LoopConfig,
    RunSummary,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
